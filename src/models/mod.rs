//! Classifier artifacts and inference

pub mod classifier;
pub mod forest;
pub mod loader;
pub mod onnx;

pub use classifier::{predict, Classifier, Prediction};
pub use forest::ForestClassifier;
pub use loader::ModelLoader;
pub use onnx::OnnxClassifier;
