//! Credit Risk Server Library
//!
//! Serves credit default predictions from a pre-trained forest classifier
//! through a web form: 17 numeric fields in, predicted class and default
//! probability out.

pub mod config;
pub mod error;
pub mod features;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod server;
pub mod types;
pub mod views;

pub use config::AppConfig;
pub use error::{ModelError, PredictError};
pub use features::{FeatureExtractor, FeatureVector, FEATURE_SCHEMA};
pub use handlers::AppState;
pub use models::{Classifier, ModelLoader};
pub use types::prediction::PredictionResult;
