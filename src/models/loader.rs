//! Model artifact loader

use crate::error::ModelError;
use crate::models::classifier::Classifier;
use crate::models::forest::ForestClassifier;
use crate::models::onnx::OnnxClassifier;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Loads the classifier artifact once at startup.
///
/// The format is chosen from the file extension: `.json` for a native
/// forest, `.onnx` for an exported model run with ONNX Runtime.
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    pub fn new() -> Self {
        Self::with_threads(1)
    }

    pub fn with_threads(onnx_threads: usize) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
        }
    }

    /// Load the artifact at `path` into a shared read-only classifier.
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Arc<dyn Classifier>, ModelError> {
        let path = path.as_ref();

        if !path.is_file() {
            return Err(ModelError::NotFound(path.to_path_buf()));
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        let model: Arc<dyn Classifier> = match extension.as_deref() {
            Some("json") => {
                let json = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                let forest = ForestClassifier::from_json(&json)?;
                info!(
                    path = %path.display(),
                    trees = forest.tree_count(),
                    classes = ?forest.classes(),
                    "Forest model loaded"
                );
                Arc::new(forest)
            }
            Some("onnx") => {
                ort::init().commit().map_err(ModelError::runtime)?;
                Arc::new(OnnxClassifier::load(path, self.onnx_threads)?)
            }
            _ => return Err(ModelError::UnsupportedFormat(path.to_path_buf())),
        };

        Ok(model)
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}
