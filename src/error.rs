//! Error types for model loading and prediction

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading the model artifact. All of them are fatal
/// at startup.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model artifact '{}' not found, check its location", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read model artifact '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported model artifact format: '{}'", .0.display())]
    UnsupportedFormat(PathBuf),
    #[error("invalid model artifact: {0}")]
    InvalidArtifact(String),
    #[error("model feature order does not match the form schema: {0}")]
    SchemaMismatch(String),
    #[error("ONNX runtime error: {0}")]
    Runtime(String),
}

/// Errors raised while serving a single prediction.
#[derive(Debug, Error)]
pub enum PredictError {
    /// The feature row could not be assembled.
    #[error("invalid features: {0}")]
    Validation(String),
    /// The model failed or returned an unusable output.
    #[error("inference failed: {0}")]
    Inference(String),
}

impl ModelError {
    pub(crate) fn runtime(e: impl std::fmt::Display) -> Self {
        ModelError::Runtime(e.to_string())
    }
}

impl PredictError {
    pub(crate) fn inference(e: impl std::fmt::Display) -> Self {
        PredictError::Inference(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_names_path() {
        let err = ModelError::NotFound(PathBuf::from("models/forest.json"));
        assert_eq!(
            err.to_string(),
            "model artifact 'models/forest.json' not found, check its location"
        );
    }

    #[test]
    fn test_predict_error_display() {
        let err = PredictError::Inference("empty distribution".to_string());
        assert_eq!(err.to_string(), "inference failed: empty distribution");
    }
}
