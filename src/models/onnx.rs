//! Forest classifier exported to ONNX, run through ONNX Runtime

use crate::error::{ModelError, PredictError};
use crate::features::{FeatureVector, FEATURE_COUNT};
use crate::models::classifier::Classifier;
use ort::memory::Allocator;
use ort::session::{builder::GraphOptimizationLevel, Session, SessionOutputs};
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, DynValue, Tensor};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// ONNX classifier with `label` and `probabilities` outputs.
///
/// A session run needs exclusive access, so the session sits behind a mutex.
pub struct OnnxClassifier {
    session: Mutex<Session>,
    input_name: String,
    label_output: String,
    probability_output: String,
}

impl OnnxClassifier {
    /// Load an ONNX model from file
    pub fn load<P: AsRef<Path>>(path: P, intra_threads: usize) -> Result<Self, ModelError> {
        let path = path.as_ref();

        info!(path = %path.display(), threads = intra_threads, "Loading ONNX model");

        let session = Session::builder()
            .map_err(ModelError::runtime)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(ModelError::runtime)?
            .with_intra_threads(intra_threads)
            .map_err(ModelError::runtime)?
            .commit_from_file(path)
            .map_err(ModelError::runtime)?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| ModelError::InvalidArtifact("ONNX model has no inputs".to_string()))?;

        let label_output = session
            .outputs
            .iter()
            .find(|o| o.name.contains("label"))
            .or_else(|| session.outputs.first())
            .map(|o| o.name.clone())
            .ok_or_else(|| ModelError::InvalidArtifact("ONNX model has no outputs".to_string()))?;

        let probability_output = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .or_else(|| session.outputs.get(1))
            .map(|o| o.name.clone())
            .ok_or_else(|| {
                ModelError::InvalidArtifact("ONNX model has no probability output".to_string())
            })?;

        info!(
            input = %input_name,
            label = %label_output,
            probabilities = %probability_output,
            "ONNX model loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            label_output,
            probability_output,
        })
    }

    /// Run the session once, returning label and class distribution.
    fn run(&self, row: &FeatureVector) -> Result<(i64, Vec<f64>), PredictError> {
        let shape = vec![1_i64, FEATURE_COUNT as i64];
        let input_tensor =
            Tensor::from_array((shape, row.as_f32())).map_err(PredictError::inference)?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| PredictError::Inference(format!("Lock error: {}", e)))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])
            .map_err(PredictError::inference)?;

        let label = self.extract_label(&outputs)?;
        let distribution = self.extract_distribution(&outputs)?;

        debug!(label = label, distribution = ?distribution, "ONNX inference complete");
        Ok((label, distribution))
    }

    fn extract_label(&self, outputs: &SessionOutputs) -> Result<i64, PredictError> {
        let output = outputs.get(self.label_output.as_str()).ok_or_else(|| {
            PredictError::Inference(format!("missing output '{}'", self.label_output))
        })?;

        let (_, data) = output
            .try_extract_tensor::<i64>()
            .map_err(PredictError::inference)?;
        data.first()
            .copied()
            .ok_or_else(|| PredictError::Inference("empty label output".to_string()))
    }

    /// Handles both plain tensors and `seq(map(int64, float))` outputs.
    fn extract_distribution(&self, outputs: &SessionOutputs) -> Result<Vec<f64>, PredictError> {
        let output = outputs.get(self.probability_output.as_str()).ok_or_else(|| {
            PredictError::Inference(format!("missing output '{}'", self.probability_output))
        })?;

        if let Ok((_, data)) = output.try_extract_tensor::<f32>() {
            return Ok(data.iter().map(|&p| p as f64).collect());
        }

        if DynSequenceValueType::can_downcast(&output.dtype()) {
            return extract_from_sequence_map(output);
        }

        Err(PredictError::Inference(format!(
            "unsupported probability output type: {:?}",
            output.dtype()
        )))
    }
}

/// Distribution from the first map of a `seq(map(int64, float))`, ordered
/// by class id.
fn extract_from_sequence_map(output: &DynValue) -> Result<Vec<f64>, PredictError> {
    let allocator = Allocator::default();

    let sequence = output
        .downcast_ref::<DynSequenceValueType>()
        .map_err(|e| PredictError::Inference(format!("Failed to downcast to sequence: {}", e)))?;

    let maps = sequence
        .try_extract_sequence::<DynMapValueType>(&allocator)
        .map_err(PredictError::inference)?;
    let first = maps
        .first()
        .ok_or_else(|| PredictError::Inference("Empty sequence".to_string()))?;

    let mut pairs = first
        .try_extract_key_values::<i64, f32>()
        .map_err(PredictError::inference)?;
    pairs.sort_by_key(|(class_id, _)| *class_id);

    Ok(pairs.into_iter().map(|(_, p)| p as f64).collect())
}

impl Classifier for OnnxClassifier {
    fn kind(&self) -> &'static str {
        "onnx"
    }

    fn classify(&self, row: &FeatureVector) -> Result<i64, PredictError> {
        self.run(row).map(|(label, _)| label)
    }

    fn score(&self, row: &FeatureVector) -> Result<Vec<f64>, PredictError> {
        self.run(row).map(|(_, distribution)| distribution)
    }

    fn classify_and_score(&self, row: &FeatureVector) -> Result<(i64, Vec<f64>), PredictError> {
        self.run(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::tests::example_form;
    use crate::features::FeatureExtractor;
    use std::collections::HashMap;

    // One tree splitting on age at 35.5: [0.25, 0.75] below, [0.9, 0.1] above.
    const TENSOR_MODEL: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/forest_tensor.onnx");
    const ZIPMAP_MODEL: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/forest_zipmap.onnx");

    fn row(form: &HashMap<String, String>) -> FeatureVector {
        FeatureExtractor::new().extract(form).unwrap()
    }

    fn load(path: &str) -> OnnxClassifier {
        ort::init().commit().unwrap();
        OnnxClassifier::load(path, 1).unwrap()
    }

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-6, "{:?} != {:?}", actual, expected);
        }
    }

    fn check_outputs(model: &OnnxClassifier) {
        let (label, distribution) = model.classify_and_score(&row(&example_form())).unwrap();
        assert_eq!(label, 1);
        assert_close(&distribution, &[0.25, 0.75]);

        let mut older = example_form();
        older.insert("age".to_string(), "40".to_string());
        let (label, distribution) = model.classify_and_score(&row(&older)).unwrap();
        assert_eq!(label, 0);
        assert_close(&distribution, &[0.9, 0.1]);

        assert_eq!(model.classify(&row(&HashMap::new())).unwrap(), 1);
    }

    #[test]
    #[ignore = "needs the ONNX Runtime library"]
    fn test_tensor_probabilities() {
        let model = load(TENSOR_MODEL);
        assert_eq!(model.input_name, "float_input");
        assert_eq!(model.label_output, "output_label");
        assert_eq!(model.probability_output, "output_probability");
        check_outputs(&model);
    }

    #[test]
    #[ignore = "needs the ONNX Runtime library"]
    fn test_zipmap_probabilities() {
        let model = load(ZIPMAP_MODEL);
        assert_eq!(model.probability_output, "output_probability");
        check_outputs(&model);
    }
}
