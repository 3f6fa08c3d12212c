//! Classifier abstraction shared by every artifact format

use crate::error::PredictError;
use crate::features::FeatureVector;

/// Index of the positive ("default") class in a two-class distribution.
pub const POSITIVE_CLASS_INDEX: usize = 1;

/// A loaded, read-only binary classifier.
///
/// Implementations must be safe to call from many requests at once.
pub trait Classifier: Send + Sync {
    /// Artifact format, for logging.
    fn kind(&self) -> &'static str;

    /// Predicted class label for one row.
    fn classify(&self, row: &FeatureVector) -> Result<i64, PredictError>;

    /// Probability distribution over classes for one row.
    fn score(&self, row: &FeatureVector) -> Result<Vec<f64>, PredictError>;

    /// Label and distribution from a single evaluation of the model.
    fn classify_and_score(&self, row: &FeatureVector) -> Result<(i64, Vec<f64>), PredictError> {
        Ok((self.classify(row)?, self.score(row)?))
    }
}

/// Label plus positive-class probability for one row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub label: i64,
    pub default_probability: f64,
}

/// Evaluate the model once, then keep the positive-class probability.
pub fn predict(model: &dyn Classifier, row: &FeatureVector) -> Result<Prediction, PredictError> {
    let (label, distribution) = model.classify_and_score(row)?;
    let default_probability = positive_probability(&distribution)?;

    Ok(Prediction {
        label,
        default_probability,
    })
}

/// Select the positive-class mass from a distribution.
pub fn positive_probability(distribution: &[f64]) -> Result<f64, PredictError> {
    let p = distribution
        .get(POSITIVE_CLASS_INDEX)
        .copied()
        .ok_or_else(|| {
            PredictError::Inference(format!(
                "expected at least 2 class probabilities, got {}",
                distribution.len()
            ))
        })?;

    if !(0.0..=1.0).contains(&p) {
        return Err(PredictError::Inference(format!(
            "positive class probability {} outside [0, 1]",
            p
        )));
    }

    Ok(p)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::features::{FeatureExtractor, FeatureVector};
    use std::sync::Mutex;

    /// Test double that records the rows it receives.
    pub(crate) struct StubClassifier {
        pub label: i64,
        pub distribution: Vec<f64>,
        pub fail: bool,
        pub seen: Mutex<Vec<Vec<f64>>>,
    }

    impl StubClassifier {
        pub(crate) fn new(label: i64, distribution: Vec<f64>) -> Self {
            Self {
                label,
                distribution,
                fail: false,
                seen: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(0, vec![1.0, 0.0])
            }
        }
    }

    impl Classifier for StubClassifier {
        fn kind(&self) -> &'static str {
            "stub"
        }

        fn classify(&self, row: &FeatureVector) -> Result<i64, PredictError> {
            if self.fail {
                return Err(PredictError::Inference("stub failure".to_string()));
            }
            self.seen.lock().unwrap().push(row.as_f64().to_vec());
            Ok(self.label)
        }

        fn score(&self, _row: &FeatureVector) -> Result<Vec<f64>, PredictError> {
            Ok(self.distribution.clone())
        }
    }

    #[test]
    fn test_predict_selects_positive_class() {
        let model = StubClassifier::new(1, vec![0.25, 0.75]);
        let row = FeatureExtractor::new()
            .extract(&crate::features::tests::example_form())
            .unwrap();

        let prediction = predict(&model, &row).unwrap();
        assert_eq!(prediction.label, 1);
        assert_eq!(prediction.default_probability, 0.75);
        assert_eq!(model.seen.lock().unwrap()[0], row.as_f64().to_vec());
    }

    #[test]
    fn test_positive_probability_rejects_bad_distributions() {
        assert!(positive_probability(&[1.0]).is_err());
        assert!(positive_probability(&[]).is_err());
        assert!(positive_probability(&[0.0, 1.5]).is_err());
        assert!(positive_probability(&[0.0, f64::NAN]).is_err());
        assert_eq!(positive_probability(&[0.4, 0.6]).unwrap(), 0.6);
    }

    #[test]
    fn test_predict_propagates_model_failure() {
        let model = StubClassifier::failing();
        let row = FeatureExtractor::new()
            .extract(&std::collections::HashMap::new())
            .unwrap();

        assert!(matches!(
            predict(&model, &row),
            Err(PredictError::Inference(_))
        ));
    }
}
