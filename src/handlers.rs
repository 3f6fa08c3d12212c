//! HTTP request handlers

use crate::error::PredictError;
use crate::features::FeatureExtractor;
use crate::metrics::{MetricsSnapshot, ServiceMetrics};
use crate::models::{self, Classifier};
use crate::types::prediction::{PredictionResult, RiskLevelThresholds};
use crate::views;
use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

/// Prefix of every 500 response body
pub const ERROR_PREFIX: &str = "Une erreur est survenue : ";

/// Shared, read-only state handed to every request
#[derive(Clone)]
pub struct AppState {
    pub model: Arc<dyn Classifier>,
    pub extractor: FeatureExtractor,
    pub metrics: Arc<ServiceMetrics>,
    pub risk_levels: RiskLevelThresholds,
}

impl AppState {
    pub fn new(model: Arc<dyn Classifier>, risk_levels: RiskLevelThresholds) -> Self {
        Self {
            model,
            extractor: FeatureExtractor::new(),
            metrics: Arc::new(ServiceMetrics::new()),
            risk_levels,
        }
    }

    /// Coerce the form, run the model and record the outcome.
    pub fn run_prediction(
        &self,
        form: &HashMap<String, String>,
    ) -> Result<PredictionResult, PredictError> {
        let start_time = Instant::now();

        let outcome = self
            .extractor
            .extract(form)
            .and_then(|row| models::predict(self.model.as_ref(), &row));

        match outcome {
            Ok(prediction) => {
                let result = PredictionResult::new(
                    prediction.label,
                    prediction.default_probability,
                    &self.risk_levels,
                );
                let latency = start_time.elapsed();
                self.metrics.record_prediction(
                    latency,
                    result.label,
                    result.default_probability,
                    result.risk_level.as_str(),
                );
                debug!(
                    prediction_id = %result.prediction_id,
                    label = result.label,
                    default_probability = result.default_probability,
                    risk_level = ?result.risk_level,
                    latency_us = latency.as_micros(),
                    "Prediction served"
                );
                Ok(result)
            }
            Err(e) => {
                self.metrics.record_failure(start_time.elapsed());
                error!(model = self.model.kind(), error = %e, "Prediction failed");
                Err(e)
            }
        }
    }
}

/// Any per-request failure, rendered as a plain-text 500.
#[derive(Debug)]
pub struct AppError(PredictError);

impl From<PredictError> for AppError {
    fn from(e: PredictError) -> Self {
        AppError(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("{}{}", ERROR_PREFIX, self.0),
        )
            .into_response()
    }
}

/// Submitted form fields.
///
/// Reads urlencoded and multipart bodies; a missing body or any other
/// content type yields no fields, so every feature takes its default.
/// A repeated key keeps its first value. File parts are ignored.
#[derive(Debug, Default)]
pub struct FormFields(pub HashMap<String, String>);

impl FormFields {
    fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut fields = HashMap::new();
        for (name, value) in pairs {
            fields.entry(name).or_insert(value);
        }
        FormFields(fields)
    }
}

fn malformed_body(e: impl std::fmt::Display) -> AppError {
    AppError(PredictError::Validation(format!("malformed form body: {}", e)))
}

#[axum::async_trait]
impl<S> FromRequest<S> for FormFields
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        if content_type.starts_with("multipart/form-data") {
            let mut multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| malformed_body(e.body_text()))?;

            let mut pairs = Vec::new();
            while let Some(field) = multipart.next_field().await.map_err(malformed_body)? {
                if field.file_name().is_some() {
                    continue;
                }
                let Some(name) = field.name().map(str::to_string) else {
                    continue;
                };
                let value = field.text().await.map_err(malformed_body)?;
                pairs.push((name, value));
            }
            return Ok(Self::from_pairs(pairs));
        }

        if content_type.is_empty() || content_type.starts_with("application/x-www-form-urlencoded") {
            let body = Bytes::from_request(req, state)
                .await
                .map_err(|e| malformed_body(e.body_text()))?;
            let pairs: Vec<(String, String)> =
                serde_urlencoded::from_bytes(&body).map_err(malformed_body)?;
            return Ok(Self::from_pairs(pairs));
        }

        debug!(content_type = %content_type, "Body is not a form, using defaults");
        Ok(Self::default())
    }
}

/// `GET /`
pub async fn index() -> Html<String> {
    Html(views::form_page())
}

/// `POST /predict`
pub async fn predict(
    State(state): State<AppState>,
    FormFields(form): FormFields,
) -> Result<Html<String>, AppError> {
    let result = state.run_prediction(&form)?;
    Ok(Html(views::result_page(&result)))
}

/// `POST /api/predict`
pub async fn api_predict(
    State(state): State<AppState>,
    FormFields(form): FormFields,
) -> Result<Json<PredictionResult>, AppError> {
    let result = state.run_prediction(&form)?;
    Ok(Json(result))
}

/// `GET /health`
pub async fn health() -> &'static str {
    "ok"
}

/// `GET /metrics`
pub async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::tests::example_form;
    use crate::models::classifier::tests::StubClassifier;

    #[test]
    fn test_run_prediction_records_success() {
        let state = AppState::new(
            Arc::new(StubClassifier::new(1, vec![0.1, 0.9])),
            RiskLevelThresholds::default(),
        );

        let result = state.run_prediction(&example_form()).unwrap();
        assert_eq!(result.label, 1);
        assert_eq!(result.default_probability, 0.9);

        let snapshot = state.metrics.snapshot();
        assert_eq!(snapshot.predictions_served, 1);
        assert_eq!(snapshot.positive_predictions, 1);
    }

    #[test]
    fn test_run_prediction_records_failure() {
        let state = AppState::new(
            Arc::new(StubClassifier::failing()),
            RiskLevelThresholds::default(),
        );

        assert!(state.run_prediction(&example_form()).is_err());
        assert_eq!(state.metrics.snapshot().predictions_failed, 1);
    }

    #[test]
    fn test_app_error_is_500_with_message() {
        let response =
            AppError(PredictError::Inference("boom".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_repeated_key_keeps_first_value() {
        let FormFields(fields) = FormFields::from_pairs(vec![
            ("age".to_string(), "30".to_string()),
            ("age".to_string(), "55".to_string()),
            ("enfant".to_string(), "2".to_string()),
        ]);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["age"], "30");
        assert_eq!(fields["enfant"], "2");
    }
}
