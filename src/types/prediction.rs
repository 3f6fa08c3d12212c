//! Prediction result data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Risk band derived from the default probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Determine risk level from probability and thresholds
    pub fn from_probability(probability: f64, thresholds: &RiskLevelThresholds) -> Self {
        if probability >= thresholds.critical {
            RiskLevel::Critical
        } else if probability >= thresholds.high {
            RiskLevel::High
        } else if probability >= thresholds.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

/// Configurable risk level thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskLevelThresholds {
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl Default for RiskLevelThresholds {
    fn default() -> Self {
        Self {
            medium: 0.3,
            high: 0.5,
            critical: 0.8,
        }
    }
}

/// Outcome of one prediction request. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Unique identifier, for correlating logs with responses
    pub prediction_id: String,

    /// Predicted class label
    pub label: i64,

    /// Probability of the positive ("default") class, in [0, 1]
    pub default_probability: f64,

    /// Risk band of the probability
    pub risk_level: RiskLevel,

    /// Prediction timestamp
    pub timestamp: DateTime<Utc>,
}

impl PredictionResult {
    pub fn new(label: i64, default_probability: f64, thresholds: &RiskLevelThresholds) -> Self {
        Self {
            prediction_id: uuid::Uuid::new_v4().to_string(),
            label,
            default_probability,
            risk_level: RiskLevel::from_probability(default_probability, thresholds),
            timestamp: Utc::now(),
        }
    }
}
