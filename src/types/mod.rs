//! Type definitions for the prediction service

pub mod prediction;

pub use prediction::{PredictionResult, RiskLevel, RiskLevelThresholds};
