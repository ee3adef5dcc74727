//! Response bodies

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Body of `/predict`
#[derive(Debug, Clone, Serialize)]
pub struct PredictResponse {
    /// Default probability, in percent
    pub probability: f64,

    /// Model feature names, in model order
    pub feature_names: Vec<String>,

    /// Values fed to the model, parallel to `feature_names`
    pub feature_values: Vec<f64>,

    /// Per-feature contributions (attribution variant only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shap_values: Option<Vec<f64>>,

    /// Baseline margin the contributions are relative to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_value: Option<f64>,
}

/// Body of `/distribution`
#[derive(Debug, Clone, Serialize)]
pub struct DistributionResponse {
    pub feature: String,
    pub client_value: Value,
    pub distribution: Vec<Value>,
}

/// Body of every 4xx/5xx response
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Body of `/health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model: String,
    pub model_format: &'static str,
    pub feature_count: usize,
    pub feature_rows: usize,
    pub personal_info_rows: usize,
    pub scaled: bool,
    pub attribution: bool,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: i64,
}
