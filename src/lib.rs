//! Credit Scoring API Library
//!
//! Serves a pre-trained credit default model over HTTP: default probability
//! with optional TreeSHAP attribution, raw client attributes, and per-feature
//! population distributions, all from tables loaded once at startup.

pub mod api;
pub mod artifacts;
pub mod config;
pub mod data;
pub mod error;
pub mod feature_extractor;
pub mod metrics;
pub mod models;
pub mod service;
pub mod types;

pub use api::{router, AppState, SharedState};
pub use config::AppConfig;
pub use error::ApiError;
pub use feature_extractor::FeatureExtractor;
pub use metrics::ApiMetrics;
pub use service::ScoringService;
