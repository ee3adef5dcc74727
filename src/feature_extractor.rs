//! Feature extraction for credit default model inference.
//!
//! Turns a feature-table row into the vector handed to the classifier and the
//! explainer: identifier and label dropped, columns in model order, optionally
//! standard-scaled.

use crate::data::FeatureTable;
use crate::models::StandardScaler;
use anyhow::{bail, Result};

/// Model input for one client
#[derive(Debug, Clone)]
pub struct ModelInput {
    /// Feature values fed to the model (scaled when a scaler is configured)
    pub values: Vec<f64>,
}

/// Feature extractor that transforms table rows into model input features.
pub struct FeatureExtractor {
    feature_names: Vec<String>,
    scaler: Option<StandardScaler>,
}

impl FeatureExtractor {
    /// Create an extractor for the table's model columns
    pub fn new(table: &FeatureTable, scaler: Option<StandardScaler>) -> Result<Self> {
        let feature_names = table.feature_names();
        if let Some(scaler) = &scaler {
            if scaler.len() != feature_names.len() {
                bail!(
                    "Scaler covers {} features, feature table has {}",
                    scaler.len(),
                    feature_names.len()
                );
            }
        }
        Ok(Self {
            feature_names,
            scaler,
        })
    }

    /// Extract the model input of one table row.
    pub fn extract(&self, table: &FeatureTable, row: usize) -> ModelInput {
        let raw = table.feature_row(row);
        let values = match &self.scaler {
            Some(scaler) => scaler.transform(&raw),
            None => raw,
        };
        ModelInput { values }
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        self.feature_names.len()
    }

    /// Get feature names (model order).
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn is_scaled(&self) -> bool {
        self.scaler.is_some()
    }
}
