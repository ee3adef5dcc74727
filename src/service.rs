//! Scoring, info and distribution lookups over the frozen tables

use crate::data::{AttributeTable, FeatureTable};
use crate::error::ApiError;
use crate::feature_extractor::FeatureExtractor;
use crate::models::{Classifier, ModelFormat, TreeExplainer};
use crate::types::{DistributionResponse, PredictResponse};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

/// Everything loaded at startup, read-only afterwards
pub struct ScoringService {
    features: FeatureTable,
    attributes: AttributeTable,
    extractor: FeatureExtractor,
    classifier: Arc<dyn Classifier>,
    model_format: ModelFormat,
    explainer: Option<TreeExplainer>,
}

impl ScoringService {
    pub fn new(
        features: FeatureTable,
        attributes: AttributeTable,
        extractor: FeatureExtractor,
        classifier: Arc<dyn Classifier>,
        model_format: ModelFormat,
        explainer: Option<TreeExplainer>,
    ) -> Self {
        Self {
            features,
            attributes,
            extractor,
            classifier,
            model_format,
            explainer,
        }
    }

    pub fn features(&self) -> &FeatureTable {
        &self.features
    }

    pub fn attributes(&self) -> &AttributeTable {
        &self.attributes
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    pub fn model_format(&self) -> ModelFormat {
        self.model_format
    }

    pub fn has_attribution(&self) -> bool {
        self.explainer.is_some()
    }

    /// Default probability (percent) of a client, with attribution when available
    pub fn predict(&self, client_id: i64) -> Result<PredictResponse, ApiError> {
        let row = self
            .features
            .row_of(client_id)
            .ok_or(ApiError::ClientNotFound(client_id))?;

        let input = self.extractor.extract(&self.features, row);
        let probability = self.classifier.positive_probability(&input.values)?;
        let probability = (probability * 100.0).clamp(0.0, 100.0);

        let attribution = self
            .explainer
            .as_ref()
            .map(|explainer| explainer.explain(&input.values));

        debug!(
            client_id = client_id,
            probability = probability,
            attribution = attribution.is_some(),
            "Client scored"
        );

        let (shap_values, expected_value) = match attribution {
            Some(a) => (Some(a.values), Some(a.expected_value)),
            None => (None, None),
        };

        Ok(PredictResponse {
            probability,
            feature_names: self.extractor.feature_names().to_vec(),
            feature_values: input.values,
            shap_values,
            expected_value,
        })
    }

    /// Personal attributes of a client, verbatim
    pub fn info(&self, client_id: i64) -> Result<Map<String, Value>, ApiError> {
        self.attributes
            .get(client_id)
            .cloned()
            .ok_or(ApiError::ClientNotFound(client_id))
    }

    /// One feature's full column plus the client's own value
    pub fn distribution(
        &self,
        client_id: i64,
        feature: &str,
    ) -> Result<DistributionResponse, ApiError> {
        let column = self
            .features
            .column(feature)
            .ok_or_else(|| ApiError::FeatureNotFound(feature.to_string()))?;
        let row = self
            .features
            .row_of(client_id)
            .ok_or(ApiError::ClientNotFound(client_id))?;

        Ok(DistributionResponse {
            feature: feature.to_string(),
            client_value: column.json_value(row),
            distribution: column.json_values(),
        })
    }
}
