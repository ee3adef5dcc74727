//! Startup loading of every static artifact into a [`ScoringService`]

use crate::config::{AppConfig, DataConfig};
use crate::data::{AttributeTable, FeatureTable};
use crate::feature_extractor::FeatureExtractor;
use crate::models::{ModelLoader, StandardScaler, TreeEnsemble, TreeExplainer};
use crate::service::ScoringService;
use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Load tables, model, scaler and explainer from the configured directory
pub fn load_service(config: &AppConfig) -> Result<ScoringService> {
    let dir = config.data.resolve_dir()?;
    load_service_from(&dir, config)
}

/// Load every artifact from `dir`
pub fn load_service_from(dir: &Path, config: &AppConfig) -> Result<ScoringService> {
    let data = &config.data;
    let path = |file: &str| DataConfig::artifact_path(dir, file);

    info!(dir = %dir.display(), "Loading artifacts");

    let features = FeatureTable::from_path(
        path(&data.features_file),
        &data.id_column,
        &data.target_column,
    )?;
    if features.feature_count() == 0 {
        bail!("Feature table has no model feature columns");
    }
    let attributes = AttributeTable::from_path(path(&data.personal_info_file), &data.id_column)?;

    let scaler = data
        .scaler_file
        .as_deref()
        .map(|file| StandardScaler::from_path(path(file)))
        .transpose()?;
    let extractor = FeatureExtractor::new(&features, scaler)?;

    let loaded = ModelLoader::with_threads(config.models.onnx_threads)
        .load(path(&data.model_file))
        .context("Failed to load classifier")?;
    loaded.check_input_width(extractor.feature_count())?;
    if let Some(ensemble) = &loaded.ensemble {
        ensemble.check_features(extractor.feature_names())?;
    }

    // a tree-ensemble model explains itself unless another explainer is configured
    let explainer_model = match data.explainer_file.as_deref() {
        Some(file) => Some(Arc::new(TreeEnsemble::from_path(path(file))?)),
        None => loaded.ensemble.clone(),
    };
    let explainer = match explainer_model {
        Some(ensemble) => {
            ensemble
                .check_features(extractor.feature_names())
                .context("Explainer does not match the feature table")?;
            Some(TreeExplainer::new(ensemble))
        }
        None => None,
    };

    info!(
        model = %loaded.classifier.name(),
        format = loaded.format.as_str(),
        features = extractor.feature_count(),
        scaled = extractor.is_scaled(),
        attribution = explainer.is_some(),
        "Artifacts loaded"
    );

    Ok(ScoringService::new(
        features,
        attributes,
        extractor,
        loaded.classifier,
        loaded.format,
        explainer,
    ))
}
