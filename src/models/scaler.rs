//! Standard scaler applied to feature vectors before prediction and attribution

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Per-feature `(x - mean) / scale` transform
#[derive(Debug, Clone, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Load a scaler artifact (`{"mean": [...], "scale": [...]}`)
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scaler {}", path.display()))?;
        let scaler: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse scaler {}", path.display()))?;

        if scaler.mean.len() != scaler.scale.len() {
            bail!(
                "Scaler mean has {} entries but scale has {}",
                scaler.mean.len(),
                scaler.scale.len()
            );
        }

        info!(path = %path.display(), features = scaler.len(), "Scaler loaded");
        Ok(scaler)
    }

    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    /// Rescale a feature vector. Zero-variance features use a scale of 1.
    pub fn transform(&self, features: &[f64]) -> Vec<f64> {
        features
            .iter()
            .zip(self.mean.iter().zip(self.scale.iter()))
            .map(|(&x, (&mean, &scale))| {
                let scale = if scale == 0.0 { 1.0 } else { scale };
                (x - mean) / scale
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform() {
        let scaler = StandardScaler {
            mean: vec![10.0, 0.0, 5.0],
            scale: vec![2.0, 1.0, 0.0],
        };
        assert_eq!(scaler.transform(&[12.0, -3.0, 7.0]), vec![1.0, -3.0, 2.0]);
    }

    #[test]
    fn test_missing_values_stay_missing() {
        let scaler = StandardScaler {
            mean: vec![1.0],
            scale: vec![2.0],
        };
        assert!(scaler.transform(&[f64::NAN])[0].is_nan());
    }

    #[test]
    fn test_rejects_mismatched_lengths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scaler.json");
        std::fs::write(&path, r#"{"mean": [0.0, 1.0], "scale": [1.0]}"#).unwrap();
        assert!(StandardScaler::from_path(&path).is_err());
    }
}
