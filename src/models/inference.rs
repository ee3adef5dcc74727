//! Positive-class probability from a loaded classifier

use super::ensemble::TreeEnsemble;
use super::loader::LoadedModel;
use anyhow::{Context, Result};
use ort::memory::Allocator;
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// A trained binary classifier
pub trait Classifier: Send + Sync {
    /// Model name for logs and `/health`
    fn name(&self) -> &str;

    /// Probability of the positive (default) class for one feature vector
    fn positive_probability(&self, features: &[f64]) -> Result<f64>;
}

/// Tree-ensemble JSON classifier, evaluated natively
pub struct EnsembleClassifier {
    name: String,
    ensemble: Arc<TreeEnsemble>,
}

impl EnsembleClassifier {
    pub fn new(name: String, ensemble: Arc<TreeEnsemble>) -> Self {
        Self { name, ensemble }
    }
}

impl Classifier for EnsembleClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn positive_probability(&self, features: &[f64]) -> Result<f64> {
        let expected = self.ensemble.feature_count();
        if features.len() != expected {
            anyhow::bail!(
                "Model {} expects {} features, got {}",
                self.name,
                expected,
                features.len()
            );
        }
        Ok(self.ensemble.predict_proba(features))
    }
}

/// ONNX Runtime classifier. Sessions run with exclusive access, hence the mutex.
pub struct OnnxClassifier {
    name: String,
    model: Mutex<LoadedModel>,
}

impl OnnxClassifier {
    pub fn new(model: LoadedModel) -> Self {
        Self {
            name: model.name.clone(),
            model: Mutex::new(model),
        }
    }

    /// Run the session on a `[1, n]` float tensor
    fn run(&self, model: &mut LoadedModel, features: &[f64]) -> Result<f64> {
        use ort::value::Tensor;

        let input: Vec<f32> = features.iter().map(|&v| v as f32).collect();
        let shape = vec![1_i64, input.len() as i64];
        let input_tensor =
            Tensor::from_array((shape, input)).context("Failed to create input tensor")?;

        let outputs = model
            .session
            .run(ort::inputs![&model.input_name => input_tensor])?;

        extract_probability(&outputs, &model.output_name, &self.name)
    }
}

impl Classifier for OnnxClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn positive_probability(&self, features: &[f64]) -> Result<f64> {
        let mut model = self
            .model
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        self.run(&mut model, features)
    }
}

/// Extract the positive-class probability from model output.
/// Handles both tensor outputs (XGBoost, scikit-learn) and seq(map) outputs (LightGBM, CatBoost).
fn extract_probability(
    outputs: &ort::session::SessionOutputs,
    output_name: &str,
    model_name: &str,
) -> Result<f64> {
    if let Some(output) = outputs.get(output_name) {
        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            let dims: Vec<i64> = shape.iter().copied().collect();
            let prob = positive_from_tensor(&dims, data)?;
            debug!(model = %model_name, prob = prob, "Extracted from tensor");
            return Ok(prob);
        }

        if DynSequenceValueType::can_downcast(&output.dtype()) {
            return extract_from_sequence_map(output, model_name);
        }
    }

    // Fallback: first non-label output that yields a probability
    for (name, output) in outputs.iter() {
        if name.contains("label") {
            continue;
        }

        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            let dims: Vec<i64> = shape.iter().copied().collect();
            let prob = positive_from_tensor(&dims, data)?;
            debug!(model = %model_name, output = %name, prob = prob, "Extracted from tensor (fallback)");
            return Ok(prob);
        }

        if DynSequenceValueType::can_downcast(&output.dtype()) {
            if let Ok(prob) = extract_from_sequence_map(&output, model_name) {
                return Ok(prob);
            }
        }
    }

    warn!(model = %model_name, "No probability output found");
    Err(anyhow::anyhow!("Model {} produced no probability output", model_name))
}

/// Extract probability from seq(map(int64, float)) format
fn extract_from_sequence_map(output: &ort::value::DynValue, model_name: &str) -> Result<f64> {
    let allocator = Allocator::default();

    let sequence = output
        .downcast_ref::<DynSequenceValueType>()
        .map_err(|e| anyhow::anyhow!("Failed to downcast to sequence: {}", e))?;

    let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;
    let map_value = maps
        .first()
        .ok_or_else(|| anyhow::anyhow!("Empty sequence"))?;

    let kv_pairs = map_value.try_extract_key_values::<i64, f32>()?;
    positive_from_class_map(&kv_pairs).map(|prob| {
        debug!(model = %model_name, prob = prob, "Extracted from seq(map)");
        prob
    })
}

/// Class 1 probability from `(class_id, probability)` pairs
fn positive_from_class_map(pairs: &[(i64, f32)]) -> Result<f64> {
    if let Some((_, prob)) = pairs.iter().find(|(class_id, _)| *class_id == 1) {
        return Ok(*prob as f64);
    }
    if let Some((_, prob)) = pairs.iter().find(|(class_id, _)| *class_id == 0) {
        return Ok(1.0 - *prob as f64);
    }
    Err(anyhow::anyhow!("No probability found in map"))
}

/// Class 1 probability from a `[batch, classes]`, `[classes]` or `[batch, 1]` tensor
fn positive_from_tensor(dims: &[i64], data: &[f32]) -> Result<f64> {
    let classes = dims.last().copied().unwrap_or(0);
    let value = match classes {
        c if c >= 2 => data.get(1),
        1 => data.first(),
        _ => None,
    };
    value
        .map(|&v| v as f64)
        .ok_or_else(|| anyhow::anyhow!("Unexpected probability tensor shape {:?}", dims))
}
