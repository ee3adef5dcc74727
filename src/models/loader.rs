//! Classifier artifact loader (ONNX or tree-ensemble JSON)

use super::ensemble::TreeEnsemble;
use super::inference::{Classifier, EnsembleClassifier, OnnxClassifier};
use anyhow::{bail, Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::ValueType;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Supported classifier artifact formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    Onnx,
    TreeJson,
}

impl ModelFormat {
    /// Detect the format from the file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("onnx") => Ok(ModelFormat::Onnx),
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(ModelFormat::TreeJson),
            _ => bail!(
                "Unsupported model artifact {} (expected .onnx or .json)",
                path.display()
            ),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModelFormat::Onnx => "onnx",
            ModelFormat::TreeJson => "tree_json",
        }
    }
}

/// Loaded ONNX model with metadata
pub struct LoadedModel {
    /// Model name
    pub name: String,
    /// ONNX Runtime session
    pub session: Session,
    /// Input name for the model
    pub input_name: String,
    /// Output name for probabilities
    pub output_name: String,
    /// Fixed feature width of the input tensor, `None` when dynamic
    pub input_width: Option<usize>,
}

/// Classifier loaded from disk, with the tree ensemble kept when there is one
pub struct LoadedClassifier {
    pub classifier: Arc<dyn Classifier>,
    pub format: ModelFormat,
    pub ensemble: Option<Arc<TreeEnsemble>>,
    /// Number of features the model takes, when the artifact declares it
    pub input_width: Option<usize>,
}

impl LoadedClassifier {
    /// Fail when the model declares a width other than the feature table's
    pub fn check_input_width(&self, feature_count: usize) -> Result<()> {
        match self.input_width {
            Some(width) if width != feature_count => bail!(
                "Model {} takes {} features, feature table provides {}",
                self.classifier.name(),
                width,
                feature_count
            ),
            _ => Ok(()),
        }
    }
}

/// Last dimension of an input shape; symbolic (`-1`) dimensions are unknown
fn input_width_from_dims(dims: &[i64]) -> Option<usize> {
    dims.last()
        .copied()
        .filter(|&d| d > 0)
        .map(|d| d as usize)
}

/// Loader for classifier artifacts
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with default settings (1 thread)
    pub fn new() -> Self {
        Self::with_threads(1)
    }

    /// Create a new model loader with specified number of threads
    pub fn with_threads(onnx_threads: usize) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
        }
    }

    /// Load the classifier artifact, picking the runtime from its extension
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<LoadedClassifier> {
        let path = path.as_ref();
        if !path.exists() {
            bail!("Model file not found: {}", path.display());
        }

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("model")
            .to_string();

        let format = ModelFormat::from_path(path)?;
        match format {
            ModelFormat::Onnx => {
                let model = self.load_onnx(path, &name)?;
                let input_width = model.input_width;
                Ok(LoadedClassifier {
                    classifier: Arc::new(OnnxClassifier::new(model)),
                    format,
                    ensemble: None,
                    input_width,
                })
            }
            ModelFormat::TreeJson => {
                let ensemble = Arc::new(TreeEnsemble::from_path(path)?);
                let name = ensemble.name.clone().unwrap_or(name);
                Ok(LoadedClassifier {
                    classifier: Arc::new(EnsembleClassifier::new(name, ensemble.clone())),
                    format,
                    input_width: Some(ensemble.feature_count()),
                    ensemble: Some(ensemble),
                })
            }
        }
    }

    /// Load a single ONNX model from file
    pub fn load_onnx<P: AsRef<Path>>(&self, path: P, name: &str) -> Result<LoadedModel> {
        let path = path.as_ref();

        // Initialize ONNX Runtime
        ort::init().commit()?;
        info!(model = %name, path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
            .context(format!("Failed to load model from {:?}", path))?;

        // Get input/output names
        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let input_width = session.inputs.first().and_then(|input| match &input.input_type {
            ValueType::Tensor { shape, .. } => {
                let dims: Vec<i64> = shape.iter().copied().collect();
                input_width_from_dims(&dims)
            }
            _ => None,
        });

        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .map(|o| o.name.clone())
            .unwrap_or_else(|| {
                session
                    .outputs
                    .last()
                    .map(|o| o.name.clone())
                    .unwrap_or_else(|| "probabilities".to_string())
            });

        info!(
            model = %name,
            input = %input_name,
            input_width = ?input_width,
            output = %output_name,
            "Model loaded successfully"
        );

        Ok(LoadedModel {
            name: name.to_string(),
            session,
            input_name,
            output_name,
            input_width,
        })
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}
