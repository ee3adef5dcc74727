//! Classifier, scaler and attribution components

pub mod ensemble;
pub mod explainer;
pub mod inference;
pub mod loader;
pub mod scaler;

pub use ensemble::TreeEnsemble;
pub use explainer::{Attribution, TreeExplainer};
pub use inference::{Classifier, EnsembleClassifier, OnnxClassifier};
pub use loader::{LoadedClassifier, ModelFormat, ModelLoader};
pub use scaler::StandardScaler;
