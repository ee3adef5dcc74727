//! Additive tree ensemble for binary classification.
//!
//! The JSON artifact holds a base margin and a list of trees, each a flat node
//! array rooted at index 0:
//!
//! ```json
//! {
//!   "base_score": -2.1,
//!   "feature_names": ["EXT_SOURCE_2", "INCOME_PER_PERSON"],
//!   "trees": [
//!     { "nodes": [
//!       { "split_feature": 0, "threshold": 0.5, "left": 1, "right": 2, "missing_left": true, "cover": 300 },
//!       { "leaf_value": 0.4, "cover": 120 },
//!       { "leaf_value": -0.2, "cover": 180 }
//!     ] }
//!   ]
//! }
//! ```
//!
//! A sample goes left when `value <= threshold`; missing values follow
//! `missing_left`. The positive-class probability is `sigmoid(margin)`.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Tree node, either an internal split or a leaf
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Split {
        split_feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        #[serde(default = "default_missing_left")]
        missing_left: bool,
        cover: f64,
    },
    Leaf {
        leaf_value: f64,
        cover: f64,
    },
}

fn default_missing_left() -> bool {
    true
}

impl Node {
    pub fn cover(&self) -> f64 {
        match self {
            Node::Split { cover, .. } | Node::Leaf { cover, .. } => *cover,
        }
    }
}

/// A single regression tree
#[derive(Debug, Clone, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    /// Index of the child a sample follows at a split node
    pub(crate) fn next_node(node: &Node, features: &[f64]) -> Option<usize> {
        match node {
            Node::Split {
                split_feature,
                threshold,
                left,
                right,
                missing_left,
                ..
            } => {
                let value = features[*split_feature];
                let go_left = if value.is_nan() {
                    *missing_left
                } else {
                    value <= *threshold
                };
                Some(if go_left { *left } else { *right })
            }
            Node::Leaf { .. } => None,
        }
    }

    /// Leaf value reached by a sample
    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            let node = &self.nodes[index];
            match Self::next_node(node, features) {
                Some(next) => index = next,
                None => {
                    if let Node::Leaf { leaf_value, .. } = node {
                        return *leaf_value;
                    }
                    return 0.0;
                }
            }
        }
    }

    /// Cover-weighted mean leaf value of the subtree at `index`
    pub(crate) fn expected_value_at(&self, index: usize) -> f64 {
        match &self.nodes[index] {
            Node::Leaf { leaf_value, .. } => *leaf_value,
            Node::Split { left, right, .. } => {
                let left_cover = self.nodes[*left].cover();
                let right_cover = self.nodes[*right].cover();
                let total = left_cover + right_cover;
                if total <= 0.0 {
                    return 0.0;
                }
                (left_cover * self.expected_value_at(*left)
                    + right_cover * self.expected_value_at(*right))
                    / total
            }
        }
    }

    fn validate(&self, tree_index: usize, feature_count: usize) -> Result<()> {
        if self.nodes.is_empty() {
            bail!("Tree {tree_index} has no nodes");
        }
        for (index, node) in self.nodes.iter().enumerate() {
            if node.cover() < 0.0 || !node.cover().is_finite() {
                bail!("Tree {tree_index} node {index} has an invalid cover");
            }
            if let Node::Split {
                split_feature,
                left,
                right,
                ..
            } = node
            {
                if *split_feature >= feature_count {
                    bail!(
                        "Tree {tree_index} node {index} splits on feature {split_feature}, \
                         model has {feature_count} features"
                    );
                }
                // children after their parent keeps every tree acyclic
                for child in [*left, *right] {
                    if child <= index || child >= self.nodes.len() {
                        bail!("Tree {tree_index} node {index} has invalid child {child}");
                    }
                }
            }
        }
        Ok(())
    }
}

/// Binary-logistic tree ensemble
#[derive(Debug, Clone, Deserialize)]
pub struct TreeEnsemble {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub base_score: f64,
    /// Feature names in model order; when absent, only the width is checked
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
    /// Number of input features, derived from `feature_names` when absent
    #[serde(default)]
    pub num_features: Option<usize>,
    pub trees: Vec<Tree>,
}

impl TreeEnsemble {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read tree ensemble {}", path.display()))?;
        let ensemble = Self::from_json(&raw)
            .with_context(|| format!("Failed to load tree ensemble {}", path.display()))?;

        info!(
            path = %path.display(),
            trees = ensemble.trees.len(),
            features = ensemble.feature_count(),
            "Tree ensemble loaded"
        );

        Ok(ensemble)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let mut ensemble: Self = serde_json::from_str(raw)?;

        let count = match (&ensemble.feature_names, ensemble.num_features) {
            (Some(names), Some(n)) if names.len() != n => {
                bail!("feature_names has {} entries but num_features is {}", names.len(), n)
            }
            (Some(names), _) => names.len(),
            (None, Some(n)) => n,
            (None, None) => bail!("Tree ensemble needs feature_names or num_features"),
        };
        ensemble.num_features = Some(count);

        if ensemble.trees.is_empty() {
            bail!("Tree ensemble has no trees");
        }
        for (index, tree) in ensemble.trees.iter().enumerate() {
            tree.validate(index, count)?;
        }

        Ok(ensemble)
    }

    pub fn feature_count(&self) -> usize {
        self.num_features
            .or_else(|| self.feature_names.as_ref().map(Vec::len))
            .unwrap_or(0)
    }

    /// Check the ensemble against the feature table's model columns
    pub fn check_features(&self, names: &[String]) -> Result<()> {
        if self.feature_count() != names.len() {
            bail!(
                "Tree ensemble expects {} features, feature table provides {}",
                self.feature_count(),
                names.len()
            );
        }
        if let Some(expected) = &self.feature_names {
            if let Some((i, (a, b))) = expected
                .iter()
                .zip(names.iter())
                .enumerate()
                .find(|(_, (a, b))| a != b)
            {
                bail!("Feature {i} is {b} in the feature table but {a} in the tree ensemble");
            }
        }
        Ok(())
    }

    /// Raw margin (log-odds) of a sample
    pub fn predict_margin(&self, features: &[f64]) -> f64 {
        self.base_score + self.trees.iter().map(|t| t.predict(features)).sum::<f64>()
    }

    /// Positive-class probability of a sample
    pub fn predict_proba(&self, features: &[f64]) -> f64 {
        sigmoid(self.predict_margin(features))
    }

    /// Margin of the average sample, weighted by training cover
    pub fn expected_value(&self) -> f64 {
        self.base_score
            + self
                .trees
                .iter()
                .map(|t| t.expected_value_at(0))
                .sum::<f64>()
    }
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
