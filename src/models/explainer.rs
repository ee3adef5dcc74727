//! Path-dependent TreeSHAP attribution for tree ensembles.
//!
//! Values are exact Shapley values of the margin (log-odds) for the positive
//! class, with feature absence modelled by training cover. They satisfy local
//! accuracy: `expected_value + Σ values == predict_margin(x)`.

use super::ensemble::{Node, Tree, TreeEnsemble};
use std::sync::Arc;

/// Attribution for a single prediction
#[derive(Debug, Clone)]
pub struct Attribution {
    /// One value per model feature, in model order
    pub values: Vec<f64>,
    /// Margin of the average sample
    pub expected_value: f64,
}

/// Computes per-feature contributions against a tree ensemble
#[derive(Debug, Clone)]
pub struct TreeExplainer {
    ensemble: Arc<TreeEnsemble>,
    expected_value: f64,
}

impl TreeExplainer {
    pub fn new(ensemble: Arc<TreeEnsemble>) -> Self {
        let expected_value = ensemble.expected_value();
        Self {
            ensemble,
            expected_value,
        }
    }

    pub fn feature_count(&self) -> usize {
        self.ensemble.feature_count()
    }

    pub fn ensemble(&self) -> &TreeEnsemble {
        &self.ensemble
    }

    pub fn expected_value(&self) -> f64 {
        self.expected_value
    }

    /// Shapley values of one (already scaled) feature vector
    pub fn explain(&self, features: &[f64]) -> Attribution {
        let mut phi = vec![0.0; self.feature_count()];
        for tree in &self.ensemble.trees {
            let mut walker = PathWalker {
                tree,
                features,
                phi: &mut phi,
            };
            walker.recurse(0, &[], 0, 1.0, 1.0, None);
        }
        Attribution {
            values: phi,
            expected_value: self.expected_value,
        }
    }
}

/// One entry of the decision path: a feature and the fraction of paths that
/// flow through it when the feature is absent (`zero`) or present (`one`)
#[derive(Debug, Clone, Copy)]
struct PathElement {
    feature: Option<usize>,
    zero_fraction: f64,
    one_fraction: f64,
    weight: f64,
}

impl Default for PathElement {
    fn default() -> Self {
        Self {
            feature: None,
            zero_fraction: 0.0,
            one_fraction: 0.0,
            weight: 0.0,
        }
    }
}

struct PathWalker<'a> {
    tree: &'a Tree,
    features: &'a [f64],
    phi: &'a mut [f64],
}

impl PathWalker<'_> {
    fn recurse(
        &mut self,
        node_index: usize,
        parent_path: &[PathElement],
        depth: usize,
        zero_fraction: f64,
        one_fraction: f64,
        feature: Option<usize>,
    ) {
        let mut path = Vec::with_capacity(depth + 2);
        path.extend_from_slice(&parent_path[..depth]);
        path.push(PathElement::default());
        extend_path(&mut path, depth, zero_fraction, one_fraction, feature);

        let node = &self.tree.nodes[node_index];
        match node {
            Node::Leaf { leaf_value, .. } => {
                for i in 1..=depth {
                    let weight = unwound_path_sum(&path, depth, i);
                    let element = path[i];
                    if let Some(f) = element.feature {
                        self.phi[f] +=
                            weight * (element.one_fraction - element.zero_fraction) * leaf_value;
                    }
                }
            }
            Node::Split {
                split_feature,
                left,
                right,
                ..
            } => {
                let hot = Tree::next_node(node, self.features).unwrap_or(*left);
                let cold = if hot == *left { *right } else { *left };

                let total = self.tree.nodes[*left].cover() + self.tree.nodes[*right].cover();
                let (hot_zero, cold_zero) = if total > 0.0 {
                    (
                        self.tree.nodes[hot].cover() / total,
                        self.tree.nodes[cold].cover() / total,
                    )
                } else {
                    (0.5, 0.5)
                };

                let mut depth = depth;
                let mut incoming_zero = 1.0;
                let mut incoming_one = 1.0;

                // a feature already on the path is undone before splitting on it again
                if let Some(i) = (1..=depth).find(|&i| path[i].feature == Some(*split_feature)) {
                    incoming_zero = path[i].zero_fraction;
                    incoming_one = path[i].one_fraction;
                    unwind_path(&mut path, depth, i);
                    depth -= 1;
                }

                self.recurse(
                    hot,
                    &path,
                    depth + 1,
                    hot_zero * incoming_zero,
                    incoming_one,
                    Some(*split_feature),
                );
                self.recurse(
                    cold,
                    &path,
                    depth + 1,
                    cold_zero * incoming_zero,
                    0.0,
                    Some(*split_feature),
                );
            }
        }
    }
}

fn extend_path(
    path: &mut [PathElement],
    depth: usize,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    path[depth] = PathElement {
        feature,
        zero_fraction,
        one_fraction,
        weight: if depth == 0 { 1.0 } else { 0.0 },
    };
    let d = (depth + 1) as f64;
    for i in (0..depth).rev() {
        path[i + 1].weight += one_fraction * path[i].weight * (i + 1) as f64 / d;
        path[i].weight = zero_fraction * path[i].weight * (depth - i) as f64 / d;
    }
}

fn unwind_path(path: &mut [PathElement], depth: usize, index: usize) {
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let d = (depth + 1) as f64;
    let mut next_one_portion = path[depth].weight;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = path[i].weight;
            path[i].weight = next_one_portion * d / ((i + 1) as f64 * one_fraction);
            next_one_portion = tmp - path[i].weight * zero_fraction * (depth - i) as f64 / d;
        } else {
            path[i].weight = path[i].weight * d / (zero_fraction * (depth - i) as f64);
        }
    }

    for i in index..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
}

fn unwound_path_sum(path: &[PathElement], depth: usize, index: usize) -> f64 {
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let mut next_one_portion = path[depth].weight;
    let mut total = 0.0;

    if one_fraction != 0.0 {
        for i in (0..depth).rev() {
            let tmp = next_one_portion / ((i + 1) as f64 * one_fraction);
            total += tmp;
            next_one_portion = path[i].weight - tmp * zero_fraction * (depth - i) as f64;
        }
    } else if zero_fraction != 0.0 {
        for i in (0..depth).rev() {
            total += path[i].weight / (zero_fraction * (depth - i) as f64);
        }
    }

    total * (depth + 1) as f64
}
