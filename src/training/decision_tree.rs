//! Regression tree (CART, squared-error criterion)

use super::models::{check_features, check_training_data, Model};
use crate::error::{MathScoreError, Result};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf { value: f64, n_samples: usize },
    /// Internal node; rows with `x[feature_idx] <= threshold` go left
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

impl TreeNode {
    fn predict_row(&self, row: ndarray::ArrayView1<f64>) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if row[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    /// Depth of the subtree rooted here (a lone leaf has depth 0)
    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// Best split found for one node
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// Regression tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    /// Maximum depth (`None` grows until leaves are pure or too small)
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    n_features: usize,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            n_features: 0,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    pub fn root(&self) -> Option<&TreeNode> {
        self.root.as_ref()
    }

    /// Fit on a subset of rows given by index (used by the ensembles)
    pub(crate) fn fit_rows(&mut self, x: &Array2<f64>, y: &Array1<f64>, rows: Vec<usize>) -> Result<()> {
        check_training_data(x, y)?;
        if rows.is_empty() {
            return Err(MathScoreError::TrainingError(
                "cannot grow a tree from zero rows".to_string(),
            ));
        }
        self.n_features = x.ncols();
        self.root = Some(self.build_tree(x, y, rows, 0));
        Ok(())
    }

    fn build_tree(&self, x: &Array2<f64>, y: &Array1<f64>, rows: Vec<usize>, depth: usize) -> TreeNode {
        let n_samples = rows.len();
        let value = rows.iter().map(|&i| y[i]).sum::<f64>() / n_samples as f64;

        let depth_reached = self.max_depth.map_or(false, |d| depth >= d);
        let too_small = n_samples < self.min_samples_split || n_samples < 2 * self.min_samples_leaf;
        if depth_reached || too_small || is_constant(y, &rows) {
            return TreeNode::Leaf { value, n_samples };
        }

        let Some(split) = self.find_best_split(x, y, &rows) else {
            return TreeNode::Leaf { value, n_samples };
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&i| x[[i, split.feature_idx]] <= split.threshold);

        TreeNode::Split {
            feature_idx: split.feature_idx,
            threshold: split.threshold,
            left: Box::new(self.build_tree(x, y, left_rows, depth + 1)),
            right: Box::new(self.build_tree(x, y, right_rows, depth + 1)),
            n_samples,
        }
    }

    fn find_best_split(&self, x: &Array2<f64>, y: &Array1<f64>, rows: &[usize]) -> Option<SplitCandidate> {
        let per_feature: Vec<Option<SplitCandidate>> = (0..x.ncols())
            .into_par_iter()
            .map(|feature_idx| self.best_split_for_feature(x, y, rows, feature_idx))
            .collect();

        // Sequential reduction keeps the lowest feature index on ties
        let mut best: Option<SplitCandidate> = None;
        for candidate in per_feature.into_iter().flatten() {
            if best.map_or(true, |b| candidate.gain > b.gain) {
                best = Some(candidate);
            }
        }
        best
    }

    /// Sorted sweep over one feature, tracking running sums of y and y²
    fn best_split_for_feature(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        rows: &[usize],
        feature_idx: usize,
    ) -> Option<SplitCandidate> {
        let mut sorted: Vec<(f64, f64)> = rows.iter().map(|&i| (x[[i, feature_idx]], y[i])).collect();
        sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        let n = sorted.len();
        let total_sum: f64 = sorted.iter().map(|(_, v)| v).sum();
        let total_sq: f64 = sorted.iter().map(|(_, v)| v * v).sum();
        let parent_sse = total_sq - total_sum * total_sum / n as f64;

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        let mut best: Option<SplitCandidate> = None;

        for i in 0..n - 1 {
            let (value, target) = sorted[i];
            left_sum += target;
            left_sq += target * target;

            let n_left = i + 1;
            let n_right = n - n_left;
            if n_left < self.min_samples_leaf || n_right < self.min_samples_leaf {
                continue;
            }
            let next_value = sorted[i + 1].0;
            if next_value <= value {
                continue;
            }

            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let left_sse = left_sq - left_sum * left_sum / n_left as f64;
            let right_sse = right_sq - right_sum * right_sum / n_right as f64;
            let gain = parent_sse - left_sse - right_sse;

            if gain > 1e-12 && best.map_or(true, |b| gain > b.gain) {
                best = Some(SplitCandidate {
                    feature_idx,
                    threshold: (value + next_value) / 2.0,
                    gain,
                });
            }
        }

        best
    }
}

fn is_constant(y: &Array1<f64>, rows: &[usize]) -> bool {
    let first = y[rows[0]];
    rows.iter().all(|&i| (y[i] - first).abs() < 1e-12)
}

impl Model for DecisionTree {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.fit_rows(x, y, (0..x.nrows()).collect())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(MathScoreError::ModelNotFitted)?;
        check_features(self.n_features, x)?;
        Ok(x.outer_iter().map(|row| root.predict_row(row)).collect())
    }
}
