//! XGBoost-style gradient boosting with second-order approximation
//!
//! Differences from plain gradient boosting:
//! - Uses both gradient and hessian of the loss
//! - Regularized leaf weights: w* = -G / (H + lambda), with L1 soft-thresholding
//! - Split gain: 0.5 * [GL²/(HL+λ) + GR²/(HR+λ) - (GL+GR)²/(HL+HR+λ)], accepted above γ
//! - Minimum child weight constraint

use super::config::{require_positive, require_positive_f64, require_unit_interval};
use super::models::{check_features, check_training_data, Model};
use crate::error::{MathScoreError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// XGBoost configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// L1 regularization on leaf weights
    pub reg_alpha: f64,
    /// Minimum loss reduction to make a split
    pub gamma: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub random_state: u64,
}

impl Default for XGBoostConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            reg_alpha: 0.0,
            gamma: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            random_state: 42,
        }
    }
}

impl XGBoostConfig {
    pub fn validate(&self) -> Result<()> {
        require_positive("n_estimators", self.n_estimators)?;
        require_positive("max_depth", self.max_depth)?;
        require_positive_f64("learning_rate", self.learning_rate)?;
        require_unit_interval("subsample", self.subsample)?;
        require_unit_interval("colsample_bytree", self.colsample_bytree)?;
        for (name, value) in [
            ("min_child_weight", self.min_child_weight),
            ("reg_lambda", self.reg_lambda),
            ("reg_alpha", self.reg_alpha),
            ("gamma", self.gamma),
        ] {
            if value < 0.0 {
                return Err(MathScoreError::InvalidParameter {
                    name: name.to_string(),
                    value: value.to_string(),
                    reason: "must not be negative".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum XGBNode {
    Leaf {
        weight: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<XGBNode>,
        right: Box<XGBNode>,
    },
}

impl XGBNode {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        let mut node = self;
        loop {
            match node {
                XGBNode::Leaf { weight } => return *weight,
                XGBNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => node = if sample[*feature] <= *threshold { left } else { right },
            }
        }
    }
}

/// Gradient and hessian of the squared-error loss for one round
struct Gradients {
    grad: Array1<f64>,
    hess: Array1<f64>,
}

#[derive(Debug, Clone, Copy)]
struct XGBSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Build a tree using exact greedy split finding
fn build_xgb_tree(
    x: &Array2<f64>,
    gradients: &Gradients,
    indices: &[usize],
    feature_indices: &[usize],
    depth: usize,
    config: &XGBoostConfig,
) -> XGBNode {
    let g_sum: f64 = indices.iter().map(|&i| gradients.grad[i]).sum();
    let h_sum: f64 = indices.iter().map(|&i| gradients.hess[i]).sum();
    let leaf = XGBNode::Leaf {
        weight: compute_leaf_weight(g_sum, h_sum, config.reg_lambda, config.reg_alpha),
    };

    if depth >= config.max_depth || indices.len() < 2 || h_sum < config.min_child_weight {
        return leaf;
    }

    let candidates: Vec<Option<XGBSplit>> = feature_indices
        .par_iter()
        .map(|&f| find_best_split_for_feature(x, gradients, indices, f, config))
        .collect();

    let mut best: Option<XGBSplit> = None;
    for split in candidates.into_iter().flatten() {
        if best.map_or(true, |b| split.gain > b.gain) {
            best = Some(split);
        }
    }

    match best {
        Some(split) if split.gain > config.gamma => {
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                .iter()
                .partition(|&&i| x[[i, split.feature]] <= split.threshold);

            if left_idx.is_empty() || right_idx.is_empty() {
                return leaf;
            }

            XGBNode::Split {
                feature: split.feature,
                threshold: split.threshold,
                left: Box::new(build_xgb_tree(x, gradients, &left_idx, feature_indices, depth + 1, config)),
                right: Box::new(build_xgb_tree(x, gradients, &right_idx, feature_indices, depth + 1, config)),
            }
        }
        _ => leaf,
    }
}

/// Optimal leaf weight with L1 (alpha) and L2 (lambda) regularization
fn compute_leaf_weight(g_sum: f64, h_sum: f64, lambda: f64, alpha: f64) -> f64 {
    let g_adj = if g_sum > alpha {
        g_sum - alpha
    } else if g_sum < -alpha {
        g_sum + alpha
    } else {
        return 0.0;
    };
    -g_adj / (h_sum + lambda)
}

/// Find best split for a single feature using exact greedy method
fn find_best_split_for_feature(
    x: &Array2<f64>,
    gradients: &Gradients,
    indices: &[usize],
    feature: usize,
    config: &XGBoostConfig,
) -> Option<XGBSplit> {
    let mut sorted: Vec<usize> = indices.to_vec();
    sorted.sort_by(|&a, &b| {
        x[[a, feature]]
            .partial_cmp(&x[[b, feature]])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let g_total: f64 = sorted.iter().map(|&i| gradients.grad[i]).sum();
    let h_total: f64 = sorted.iter().map(|&i| gradients.hess[i]).sum();
    let lambda = config.reg_lambda;
    let parent_score = g_total * g_total / (h_total + lambda);

    let mut g_left = 0.0;
    let mut h_left = 0.0;
    let mut best: Option<XGBSplit> = None;

    for pos in 0..sorted.len() - 1 {
        let idx = sorted[pos];
        let next_idx = sorted[pos + 1];
        g_left += gradients.grad[idx];
        h_left += gradients.hess[idx];

        let value = x[[idx, feature]];
        let next_value = x[[next_idx, feature]];
        if next_value <= value {
            continue;
        }

        let g_right = g_total - g_left;
        let h_right = h_total - h_left;
        if h_left < config.min_child_weight || h_right < config.min_child_weight {
            continue;
        }

        let gain = 0.5
            * ((g_left * g_left) / (h_left + lambda) + (g_right * g_right) / (h_right + lambda)
                - parent_score);

        if best.map_or(true, |b| gain > b.gain) {
            best = Some(XGBSplit {
                feature,
                threshold: (value + next_value) / 2.0,
                gain,
            });
        }
    }

    best
}

fn subsample(rng: &mut Xoshiro256PlusPlus, n: usize, ratio: f64) -> Vec<usize> {
    if ratio >= 1.0 {
        return (0..n).collect();
    }
    let k = (((n as f64) * ratio).ceil() as usize).max(1);
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(k);
    indices.sort_unstable();
    indices
}

/// XGBoost Regressor (squared error loss)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostRegressor {
    config: XGBoostConfig,
    trees: Vec<XGBNode>,
    base_score: f64,
    n_features: usize,
}

impl XGBoostRegressor {
    pub fn new(config: XGBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_score: 0.0,
            n_features: 0,
        }
    }

    pub fn config(&self) -> &XGBoostConfig {
        &self.config
    }

    fn raw_tree_sum(&self, row: ArrayView1<f64>) -> f64 {
        self.trees.iter().map(|tree| tree.predict(row)).sum::<f64>()
    }
}

impl Model for XGBoostRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_data(x, y)?;
        self.config.validate()?;

        let n_samples = x.nrows();
        let n_features = x.ncols();

        self.base_score = y.mean().unwrap_or(0.0);
        let mut preds = Array1::from_elem(n_samples, self.base_score);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);

        self.trees.clear();
        for _ in 0..self.config.n_estimators {
            // Squared error: grad = pred - y, hess = 1
            let gradients = Gradients {
                grad: &preds - y,
                hess: Array1::from_elem(n_samples, 1.0),
            };

            let row_indices = subsample(&mut rng, n_samples, self.config.subsample);
            let col_indices = subsample(&mut rng, n_features, self.config.colsample_bytree);

            let tree = build_xgb_tree(x, &gradients, &row_indices, &col_indices, 0, &self.config);
            for (i, row) in x.outer_iter().enumerate() {
                preds[i] += self.config.learning_rate * tree.predict(row);
            }
            self.trees.push(tree);
        }

        self.n_features = n_features;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(MathScoreError::ModelNotFitted);
        }
        check_features(self.n_features, x)?;

        Ok(x.outer_iter()
            .map(|row| self.base_score + self.config.learning_rate * self.raw_tree_sum(row))
            .collect())
    }
}
