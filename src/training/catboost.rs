//! CatBoost-style gradient boosting over symmetric (oblivious) trees
//!
//! Every level of a symmetric tree applies one (feature, border) pair to all
//! of its nodes, so a tree of depth `d` is a list of `d` splits and a table
//! of `2^d` leaf values indexed by the split outcomes.

use super::config::{require_positive, require_positive_f64, require_unit_interval};
use super::models::{check_features, check_training_data, Model};
use crate::error::{MathScoreError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Marks a row that is not part of the current round's sample
const NOT_SAMPLED: usize = usize::MAX;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatBoostConfig {
    pub iterations: usize,
    pub learning_rate: f64,
    pub depth: usize,
    pub l2_leaf_reg: f64,
    /// Maximum number of candidate borders per feature
    pub border_count: usize,
    pub subsample: f64,
    pub random_state: u64,
    /// Log training loss while boosting
    pub verbose: bool,
}

impl Default for CatBoostConfig {
    fn default() -> Self {
        Self {
            iterations: 100,
            learning_rate: 0.1,
            depth: 6,
            l2_leaf_reg: 3.0,
            border_count: 254,
            subsample: 1.0,
            random_state: 42,
            verbose: false,
        }
    }
}

impl CatBoostConfig {
    pub fn validate(&self) -> Result<()> {
        require_positive("iterations", self.iterations)?;
        require_positive("depth", self.depth)?;
        require_positive("border_count", self.border_count)?;
        require_positive_f64("learning_rate", self.learning_rate)?;
        require_unit_interval("subsample", self.subsample)?;
        if self.l2_leaf_reg < 0.0 {
            return Err(MathScoreError::InvalidParameter {
                name: "l2_leaf_reg".to_string(),
                value: self.l2_leaf_reg.to_string(),
                reason: "must not be negative".to_string(),
            });
        }
        // 2^depth leaves must stay addressable
        if self.depth > 16 {
            return Err(MathScoreError::InvalidParameter {
                name: "depth".to_string(),
                value: self.depth.to_string(),
                reason: "symmetric trees support depth up to 16".to_string(),
            });
        }
        Ok(())
    }
}

/// Symmetric tree: each level uses the same split feature and border
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SymmetricTree {
    splits: Vec<(usize, f64)>,
    leaf_values: Vec<f64>,
}

impl SymmetricTree {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        let idx = self
            .splits
            .iter()
            .fold(0usize, |idx, &(feature, border)| idx * 2 + usize::from(sample[feature] > border));
        self.leaf_values[idx]
    }
}

/// Per-feature row order, computed once per fit
struct FeatureOrder {
    sorted_rows: Vec<Vec<usize>>,
}

impl FeatureOrder {
    fn new(x: &Array2<f64>) -> Self {
        let sorted_rows = (0..x.ncols())
            .into_par_iter()
            .map(|feat| {
                let mut rows: Vec<usize> = (0..x.nrows()).collect();
                rows.sort_by(|&a, &b| {
                    x[[a, feat]]
                        .partial_cmp(&x[[b, feat]])
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                rows
            })
            .collect();
        Self { sorted_rows }
    }
}

fn leaf_score(g: f64, h: f64, reg: f64) -> f64 {
    if h + reg > 0.0 {
        g * g / (h + reg)
    } else {
        0.0
    }
}

fn build_symmetric_tree(
    x: &Array2<f64>,
    orders: &FeatureOrder,
    gradients: &[f64],
    sample: &[usize],
    config: &CatBoostConfig,
) -> SymmetricTree {
    let mut leaf_of = vec![NOT_SAMPLED; x.nrows()];
    for &i in sample {
        leaf_of[i] = 0;
    }

    let mut splits = Vec::with_capacity(config.depth);
    for level in 0..config.depth {
        let n_leaves = 1usize << level;
        let candidates: Vec<Option<(f64, f64)>> = orders
            .sorted_rows
            .par_iter()
            .enumerate()
            .map(|(feat, order)| best_border(x, feat, order, &leaf_of, gradients, n_leaves, config))
            .collect();

        // (feature, border, gain); lowest feature index wins ties
        let mut best: Option<(usize, f64, f64)> = None;
        for (feat, candidate) in candidates.into_iter().enumerate() {
            if let Some((border, gain)) = candidate {
                if best.map_or(true, |(_, _, g)| gain > g) {
                    best = Some((feat, border, gain));
                }
            }
        }

        let Some((feat, border, _)) = best else { break };
        splits.push((feat, border));
        for &i in sample {
            leaf_of[i] = leaf_of[i] * 2 + usize::from(x[[i, feat]] > border);
        }
    }

    let n_leaves = 1usize << splits.len();
    let mut g_sum = vec![0.0; n_leaves];
    let mut h_sum = vec![0.0; n_leaves];
    for &i in sample {
        g_sum[leaf_of[i]] += gradients[i];
        h_sum[leaf_of[i]] += 1.0;
    }
    let leaf_values = g_sum
        .iter()
        .zip(h_sum.iter())
        .map(|(&g, &h)| if h > 0.0 { -g / (h + config.l2_leaf_reg) } else { 0.0 })
        .collect();

    SymmetricTree { splits, leaf_values }
}

/// Best border for one feature given the current leaf assignment.
///
/// Sweeps rows in feature order while keeping per-leaf left sums, so each
/// candidate border costs O(leaves).
fn best_border(
    x: &Array2<f64>,
    feat: usize,
    order: &[usize],
    leaf_of: &[usize],
    gradients: &[f64],
    n_leaves: usize,
    config: &CatBoostConfig,
) -> Option<(f64, f64)> {
    let reg = config.l2_leaf_reg;
    let rows: Vec<usize> = order.iter().copied().filter(|&i| leaf_of[i] != NOT_SAMPLED).collect();
    if rows.len() < 2 {
        return None;
    }

    let mut g_total = vec![0.0; n_leaves];
    let mut h_total = vec![0.0; n_leaves];
    for &i in &rows {
        g_total[leaf_of[i]] += gradients[i];
        h_total[leaf_of[i]] += 1.0;
    }
    let parent: f64 = (0..n_leaves).map(|b| leaf_score(g_total[b], h_total[b], reg)).sum();

    // Positions where the feature value changes are the candidate borders
    let boundaries: Vec<usize> = (0..rows.len() - 1)
        .filter(|&p| x[[rows[p + 1], feat]] > x[[rows[p], feat]])
        .collect();
    if boundaries.is_empty() {
        return None;
    }
    let step = boundaries.len().div_ceil(config.border_count);

    let mut g_left = vec![0.0; n_leaves];
    let mut h_left = vec![0.0; n_leaves];
    let mut consumed = 0usize;
    let mut best: Option<(f64, f64)> = None;

    for &pos in boundaries.iter().step_by(step) {
        while consumed <= pos {
            let i = rows[consumed];
            g_left[leaf_of[i]] += gradients[i];
            h_left[leaf_of[i]] += 1.0;
            consumed += 1;
        }

        let children: f64 = (0..n_leaves)
            .map(|b| {
                let (gl, hl) = (g_left[b], h_left[b]);
                let (gr, hr) = (g_total[b] - gl, h_total[b] - hl);
                leaf_score(gl, hl, reg) + leaf_score(gr, hr, reg)
            })
            .sum();
        let gain = children - parent;

        if gain > 1e-12 && best.map_or(true, |(_, g)| gain > g) {
            let border = (x[[rows[pos], feat]] + x[[rows[pos + 1], feat]]) / 2.0;
            best = Some((border, gain));
        }
    }

    best
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatBoostRegressor {
    pub config: CatBoostConfig,
    trees: Vec<SymmetricTree>,
    base_prediction: f64,
    n_features: usize,
}

impl CatBoostRegressor {
    pub fn new(config: CatBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_prediction: 0.0,
            n_features: 0,
        }
    }

    fn sample_rows(&self, n: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        let mut rows: Vec<usize> = (0..n).collect();
        if self.config.subsample < 1.0 {
            let k = (((n as f64) * self.config.subsample).ceil() as usize).max(1);
            rows.shuffle(rng);
            rows.truncate(k);
        }
        rows
    }
}

impl Model for CatBoostRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_data(x, y)?;
        self.config.validate()?;

        let n = x.nrows();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);
        let orders = FeatureOrder::new(x);

        self.base_prediction = y.mean().unwrap_or(0.0);
        let mut predictions = Array1::from_elem(n, self.base_prediction);
        let log_every = (self.config.iterations / 10).max(1);

        self.trees.clear();
        for iteration in 0..self.config.iterations {
            let gradients: Vec<f64> = predictions.iter().zip(y.iter()).map(|(&p, &yi)| p - yi).collect();
            let sample = self.sample_rows(n, &mut rng);

            let tree = build_symmetric_tree(x, &orders, &gradients, &sample, &self.config);
            for (i, row) in x.outer_iter().enumerate() {
                predictions[i] += self.config.learning_rate * tree.predict(row);
            }
            self.trees.push(tree);

            if self.config.verbose && (iteration + 1) % log_every == 0 {
                let rmse = ((&predictions - y).mapv(|e| e * e).sum() / n as f64).sqrt();
                info!(iteration = iteration + 1, rmse, "catboost progress");
            }
        }

        self.n_features = x.ncols();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(MathScoreError::ModelNotFitted);
        }
        check_features(self.n_features, x)?;

        Ok(x.outer_iter()
            .map(|row| {
                self.base_prediction
                    + self.config.learning_rate * self.trees.iter().map(|t| t.predict(row)).sum::<f64>()
            })
            .collect())
    }
}
