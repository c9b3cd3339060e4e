//! AdaBoost.R2 regression
//!
//! Each round draws a weighted bootstrap of the training rows, fits a shallow
//! regression tree on it and measures the tree's relative error on every row.
//! Rows with large error gain weight for the next round. Predictions are the
//! weighted median of the estimators' outputs.

use super::config::{require_positive, require_positive_f64};
use super::decision_tree::DecisionTree;
use super::models::{check_features, check_training_data, Model};
use crate::error::{MathScoreError, Result};
use ndarray::{Array1, Array2};
use rand::distributions::{Distribution, WeightedIndex};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// How per-row errors are turned into losses in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AdaBoostLoss {
    #[default]
    Linear,
    Square,
    Exponential,
}

impl AdaBoostLoss {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "linear" => Ok(Self::Linear),
            "square" => Ok(Self::Square),
            "exponential" => Ok(Self::Exponential),
            other => Err(MathScoreError::InvalidParameter {
                name: "loss".to_string(),
                value: other.to_string(),
                reason: "expected linear, square or exponential".to_string(),
            }),
        }
    }

    fn apply(&self, relative_error: f64) -> f64 {
        match self {
            Self::Linear => relative_error,
            Self::Square => relative_error * relative_error,
            Self::Exponential => 1.0 - (-relative_error).exp(),
        }
    }
}

/// AdaBoost.R2 regressor over depth-limited regression trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoostRegressor {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub loss: AdaBoostLoss,
    /// Depth of each base tree
    pub max_depth: usize,
    pub random_state: u64,
    estimators: Vec<DecisionTree>,
    estimator_weights: Vec<f64>,
    n_features: usize,
}

impl Default for AdaBoostRegressor {
    fn default() -> Self {
        Self::new(50, 1.0)
    }
}

impl AdaBoostRegressor {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators,
            learning_rate,
            loss: AdaBoostLoss::Linear,
            max_depth: 3,
            random_state: 42,
            estimators: Vec::new(),
            estimator_weights: Vec::new(),
            n_features: 0,
        }
    }

    pub fn with_loss(mut self, loss: AdaBoostLoss) -> Self {
        self.loss = loss;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn n_fitted_estimators(&self) -> usize {
        self.estimators.len()
    }

    /// Weighted median of one row's per-estimator predictions
    fn weighted_median(predictions: &[f64], weights: &[f64]) -> f64 {
        let mut order: Vec<usize> = (0..predictions.len()).collect();
        order.sort_by(|&a, &b| {
            predictions[a]
                .partial_cmp(&predictions[b])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let total: f64 = weights.iter().sum();
        let mut cumulative = 0.0;
        for &i in &order {
            cumulative += weights[i];
            if cumulative >= 0.5 * total {
                return predictions[i];
            }
        }
        order.last().map_or(0.0, |&i| predictions[i])
    }
}

impl Model for AdaBoostRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_data(x, y)?;
        require_positive("n_estimators", self.n_estimators)?;
        require_positive("max_depth", self.max_depth)?;
        require_positive_f64("learning_rate", self.learning_rate)?;

        let n_samples = x.nrows();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.random_state);
        let mut sample_weight = vec![1.0 / n_samples as f64; n_samples];

        self.estimators.clear();
        self.estimator_weights.clear();

        for iboost in 0..self.n_estimators {
            let sampler = WeightedIndex::new(&sample_weight)
                .map_err(|e| MathScoreError::ComputationError(format!("sample weights: {}", e)))?;
            let rows: Vec<usize> = (0..n_samples).map(|_| sampler.sample(&mut rng)).collect();

            let mut tree = DecisionTree::new().with_max_depth(Some(self.max_depth));
            tree.fit_rows(x, y, rows)?;
            let predictions = tree.predict(x)?;

            let mut errors: Vec<f64> = predictions.iter().zip(y.iter()).map(|(p, t)| (p - t).abs()).collect();
            let max_error = errors.iter().cloned().fold(0.0_f64, f64::max);
            if max_error > 0.0 {
                errors.iter_mut().for_each(|e| *e /= max_error);
            }
            errors.iter_mut().for_each(|e| *e = self.loss.apply(*e));

            let estimator_error: f64 = sample_weight.iter().zip(errors.iter()).map(|(w, e)| w * e).sum();

            if estimator_error <= 0.0 {
                // Perfect fit; nothing left to boost
                self.estimators.push(tree);
                self.estimator_weights.push(1.0);
                break;
            }
            if estimator_error >= 0.5 {
                // Worse than chance; keep it only if it is the sole estimator
                if self.estimators.is_empty() {
                    self.estimators.push(tree);
                    self.estimator_weights.push(1.0);
                }
                break;
            }

            let beta = estimator_error / (1.0 - estimator_error);
            self.estimators.push(tree);
            self.estimator_weights.push(self.learning_rate * (1.0 / beta).ln());

            if iboost + 1 < self.n_estimators {
                for (w, e) in sample_weight.iter_mut().zip(errors.iter()) {
                    *w *= beta.powf((1.0 - e) * self.learning_rate);
                }
                let total: f64 = sample_weight.iter().sum();
                if !(total > 0.0) {
                    break;
                }
                sample_weight.iter_mut().for_each(|w| *w /= total);
            }
        }

        self.n_features = x.ncols();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.estimators.is_empty() {
            return Err(MathScoreError::ModelNotFitted);
        }
        check_features(self.n_features, x)?;

        let per_estimator = self
            .estimators
            .iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<Vec<_>>>()?;

        let mut row_predictions = vec![0.0; per_estimator.len()];
        let medians = (0..x.nrows())
            .map(|i| {
                for (slot, preds) in row_predictions.iter_mut().zip(per_estimator.iter()) {
                    *slot = preds[i];
                }
                Self::weighted_median(&row_predictions, &self.estimator_weights)
            })
            .collect();
        Ok(medians)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::models::r2_score;

    fn regression_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((100, 2), |(i, j)| ((i * (j + 2)) % 23) as f64);
        let y: Array1<f64> = x.rows().into_iter().map(|r| 2.0 * r[0] + r[1]).collect();
        (x, y)
    }

    #[test]
    fn test_adaboost_regressor() {
        let (x, y) = regression_data();
        let mut model = AdaBoostRegressor::new(30, 1.0);
        model.fit(&x, &y).unwrap();
        assert!(model.n_fitted_estimators() >= 1);

        let r2 = r2_score(&y, &model.predict(&x).unwrap());
        assert!(r2 > 0.7, "AdaBoost R² = {}", r2);
    }

    #[test]
    fn test_weighted_median() {
        let preds = [1.0, 10.0, 5.0];
        assert_eq!(AdaBoostRegressor::weighted_median(&preds, &[1.0, 1.0, 1.0]), 5.0);
        assert_eq!(AdaBoostRegressor::weighted_median(&preds, &[0.1, 5.0, 0.1]), 10.0);
    }

    #[test]
    fn test_seeded_runs_match() {
        let (x, y) = regression_data();
        let mut a = AdaBoostRegressor::new(10, 0.5).with_random_state(11);
        let mut b = AdaBoostRegressor::new(10, 0.5).with_random_state(11);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_unknown_loss() {
        assert!(AdaBoostLoss::parse("huber").is_err());
        assert_eq!(AdaBoostLoss::parse("square").unwrap(), AdaBoostLoss::Square);
    }
}
