//! Model trait, trained-model dispatch and regression metrics

use super::adaboost::{AdaBoostLoss, AdaBoostRegressor};
use super::catboost::{CatBoostConfig, CatBoostRegressor};
use super::config::{Hyperparameters, ModelType};
use super::decision_tree::DecisionTree;
use super::gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
use super::knn::{DistanceMetric, KNNConfig, KNNRegressor, WeightScheme};
use super::linear_models::LinearRegression;
use super::random_forest::RandomForest;
use super::xgboost::{XGBoostConfig, XGBoostRegressor};
use crate::error::{MathScoreError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Seed used by stochastic models when none is configured
pub const DEFAULT_RANDOM_STATE: u64 = 42;

/// Trait for regression models
pub trait Model: Send + Sync {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Predict one value per row of `x`
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;
}

/// Reject empty or misaligned training data
pub(crate) fn check_training_data(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(MathScoreError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 {
        return Err(MathScoreError::DataError("training data has no rows".to_string()));
    }
    Ok(())
}

/// Reject a feature matrix whose width differs from what the model was fit on
pub(crate) fn check_features(expected: usize, x: &Array2<f64>) -> Result<()> {
    if x.ncols() != expected {
        return Err(MathScoreError::ShapeError {
            expected: format!("{} features", expected),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

/// Coefficient of determination.
///
/// With a constant target (zero total variance) the score is 1.0 for an
/// exact prediction and 0.0 otherwise.
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let n = y_true.len();
    if n == 0 {
        return 0.0;
    }
    let mean = y_true.sum() / n as f64;
    let ss_res: f64 = y_true.iter().zip(y_pred.iter()).map(|(t, p)| (t - p).powi(2)).sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();

    if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else if ss_res == 0.0 {
        1.0
    } else {
        0.0
    }
}

/// Regression metrics for one candidate on the test set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Error
    pub mae: f64,
    /// R-squared
    pub r2: f64,
    /// Wall-clock seconds spent fitting
    pub training_time_secs: f64,
    /// Number of evaluated samples
    pub n_samples: usize,
}

impl ModelMetrics {
    /// Compute regression metrics
    pub fn compute_regression(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let n = y_true.len();
        if n == 0 {
            return Self::default();
        }

        let errors: Vec<f64> = y_true.iter().zip(y_pred.iter()).map(|(t, p)| t - p).collect();
        let mse = errors.iter().map(|e| e * e).sum::<f64>() / n as f64;
        let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n as f64;

        Self {
            mse,
            rmse: mse.sqrt(),
            mae,
            r2: r2_score(y_true, y_pred),
            training_time_secs: 0.0,
            n_samples: n,
        }
    }

    pub fn with_training_time(mut self, secs: f64) -> Self {
        self.training_time_secs = secs;
        self
    }
}

/// A fitted (or ready-to-fit) model of any supported type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedModel {
    RandomForest(RandomForest),
    DecisionTree(DecisionTree),
    GradientBoosting(GradientBoostingRegressor),
    LinearRegression(LinearRegression),
    KNeighbors(KNNRegressor),
    XGBoost(XGBoostRegressor),
    CatBoost(CatBoostRegressor),
    AdaBoost(AdaBoostRegressor),
}

const RANDOM_FOREST_PARAMS: &[&str] = &[
    "n_estimators",
    "max_depth",
    "min_samples_split",
    "min_samples_leaf",
    "bootstrap",
    "random_state",
];
const DECISION_TREE_PARAMS: &[&str] = &["max_depth", "min_samples_split", "min_samples_leaf"];
const GRADIENT_BOOSTING_PARAMS: &[&str] = &[
    "n_estimators",
    "learning_rate",
    "max_depth",
    "min_samples_split",
    "min_samples_leaf",
    "subsample",
    "random_state",
];
const LINEAR_REGRESSION_PARAMS: &[&str] = &["fit_intercept"];
const KNEIGHBORS_PARAMS: &[&str] = &["n_neighbors", "weights", "metric", "p"];
const XGBOOST_PARAMS: &[&str] = &[
    "n_estimators",
    "learning_rate",
    "max_depth",
    "min_child_weight",
    "reg_lambda",
    "reg_alpha",
    "gamma",
    "subsample",
    "colsample_bytree",
    "random_state",
];
const CATBOOST_PARAMS: &[&str] = &[
    "iterations",
    "learning_rate",
    "depth",
    "l2_leaf_reg",
    "border_count",
    "subsample",
    "random_state",
    "verbose",
];
const ADABOOST_PARAMS: &[&str] = &["n_estimators", "learning_rate", "loss", "max_depth", "random_state"];

impl TrainedModel {
    /// Build an unfitted model from its type and hyperparameters
    pub fn build(model_type: ModelType, params: &Hyperparameters) -> Result<Self> {
        let model = match model_type {
            ModelType::RandomForest => {
                params.ensure_known(model_type, RANDOM_FOREST_PARAMS)?;
                TrainedModel::RandomForest(
                    RandomForest::new(params.usize_or("n_estimators", 100)?)
                        .with_max_depth(params.opt_usize("max_depth")?)
                        .with_min_samples_split(params.usize_or("min_samples_split", 2)?)
                        .with_min_samples_leaf(params.usize_or("min_samples_leaf", 1)?)
                        .with_bootstrap(params.bool_or("bootstrap", true)?)
                        .with_random_state(params.u64_or("random_state", DEFAULT_RANDOM_STATE)?),
                )
            }
            ModelType::DecisionTree => {
                params.ensure_known(model_type, DECISION_TREE_PARAMS)?;
                TrainedModel::DecisionTree(
                    DecisionTree::new()
                        .with_max_depth(params.opt_usize("max_depth")?)
                        .with_min_samples_split(params.usize_or("min_samples_split", 2)?)
                        .with_min_samples_leaf(params.usize_or("min_samples_leaf", 1)?),
                )
            }
            ModelType::GradientBoosting => {
                params.ensure_known(model_type, GRADIENT_BOOSTING_PARAMS)?;
                let defaults = GradientBoostingConfig::default();
                let config = GradientBoostingConfig {
                    n_estimators: params.usize_or("n_estimators", defaults.n_estimators)?,
                    learning_rate: params.f64_or("learning_rate", defaults.learning_rate)?,
                    max_depth: params.usize_or("max_depth", defaults.max_depth)?,
                    min_samples_split: params.usize_or("min_samples_split", defaults.min_samples_split)?,
                    min_samples_leaf: params.usize_or("min_samples_leaf", defaults.min_samples_leaf)?,
                    subsample: params.f64_or("subsample", defaults.subsample)?,
                    random_state: params.u64_or("random_state", defaults.random_state)?,
                };
                config.validate()?;
                TrainedModel::GradientBoosting(GradientBoostingRegressor::new(config))
            }
            ModelType::LinearRegression => {
                params.ensure_known(model_type, LINEAR_REGRESSION_PARAMS)?;
                TrainedModel::LinearRegression(
                    LinearRegression::new().with_fit_intercept(params.bool_or("fit_intercept", true)?),
                )
            }
            ModelType::KNeighbors => {
                params.ensure_known(model_type, KNEIGHBORS_PARAMS)?;
                let config = KNNConfig {
                    n_neighbors: params.usize_or("n_neighbors", 5)?,
                    metric: DistanceMetric::parse(
                        params.text_or("metric", "euclidean")?,
                        params.f64_or("p", 2.0)?,
                    )?,
                    weights: WeightScheme::parse(params.text_or("weights", "uniform")?)?,
                };
                TrainedModel::KNeighbors(KNNRegressor::new(config))
            }
            ModelType::XGBoost => {
                params.ensure_known(model_type, XGBOOST_PARAMS)?;
                let defaults = XGBoostConfig::default();
                let config = XGBoostConfig {
                    n_estimators: params.usize_or("n_estimators", defaults.n_estimators)?,
                    learning_rate: params.f64_or("learning_rate", defaults.learning_rate)?,
                    max_depth: params.usize_or("max_depth", defaults.max_depth)?,
                    min_child_weight: params.f64_or("min_child_weight", defaults.min_child_weight)?,
                    reg_lambda: params.f64_or("reg_lambda", defaults.reg_lambda)?,
                    reg_alpha: params.f64_or("reg_alpha", defaults.reg_alpha)?,
                    gamma: params.f64_or("gamma", defaults.gamma)?,
                    subsample: params.f64_or("subsample", defaults.subsample)?,
                    colsample_bytree: params.f64_or("colsample_bytree", defaults.colsample_bytree)?,
                    random_state: params.u64_or("random_state", defaults.random_state)?,
                };
                config.validate()?;
                TrainedModel::XGBoost(XGBoostRegressor::new(config))
            }
            ModelType::CatBoost => {
                params.ensure_known(model_type, CATBOOST_PARAMS)?;
                let defaults = CatBoostConfig::default();
                let config = CatBoostConfig {
                    iterations: params.usize_or("iterations", defaults.iterations)?,
                    learning_rate: params.f64_or("learning_rate", defaults.learning_rate)?,
                    depth: params.usize_or("depth", defaults.depth)?,
                    l2_leaf_reg: params.f64_or("l2_leaf_reg", defaults.l2_leaf_reg)?,
                    border_count: params.usize_or("border_count", defaults.border_count)?,
                    subsample: params.f64_or("subsample", defaults.subsample)?,
                    random_state: params.u64_or("random_state", defaults.random_state)?,
                    verbose: params.bool_or("verbose", defaults.verbose)?,
                };
                config.validate()?;
                TrainedModel::CatBoost(CatBoostRegressor::new(config))
            }
            ModelType::AdaBoost => {
                params.ensure_known(model_type, ADABOOST_PARAMS)?;
                TrainedModel::AdaBoost(
                    AdaBoostRegressor::new(
                        params.usize_or("n_estimators", 50)?,
                        params.f64_or("learning_rate", 1.0)?,
                    )
                    .with_loss(AdaBoostLoss::parse(params.text_or("loss", "linear")?)?)
                    .with_max_depth(params.usize_or("max_depth", 3)?)
                    .with_random_state(params.u64_or("random_state", DEFAULT_RANDOM_STATE)?),
                )
            }
        };
        Ok(model)
    }

    pub fn model_type(&self) -> ModelType {
        match self {
            TrainedModel::RandomForest(_) => ModelType::RandomForest,
            TrainedModel::DecisionTree(_) => ModelType::DecisionTree,
            TrainedModel::GradientBoosting(_) => ModelType::GradientBoosting,
            TrainedModel::LinearRegression(_) => ModelType::LinearRegression,
            TrainedModel::KNeighbors(_) => ModelType::KNeighbors,
            TrainedModel::XGBoost(_) => ModelType::XGBoost,
            TrainedModel::CatBoost(_) => ModelType::CatBoost,
            TrainedModel::AdaBoost(_) => ModelType::AdaBoost,
        }
    }

    fn inner(&self) -> &dyn Model {
        match self {
            TrainedModel::RandomForest(m) => m,
            TrainedModel::DecisionTree(m) => m,
            TrainedModel::GradientBoosting(m) => m,
            TrainedModel::LinearRegression(m) => m,
            TrainedModel::KNeighbors(m) => m,
            TrainedModel::XGBoost(m) => m,
            TrainedModel::CatBoost(m) => m,
            TrainedModel::AdaBoost(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Model {
        match self {
            TrainedModel::RandomForest(m) => m,
            TrainedModel::DecisionTree(m) => m,
            TrainedModel::GradientBoosting(m) => m,
            TrainedModel::LinearRegression(m) => m,
            TrainedModel::KNeighbors(m) => m,
            TrainedModel::XGBoost(m) => m,
            TrainedModel::CatBoost(m) => m,
            TrainedModel::AdaBoost(m) => m,
        }
    }
}

impl Model for TrainedModel {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.inner().predict(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_regression_metrics() {
        let y_true = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let y_pred = array![1.1, 2.0, 2.9, 4.1, 5.0];

        let metrics = ModelMetrics::compute_regression(&y_true, &y_pred);
        assert_eq!(metrics.n_samples, 5);
        assert!((metrics.mse - 0.006).abs() < 1e-9);
        assert!((metrics.rmse - 0.006_f64.sqrt()).abs() < 1e-9);
        assert!(metrics.r2 > 0.99);
    }

    #[test]
    fn test_r2_perfect_and_mean_predictor() {
        let y = array![1.0, 2.0, 3.0, 4.0];
        assert_eq!(r2_score(&y, &y), 1.0);
        assert!(r2_score(&y, &array![2.5, 2.5, 2.5, 2.5]).abs() < 1e-12);
    }

    #[test]
    fn test_r2_constant_target() {
        let y = array![3.0, 3.0, 3.0];
        assert_eq!(r2_score(&y, &array![3.0, 3.0, 3.0]), 1.0);
        assert_eq!(r2_score(&y, &array![3.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn test_build_every_model_type() {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| (i + 3 * j) as f64);
        let y = x.column(0).mapv(|v| 2.0 * v + 1.0);

        for model_type in [
            ModelType::RandomForest,
            ModelType::DecisionTree,
            ModelType::GradientBoosting,
            ModelType::LinearRegression,
            ModelType::KNeighbors,
            ModelType::XGBoost,
            ModelType::CatBoost,
            ModelType::AdaBoost,
        ] {
            let params = match model_type {
                ModelType::RandomForest | ModelType::GradientBoosting | ModelType::XGBoost => {
                    Hyperparameters::new().with("n_estimators", 5usize)
                }
                ModelType::CatBoost => Hyperparameters::new().with("iterations", 5usize),
                _ => Hyperparameters::new(),
            };
            let mut model = TrainedModel::build(model_type, &params).unwrap();
            assert_eq!(model.model_type(), model_type);
            model.fit(&x, &y).unwrap();
            let preds = model.predict(&x).unwrap();
            assert_eq!(preds.len(), 30);
            assert!(preds.iter().all(|p| p.is_finite()), "{model_type} produced non-finite output");
        }
    }

    #[test]
    fn test_build_rejects_unknown_parameter() {
        let params = Hyperparameters::new().with("n_estimator", 10usize);
        let err = TrainedModel::build(ModelType::RandomForest, &params).unwrap_err();
        assert!(matches!(err, MathScoreError::InvalidParameter { .. }));
    }

    #[test]
    fn test_build_rejects_bad_value() {
        let params = Hyperparameters::new().with("learning_rate", -0.1);
        let err = TrainedModel::build(ModelType::GradientBoosting, &params).unwrap_err();
        assert!(matches!(err, MathScoreError::InvalidParameter { ref name, .. } if name == "learning_rate"));
    }
}
