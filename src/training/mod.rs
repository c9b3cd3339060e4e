//! Model training module
//!
//! Candidate regressors and the selection pass that picks one of them:
//! - Decision trees and Random Forests
//! - Gradient boosting, XGBoost-style and CatBoost-style boosting
//! - AdaBoost.R2
//! - Ordinary least squares
//! - K-Nearest Neighbors
//!
//! A [`CandidateRegistry`] names the roster, the [`Evaluator`] scores each
//! candidate by test-set R², and the [`ModelTrainer`] gates and persists the
//! winner.

mod config;
mod dataset;
mod evaluator;
mod models;
mod registry;
mod trainer;
pub mod adaboost;
pub mod catboost;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod knn;
pub mod linear_models;
pub mod random_forest;
pub mod xgboost;

pub use config::{
    Hyperparameters, ModelType, ParamValue, TrainerConfig, DEFAULT_ACCEPTANCE_THRESHOLD,
    DEFAULT_ARTIFACT_PATH,
};
pub use dataset::Dataset;
pub use evaluator::{CandidateScore, EvaluatedCandidate, EvaluationReport, Evaluator};
pub use models::{r2_score, Model, ModelMetrics, TrainedModel, DEFAULT_RANDOM_STATE};
pub use registry::{Candidate, CandidateRegistry};
pub use trainer::{ModelTrainer, TrainingOutcome};

pub use adaboost::{AdaBoostLoss, AdaBoostRegressor};
pub use catboost::{CatBoostConfig, CatBoostRegressor};
pub use decision_tree::{DecisionTree, TreeNode};
pub use gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
pub use knn::{DistanceMetric, KNNConfig, KNNRegressor, WeightScheme};
pub use linear_models::LinearRegression;
pub use random_forest::RandomForest;
pub use xgboost::{XGBoostConfig, XGBoostRegressor};
