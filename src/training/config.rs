//! Training configuration

use crate::error::{MathScoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Default location of the persisted model artifact
pub const DEFAULT_ARTIFACT_PATH: &str = "artifacts/model.bin";

/// Minimum test-set R² a model must reach before it is persisted
pub const DEFAULT_ACCEPTANCE_THRESHOLD: f64 = 0.6;

/// Type of model a candidate trains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// Bagged regression trees
    RandomForest,
    /// Single CART regression tree
    DecisionTree,
    /// Gradient boosted regression trees
    GradientBoosting,
    /// Ordinary least squares
    LinearRegression,
    /// K-Nearest Neighbors regression
    KNeighbors,
    /// Second-order boosting with regularized leaves
    XGBoost,
    /// Boosting over symmetric (oblivious) trees
    CatBoost,
    /// AdaBoost.R2 over shallow trees
    AdaBoost,
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::RandomForest => "random_forest",
            ModelType::DecisionTree => "decision_tree",
            ModelType::GradientBoosting => "gradient_boosting",
            ModelType::LinearRegression => "linear_regression",
            ModelType::KNeighbors => "k_neighbors",
            ModelType::XGBoost => "xgboost",
            ModelType::CatBoost => "catboost",
            ModelType::AdaBoost => "adaboost",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single hyperparameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

/// Ordered mapping of hyperparameter name to value.
///
/// Values are only interpreted when a model is built from them, so an
/// unknown name or a value of the wrong kind surfaces as
/// [`MathScoreError::InvalidParameter`] at that point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hyperparameters(BTreeMap<String, ParamValue>);

impl Hyperparameters {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Add or replace a value
    pub fn with(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    /// Reject names that the model type does not understand
    pub fn ensure_known(&self, model_type: ModelType, known: &[&str]) -> Result<()> {
        if let Some((name, value)) = self.0.iter().find(|(name, _)| !known.contains(&name.as_str())) {
            return Err(MathScoreError::InvalidParameter {
                name: name.clone(),
                value: value.to_string(),
                reason: format!("not a hyperparameter of {}", model_type),
            });
        }
        Ok(())
    }

    pub fn usize_or(&self, name: &str, default: usize) -> Result<usize> {
        match self.0.get(name) {
            None => Ok(default),
            Some(ParamValue::Int(v)) if *v >= 0 => Ok(*v as usize),
            Some(other) => Err(invalid(name, other, "expected a non-negative integer")),
        }
    }

    /// Integer that may be absent (e.g. an unbounded tree depth)
    pub fn opt_usize(&self, name: &str) -> Result<Option<usize>> {
        match self.0.get(name) {
            None => Ok(None),
            Some(ParamValue::Int(v)) if *v >= 0 => Ok(Some(*v as usize)),
            Some(other) => Err(invalid(name, other, "expected a non-negative integer")),
        }
    }

    pub fn f64_or(&self, name: &str, default: f64) -> Result<f64> {
        match self.0.get(name) {
            None => Ok(default),
            Some(ParamValue::Float(v)) if v.is_finite() => Ok(*v),
            Some(ParamValue::Int(v)) => Ok(*v as f64),
            Some(other) => Err(invalid(name, other, "expected a finite number")),
        }
    }

    pub fn bool_or(&self, name: &str, default: bool) -> Result<bool> {
        match self.0.get(name) {
            None => Ok(default),
            Some(ParamValue::Bool(v)) => Ok(*v),
            Some(other) => Err(invalid(name, other, "expected true or false")),
        }
    }

    pub fn text_or<'a>(&'a self, name: &str, default: &'a str) -> Result<&'a str> {
        match self.0.get(name) {
            None => Ok(default),
            Some(ParamValue::Text(v)) => Ok(v.as_str()),
            Some(other) => Err(invalid(name, other, "expected a string")),
        }
    }

    pub fn u64_or(&self, name: &str, default: u64) -> Result<u64> {
        Ok(self.usize_or(name, default as usize)? as u64)
    }
}

fn invalid(name: &str, value: &ParamValue, reason: &str) -> MathScoreError {
    MathScoreError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Check a strictly positive count
pub(crate) fn require_positive(name: &str, value: usize) -> Result<usize> {
    if value == 0 {
        return Err(MathScoreError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(value)
}

/// Check a value in the half-open unit interval (0, 1]
pub(crate) fn require_unit_interval(name: &str, value: f64) -> Result<f64> {
    if !(value > 0.0 && value <= 1.0) {
        return Err(MathScoreError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
            reason: "must be in (0, 1]".to_string(),
        });
    }
    Ok(value)
}

/// Check a strictly positive real
pub(crate) fn require_positive_f64(name: &str, value: f64) -> Result<f64> {
    if !(value > 0.0) {
        return Err(MathScoreError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
            reason: "must be greater than 0".to_string(),
        });
    }
    Ok(value)
}

/// Configuration for a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Where the winning model is persisted
    pub artifact_path: PathBuf,
    /// Minimum test-set R² for a model to be kept
    pub acceptance_threshold: f64,
    /// Fit candidates on the rayon pool instead of one after another
    pub parallel: bool,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            artifact_path: PathBuf::from(DEFAULT_ARTIFACT_PATH),
            acceptance_threshold: DEFAULT_ACCEPTANCE_THRESHOLD,
            parallel: true,
        }
    }
}

impl TrainerConfig {
    pub fn new(artifact_path: impl Into<PathBuf>) -> Self {
        Self {
            artifact_path: artifact_path.into(),
            ..Default::default()
        }
    }

    /// Set artifact path
    pub fn with_artifact_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact_path = path.into();
        self
    }

    /// Set acceptance threshold
    pub fn with_acceptance_threshold(mut self, threshold: f64) -> Self {
        self.acceptance_threshold = threshold;
        self
    }

    /// Enable or disable parallel candidate fitting
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.acceptance_threshold.is_finite() {
            return Err(MathScoreError::ConfigError(format!(
                "acceptance threshold must be finite, got {}",
                self.acceptance_threshold
            )));
        }
        if self.artifact_path.as_os_str().is_empty() {
            return Err(MathScoreError::ConfigError("artifact path is empty".to_string()));
        }
        Ok(())
    }
}
