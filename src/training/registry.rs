//! Candidate registry: the ordered roster of models a training run compares

use super::config::{Hyperparameters, ModelType};
use super::models::TrainedModel;
use crate::error::{MathScoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// A named model type with fixed hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
    pub model_type: ModelType,
    #[serde(default)]
    pub hyperparameters: Hyperparameters,
}

impl Candidate {
    pub fn new(name: impl Into<String>, model_type: ModelType, hyperparameters: Hyperparameters) -> Self {
        Self {
            name: name.into(),
            model_type,
            hyperparameters,
        }
    }

    /// Build a fresh, unfitted model for this candidate
    pub fn build(&self) -> Result<TrainedModel> {
        TrainedModel::build(self.model_type, &self.hyperparameters)
    }
}

/// Immutable, order-stable collection of candidates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RegistryFile", into = "RegistryFile")]
pub struct CandidateRegistry {
    candidates: Vec<Candidate>,
}

/// On-disk shape of a registry
#[derive(Serialize, Deserialize)]
struct RegistryFile {
    candidates: Vec<Candidate>,
}

impl TryFrom<RegistryFile> for CandidateRegistry {
    type Error = MathScoreError;

    fn try_from(file: RegistryFile) -> Result<Self> {
        CandidateRegistry::new(file.candidates)
    }
}

impl From<CandidateRegistry> for RegistryFile {
    fn from(registry: CandidateRegistry) -> Self {
        RegistryFile {
            candidates: registry.candidates,
        }
    }
}

impl CandidateRegistry {
    /// Create a registry; names must be unique and the roster non-empty
    pub fn new(candidates: Vec<Candidate>) -> Result<Self> {
        if candidates.is_empty() {
            return Err(MathScoreError::ConfigError(
                "candidate registry is empty".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for candidate in &candidates {
            if candidate.name.trim().is_empty() {
                return Err(MathScoreError::ConfigError(
                    "candidate name must not be empty".to_string(),
                ));
            }
            if !seen.insert(candidate.name.as_str()) {
                return Err(MathScoreError::ConfigError(format!(
                    "duplicate candidate name '{}'",
                    candidate.name
                )));
            }
        }
        Ok(Self { candidates })
    }

    /// The built-in roster, in its declared order
    pub fn default_roster() -> Self {
        let candidates = vec![
            Candidate::new(
                "Random Forest",
                ModelType::RandomForest,
                Hyperparameters::new()
                    .with("n_estimators", 100usize)
                    .with("max_depth", 15usize)
                    .with("min_samples_split", 5usize)
                    .with("min_samples_leaf", 2usize),
            ),
            Candidate::new(
                "Decision Tree",
                ModelType::DecisionTree,
                Hyperparameters::new()
                    .with("max_depth", 10usize)
                    .with("min_samples_split", 5usize)
                    .with("min_samples_leaf", 2usize),
            ),
            Candidate::new(
                "Gradient Boosting",
                ModelType::GradientBoosting,
                Hyperparameters::new()
                    .with("n_estimators", 100usize)
                    .with("learning_rate", 0.1)
                    .with("max_depth", 5usize)
                    .with("min_samples_split", 5usize)
                    .with("min_samples_leaf", 2usize),
            ),
            Candidate::new("Linear Regression", ModelType::LinearRegression, Hyperparameters::new()),
            Candidate::new(
                "K-Neighbors Regressor",
                ModelType::KNeighbors,
                Hyperparameters::new().with("n_neighbors", 5usize),
            ),
            Candidate::new(
                "XGBRegressor",
                ModelType::XGBoost,
                Hyperparameters::new()
                    .with("n_estimators", 100usize)
                    .with("learning_rate", 0.1)
                    .with("max_depth", 5usize),
            ),
            Candidate::new(
                "CatBoosting Regressor",
                ModelType::CatBoost,
                Hyperparameters::new()
                    .with("iterations", 100usize)
                    .with("learning_rate", 0.1)
                    .with("verbose", false),
            ),
            Candidate::new(
                "AdaBoost Regressor",
                ModelType::AdaBoost,
                Hyperparameters::new()
                    .with("n_estimators", 100usize)
                    .with("learning_rate", 0.1),
            ),
        ];
        Self { candidates }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a roster from a JSON file of the form `{"candidates": [...]}`
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            MathScoreError::ConfigError(format!("cannot read registry {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candidate> {
        self.candidates.iter()
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.candidates.iter().map(|c| c.name.as_str()).collect()
    }
}

impl Default for CandidateRegistry {
    fn default() -> Self {
        Self::default_roster()
    }
}

impl<'a> IntoIterator for &'a CandidateRegistry {
    type Item = &'a Candidate;
    type IntoIter = std::slice::Iter<'a, Candidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_roster_order() {
        let registry = CandidateRegistry::default_roster();
        assert_eq!(
            registry.names(),
            vec![
                "Random Forest",
                "Decision Tree",
                "Gradient Boosting",
                "Linear Regression",
                "K-Neighbors Regressor",
                "XGBRegressor",
                "CatBoosting Regressor",
                "AdaBoost Regressor",
            ]
        );
    }

    #[test]
    fn test_default_roster_builds() {
        for candidate in &CandidateRegistry::default_roster() {
            let model = candidate.build().unwrap();
            assert_eq!(model.model_type(), candidate.model_type);
        }
    }

    #[test]
    fn test_same_configuration_same_roster() {
        assert_eq!(CandidateRegistry::default_roster(), CandidateRegistry::default_roster());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = CandidateRegistry::new(vec![
            Candidate::new("A", ModelType::LinearRegression, Hyperparameters::new()),
            Candidate::new("A", ModelType::DecisionTree, Hyperparameters::new()),
        ])
        .unwrap_err();
        assert!(matches!(err, MathScoreError::ConfigError(_)));
    }

    #[test]
    fn test_registry_from_json() {
        let json = r#"{
            "candidates": [
                {"name": "OLS", "model_type": "linear_regression"},
                {"name": "Shallow Tree", "model_type": "decision_tree",
                 "hyperparameters": {"max_depth": 3}}
            ]
        }"#;
        let registry = CandidateRegistry::from_json_str(json).unwrap();
        assert_eq!(registry.names(), vec!["OLS", "Shallow Tree"]);
        assert!(registry.get("OLS").unwrap().hyperparameters.is_empty());

        let reparsed = CandidateRegistry::from_json_str(&registry.to_json_string().unwrap()).unwrap();
        assert_eq!(reparsed, registry);
    }

    #[test]
    fn test_registry_json_duplicate_rejected() {
        let json = r#"{"candidates": [
            {"name": "X", "model_type": "linear_regression"},
            {"name": "X", "model_type": "linear_regression"}
        ]}"#;
        assert!(CandidateRegistry::from_json_str(json).is_err());
    }
}
