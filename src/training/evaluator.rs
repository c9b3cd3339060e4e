//! Candidate evaluation: fit on the training partition, score R² on the test partition

use super::config::ModelType;
use super::dataset::Dataset;
use super::models::{Model, ModelMetrics, TrainedModel};
use super::registry::{Candidate, CandidateRegistry};
use crate::error::{MathScoreError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Test-set score of one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub name: String,
    pub model_type: ModelType,
    pub r2: f64,
}

/// Candidate name → R², in registry order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    entries: Vec<CandidateScore>,
}

impl EvaluationReport {
    pub fn entries(&self) -> &[CandidateScore] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn score(&self, name: &str) -> Option<f64> {
        self.entries.iter().find(|e| e.name == name).map(|e| e.r2)
    }

    /// Index of the highest score; the earliest entry wins exact ties
    pub fn best_index(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (idx, entry) in self.entries.iter().enumerate() {
            if best.map_or(true, |b| entry.r2 > self.entries[b].r2) {
                best = Some(idx);
            }
        }
        best
    }

    pub fn best(&self) -> Option<&CandidateScore> {
        self.best_index().map(|idx| &self.entries[idx])
    }
}

/// A candidate after fitting, kept so the winner need not be refit
#[derive(Debug, Clone)]
pub struct EvaluatedCandidate {
    pub name: String,
    pub model: TrainedModel,
    pub metrics: ModelMetrics,
}

/// Fits and scores every candidate in a registry
#[derive(Debug, Clone)]
pub struct Evaluator {
    parallel: bool,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self { parallel: true }
    }

    /// Fit candidates on the rayon pool or one after another
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Score every candidate; any failure aborts the pass
    pub fn evaluate(&self, dataset: &Dataset, registry: &CandidateRegistry) -> Result<EvaluationReport> {
        let evaluated = self.evaluate_models(dataset, registry)?;
        Ok(report_from(registry, &evaluated))
    }

    /// Same as [`Evaluator::evaluate`] but keeps the fitted models
    pub fn evaluate_models(
        &self,
        dataset: &Dataset,
        registry: &CandidateRegistry,
    ) -> Result<Vec<EvaluatedCandidate>> {
        dataset.validate()?;
        info!(
            candidates = registry.len(),
            train_rows = dataset.n_train(),
            test_rows = dataset.n_test(),
            features = dataset.n_features(),
            parallel = self.parallel,
            "Evaluating candidates"
        );

        if self.parallel {
            // Results are collected in registry order, so the first failure
            // reported is the first failing candidate in that order
            let results: Vec<Result<EvaluatedCandidate>> = registry
                .candidates()
                .par_iter()
                .map(|candidate| evaluate_candidate(candidate, dataset))
                .collect();
            results.into_iter().collect()
        } else {
            registry
                .iter()
                .map(|candidate| evaluate_candidate(candidate, dataset))
                .collect()
        }
    }
}

pub(crate) fn report_from(registry: &CandidateRegistry, evaluated: &[EvaluatedCandidate]) -> EvaluationReport {
    let entries = registry
        .iter()
        .zip(evaluated.iter())
        .map(|(candidate, result)| CandidateScore {
            name: candidate.name.clone(),
            model_type: candidate.model_type,
            r2: result.metrics.r2,
        })
        .collect();
    EvaluationReport { entries }
}

fn evaluate_candidate(candidate: &Candidate, dataset: &Dataset) -> Result<EvaluatedCandidate> {
    let wrap = |err| MathScoreError::candidate(candidate.name.clone(), err);

    let mut model = candidate.build().map_err(wrap)?;

    let start = Instant::now();
    model.fit(&dataset.x_train, &dataset.y_train).map_err(wrap)?;
    let fit_secs = start.elapsed().as_secs_f64();

    let predictions = model.predict(&dataset.x_test).map_err(wrap)?;
    if let Some(bad) = predictions.iter().position(|p| !p.is_finite()) {
        return Err(wrap(MathScoreError::ComputationError(format!(
            "non-finite prediction {} for test row {}",
            predictions[bad], bad
        ))));
    }

    let metrics = ModelMetrics::compute_regression(&dataset.y_test, &predictions).with_training_time(fit_secs);
    info!(
        candidate = %candidate.name,
        model_type = %candidate.model_type,
        r2 = metrics.r2,
        fit_secs,
        "Candidate evaluated"
    );
    debug!(candidate = %candidate.name, mse = metrics.mse, mae = metrics.mae, "Candidate error metrics");

    Ok(EvaluatedCandidate {
        name: candidate.name.clone(),
        model,
        metrics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::config::Hyperparameters;
    use ndarray::{Array1, Array2};

    fn linear_dataset() -> Dataset {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| ((i * (j + 1)) % 13) as f64);
        let y: Array1<f64> = x.rows().into_iter().map(|r| 2.0 * r[0] - r[1]).collect();
        let x_test = x.slice(ndarray::s![30.., ..]).to_owned();
        let y_test = y.slice(ndarray::s![30..]).to_owned();
        let x_train = x.slice(ndarray::s![..30, ..]).to_owned();
        let y_train = y.slice(ndarray::s![..30]).to_owned();
        Dataset::new(x_train, y_train, x_test, y_test).unwrap()
    }

    fn small_registry() -> CandidateRegistry {
        CandidateRegistry::new(vec![
            Candidate::new("Tree", ModelType::DecisionTree, Hyperparameters::new().with("max_depth", 4usize)),
            Candidate::new("OLS", ModelType::LinearRegression, Hyperparameters::new()),
            Candidate::new("KNN", ModelType::KNeighbors, Hyperparameters::new().with("n_neighbors", 3usize)),
        ])
        .unwrap()
    }

    #[test]
    fn test_report_has_one_entry_per_candidate_in_order() {
        let report = Evaluator::new().evaluate(&linear_dataset(), &small_registry()).unwrap();
        let names: Vec<&str> = report.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Tree", "OLS", "KNN"]);
        assert!(report.entries().iter().all(|e| e.r2.is_finite()));
        assert!(report.score("OLS").unwrap() > 0.999);
    }

    #[test]
    fn test_parallel_and_sequential_agree() {
        let dataset = linear_dataset();
        let registry = small_registry();
        let par = Evaluator::new().with_parallel(true).evaluate(&dataset, &registry).unwrap();
        let seq = Evaluator::new().with_parallel(false).evaluate(&dataset, &registry).unwrap();
        assert_eq!(par, seq);
    }

    #[test]
    fn test_invalid_candidate_aborts_with_its_name() {
        let registry = CandidateRegistry::new(vec![
            Candidate::new("OLS", ModelType::LinearRegression, Hyperparameters::new()),
            Candidate::new("Broken KNN", ModelType::KNeighbors, Hyperparameters::new().with("n_neighbors", 0usize)),
        ])
        .unwrap();

        let err = Evaluator::new().evaluate(&linear_dataset(), &registry).unwrap_err();
        match err {
            MathScoreError::CandidateFitFailure { candidate, .. } => assert_eq!(candidate, "Broken KNN"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_best_prefers_first_on_ties() {
        let report = EvaluationReport {
            entries: vec![
                CandidateScore { name: "a".into(), model_type: ModelType::LinearRegression, r2: 0.5 },
                CandidateScore { name: "b".into(), model_type: ModelType::LinearRegression, r2: 0.9 },
                CandidateScore { name: "c".into(), model_type: ModelType::LinearRegression, r2: 0.9 },
            ],
        };
        assert_eq!(report.best().unwrap().name, "b");
    }
}
