//! Model selection: evaluate the roster, gate the winner, persist it

use super::config::{ModelType, TrainerConfig};
use super::dataset::Dataset;
use super::evaluator::{report_from, EvaluationReport, Evaluator};
use super::models::ModelMetrics;
use super::registry::CandidateRegistry;
use crate::error::{MathScoreError, Result};
use crate::export::{ArtifactMetadata, ModelArtifact};
use crate::preprocessing::FeatureEncoder;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

/// Result of a successful training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingOutcome {
    pub best_name: String,
    pub best_score: f64,
    pub model_type: ModelType,
    pub metrics: ModelMetrics,
    pub report: EvaluationReport,
    pub artifact_path: PathBuf,
}

/// Runs the full selection pass over a candidate registry
#[derive(Debug, Clone)]
pub struct ModelTrainer {
    config: TrainerConfig,
    registry: CandidateRegistry,
}

impl ModelTrainer {
    pub fn new(config: TrainerConfig, registry: CandidateRegistry) -> Self {
        Self { config, registry }
    }

    pub fn with_default_roster(config: TrainerConfig) -> Self {
        Self::new(config, CandidateRegistry::default_roster())
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn registry(&self) -> &CandidateRegistry {
        &self.registry
    }

    /// Evaluate every candidate and persist the best one with `encoder`.
    ///
    /// Nothing is written unless the best test R² reaches the acceptance
    /// threshold; an existing artifact is left untouched in that case.
    pub fn train(&self, dataset: &Dataset, encoder: &FeatureEncoder) -> Result<TrainingOutcome> {
        self.config.validate()?;
        if !encoder.is_fitted() {
            return Err(MathScoreError::PreprocessingError(
                "feature encoder must be fitted before training".to_string(),
            ));
        }
        if encoder.n_output_features() != dataset.n_features() {
            return Err(MathScoreError::ShapeError {
                expected: format!("{} encoded features", encoder.n_output_features()),
                actual: format!("{} dataset features", dataset.n_features()),
            });
        }

        let evaluated = Evaluator::new()
            .with_parallel(self.config.parallel)
            .evaluate_models(dataset, &self.registry)?;
        let report = report_from(&self.registry, &evaluated);

        let best_idx = report
            .best_index()
            .ok_or_else(|| MathScoreError::TrainingError("no candidates were evaluated".to_string()))?;
        let best = report.entries()[best_idx].clone();

        let tied: Vec<&str> = report
            .entries()
            .iter()
            .skip(best_idx + 1)
            .filter(|e| e.r2 == best.r2)
            .map(|e| e.name.as_str())
            .collect();
        if !tied.is_empty() {
            warn!(winner = %best.name, ?tied, r2 = best.r2, "Tied best score; keeping the earliest candidate");
        }

        let threshold = self.config.acceptance_threshold;
        if best.r2 < threshold {
            warn!(
                best_candidate = %best.name,
                r2 = best.r2,
                threshold,
                "No candidate reached the acceptance threshold; artifact not written"
            );
            return Err(MathScoreError::NoAcceptableModel {
                best_candidate: best.name.clone(),
                best_score: best.r2,
                threshold,
            });
        }

        let winner = evaluated
            .into_iter()
            .nth(best_idx)
            .ok_or_else(|| MathScoreError::TrainingError("winning candidate missing".to_string()))?;

        let metadata = ArtifactMetadata {
            candidate_name: winner.name.clone(),
            model_type: best.model_type,
            r2: best.r2,
            metrics: winner.metrics.clone(),
            trained_at: Utc::now(),
            feature_names: encoder.output_names(),
        };
        ModelArtifact::new(metadata, encoder.clone(), winner.model).save(&self.config.artifact_path)?;

        info!(
            winner = %winner.name,
            r2 = best.r2,
            rmse = winner.metrics.rmse,
            mae = winner.metrics.mae,
            artifact = %self.config.artifact_path.display(),
            "Training complete"
        );

        Ok(TrainingOutcome {
            best_name: winner.name,
            best_score: best.r2,
            model_type: best.model_type,
            metrics: winner.metrics,
            report,
            artifact_path: self.config.artifact_path.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::FeatureSchema;
    use crate::training::config::Hyperparameters;
    use crate::training::registry::Candidate;
    use ndarray::{Array1, Array2};
    use polars::prelude::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn encoder_for(width: usize) -> FeatureEncoder {
        let names: Vec<String> = (0..width).map(|i| format!("f{}", i)).collect();
        let columns: Vec<Column> = names
            .iter()
            .map(|n| Column::new(n.as_str().into(), &[0.0, 1.0, 2.0]))
            .collect();
        let frame = DataFrame::new(columns).unwrap();
        let mut encoder = FeatureEncoder::new(FeatureSchema::new().with_numeric(names));
        encoder.fit(&frame).unwrap();
        encoder
    }

    fn dataset(noise_only: bool) -> Dataset {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let x = Array2::from_shape_fn((120, 2), |_| rng.gen_range(-1.0..1.0));
        let y: Array1<f64> = x
            .rows()
            .into_iter()
            .map(|r| {
                if noise_only {
                    rng.gen_range(-1.0..1.0)
                } else {
                    3.0 * r[0] - 2.0 * r[1] + 0.01 * rng.gen_range(-1.0..1.0)
                }
            })
            .collect();
        Dataset::new(
            x.slice(ndarray::s![..90, ..]).to_owned(),
            y.slice(ndarray::s![..90]).to_owned(),
            x.slice(ndarray::s![90.., ..]).to_owned(),
            y.slice(ndarray::s![90..]).to_owned(),
        )
        .unwrap()
    }

    fn registry() -> CandidateRegistry {
        CandidateRegistry::new(vec![
            Candidate::new("Shallow Tree", ModelType::DecisionTree, Hyperparameters::new().with("max_depth", 2usize)),
            Candidate::new("First OLS", ModelType::LinearRegression, Hyperparameters::new()),
            Candidate::new("Second OLS", ModelType::LinearRegression, Hyperparameters::new()),
        ])
        .unwrap()
    }

    #[test]
    fn test_winner_persisted_and_ties_keep_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        let trainer = ModelTrainer::new(TrainerConfig::new(&path), registry());

        let outcome = trainer.train(&dataset(false), &encoder_for(2)).unwrap();
        assert_eq!(outcome.best_name, "First OLS");
        assert!(outcome.best_score > 0.99);
        assert_eq!(outcome.report.len(), 3);
        assert_eq!(outcome.report.score("First OLS"), outcome.report.score("Second OLS"));

        let artifact = ModelArtifact::load(&path).unwrap();
        assert_eq!(artifact.metadata.candidate_name, "First OLS");
        assert_eq!(artifact.metadata.model_type, ModelType::LinearRegression);
    }

    #[test]
    fn test_gate_rejects_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        let trainer = ModelTrainer::new(TrainerConfig::new(&path), registry());

        let err = trainer.train(&dataset(true), &encoder_for(2)).unwrap_err();
        match err {
            MathScoreError::NoAcceptableModel { best_score, threshold, .. } => {
                assert!(best_score < threshold);
                assert_eq!(threshold, 0.6);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_failed_run_keeps_previous_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        let trainer = ModelTrainer::new(TrainerConfig::new(&path), registry());

        trainer.train(&dataset(false), &encoder_for(2)).unwrap();
        let before = std::fs::read(&path).unwrap();

        assert!(trainer.train(&dataset(true), &encoder_for(2)).is_err());
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_threshold_is_configurable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        let config = TrainerConfig::new(&path).with_acceptance_threshold(-1e9);
        let trainer = ModelTrainer::new(config, registry());

        assert!(trainer.train(&dataset(true), &encoder_for(2)).is_ok());
        assert!(path.exists());
    }

    #[test]
    fn test_encoder_width_must_match() {
        let dir = tempfile::tempdir().unwrap();
        let trainer = ModelTrainer::new(TrainerConfig::new(dir.path().join("m.bin")), registry());
        let err = trainer.train(&dataset(false), &encoder_for(3)).unwrap_err();
        assert!(matches!(err, MathScoreError::ShapeError { .. }));
    }
}
