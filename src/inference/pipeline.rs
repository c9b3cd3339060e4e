//! Prediction pipeline over a persisted artifact
//!
//! The artifact is read once; afterwards the pipeline is immutable and can be
//! shared between threads behind an `Arc`.

use super::adapter::{records_to_dataframe, PredictionRequest, StudentRecord};
use super::config::InferenceConfig;
use crate::error::{MathScoreError, Result};
use crate::export::{ArtifactMetadata, ModelArtifact};
use crate::preprocessing::FeatureEncoder;
use crate::training::{Model, TrainedModel};
use ndarray::{concatenate, Array1, Array2, Axis};
use polars::prelude::*;
use rayon::prelude::*;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Loaded encoder and model, ready to score students
#[derive(Debug, Clone)]
pub struct PredictPipeline {
    config: InferenceConfig,
    metadata: ArtifactMetadata,
    encoder: FeatureEncoder,
    model: TrainedModel,
}

impl PredictPipeline {
    /// Load the artifact at `path`; a missing file is `ArtifactNotFound`
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let artifact = ModelArtifact::load(path)?;
        info!(
            path = %path.display(),
            candidate = %artifact.metadata.candidate_name,
            r2 = artifact.metadata.r2,
            "Prediction pipeline ready"
        );
        Ok(Self::from_artifact(artifact))
    }

    pub fn from_artifact(artifact: ModelArtifact) -> Self {
        Self {
            config: InferenceConfig::default(),
            metadata: artifact.metadata,
            encoder: artifact.preprocessor,
            model: artifact.model,
        }
    }

    pub fn with_config(mut self, config: InferenceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn metadata(&self) -> &ArtifactMetadata {
        &self.metadata
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    /// Predict one math score per row of raw student attributes
    pub fn predict(&self, df: &DataFrame) -> Result<Array1<f64>> {
        self.config.validate()?;
        let start = Instant::now();
        let x = self.encoder.transform(df)?;

        let predictions = if self.should_use_parallel(x.nrows()) {
            self.predict_parallel(&x)?
        } else {
            self.model.predict(&x)?
        };

        debug!(
            rows = predictions.len(),
            latency_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Predicted"
        );
        Ok(predictions)
    }

    /// Predict the math score of a single validated record
    pub fn predict_record(&self, record: &StudentRecord) -> Result<f64> {
        let predictions = self.predict(&record.to_dataframe()?)?;
        predictions
            .first()
            .copied()
            .ok_or_else(|| MathScoreError::ComputationError("model returned no prediction".to_string()))
    }

    /// Validate raw fields, then predict; input errors surface before the model runs
    pub fn predict_request(&self, request: PredictionRequest) -> Result<f64> {
        let record = request.into_record()?;
        self.predict_record(&record)
    }

    pub fn predict_records(&self, records: &[StudentRecord]) -> Result<Array1<f64>> {
        self.predict(&records_to_dataframe(records)?)
    }

    fn should_use_parallel(&self, n_rows: usize) -> bool {
        self.config.parallel && rayon::current_num_threads() > 1 && n_rows > self.config.batch_size * 2
    }

    fn predict_parallel(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let batches: Vec<Array1<f64>> = x
            .axis_chunks_iter(Axis(0), self.config.batch_size)
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|batch| self.model.predict(&batch.to_owned()))
            .collect::<Result<Vec<_>>>()?;

        let views: Vec<_> = batches.iter().map(|b| b.view()).collect();
        Ok(concatenate(Axis(0), &views)?)
    }
}
