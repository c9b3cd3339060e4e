//! Inference configuration

use crate::error::{MathScoreError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for batch prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Rows handed to the model at a time
    pub batch_size: usize,

    /// Predict batches on the rayon pool when there are enough rows
    pub parallel: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            parallel: true,
        }
    }
}

impl InferenceConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(MathScoreError::ConfigError("batch_size must be at least 1".to_string()));
        }
        Ok(())
    }
}
