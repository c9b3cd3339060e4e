//! mathscore - Student math-score prediction
//!
//! Trains a fixed roster of regression models on student performance data,
//! keeps the one with the best held-out R² (if it clears an acceptance
//! threshold) and serves predictions from the persisted result.
//!
//! # Modules
//!
//! - [`preprocessing`] - Imputation, scaling and one-hot encoding of student records
//! - [`training`] - Regressors, candidate registry, evaluator and trainer
//! - [`inference`] - Input validation and the prediction pipeline
//! - [`export`] - The persisted model artifact
//! - [`utils`] - CSV loading and train/test splitting
//! - [`cli`] - Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use mathscore::prelude::*;
//!
//! # fn main() -> mathscore::Result<()> {
//! let (dataset, encoder) = load_dataset("data/stud.csv", &FeatureSchema::default(), &SplitConfig::default())?;
//! let trainer = ModelTrainer::with_default_roster(TrainerConfig::default());
//! let outcome = trainer.train(&dataset, &encoder)?;
//! println!("{} scored R² = {:.3}", outcome.best_name, outcome.best_score);
//!
//! let pipeline = PredictPipeline::load(&outcome.artifact_path)?;
//! let request = PredictionRequest::new()
//!     .with_gender("female")
//!     .with_race_ethnicity("group B")
//!     .with_parental_level_of_education("bachelor's degree")
//!     .with_lunch("standard")
//!     .with_test_preparation_course("none")
//!     .with_reading_score("72")
//!     .with_writing_score("74");
//! println!("predicted math score: {:.1}", pipeline.predict_request(request)?);
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

// Core ML modules
pub mod preprocessing;
pub mod training;
pub mod inference;

// Persistence and utilities
pub mod export;
pub mod utils;

// Services
pub mod cli;

pub use error::{MathScoreError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{MathScoreError, Result};

    // Preprocessing
    pub use crate::preprocessing::{FeatureEncoder, FeatureSchema};

    // Training
    pub use crate::training::{
        Candidate, CandidateRegistry, Dataset, EvaluationReport, Evaluator, Hyperparameters, Model,
        ModelTrainer, ModelType, TrainedModel, TrainerConfig, TrainingOutcome,
    };

    // Inference
    pub use crate::inference::{PredictPipeline, PredictionRequest, StudentRecord};

    // Persistence
    pub use crate::export::ModelArtifact;

    // Data loading
    pub use crate::utils::{load_dataset, prepare_dataset, train_test_split, DataLoader, SplitConfig};
}
