//! Inference module
//!
//! Scores students with a persisted artifact:
//! - Field-by-field input validation ([`PredictionRequest`])
//! - Encoding with the fitted, never refitted, feature encoder
//! - Single-record and batch prediction, batches optionally on rayon

mod adapter;
mod config;
mod pipeline;

pub use adapter::{records_to_dataframe, PredictionRequest, StudentRecord};
pub use config::InferenceConfig;
pub use pipeline::PredictPipeline;
