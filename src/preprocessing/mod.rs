//! Data preprocessing module
//!
//! Turns raw student records into the numeric matrix every regressor consumes:
//! - Missing value imputation (median for scores, most frequent for categories)
//! - Standard scaling of numeric columns
//! - One-hot encoding of categorical columns, scaled without centering

mod config;
mod encoder;
mod scaler;

pub use config::{
    FeatureSchema, GENDER, LUNCH, MATH_SCORE, PARENTAL_EDUCATION, RACE_ETHNICITY, READING_SCORE,
    TEST_PREPARATION, WRITING_SCORE,
};
pub use encoder::{CategoricalEncoding, FeatureEncoder, NumericEncoding};
pub use scaler::ColumnScaler;
