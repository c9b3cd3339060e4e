//! Preprocessing configuration

use crate::error::{MathScoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const GENDER: &str = "gender";
pub const RACE_ETHNICITY: &str = "race_ethnicity";
pub const PARENTAL_EDUCATION: &str = "parental_level_of_education";
pub const LUNCH: &str = "lunch";
pub const TEST_PREPARATION: &str = "test_preparation_course";
pub const READING_SCORE: &str = "reading_score";
pub const WRITING_SCORE: &str = "writing_score";
pub const MATH_SCORE: &str = "math_score";

/// Which input columns are numeric and which are categorical
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    /// Imputed with the median, then standardized
    pub numeric_columns: Vec<String>,
    /// Imputed with the most frequent value, then one-hot encoded and scaled
    pub categorical_columns: Vec<String>,
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self {
            numeric_columns: vec![READING_SCORE.to_string(), WRITING_SCORE.to_string()],
            categorical_columns: vec![
                GENDER.to_string(),
                RACE_ETHNICITY.to_string(),
                PARENTAL_EDUCATION.to_string(),
                LUNCH.to_string(),
                TEST_PREPARATION.to_string(),
            ],
        }
    }
}

impl FeatureSchema {
    pub fn new() -> Self {
        Self {
            numeric_columns: Vec::new(),
            categorical_columns: Vec::new(),
        }
    }

    /// Set numeric columns
    pub fn with_numeric<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.numeric_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Set categorical columns
    pub fn with_categorical<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.categorical_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Numeric columns first, then categorical, each in declared order
    pub fn input_columns(&self) -> impl Iterator<Item = &str> {
        self.numeric_columns
            .iter()
            .chain(self.categorical_columns.iter())
            .map(String::as_str)
    }

    pub fn validate(&self) -> Result<()> {
        if self.numeric_columns.is_empty() && self.categorical_columns.is_empty() {
            return Err(MathScoreError::ConfigError("feature schema has no columns".to_string()));
        }
        let mut seen = HashSet::new();
        for column in self.input_columns() {
            if !seen.insert(column) {
                return Err(MathScoreError::ConfigError(format!(
                    "column '{}' listed more than once in the feature schema",
                    column
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schema() {
        let schema = FeatureSchema::default();
        let columns: Vec<&str> = schema.input_columns().collect();
        assert_eq!(columns.len(), 7);
        assert_eq!(columns[0], READING_SCORE);
        assert_eq!(columns[2], GENDER);
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let schema = FeatureSchema::new().with_numeric(["x"]).with_categorical(["x"]);
        assert!(schema.validate().is_err());
        assert!(FeatureSchema::new().validate().is_err());
    }
}
