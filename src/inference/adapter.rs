//! Input adapter: raw form fields to a typed student record

use crate::error::{MathScoreError, Result};
use crate::preprocessing::{
    GENDER, LUNCH, PARENTAL_EDUCATION, RACE_ETHNICITY, READING_SCORE, TEST_PREPARATION, WRITING_SCORE,
};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Unvalidated prediction input, one optional text value per field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub gender: Option<String>,
    pub race_ethnicity: Option<String>,
    pub parental_level_of_education: Option<String>,
    pub lunch: Option<String>,
    pub test_preparation_course: Option<String>,
    pub reading_score: Option<String>,
    pub writing_score: Option<String>,
}

impl PredictionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gender(mut self, value: impl Into<String>) -> Self {
        self.gender = Some(value.into());
        self
    }

    pub fn with_race_ethnicity(mut self, value: impl Into<String>) -> Self {
        self.race_ethnicity = Some(value.into());
        self
    }

    pub fn with_parental_level_of_education(mut self, value: impl Into<String>) -> Self {
        self.parental_level_of_education = Some(value.into());
        self
    }

    pub fn with_lunch(mut self, value: impl Into<String>) -> Self {
        self.lunch = Some(value.into());
        self
    }

    pub fn with_test_preparation_course(mut self, value: impl Into<String>) -> Self {
        self.test_preparation_course = Some(value.into());
        self
    }

    pub fn with_reading_score(mut self, value: impl Into<String>) -> Self {
        self.reading_score = Some(value.into());
        self
    }

    pub fn with_writing_score(mut self, value: impl Into<String>) -> Self {
        self.writing_score = Some(value.into());
        self
    }

    /// Validate every field and build a record.
    ///
    /// Fields are checked in declaration order and the first failure is
    /// reported.
    pub fn into_record(self) -> Result<StudentRecord> {
        Ok(StudentRecord {
            gender: required_text(GENDER, self.gender)?,
            race_ethnicity: required_text(RACE_ETHNICITY, self.race_ethnicity)?,
            parental_level_of_education: required_text(PARENTAL_EDUCATION, self.parental_level_of_education)?,
            lunch: required_text(LUNCH, self.lunch)?,
            test_preparation_course: required_text(TEST_PREPARATION, self.test_preparation_course)?,
            reading_score: required_score(READING_SCORE, self.reading_score)?,
            writing_score: required_score(WRITING_SCORE, self.writing_score)?,
        })
    }
}

/// A validated student, ready for encoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub gender: String,
    pub race_ethnicity: String,
    pub parental_level_of_education: String,
    pub lunch: String,
    pub test_preparation_course: String,
    pub reading_score: f64,
    pub writing_score: f64,
}

impl StudentRecord {
    /// Single-row frame with the raw column names the encoder expects
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        records_to_dataframe(std::slice::from_ref(self))
    }
}

/// Frame with one row per record
pub fn records_to_dataframe(records: &[StudentRecord]) -> Result<DataFrame> {
    fn text<'a>(name: &str, values: impl Iterator<Item = &'a str>) -> Column {
        Series::new(name.into(), values.collect::<Vec<&str>>()).into()
    }
    fn number(name: &str, values: impl Iterator<Item = f64>) -> Column {
        Series::new(name.into(), values.collect::<Vec<f64>>()).into()
    }

    let columns = vec![
        text(GENDER, records.iter().map(|r| r.gender.as_str())),
        text(RACE_ETHNICITY, records.iter().map(|r| r.race_ethnicity.as_str())),
        text(PARENTAL_EDUCATION, records.iter().map(|r| r.parental_level_of_education.as_str())),
        text(LUNCH, records.iter().map(|r| r.lunch.as_str())),
        text(TEST_PREPARATION, records.iter().map(|r| r.test_preparation_course.as_str())),
        number(READING_SCORE, records.iter().map(|r| r.reading_score)),
        number(WRITING_SCORE, records.iter().map(|r| r.writing_score)),
    ];
    Ok(DataFrame::new(columns)?)
}

fn required_text(field: &str, value: Option<String>) -> Result<String> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(MathScoreError::InvalidInput {
            field: field.to_string(),
            reason: "value is required".to_string(),
        }),
    }
}

fn required_score(field: &str, value: Option<String>) -> Result<f64> {
    let text = required_text(field, value)?;
    match text.parse::<f64>() {
        Ok(score) if score.is_finite() => Ok(score),
        Ok(_) => Err(MathScoreError::InvalidInput {
            field: field.to_string(),
            reason: format!("expected a finite number, got '{}'", text),
        }),
        Err(_) => Err(MathScoreError::InvalidInput {
            field: field.to_string(),
            reason: format!("expected a number, got '{}'", text),
        }),
    }
}
