//! Feature encoder: imputation, scaling and one-hot encoding of student records
//!
//! Numeric columns are imputed with the training median and standardized.
//! Categorical columns are imputed with the most frequent training value,
//! one-hot encoded over the categories seen while fitting, and each
//! indicator is divided by its standard deviation without centering.
//!
//! Output layout is fixed: numeric columns first in schema order, then the
//! indicators of each categorical column with categories sorted.

use super::config::FeatureSchema;
use super::scaler::ColumnScaler;
use crate::error::{MathScoreError, Result};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Fitted state of one numeric column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericEncoding {
    pub column: String,
    pub median: f64,
    pub scaler: ColumnScaler,
}

/// Fitted state of one categorical column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalEncoding {
    pub column: String,
    pub most_frequent: String,
    /// Sorted, unique
    pub categories: Vec<String>,
    /// One per category
    pub scalers: Vec<ColumnScaler>,
}

impl CategoricalEncoding {
    fn position(&self, value: &str) -> Option<usize> {
        self.categories
            .binary_search_by(|c| c.as_str().cmp(value))
            .ok()
    }
}

/// Turns a frame of raw student attributes into a numeric feature matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEncoder {
    schema: FeatureSchema,
    numeric: Vec<NumericEncoding>,
    categorical: Vec<CategoricalEncoding>,
    is_fitted: bool,
}

impl Default for FeatureEncoder {
    fn default() -> Self {
        Self::new(FeatureSchema::default())
    }
}

impl FeatureEncoder {
    pub fn new(schema: FeatureSchema) -> Self {
        Self {
            schema,
            numeric: Vec::new(),
            categorical: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn numeric_encodings(&self) -> &[NumericEncoding] {
        &self.numeric
    }

    pub fn categorical_encodings(&self) -> &[CategoricalEncoding] {
        &self.categorical
    }

    /// Learn medians, modes, categories and scales from training rows
    pub fn fit(&mut self, df: &DataFrame) -> Result<()> {
        self.schema.validate()?;
        if df.height() == 0 {
            return Err(MathScoreError::DataError(
                "cannot fit the feature encoder on an empty frame".to_string(),
            ));
        }

        let mut numeric = Vec::with_capacity(self.schema.numeric_columns.len());
        for name in &self.schema.numeric_columns {
            let values = numeric_values(df, name, |row, raw| {
                MathScoreError::DataError(format!(
                    "column '{}' row {}: '{}' is not a number",
                    name, row, raw
                ))
            })?;
            let observed: Vec<f64> = values.iter().flatten().copied().collect();
            let median = median(&observed).ok_or_else(|| {
                MathScoreError::PreprocessingError(format!("column '{}' has no observed values", name))
            })?;
            let imputed: Vec<f64> = values.iter().map(|v| v.unwrap_or(median)).collect();
            let scaler = ColumnScaler::fit_standard(&imputed, true);
            debug!(column = %name, median, mean = scaler.center, std = scaler.scale, "Fitted numeric column");
            numeric.push(NumericEncoding {
                column: name.clone(),
                median,
                scaler,
            });
        }

        let mut categorical = Vec::with_capacity(self.schema.categorical_columns.len());
        for name in &self.schema.categorical_columns {
            let values = categorical_values(df, name)?;
            let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
            for value in values.iter().flatten() {
                *counts.entry(value.as_str()).or_insert(0) += 1;
            }
            let most_frequent = most_frequent(&counts).ok_or_else(|| {
                MathScoreError::PreprocessingError(format!("column '{}' has no observed values", name))
            })?;

            // Missing cells count toward the mode they are imputed with
            let missing = values.iter().filter(|v| v.is_none()).count();
            if let Some(count) = counts.get_mut(most_frequent.as_str()) {
                *count += missing;
            }

            let n = values.len() as f64;
            let categories: Vec<String> = counts.keys().map(|c| c.to_string()).collect();
            let scalers = counts
                .values()
                .map(|&count| indicator_scaler(count as f64 / n))
                .collect();
            debug!(column = %name, categories = categories.len(), mode = %most_frequent, "Fitted categorical column");
            categorical.push(CategoricalEncoding {
                column: name.clone(),
                most_frequent,
                categories,
                scalers,
            });
        }

        self.numeric = numeric;
        self.categorical = categorical;
        self.is_fitted = true;
        Ok(())
    }

    /// Encode rows using the fitted state; unseen categories are rejected
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(MathScoreError::ModelNotFitted);
        }

        let n_rows = df.height();
        let mut out = Array2::zeros((n_rows, self.n_output_features()));
        let mut offset = 0;

        for encoding in &self.numeric {
            let values = numeric_values(df, &encoding.column, |row, raw| MathScoreError::InvalidInput {
                field: encoding.column.clone(),
                reason: format!("'{}' in row {} is not a number", raw, row),
            })?;
            for (row, value) in values.into_iter().enumerate() {
                out[[row, offset]] = encoding.scaler.apply(value.unwrap_or(encoding.median));
            }
            offset += 1;
        }

        for encoding in &self.categorical {
            let values = categorical_values(df, &encoding.column)?;
            for (row, value) in values.iter().enumerate() {
                let value = value.as_deref().unwrap_or(encoding.most_frequent.as_str());
                let pos = encoding
                    .position(value)
                    .ok_or_else(|| MathScoreError::FeatureEncodingError {
                        column: encoding.column.clone(),
                        value: value.to_string(),
                    })?;
                out[[row, offset + pos]] = encoding.scalers[pos].apply(1.0);
            }
            offset += encoding.categories.len();
        }

        Ok(out)
    }

    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<Array2<f64>> {
        self.fit(df)?;
        self.transform(df)
    }

    /// Width of the encoded matrix; zero before fitting
    pub fn n_output_features(&self) -> usize {
        self.numeric.len() + self.categorical.iter().map(|c| c.categories.len()).sum::<usize>()
    }

    /// Names of the encoded columns, e.g. `reading_score` or `lunch_standard`
    pub fn output_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.numeric.iter().map(|n| n.column.clone()).collect();
        for encoding in &self.categorical {
            names.extend(
                encoding
                    .categories
                    .iter()
                    .map(|c| format!("{}_{}", encoding.column, c)),
            );
        }
        names
    }
}

fn column_series<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map(|column| column.as_materialized_series())
        .map_err(|_| MathScoreError::FeatureNotFound(name.to_string()))
}

/// Numeric cells as `f64`; nulls and non-finite values are missing.
///
/// A cell that was present but does not parse as a number is reported through
/// `on_invalid` with its row and raw text instead of being treated as missing.
fn numeric_values<F>(df: &DataFrame, name: &str, on_invalid: F) -> Result<Vec<Option<f64>>>
where
    F: Fn(usize, String) -> MathScoreError,
{
    let raw = column_series(df, name)?;
    let series = raw.cast(&DataType::Float64)?;
    let ca = series.f64()?;
    let was_null = raw.is_null();

    let mut values = Vec::with_capacity(ca.len());
    for (row, (value, null_before)) in ca.into_iter().zip(&was_null).enumerate() {
        if value.is_none() && null_before == Some(false) {
            let text = raw.get(row).map(|v| v.to_string()).unwrap_or_default();
            return Err(on_invalid(row, text.trim_matches('"').to_string()));
        }
        values.push(value.filter(|x| x.is_finite()));
    }
    Ok(values)
}

/// Categorical cells as strings; nulls and blank strings are missing
fn categorical_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = column_series(df, name)?.cast(&DataType::String)?;
    let ca = series.str()?;
    Ok(ca
        .into_iter()
        .map(|v| v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string))
        .collect())
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Highest count wins; the alphabetically first category breaks ties
fn most_frequent(counts: &BTreeMap<&str, usize>) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;
    for (&value, &count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value.to_string())
}

/// Scale of a 0/1 indicator that is set with frequency `p`
fn indicator_scaler(p: f64) -> ColumnScaler {
    let std = (p * (1.0 - p)).sqrt();
    ColumnScaler {
        center: 0.0,
        scale: if std > 0.0 { std } else { 1.0 },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn training_frame() -> DataFrame {
        df!(
            "reading_score" => [Some(70.0), Some(80.0), None, Some(90.0)],
            "lunch" => [Some("standard"), Some("free/reduced"), Some("standard"), None]
        )
        .unwrap()
    }

    fn schema() -> FeatureSchema {
        FeatureSchema::new()
            .with_numeric(["reading_score"])
            .with_categorical(["lunch"])
    }

    #[test]
    fn test_fit_learns_median_mode_and_categories() {
        let mut encoder = FeatureEncoder::new(schema());
        encoder.fit(&training_frame()).unwrap();

        assert_eq!(encoder.numeric_encodings()[0].median, 80.0);
        let lunch = &encoder.categorical_encodings()[0];
        assert_eq!(lunch.most_frequent, "standard");
        assert_eq!(lunch.categories, vec!["free/reduced", "standard"]);
        assert_eq!(encoder.n_output_features(), 3);
        assert_eq!(
            encoder.output_names(),
            vec!["reading_score", "lunch_free/reduced", "lunch_standard"]
        );
    }

    #[test]
    fn test_transform_layout_and_scaling() {
        let mut encoder = FeatureEncoder::new(schema());
        let x = encoder.fit_transform(&training_frame()).unwrap();
        assert_eq!(x.dim(), (4, 3));

        // Imputed numeric column is centered
        let mean = x.column(0).sum() / 4.0;
        assert!(mean.abs() < 1e-12);

        // Exactly one indicator per row, never centered
        for row in x.rows() {
            let set = row.iter().skip(1).filter(|v| **v != 0.0).count();
            assert_eq!(set, 1);
            assert!(row.iter().skip(1).all(|v| *v >= 0.0));
        }
        // Row 3 had a missing lunch, imputed with "standard"
        assert!(x[[3, 2]] > 0.0);
        assert_eq!(x[[3, 1]], 0.0);
    }

    #[test]
    fn test_unseen_category_rejected() {
        let mut encoder = FeatureEncoder::new(schema());
        encoder.fit(&training_frame()).unwrap();

        let row = df!("reading_score" => [75.0], "lunch" => ["deluxe"]).unwrap();
        match encoder.transform(&row).unwrap_err() {
            MathScoreError::FeatureEncodingError { column, value } => {
                assert_eq!(column, "lunch");
                assert_eq!(value, "deluxe");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_column_rejected() {
        let mut encoder = FeatureEncoder::new(schema());
        encoder.fit(&training_frame()).unwrap();

        let row = df!("reading_score" => [75.0]).unwrap();
        assert!(matches!(
            encoder.transform(&row).unwrap_err(),
            MathScoreError::FeatureNotFound(_)
        ));
    }

    #[test]
    fn test_transform_before_fit() {
        let encoder = FeatureEncoder::new(schema());
        assert!(matches!(
            encoder.transform(&training_frame()).unwrap_err(),
            MathScoreError::ModelNotFitted
        ));
    }

    #[test]
    fn test_integer_columns_are_cast() {
        let df = df!("reading_score" => [60i64, 70, 80], "lunch" => ["a", "b", "a"]).unwrap();
        let mut encoder = FeatureEncoder::new(schema());
        let x = encoder.fit_transform(&df).unwrap();
        assert_eq!(encoder.numeric_encodings()[0].median, 70.0);
        assert_eq!(x[[1, 0]], 0.0);
    }

    #[test]
    fn test_non_numeric_cell_rejected_at_transform() {
        let mut encoder = FeatureEncoder::new(FeatureSchema::new().with_numeric(["reading_score"]));
        encoder.fit(&df!("reading_score" => [10.0, 50.0, 90.0]).unwrap()).unwrap();

        let row = df!("reading_score" => ["abc"]).unwrap();
        match encoder.transform(&row).unwrap_err() {
            MathScoreError::InvalidInput { field, reason } => {
                assert_eq!(field, "reading_score");
                assert!(reason.contains("abc"), "{reason}");
            }
            other => panic!("expected InvalidInput, got {other}"),
        }

        // Numeric text still parses, and a real null is still imputed
        let ok = df!("reading_score" => [Some("90"), None]).unwrap();
        let x = encoder.transform(&ok).unwrap();
        assert!(x[[0, 0]] > 0.0);
        assert_eq!(x[[1, 0]], 0.0);
    }

    #[test]
    fn test_non_numeric_cell_rejected_at_fit() {
        let df = df!(
            "reading_score" => ["70", "eighty", "90"],
            "lunch" => ["standard", "standard", "free/reduced"]
        )
        .unwrap();
        let mut encoder = FeatureEncoder::new(schema());
        assert!(matches!(encoder.fit(&df).unwrap_err(), MathScoreError::DataError(_)));
        assert!(!encoder.is_fitted());
    }

    #[test]
    fn test_median_and_mode_helpers() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);

        let counts: BTreeMap<&str, usize> = [("b", 2), ("a", 2), ("c", 1)].into_iter().collect();
        assert_eq!(most_frequent(&counts).as_deref(), Some("a"));
    }
}
