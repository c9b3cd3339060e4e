//! Data loading utilities: student CSV ingestion, train/test split, encoding

use crate::error::{MathScoreError, Result};
use crate::preprocessing::{FeatureEncoder, FeatureSchema, MATH_SCORE};
use crate::training::Dataset;
use ndarray::Array1;
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// How rows are divided between training and evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Fraction of rows held out for testing
    pub test_size: f64,
    /// Shuffle seed; equal seeds give equal partitions
    pub seed: u64,
    pub target_column: String,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            seed: 42,
            target_column: MATH_SCORE.to_string(),
        }
    }
}

impl SplitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_target_column(mut self, column: impl Into<String>) -> Self {
        self.target_column = column.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(MathScoreError::ConfigError(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        if self.target_column.trim().is_empty() {
            return Err(MathScoreError::ConfigError("target column must be named".to_string()));
        }
        Ok(())
    }
}

/// CSV reader for the student performance table
pub struct DataLoader {
    /// Rows used to infer column types
    infer_schema_length: Option<usize>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            infer_schema_length: Some(100),
        }
    }

    /// `None` scans the whole file before choosing column types
    pub fn with_infer_schema_length(mut self, rows: Option<usize>) -> Self {
        self.infer_schema_length = rows;
        self
    }

    /// Load a CSV file with a header row
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let start = Instant::now();
        let file = File::open(path)
            .map_err(|e| MathScoreError::DataError(format!("cannot open {}: {}", path.display(), e)))?;

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .into_reader_with_file_handle(file)
            .finish()?;

        info!(
            path = %path.display(),
            rows = df.height(),
            columns = df.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded CSV"
        );
        Ok(df)
    }
}

/// Fail with `FeatureNotFound` for the first schema or target column absent from `df`
pub fn validate_columns(df: &DataFrame, schema: &FeatureSchema, target: &str) -> Result<()> {
    let present: Vec<&str> = df.get_column_names().into_iter().map(|n| n.as_str()).collect();
    for column in schema.input_columns().chain(std::iter::once(target)) {
        if !present.contains(&column) {
            return Err(MathScoreError::FeatureNotFound(column.to_string()));
        }
    }
    Ok(())
}

/// Shuffle rows and split them into `(train, test)` frames.
///
/// The test partition receives `ceil(n * test_size)` rows. Both partitions
/// must end up non-empty.
pub fn train_test_split(df: &DataFrame, config: &SplitConfig) -> Result<(DataFrame, DataFrame)> {
    config.validate()?;
    let n = df.height();
    let n_test = (n as f64 * config.test_size).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(MathScoreError::DataError(format!(
            "cannot split {} rows with test_size {}",
            n, config.test_size
        )));
    }

    let mut order: Vec<IdxSize> = (0..n as IdxSize).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    order.shuffle(&mut rng);

    let train_idx = IdxCa::from_vec("idx".into(), order[n_test..].to_vec());
    let test_idx = IdxCa::from_vec("idx".into(), order[..n_test].to_vec());
    let train = df.take(&train_idx)?;
    let test = df.take(&test_idx)?;

    info!(train_rows = train.height(), test_rows = test.height(), seed = config.seed, "Split data");
    Ok((train, test))
}

/// Target column as `f64`; a missing target value is a data error
pub fn target_vector(df: &DataFrame, target: &str) -> Result<Array1<f64>> {
    let series = df
        .column(target)
        .map_err(|_| MathScoreError::FeatureNotFound(target.to_string()))?
        .as_materialized_series()
        .cast(&DataType::Float64)?;

    series
        .f64()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value.filter(|v| v.is_finite()).ok_or_else(|| {
                MathScoreError::DataError(format!("missing or non-numeric '{}' in row {}", target, row))
            })
        })
        .collect()
}

/// Fit the encoder on the training frame only and encode both partitions
pub fn prepare_dataset(
    train: &DataFrame,
    test: &DataFrame,
    schema: &FeatureSchema,
    target: &str,
) -> Result<(Dataset, FeatureEncoder)> {
    validate_columns(train, schema, target)?;
    validate_columns(test, schema, target)?;

    let mut encoder = FeatureEncoder::new(schema.clone());
    let x_train = encoder.fit_transform(train)?;
    let x_test = encoder.transform(test)?;
    let y_train = target_vector(train, target)?;
    let y_test = target_vector(test, target)?;
    debug!(features = encoder.n_output_features(), "Encoded train and test partitions");

    let dataset = Dataset::new(x_train, y_train, x_test, y_test)?;
    Ok((dataset, encoder))
}

/// Load a CSV, split it and encode both partitions in one step
pub fn load_dataset(
    path: impl AsRef<Path>,
    schema: &FeatureSchema,
    split: &SplitConfig,
) -> Result<(Dataset, FeatureEncoder)> {
    let df = DataLoader::new().load_csv(path)?;
    validate_columns(&df, schema, &split.target_column)?;
    let (train, test) = train_test_split(&df, split)?;
    prepare_dataset(&train, &test, schema, &split.target_column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv() -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "kind,x,y").unwrap();
        for i in 0..10 {
            writeln!(file, "{},{},{}", if i % 2 == 0 { "even" } else { "odd" }, i, 2 * i).unwrap();
        }
        file
    }

    fn schema() -> FeatureSchema {
        FeatureSchema::new().with_numeric(["x"]).with_categorical(["kind"])
    }

    fn numbered_frame(n: i64) -> DataFrame {
        let ids: Vec<i64> = (0..n).collect();
        df!("id" => ids).unwrap()
    }

    #[test]
    fn test_load_csv() {
        let file = create_test_csv();
        let df = DataLoader::new().load_csv(file.path()).unwrap();
        assert_eq!(df.height(), 10);
        assert_eq!(df.width(), 3);
    }

    #[test]
    fn test_load_missing_file() {
        let err = DataLoader::new().load_csv("/nonexistent/students.csv").unwrap_err();
        assert!(matches!(err, MathScoreError::DataError(_)));
    }

    #[test]
    fn test_split_sizes_and_disjoint() {
        let df = numbered_frame(100);
        let (train, test) = train_test_split(&df, &SplitConfig::default()).unwrap();
        assert_eq!(train.height(), 80);
        assert_eq!(test.height(), 20);

        let ids = |frame: &DataFrame| -> HashSet<i64> {
            frame.column("id").unwrap().as_materialized_series().i64().unwrap().into_no_null_iter().collect()
        };
        let (train_ids, test_ids) = (ids(&train), ids(&test));
        assert!(train_ids.is_disjoint(&test_ids));
        assert_eq!(train_ids.len() + test_ids.len(), 100);
    }

    #[test]
    fn test_split_is_seeded() {
        let df = numbered_frame(50);
        let config = SplitConfig::default().with_seed(9);
        let (a, _) = train_test_split(&df, &config).unwrap();
        let (b, _) = train_test_split(&df, &config).unwrap();
        assert!(a.equals(&b));
    }

    #[test]
    fn test_split_rejects_degenerate_sizes() {
        assert!(train_test_split(&numbered_frame(1), &SplitConfig::default()).is_err());
        assert!(train_test_split(&numbered_frame(10), &SplitConfig::default().with_test_size(1.0)).is_err());
    }

    #[test]
    fn test_load_dataset_end_to_end() {
        let file = create_test_csv();
        let split = SplitConfig::default().with_target_column("y");
        let (dataset, encoder) = load_dataset(file.path(), &schema(), &split).unwrap();
        assert_eq!(dataset.n_train(), 8);
        assert_eq!(dataset.n_test(), 2);
        assert_eq!(dataset.n_features(), 3);
        assert_eq!(encoder.n_output_features(), 3);
    }

    #[test]
    fn test_missing_target_column() {
        let file = create_test_csv();
        let split = SplitConfig::default();
        let err = load_dataset(file.path(), &schema(), &split).unwrap_err();
        match err {
            MathScoreError::FeatureNotFound(column) => assert_eq!(column, "math_score"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_target_vector_rejects_nulls() {
        let df = df!("y" => [Some(1.0), None]).unwrap();
        assert!(matches!(target_vector(&df, "y").unwrap_err(), MathScoreError::DataError(_)));
    }
}
