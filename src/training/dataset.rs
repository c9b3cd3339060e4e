//! Encoded train/test partitions handed to the evaluator

use crate::error::{MathScoreError, Result};
use ndarray::{Array1, Array2};

/// Feature matrices and targets for both partitions
#[derive(Debug, Clone)]
pub struct Dataset {
    pub x_train: Array2<f64>,
    pub y_train: Array1<f64>,
    pub x_test: Array2<f64>,
    pub y_test: Array1<f64>,
}

impl Dataset {
    /// Build a dataset, checking the shape invariants up front
    pub fn new(
        x_train: Array2<f64>,
        y_train: Array1<f64>,
        x_test: Array2<f64>,
        y_test: Array1<f64>,
    ) -> Result<Self> {
        let dataset = Self {
            x_train,
            y_train,
            x_test,
            y_test,
        };
        dataset.validate()?;
        Ok(dataset)
    }

    /// Row counts match target lengths and both partitions share a width
    pub fn validate(&self) -> Result<()> {
        if self.x_train.nrows() != self.y_train.len() {
            return Err(MathScoreError::ShapeError {
                expected: format!("{} training targets", self.x_train.nrows()),
                actual: format!("{} training targets", self.y_train.len()),
            });
        }
        if self.x_test.nrows() != self.y_test.len() {
            return Err(MathScoreError::ShapeError {
                expected: format!("{} test targets", self.x_test.nrows()),
                actual: format!("{} test targets", self.y_test.len()),
            });
        }
        if self.x_train.ncols() != self.x_test.ncols() {
            return Err(MathScoreError::ShapeError {
                expected: format!("{} test features", self.x_train.ncols()),
                actual: format!("{} test features", self.x_test.ncols()),
            });
        }
        if self.x_train.nrows() == 0 || self.x_test.nrows() == 0 {
            return Err(MathScoreError::DataError(
                "both train and test partitions need at least one row".to_string(),
            ));
        }
        Ok(())
    }

    pub fn n_features(&self) -> usize {
        self.x_train.ncols()
    }

    pub fn n_train(&self) -> usize {
        self.x_train.nrows()
    }

    pub fn n_test(&self) -> usize {
        self.x_test.nrows()
    }
}
