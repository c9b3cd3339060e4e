//! Per-column scaling parameters

use serde::{Deserialize, Serialize};

/// Fitted scaling for one output column: `(x - center) / scale`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnScaler {
    pub center: f64,
    pub scale: f64,
}

impl ColumnScaler {
    /// Standard scaling from mean and population standard deviation.
    ///
    /// Without centering only the division by the standard deviation is
    /// applied, which keeps one-hot indicators sparse. A zero deviation
    /// leaves the column unscaled.
    pub fn fit_standard(values: &[f64], with_centering: bool) -> Self {
        if values.is_empty() {
            return Self { center: 0.0, scale: 1.0 };
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();

        Self {
            center: if with_centering { mean } else { 0.0 },
            scale: if std > 0.0 && std.is_finite() { std } else { 1.0 },
        }
    }

    #[inline]
    pub fn apply(&self, value: f64) -> f64 {
        (value - self.center) / self.scale
    }

    #[inline]
    pub fn invert(&self, value: f64) -> f64 {
        value * self.scale + self.center
    }
}
