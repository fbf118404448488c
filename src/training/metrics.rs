//! Regression metrics

use crate::error::{TabfitError, Result};
use ndarray::Array1;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A regression metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Mse,
    Rmse,
    Mae,
    R2,
    Mape,
}

impl Metric {
    pub const ALL: [Metric; 5] = [Metric::Mse, Metric::Rmse, Metric::Mae, Metric::R2, Metric::Mape];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Mse => "mse",
            Metric::Rmse => "rmse",
            Metric::Mae => "mae",
            Metric::R2 => "r2",
            Metric::Mape => "mape",
        }
    }

    /// Value of this metric; inputs must be equal-length and non-empty
    fn evaluate(&self, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
        match self {
            Metric::Mse => mean_squared_error(y_true, y_pred),
            Metric::Rmse => mean_squared_error(y_true, y_pred).sqrt(),
            Metric::Mae => mean_absolute_error(y_true, y_pred),
            Metric::R2 => r2_score(y_true, y_pred),
            Metric::Mape => mean_absolute_percentage_error(y_true, y_pred),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = TabfitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mse" => Ok(Metric::Mse),
            "rmse" => Ok(Metric::Rmse),
            "mae" => Ok(Metric::Mae),
            "r2" => Ok(Metric::R2),
            "mape" => Ok(Metric::Mape),
            other => Err(TabfitError::ConfigError(format!("unknown metric '{}'", other))),
        }
    }
}

/// Metric values in the order they were requested
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsReport {
    values: Vec<(Metric, f64)>,
}

impl MetricsReport {
    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.values.iter().find(|(m, _)| *m == metric).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, f64)> + '_ {
        self.values.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Serializes as a JSON object; NaN values become `null`
impl Serialize for MetricsReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (metric, value) in &self.values {
            let value = if value.is_finite() { Some(*value) } else { None };
            map.serialize_entry(metric.as_str(), &value)?;
        }
        map.end()
    }
}

/// Compute the requested metrics. Repeated metrics are reported once.
pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>, metrics: &[Metric]) -> Result<MetricsReport> {
    check_lengths(y_true, y_pred)?;

    let mut report = MetricsReport::default();
    for metric in metrics {
        if report.get(*metric).is_none() {
            report.values.push((*metric, metric.evaluate(y_true, y_pred)));
        }
    }
    Ok(report)
}

pub(crate) fn check_lengths(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<()> {
    if y_true.len() != y_pred.len() || y_true.is_empty() {
        return Err(TabfitError::LengthMismatch {
            expected: y_true.len(),
            actual: y_pred.len(),
        });
    }
    Ok(())
}

pub(crate) fn mean_squared_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let n = y_true.len() as f64;
    y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / n
}

pub(crate) fn mean_absolute_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let n = y_true.len() as f64;
    y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).abs())
        .sum::<f64>()
        / n
}

/// NaN when `y_true` has zero variance
pub(crate) fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let n = y_true.len() as f64;
    let y_mean = y_true.sum() / n;
    let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();

    if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else {
        f64::NAN
    }
}

/// Percentage error over rows with a non-zero target; NaN when there are none
fn mean_absolute_percentage_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let (sum, count) = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, _)| **t != 0.0)
        .fold((0.0, 0usize), |(sum, count), (t, p)| (sum + ((t - p) / t).abs(), count + 1));

    if count == 0 {
        f64::NAN
    } else {
        100.0 * sum / count as f64
    }
}
