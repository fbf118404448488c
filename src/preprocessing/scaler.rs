//! Feature scaling implementations

use crate::error::{TabfitError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Type of scaler to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalerType {
    /// Standard scaling (z-score normalization): (x - mean) / std
    Standard,
    /// Min-Max scaling: (x - min) / (max - min)
    MinMax,
    /// Robust scaling using median and IQR
    Robust,
}

impl FromStr for ScalerType {
    type Err = TabfitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(ScalerType::Standard),
            "minmax" => Ok(ScalerType::MinMax),
            "robust" => Ok(ScalerType::Robust),
            other => Err(TabfitError::ConfigError(format!(
                "unknown scaling strategy '{}', expected standard, minmax or robust",
                other
            ))),
        }
    }
}

/// Parameters for a fitted column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ScalerParams {
    center: f64, // mean, min, or median
    scale: f64,  // std, range, or IQR
}

/// Feature scaler.
///
/// Zero-spread columns keep a scale of 1.0, so they are centered but never
/// divided by zero. Nulls are skipped when learning statistics and map to the
/// center (0.0 after scaling) when transforming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    scaler_type: ScalerType,
    params: Vec<(String, ScalerParams)>,
    is_fitted: bool,
}

impl Scaler {
    /// Create a new scaler
    pub fn new(scaler_type: ScalerType) -> Self {
        Self {
            scaler_type,
            params: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Fit the scaler to the data
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        let mut params = Vec::with_capacity(columns.len());
        for col_name in columns {
            let series = float_series(df, col_name)?;
            params.push((col_name.to_string(), self.compute_params(&series)?));
        }

        self.params = params;
        self.is_fitted = true;
        Ok(self)
    }

    /// Transform the data, replacing every fitted column with its scaled
    /// version and leaving other columns untouched.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(TabfitError::NotFitted);
        }

        let replacements: Vec<Series> = self
            .params
            .iter()
            .map(|(col_name, _)| {
                let values = self.scaled_values(df, col_name)?;
                Ok(Series::new(col_name.as_str().into(), values))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut result = df.clone();
        for scaled in replacements {
            result = result
                .with_column(scaled)
                .map_err(|e| TabfitError::DataError(e.to_string()))?
                .clone();
        }

        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    /// Scaled values of one fitted column
    pub fn scaled_values(&self, df: &DataFrame, col_name: &str) -> Result<Vec<f64>> {
        if !self.is_fitted {
            return Err(TabfitError::NotFitted);
        }
        let params = self
            .params
            .iter()
            .find(|(name, _)| name == col_name)
            .map(|(_, p)| p)
            .ok_or_else(|| TabfitError::FeatureNotFound(col_name.to_string()))?;

        let series = float_series(df, col_name)?;
        let ca = series
            .f64()
            .map_err(|e| TabfitError::DataError(e.to_string()))?;

        Ok(ca
            .into_iter()
            .map(|opt| match opt {
                Some(v) => (v - params.center) / params.scale,
                None => 0.0,
            })
            .collect())
    }

    fn compute_params(&self, series: &Series) -> Result<ScalerParams> {
        let ca = series
            .f64()
            .map_err(|e| TabfitError::DataError(e.to_string()))?;

        let (center, scale) = match self.scaler_type {
            ScalerType::Standard => {
                let mean = ca.mean().unwrap_or(0.0);
                // Population std, matching the usual StandardScaler definition
                let std = ca.std(0).unwrap_or(0.0);
                (mean, std)
            }
            ScalerType::MinMax => {
                let min = ca.min().unwrap_or(0.0);
                let max = ca.max().unwrap_or(0.0);
                (min, max - min)
            }
            ScalerType::Robust => {
                let median = ca.median().unwrap_or(0.0);
                let q1 = ca.quantile(0.25, QuantileMethod::Linear)?.unwrap_or(0.0);
                let q3 = ca.quantile(0.75, QuantileMethod::Linear)?.unwrap_or(0.0);
                (median, q3 - q1)
            }
        };

        Ok(ScalerParams {
            center,
            scale: safe_scale(scale, center),
        })
    }
}

/// Replace a zero (or rounding-noise) spread with 1.0
fn safe_scale(scale: f64, center: f64) -> f64 {
    let tolerance = 10.0 * f64::EPSILON * center.abs().max(1.0);
    if !scale.is_finite() || scale.abs() <= tolerance {
        1.0
    } else {
        scale
    }
}

/// Fetch a column and cast it to Float64
fn float_series(df: &DataFrame, col_name: &str) -> Result<Series> {
    let column = df
        .column(col_name)
        .map_err(|_| TabfitError::FeatureNotFound(col_name.to_string()))?;
    column
        .as_materialized_series()
        .cast(&DataType::Float64)
        .map_err(|e| TabfitError::DataError(format!("column '{}': {}", col_name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_scaler() {
        let df = df!("a" => &[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();

        let mut scaler = Scaler::new(ScalerType::Standard);
        let result = scaler.fit_transform(&df, &["a"]).unwrap();

        let col = result.column("a").unwrap().f64().unwrap();
        let mean: f64 = col.mean().unwrap();
        assert!(mean.abs() < 1e-10);
        // population std of the scaled column is 1
        assert!((col.std(0).unwrap() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_minmax_scaler() {
        let df = df!("a" => &[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();

        let mut scaler = Scaler::new(ScalerType::MinMax);
        let result = scaler.fit_transform(&df, &["a"]).unwrap();

        let col = result.column("a").unwrap().f64().unwrap();
        assert!((col.min().unwrap() - 0.0).abs() < 1e-10);
        assert!((col.max().unwrap() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_robust_scaler_centers_on_median() {
        let df = df!("a" => &[1.0, 2.0, 3.0, 4.0, 100.0]).unwrap();

        let mut scaler = Scaler::new(ScalerType::Robust);
        scaler.fit(&df, &["a"]).unwrap();
        let values = scaler.scaled_values(&df, "a").unwrap();
        assert!(values[2].abs() < 1e-10);
    }

    #[test]
    fn test_zero_variance_is_centered_only() {
        let df = df!("a" => &[7.0, 7.0, 7.0]).unwrap();

        let mut scaler = Scaler::new(ScalerType::Standard);
        scaler.fit(&df, &["a"]).unwrap();
        let values = scaler.scaled_values(&df, "a").unwrap();
        assert!(values.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_integer_columns_are_cast() {
        let df = df!("n" => &[1i64, 2, 3]).unwrap();

        let mut scaler = Scaler::new(ScalerType::MinMax);
        scaler.fit(&df, &["n"]).unwrap();
        assert_eq!(scaler.scaled_values(&df, "n").unwrap(), vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_transform_before_fit() {
        let df = df!("a" => &[1.0]).unwrap();
        let scaler = Scaler::new(ScalerType::Standard);
        assert!(matches!(scaler.transform(&df), Err(TabfitError::NotFitted)));
    }

    #[test]
    fn test_parse_strategy() {
        assert_eq!("MinMax".parse::<ScalerType>().unwrap(), ScalerType::MinMax);
        assert!("zscore".parse::<ScalerType>().is_err());
    }
}
