//! Categorical encoding

use crate::error::{TabfitError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Categories learned for one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ColumnCategories {
    name: String,
    /// Sorted lexicographically
    categories: Vec<String>,
}

impl ColumnCategories {
    /// Categories that get an indicator column
    fn kept(&self, drop_first: bool) -> &[String] {
        if drop_first && !self.categories.is_empty() {
            &self.categories[1..]
        } else {
            &self.categories
        }
    }
}

/// One-hot encoder.
///
/// Categories are sorted per column. With `drop_first` the first sorted
/// category gets no indicator, so a column with k categories yields k - 1
/// outputs. Values not seen at fit time, and nulls, encode as all zeros.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneHotEncoder {
    drop_first: bool,
    columns: Vec<ColumnCategories>,
    is_fitted: bool,
}

impl Default for OneHotEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl OneHotEncoder {
    /// Create an encoder that drops the first category of every column
    pub fn new() -> Self {
        Self {
            drop_first: true,
            columns: Vec::new(),
            is_fitted: false,
        }
    }

    /// Keep an indicator for every category
    pub fn with_drop_first(mut self, drop_first: bool) -> Self {
        self.drop_first = drop_first;
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Fit the encoder to the data
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        let mut learned = Vec::with_capacity(columns.len());
        for col_name in columns {
            let series = string_series(df, col_name)?;
            let ca = series
                .str()
                .map_err(|e| TabfitError::DataError(e.to_string()))?;

            let categories: BTreeSet<String> =
                ca.into_iter().flatten().map(|v| v.to_string()).collect();

            learned.push(ColumnCategories {
                name: col_name.to_string(),
                categories: categories.into_iter().collect(),
            });
        }

        self.columns = learned;
        self.is_fitted = true;
        Ok(self)
    }

    /// Total number of indicator columns produced
    pub fn n_outputs(&self) -> usize {
        self.columns
            .iter()
            .map(|c| c.kept(self.drop_first).len())
            .sum()
    }

    /// Names of the indicator columns, `<column>_<category>`
    pub fn output_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .flat_map(|c| {
                c.kept(self.drop_first)
                    .iter()
                    .map(move |cat| format!("{}_{}", c.name, cat))
            })
            .collect()
    }

    /// Indicator columns for every fitted column, in fit order
    pub fn encode(&self, df: &DataFrame) -> Result<Vec<Vec<f64>>> {
        if !self.is_fitted {
            return Err(TabfitError::NotFitted);
        }

        let mut outputs = Vec::with_capacity(self.n_outputs());
        for column in &self.columns {
            let series = string_series(df, &column.name)?;
            let ca = series
                .str()
                .map_err(|e| TabfitError::DataError(e.to_string()))?;

            for category in column.kept(self.drop_first) {
                let values: Vec<f64> = ca
                    .into_iter()
                    .map(|v| if v == Some(category.as_str()) { 1.0 } else { 0.0 })
                    .collect();
                outputs.push(values);
            }
        }

        Ok(outputs)
    }
}

/// Fetch a column as strings, casting categorical dtypes
fn string_series(df: &DataFrame, col_name: &str) -> Result<Series> {
    let column = df
        .column(col_name)
        .map_err(|_| TabfitError::FeatureNotFound(col_name.to_string()))?;
    column
        .as_materialized_series()
        .cast(&DataType::String)
        .map_err(|e| TabfitError::DataError(format!("column '{}': {}", col_name, e)))
}
