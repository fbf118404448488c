//! Data preprocessing module
//!
//! Turns a heterogeneous feature table into a numeric matrix:
//! - Column classification by dtype
//! - Feature scaling (standard, min-max, robust)
//! - One-hot encoding of categorical columns
//! - A composed column transformer that owns both

mod encoder;
mod scaler;
mod transformer;

pub use encoder::OneHotEncoder;
pub use scaler::{Scaler, ScalerType};
pub use transformer::ColumnTransformer;

use crate::error::Result;
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Column data type for preprocessing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Numeric,
    Categorical,
    /// Anything else; carried through unscaled
    Passthrough,
}

impl ColumnType {
    pub fn of(dtype: &DataType) -> Self {
        match dtype {
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64 => ColumnType::Numeric,
            DataType::String | DataType::Categorical(_, _) => ColumnType::Categorical,
            _ => ColumnType::Passthrough,
        }
    }
}

/// Numeric and categorical column names of a table, each in table order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnClassification {
    pub numeric: Vec<String>,
    pub categorical: Vec<String>,
}

impl ColumnClassification {
    /// Columns of `table` that are neither numeric nor categorical
    pub fn passthrough(&self, table: &DataFrame) -> Vec<String> {
        table
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .filter(|name| !self.numeric.contains(name) && !self.categorical.contains(name))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.numeric.is_empty() && self.categorical.is_empty()
    }
}

/// Split a table's columns into numeric and categorical sets by dtype.
pub fn classify(table: &DataFrame) -> ColumnClassification {
    let mut classification = ColumnClassification::default();

    for col in table.get_columns() {
        let name = col.name().to_string();
        match ColumnType::of(col.dtype()) {
            ColumnType::Numeric => classification.numeric.push(name),
            ColumnType::Categorical => classification.categorical.push(name),
            ColumnType::Passthrough => {}
        }
    }

    classification
}

/// A table-to-matrix transform with learned state
pub trait Transformable {
    /// Learn the transform's parameters from `table`
    fn fit(&mut self, table: &DataFrame) -> Result<()>;

    /// Map a table with the fitted schema to a fixed-width matrix
    fn apply(&self, table: &DataFrame) -> Result<Array2<f64>>;

    fn fit_apply(&mut self, table: &DataFrame) -> Result<Array2<f64>> {
        self.fit(table)?;
        self.apply(table)
    }
}
