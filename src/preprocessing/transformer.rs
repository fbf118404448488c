//! Column-wise preprocessing composed into a single transform

use super::{ColumnClassification, ColumnType, OneHotEncoder, Scaler, ScalerType, Transformable};
use crate::error::{TabfitError, Result};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Scales numeric columns, one-hot encodes categorical columns and passes
/// every other column through as f64.
///
/// Output layout is fixed at fit time: the numeric block, then one block per
/// categorical column, then the passthrough columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnTransformer {
    classification: ColumnClassification,
    /// Absent when there are no numeric columns
    scaler: Option<Scaler>,
    /// Absent when there are no categorical columns
    encoder: Option<OneHotEncoder>,
    passthrough: Vec<String>,
    /// Column names and order of the fit table
    schema: Option<Vec<String>>,
    /// Dtype class of each fit column, parallel to `schema`
    column_types: Vec<ColumnType>,
}

impl ColumnTransformer {
    /// Build an unfitted transform for the given column sets
    pub fn build(classification: &ColumnClassification) -> Self {
        let scaler = (!classification.numeric.is_empty()).then(|| Scaler::new(ScalerType::Standard));
        let encoder = (!classification.categorical.is_empty()).then(OneHotEncoder::new);

        Self {
            classification: classification.clone(),
            scaler,
            encoder,
            passthrough: Vec::new(),
            schema: None,
            column_types: Vec::new(),
        }
    }

    pub fn classification(&self) -> &ColumnClassification {
        &self.classification
    }

    pub fn is_fitted(&self) -> bool {
        self.schema.is_some()
    }

    /// Input column names seen at fit
    pub fn schema(&self) -> Option<&[String]> {
        self.schema.as_deref()
    }

    /// Width of the matrix produced by `apply`
    pub fn n_features_out(&self) -> usize {
        self.classification.numeric.len()
            + self.encoder.as_ref().map_or(0, |e| e.n_outputs())
            + self.passthrough.len()
    }

    /// Output column names, in output order
    pub fn feature_names_out(&self) -> Vec<String> {
        let mut names = self.classification.numeric.clone();
        if let Some(encoder) = &self.encoder {
            names.extend(encoder.output_names());
        }
        names.extend(self.passthrough.iter().cloned());
        names
    }

    fn check_schema(&self, table: &DataFrame) -> Result<()> {
        let expected = self.schema.as_ref().ok_or(TabfitError::NotFitted)?;
        let actual: Vec<String> = table
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect();

        if &actual != expected {
            return Err(TabfitError::SchemaMismatch {
                expected: expected.clone(),
                actual,
            });
        }

        // All-null columns carry no dtype of their own
        let changed: Vec<(usize, &DataType)> = table
            .get_columns()
            .iter()
            .zip(&self.column_types)
            .enumerate()
            .filter(|(_, (col, fitted))| {
                !matches!(col.dtype(), DataType::Null) && ColumnType::of(col.dtype()) != **fitted
            })
            .map(|(i, (col, _))| (i, col.dtype()))
            .collect();

        if !changed.is_empty() {
            return Err(TabfitError::SchemaMismatch {
                expected: changed
                    .iter()
                    .map(|&(i, _)| format!("{}: {:?}", expected[i], self.column_types[i]))
                    .collect(),
                actual: changed
                    .iter()
                    .map(|&(i, dtype)| format!("{}: {}", expected[i], dtype))
                    .collect(),
            });
        }
        Ok(())
    }
}

impl Transformable for ColumnTransformer {
    fn fit(&mut self, table: &DataFrame) -> Result<()> {
        for name in self
            .classification
            .numeric
            .iter()
            .chain(self.classification.categorical.iter())
        {
            if table.column(name).is_err() {
                return Err(TabfitError::FeatureNotFound(name.clone()));
            }
        }

        if let Some(scaler) = self.scaler.as_mut() {
            let cols: Vec<&str> = self.classification.numeric.iter().map(|s| s.as_str()).collect();
            scaler.fit(table, &cols)?;
        }

        if let Some(encoder) = self.encoder.as_mut() {
            let cols: Vec<&str> = self
                .classification
                .categorical
                .iter()
                .map(|s| s.as_str())
                .collect();
            encoder.fit(table, &cols)?;
        }

        self.passthrough = self.classification.passthrough(table);
        self.column_types = table
            .get_columns()
            .iter()
            .map(|col| ColumnType::of(col.dtype()))
            .collect();
        self.schema = Some(
            table
                .get_column_names()
                .into_iter()
                .map(|name| name.to_string())
                .collect(),
        );

        debug!(
            numeric = self.classification.numeric.len(),
            categorical = self.classification.categorical.len(),
            passthrough = self.passthrough.len(),
            width = self.n_features_out(),
            "Fitted column transformer"
        );
        Ok(())
    }

    fn apply(&self, table: &DataFrame) -> Result<Array2<f64>> {
        self.check_schema(table)?;

        let mut columns: Vec<Vec<f64>> = Vec::with_capacity(self.n_features_out());

        if let Some(scaler) = &self.scaler {
            for name in &self.classification.numeric {
                columns.push(scaler.scaled_values(table, name)?);
            }
        }

        if let Some(encoder) = &self.encoder {
            columns.extend(encoder.encode(table)?);
        }

        for name in &self.passthrough {
            let series = table
                .column(name)
                .map_err(|_| TabfitError::FeatureNotFound(name.clone()))?
                .as_materialized_series()
                .cast(&DataType::Float64)
                .map_err(|e| {
                    TabfitError::DataError(format!("passthrough column '{}': {}", name, e))
                })?;
            let ca = series
                .f64()
                .map_err(|e| TabfitError::DataError(e.to_string()))?;
            columns.push(ca.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect());
        }

        let rows = table.height();
        let width = columns.len();
        Ok(Array2::from_shape_fn((rows, width), |(i, j)| columns[j][i]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::classify;

    fn sample() -> DataFrame {
        df!(
            "size" => &[1.0, 2.0, 3.0, 4.0],
            "kind" => &["a", "b", "c", "a"],
            "flag" => &[true, false, true, true]
        )
        .unwrap()
    }

    #[test]
    fn test_layout_and_width() {
        let df = sample();
        let mut ct = ColumnTransformer::build(&classify(&df));
        let out = ct.fit_apply(&df).unwrap();

        // 1 numeric + (3 - 1) indicators + 1 passthrough
        assert_eq!(out.dim(), (4, 4));
        assert_eq!(ct.feature_names_out(), vec!["size", "kind_b", "kind_c", "flag"]);
        assert_eq!(out[[1, 1]], 1.0);
        assert_eq!(out[[2, 2]], 1.0);
        assert_eq!(out[[1, 3]], 0.0);
    }

    #[test]
    fn test_empty_branch_is_omitted() {
        let df = df!("x" => &[1.0, 3.0]).unwrap();
        let mut ct = ColumnTransformer::build(&classify(&df));
        let out = ct.fit_apply(&df).unwrap();
        assert_eq!(out.dim(), (2, 1));
        assert!(ct.encoder.is_none());
        assert_eq!(out[[0, 0]], -1.0);
    }

    #[test]
    fn test_zero_rows_keep_width() {
        let df = sample();
        let mut ct = ColumnTransformer::build(&classify(&df));
        ct.fit(&df).unwrap();

        let empty = df.head(Some(0));
        assert_eq!(ct.apply(&empty).unwrap().dim(), (0, 4));
    }

    #[test]
    fn test_apply_before_fit() {
        let df = sample();
        let ct = ColumnTransformer::build(&classify(&df));
        assert!(matches!(ct.apply(&df), Err(TabfitError::NotFitted)));
    }

    #[test]
    fn test_schema_mismatch() {
        let df = sample();
        let mut ct = ColumnTransformer::build(&classify(&df));
        ct.fit(&df).unwrap();

        let reordered = df.select(["kind", "size", "flag"]).unwrap();
        match ct.apply(&reordered) {
            Err(TabfitError::SchemaMismatch { expected, actual }) => {
                assert_eq!(expected[0], "size");
                assert_eq!(actual[0], "kind");
            }
            other => panic!("expected schema mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_changed_dtype_is_schema_mismatch() {
        let train = df!("area" => &[50.0, 80.0], "zone" => &["n", "s"]).unwrap();
        let mut ct = ColumnTransformer::build(&classify(&train));
        ct.fit(&train).unwrap();

        let text_area = df!("area" => &["fifty", "80"], "zone" => &["n", "s"]).unwrap();
        match ct.apply(&text_area) {
            Err(TabfitError::SchemaMismatch { expected, actual }) => {
                assert_eq!(expected, vec!["area: Numeric"]);
                assert_eq!(actual.len(), 1);
                assert!(actual[0].starts_with("area: "));
            }
            other => panic!("expected schema mismatch, got {:?}", other),
        }

        // Integer columns read back from CSV still count as numeric
        let int_area = df!("area" => &[60i64, 70], "zone" => &["n", "e"]).unwrap();
        assert_eq!(ct.apply(&int_area).unwrap().dim(), (2, 2));
    }

    #[test]
    fn test_null_numeric_maps_to_zero() {
        let train = df!("v" => &[Some(1.0), Some(3.0)]).unwrap();
        let mut ct = ColumnTransformer::build(&classify(&train));
        ct.fit(&train).unwrap();

        let test = df!("v" => &[None::<f64>, Some(2.0)]).unwrap();
        let out = ct.apply(&test).unwrap();
        assert_eq!(out[[0, 0]], 0.0);
        assert_eq!(out[[1, 0]], 0.0);
    }
}
