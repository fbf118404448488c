//! Preprocessing and estimator composed into one persistable unit

use super::models::{Estimator, Fittable, Predictive};
use crate::error::{TabfitError, Result};
use crate::preprocessing::{ColumnTransformer, Transformable};
use ndarray::Array1;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Magic prefix of a saved pipeline
const ARTIFACT_MAGIC: &[u8; 8] = b"TABFIT01";

/// A column transformer followed by a regression estimator.
///
/// Fitting fits both stages on the same table; predicting runs the table
/// through the fitted transform first. The input schema is checked on every
/// call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionPipeline {
    preprocessor: ColumnTransformer,
    estimator: Estimator,
    is_fitted: bool,
}

impl RegressionPipeline {
    pub fn new(preprocessor: ColumnTransformer, estimator: Estimator) -> Self {
        Self {
            preprocessor,
            estimator,
            is_fitted: false,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn preprocessor(&self) -> &ColumnTransformer {
        &self.preprocessor
    }

    pub fn estimator(&self) -> &Estimator {
        &self.estimator
    }

    /// Column names the pipeline expects, once fitted
    pub fn input_schema(&self) -> Option<&[String]> {
        self.preprocessor.schema()
    }

    /// Width of the matrix fed to the estimator
    pub fn n_features_out(&self) -> usize {
        self.preprocessor.n_features_out()
    }

    /// Serialize with bincode behind a magic prefix
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if !self.is_fitted {
            return Err(TabfitError::NotFitted);
        }
        let mut bytes = ARTIFACT_MAGIC.to_vec();
        bytes.extend(bincode::serialize(self)?);
        Ok(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let body = bytes.strip_prefix(ARTIFACT_MAGIC.as_slice()).ok_or_else(|| {
            TabfitError::SerializationError("not a tabfit pipeline artifact".to_string())
        })?;
        Ok(bincode::deserialize(body)?)
    }

    /// Load a pipeline saved with [`RegressionPipeline::to_bytes`]
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}

impl Fittable<DataFrame> for RegressionPipeline {
    fn fit(&mut self, x: &DataFrame, y: &Array1<f64>) -> Result<()> {
        if x.height() != y.len() {
            return Err(TabfitError::LengthMismatch {
                expected: x.height(),
                actual: y.len(),
            });
        }

        let features = self.preprocessor.fit_apply(x)?;
        self.estimator.fit(&features, y)?;
        self.is_fitted = true;
        Ok(())
    }
}

impl Predictive<DataFrame> for RegressionPipeline {
    fn predict(&self, x: &DataFrame) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(TabfitError::NotFitted);
        }
        let features = self.preprocessor.apply(x)?;
        self.estimator.predict(&features)
    }
}
