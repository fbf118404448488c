//! Estimator traits and the concrete estimator set

use super::decision_tree::DecisionTree;
use super::gradient_boosting::GradientBoostingRegressor;
use super::random_forest::RandomForestRegressor;
use crate::error::{TabfitError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Something that learns from inputs `X` and a real-valued target
pub trait Fittable<X: ?Sized> {
    fn fit(&mut self, x: &X, y: &Array1<f64>) -> Result<()>;
}

/// Something that maps inputs `X` to one prediction per row
pub trait Predictive<X: ?Sized> {
    fn predict(&self, x: &X) -> Result<Array1<f64>>;
}

/// A regression estimator built by a registry factory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Estimator {
    DecisionTree(DecisionTree),
    RandomForest(RandomForestRegressor),
    GradientBoosting(GradientBoostingRegressor),
}

impl Estimator {
    pub fn kind(&self) -> &'static str {
        match self {
            Estimator::DecisionTree(_) => "DecisionTree",
            Estimator::RandomForest(_) => "RandomForest",
            Estimator::GradientBoosting(_) => "GradientBoosting",
        }
    }
}

impl Fittable<Array2<f64>> for Estimator {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(TabfitError::LengthMismatch {
                expected: x.nrows(),
                actual: y.len(),
            });
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(TabfitError::NumericalError(
                "feature matrix contains NaN or infinite values".to_string(),
            ));
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(TabfitError::NumericalError(
                "target contains NaN or infinite values".to_string(),
            ));
        }

        match self {
            Estimator::DecisionTree(m) => m.fit(x, y).map(|_| ()),
            Estimator::RandomForest(m) => m.fit(x, y).map(|_| ()),
            Estimator::GradientBoosting(m) => m.fit(x, y),
        }
    }
}

impl Predictive<Array2<f64>> for Estimator {
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            Estimator::DecisionTree(m) => m.predict(x),
            Estimator::RandomForest(m) => m.predict(x),
            Estimator::GradientBoosting(m) => m.predict(x),
        }
    }
}
