//! Model family registry
//!
//! Maps a family name to the parameters it accepts and a factory that turns
//! one grid point into an untrained [`Estimator`].

use super::decision_tree::{DecisionTree, MaxFeatures};
use super::gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
use super::models::Estimator;
use super::random_forest::RandomForestRegressor;
use crate::config::{ParamGrid, ParamValue};
use crate::error::{TabfitError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// One concrete assignment of hyperparameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HyperParams(BTreeMap<String, ParamValue>);

impl HyperParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: ParamValue) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn usize_or(&self, name: &str, default: usize) -> Result<usize> {
        match self.get(name) {
            None => Ok(default),
            Some(ParamValue::Int(v)) => non_negative(name, *v),
            Some(other) => Err(wrong_type(name, "int", other)),
        }
    }

    /// An int, or `"none"` for unset
    pub fn opt_usize_or(&self, name: &str, default: Option<usize>) -> Result<Option<usize>> {
        match self.get(name) {
            None => Ok(default),
            Some(v) if v.is_none() => Ok(None),
            Some(ParamValue::Int(v)) => non_negative(name, *v).map(Some),
            Some(other) => Err(wrong_type(name, "int or \"none\"", other)),
        }
    }

    pub fn f64_or(&self, name: &str, default: f64) -> Result<f64> {
        match self.get(name) {
            None => Ok(default),
            Some(ParamValue::Float(v)) => Ok(*v),
            Some(ParamValue::Int(v)) => Ok(*v as f64),
            Some(other) => Err(wrong_type(name, "float", other)),
        }
    }

    pub fn bool_or(&self, name: &str, default: bool) -> Result<bool> {
        match self.get(name) {
            None => Ok(default),
            Some(ParamValue::Bool(v)) => Ok(*v),
            Some(other) => Err(wrong_type(name, "bool", other)),
        }
    }

    pub fn max_features_or(&self, name: &str, default: MaxFeatures) -> Result<MaxFeatures> {
        match self.get(name) {
            None => Ok(default),
            Some(ParamValue::Str(s)) => match s.to_ascii_lowercase().as_str() {
                "sqrt" => Ok(MaxFeatures::Sqrt),
                "log2" => Ok(MaxFeatures::Log2),
                "all" | "auto" | "none" => Ok(MaxFeatures::All),
                _ => Err(wrong_type(name, "sqrt, log2, all, float or int", &ParamValue::Str(s.clone()))),
            },
            Some(ParamValue::Float(f)) => Ok(MaxFeatures::Fraction(*f)),
            Some(ParamValue::Int(n)) => non_negative(name, *n).map(MaxFeatures::Fixed),
            Some(other) => Err(wrong_type(name, "sqrt, log2, all, float or int", other)),
        }
    }
}

impl fmt::Display for HyperParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

fn non_negative(name: &str, value: i64) -> Result<usize> {
    usize::try_from(value).map_err(|_| TabfitError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: "must not be negative".to_string(),
    })
}

fn wrong_type(name: &str, expected: &str, got: &ParamValue) -> TabfitError {
    TabfitError::ConfigError(format!(
        "parameter '{}' expects {}, got {} '{}'",
        name,
        expected,
        got.type_name(),
        got
    ))
}

/// Value type a family parameter accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Int,
    /// Int or `"none"`
    OptionalInt,
    /// Float; ints are widened
    Float,
    Bool,
    /// `"sqrt"`, `"log2"`, `"all"`, a fraction or a count
    MaxFeatures,
}

impl ParamKind {
    pub fn accepts(&self, value: &ParamValue) -> bool {
        match (self, value) {
            (ParamKind::Int, ParamValue::Int(_)) => true,
            (ParamKind::OptionalInt, ParamValue::Int(_)) => true,
            (ParamKind::OptionalInt, v) => v.is_none(),
            (ParamKind::Float, ParamValue::Float(_) | ParamValue::Int(_)) => true,
            (ParamKind::Bool, ParamValue::Bool(_)) => true,
            (ParamKind::MaxFeatures, ParamValue::Float(_) | ParamValue::Int(_)) => true,
            (ParamKind::MaxFeatures, ParamValue::Str(s)) => {
                matches!(s.to_ascii_lowercase().as_str(), "sqrt" | "log2" | "all" | "auto" | "none")
            }
            _ => false,
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            ParamKind::Int => "int",
            ParamKind::OptionalInt => "int or \"none\"",
            ParamKind::Float => "float",
            ParamKind::Bool => "bool",
            ParamKind::MaxFeatures => "sqrt, log2, all, float or int",
        }
    }
}

/// Builds an untrained estimator from one grid point and the run seed
pub type Factory = Arc<dyn Fn(&HyperParams, u64) -> Result<Estimator> + Send + Sync>;

/// A registered model family
#[derive(Clone)]
pub struct FamilyEntry {
    name: String,
    accepted: Vec<(String, ParamKind)>,
    factory: Factory,
}

impl fmt::Debug for FamilyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FamilyEntry")
            .field("name", &self.name)
            .field("accepted", &self.accepted)
            .finish()
    }
}

impl FamilyEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Accepted parameter names, in registration order
    pub fn accepted_params(&self) -> impl Iterator<Item = &str> {
        self.accepted.iter().map(|(name, _)| name.as_str())
    }

    /// Build an untrained estimator
    pub fn build(&self, params: &HyperParams, seed: u64) -> Result<Estimator> {
        (self.factory)(params, seed)
    }

    /// Check a grid against this family's parameters.
    ///
    /// Unknown names and wrongly typed values are configuration errors.
    /// Value ranges are left to the estimator and surface at fit time.
    pub fn validate_grid(&self, grid: &ParamGrid) -> Result<()> {
        if grid.is_empty() {
            return Err(TabfitError::EmptySearchSpace(self.name.clone()));
        }

        for (param, values) in grid {
            let kind = self
                .accepted
                .iter()
                .find(|(name, _)| name == param)
                .map(|(_, kind)| *kind)
                .ok_or_else(|| {
                    let known: Vec<&str> = self.accepted_params().collect();
                    TabfitError::ConfigError(format!(
                        "{} does not accept parameter '{}' (accepted: {})",
                        self.name,
                        param,
                        known.join(", ")
                    ))
                })?;

            if values.is_empty() {
                return Err(TabfitError::EmptySearchSpace(format!(
                    "{} (parameter '{}' has no values)",
                    self.name, param
                )));
            }

            if let Some(bad) = values.iter().find(|v| !kind.accepts(v)) {
                return Err(TabfitError::ConfigError(format!(
                    "{}: parameter '{}' expects {}, got {} '{}'",
                    self.name,
                    param,
                    kind.describe(),
                    bad.type_name(),
                    bad
                )));
            }
        }

        Ok(())
    }
}

/// Name to family table
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    entries: Vec<FamilyEntry>,
}

impl ModelRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with RandomForest, GradientBoosting and DecisionTree
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        registry.register(
            "RandomForest",
            &[
                ("n_estimators", ParamKind::Int),
                ("max_depth", ParamKind::OptionalInt),
                ("min_samples_split", ParamKind::Int),
                ("min_samples_leaf", ParamKind::Int),
                ("max_features", ParamKind::MaxFeatures),
                ("bootstrap", ParamKind::Bool),
            ],
            |p, seed| {
                let model = RandomForestRegressor::new(p.usize_or("n_estimators", 100)?)
                    .with_max_depth(p.opt_usize_or("max_depth", None)?)
                    .with_min_samples_split(p.usize_or("min_samples_split", 2)?)
                    .with_min_samples_leaf(p.usize_or("min_samples_leaf", 1)?)
                    .with_max_features(p.max_features_or("max_features", MaxFeatures::All)?)
                    .with_bootstrap(p.bool_or("bootstrap", true)?)
                    .with_random_state(seed);
                Ok(Estimator::RandomForest(model))
            },
        );

        registry.register(
            "GradientBoosting",
            &[
                ("n_estimators", ParamKind::Int),
                ("learning_rate", ParamKind::Float),
                ("max_depth", ParamKind::Int),
                ("min_samples_split", ParamKind::Int),
                ("min_samples_leaf", ParamKind::Int),
                ("subsample", ParamKind::Float),
                ("colsample_bytree", ParamKind::Float),
            ],
            |p, seed| {
                let defaults = GradientBoostingConfig::default();
                let config = GradientBoostingConfig {
                    n_estimators: p.usize_or("n_estimators", defaults.n_estimators)?,
                    learning_rate: p.f64_or("learning_rate", defaults.learning_rate)?,
                    max_depth: p.usize_or("max_depth", defaults.max_depth)?,
                    min_samples_split: p.usize_or("min_samples_split", defaults.min_samples_split)?,
                    min_samples_leaf: p.usize_or("min_samples_leaf", defaults.min_samples_leaf)?,
                    subsample: p.f64_or("subsample", defaults.subsample)?,
                    colsample_bytree: p.f64_or("colsample_bytree", defaults.colsample_bytree)?,
                    random_state: Some(seed),
                };
                Ok(Estimator::GradientBoosting(GradientBoostingRegressor::new(config)))
            },
        );

        registry.register(
            "DecisionTree",
            &[
                ("max_depth", ParamKind::OptionalInt),
                ("min_samples_split", ParamKind::Int),
                ("min_samples_leaf", ParamKind::Int),
                ("max_features", ParamKind::MaxFeatures),
            ],
            |p, seed| {
                let model = DecisionTree::new()
                    .with_max_depth(p.opt_usize_or("max_depth", None)?)
                    .with_min_samples_split(p.usize_or("min_samples_split", 2)?)
                    .with_min_samples_leaf(p.usize_or("min_samples_leaf", 1)?)
                    .with_max_features(p.max_features_or("max_features", MaxFeatures::All)?)
                    .with_random_state(seed);
                Ok(Estimator::DecisionTree(model))
            },
        );

        registry
    }

    /// Add a family, replacing any entry with the same name
    pub fn register<F>(&mut self, name: &str, accepted: &[(&str, ParamKind)], factory: F) -> &mut Self
    where
        F: Fn(&HyperParams, u64) -> Result<Estimator> + Send + Sync + 'static,
    {
        let entry = FamilyEntry {
            name: name.to_string(),
            accepted: accepted.iter().map(|(n, k)| (n.to_string(), *k)).collect(),
            factory: Arc::new(factory),
        };

        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
        self
    }

    /// Look up a family by exact name
    pub fn resolve(&self, name: &str) -> Result<&FamilyEntry> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| TabfitError::UnknownModelFamily(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }
}
