//! Run configuration loaded from `params.toml`

use crate::error::{TabfitError, Result};
use crate::preprocessing::ScalerType;
use crate::training::Scoring;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// One candidate value of a hyperparameter.
///
/// The string `"none"` stands for an unset optional parameter such as an
/// unbounded `max_depth`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    pub fn is_none(&self) -> bool {
        matches!(self, ParamValue::Str(s) if s.eq_ignore_ascii_case("none"))
    }

    /// Short type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "bool",
            ParamValue::Int(_) => "int",
            ParamValue::Float(_) => "float",
            ParamValue::Str(_) => "string",
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Str(v) => write!(f, "{}", v),
        }
    }
}

/// Parameter name to candidate values. Names iterate in sorted order.
pub type ParamGrid = BTreeMap<String, Vec<ParamValue>>;

/// A model family to search, with its grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilySpec {
    pub name: String,
    #[serde(default)]
    pub params: ParamGrid,
}

impl FamilySpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: ParamGrid::new(),
        }
    }

    /// Add a parameter with its candidate values
    pub fn with_param(mut self, name: impl Into<String>, values: Vec<ParamValue>) -> Self {
        self.params.insert(name.into(), values);
        self
    }
}

/// Worker pool size for the search
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ParallelismRepr", into = "ParallelismRepr")]
pub enum Parallelism {
    /// Let rayon pick (one thread per core)
    #[default]
    Auto,
    Threads(usize),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ParallelismRepr {
    Count(i64),
    Name(String),
}

impl TryFrom<ParallelismRepr> for Parallelism {
    type Error = String;

    fn try_from(repr: ParallelismRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            ParallelismRepr::Name(name) if name.eq_ignore_ascii_case("auto") => Ok(Parallelism::Auto),
            // -1 is the customary spelling of "all cores"
            ParallelismRepr::Count(-1) => Ok(Parallelism::Auto),
            ParallelismRepr::Count(n) if n >= 1 => Ok(Parallelism::Threads(n as usize)),
            ParallelismRepr::Count(n) => Err(format!("n_jobs must be \"auto\" or >= 1, got {}", n)),
            ParallelismRepr::Name(name) => {
                Err(format!("n_jobs must be \"auto\" or >= 1, got \"{}\"", name))
            }
        }
    }
}

impl From<Parallelism> for ParallelismRepr {
    fn from(p: Parallelism) -> Self {
        match p {
            Parallelism::Auto => ParallelismRepr::Name("auto".to_string()),
            Parallelism::Threads(n) => ParallelismRepr::Count(n as i64),
        }
    }
}

/// Train/test split settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Fraction of rows held out for testing
    pub test_size: f64,
    pub shuffle: bool,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            shuffle: true,
        }
    }
}

/// Settings of the standalone normalize stage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingSettings {
    pub numeric_strategy: ScalerType,
}

impl Default for PreprocessingSettings {
    fn default() -> Self {
        Self {
            numeric_strategy: ScalerType::Standard,
        }
    }
}

/// Cross-validated grid search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSearchConfig {
    /// Number of folds
    pub cv: usize,
    pub scoring: Scoring,
    pub n_jobs: Parallelism,
    /// Shuffle rows (seeded) before cutting folds
    pub shuffle: bool,
    /// Wall-clock budget per family, in seconds
    pub family_budget_secs: Option<f64>,
}

impl Default for GridSearchConfig {
    fn default() -> Self {
        Self {
            cv: 5,
            scoring: Scoring::default(),
            n_jobs: Parallelism::Auto,
            shuffle: false,
            family_budget_secs: None,
        }
    }
}

impl GridSearchConfig {
    /// Per-family wall-clock budget. Values that do not fit a `Duration`
    /// are rejected.
    pub fn budget(&self) -> Result<Option<Duration>> {
        self.family_budget_secs
            .map(|secs| match Duration::try_from_secs_f64(secs) {
                Ok(budget) if secs > 0.0 => Ok(budget),
                _ => Err(TabfitError::ConfigError(format!(
                    "grid_search.family_budget_secs must be a positive number of seconds, got {}",
                    secs
                ))),
            })
            .transpose()
    }
}

/// Everything a run reads from `params.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub random_seed: u64,
    pub split: SplitConfig,
    pub preprocessing: PreprocessingSettings,
    pub grid_search: GridSearchConfig,
    pub models: Vec<FamilySpec>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            random_seed: 42,
            split: SplitConfig::default(),
            preprocessing: PreprocessingSettings::default(),
            grid_search: GridSearchConfig::default(),
            models: Vec::new(),
        }
    }
}

impl RunConfig {
    /// Load and validate a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text).map_err(|e| match e {
            TabfitError::ConfigError(msg) => {
                TabfitError::ConfigError(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Parse and validate TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let test_size = self.split.test_size;
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(TabfitError::ConfigError(format!(
                "split.test_size must be in (0, 1), got {}",
                test_size
            )));
        }

        if self.grid_search.cv < 2 {
            return Err(TabfitError::ConfigError(format!(
                "grid_search.cv must be at least 2, got {}",
                self.grid_search.cv
            )));
        }

        self.grid_search.budget()?;

        if let Some(unnamed) = self.models.iter().position(|m| m.name.trim().is_empty()) {
            return Err(TabfitError::ConfigError(format!(
                "models[{}] has an empty name",
                unnamed
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunConfig::from_toml("").unwrap();
        assert_eq!(config.random_seed, 42);
        assert_eq!(config.grid_search.cv, 5);
        assert_eq!(config.grid_search.n_jobs, Parallelism::Auto);
        assert!(config.models.is_empty());
    }

    #[test]
    fn test_full_file() {
        let text = r#"
random_seed = 7

[split]
test_size = 0.25

[preprocessing]
numeric_strategy = "robust"

[grid_search]
cv = 3
scoring = "r2"
n_jobs = 2

[[models]]
name = "RandomForest"
[models.params]
n_estimators = [50, 100]
max_depth = ["none", 10]
max_features = ["sqrt", 0.5]
bootstrap = [true]
"#;
        let config = RunConfig::from_toml(text).unwrap();
        assert_eq!(config.random_seed, 7);
        assert_eq!(config.preprocessing.numeric_strategy, ScalerType::Robust);
        assert_eq!(config.grid_search.scoring, Scoring::R2);
        assert_eq!(config.grid_search.n_jobs, Parallelism::Threads(2));

        let rf = &config.models[0];
        assert_eq!(rf.params["n_estimators"], vec![ParamValue::Int(50), ParamValue::Int(100)]);
        assert!(rf.params["max_depth"][0].is_none());
        assert_eq!(rf.params["max_features"][1], ParamValue::Float(0.5));
        assert_eq!(rf.params["bootstrap"][0], ParamValue::Bool(true));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(RunConfig::from_toml("[grid_search]\ncv = 1").is_err());
        assert!(RunConfig::from_toml("[split]\ntest_size = 1.5").is_err());
        assert!(RunConfig::from_toml("[grid_search]\nn_jobs = 0").is_err());
        assert!(RunConfig::from_toml("[grid_search]\nscoring = \"accuracy\"").is_err());
        assert!(RunConfig::from_toml("[preprocessing]\nnumeric_strategy = \"log\"").is_err());
        assert!(RunConfig::from_toml("[grid_search]\nfamily_budget_secs = 0.0").is_err());
        assert!(RunConfig::from_toml("[grid_search]\nfamily_budget_secs = nan").is_err());
    }

    #[test]
    fn test_budget_too_large_for_duration() {
        let err = RunConfig::from_toml("[grid_search]\nfamily_budget_secs = 1e30").unwrap_err();
        assert!(matches!(err, TabfitError::ConfigError(ref msg) if msg.contains("family_budget_secs")));

        let config = RunConfig::from_toml("[grid_search]\nfamily_budget_secs = 90.5").unwrap();
        assert_eq!(config.grid_search.budget().unwrap(), Some(Duration::from_secs_f64(90.5)));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.toml");
        let config = RunConfig::load(&path).unwrap();
        assert_eq!(config.split.test_size, 0.2);
    }
}
