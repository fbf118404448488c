//! Run context shared by every stage

use crate::config::RunConfig;
use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing::Span;

/// Project directory layout, resolved from a root directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub raw_data: PathBuf,
    pub processed_data: PathBuf,
    pub models: PathBuf,
    pub metrics: PathBuf,
    pub predictions: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            raw_data: root.join("data").join("raw_data"),
            processed_data: root.join("data").join("processed_data"),
            models: root.join("models"),
            metrics: root.join("metrics"),
            predictions: root.join("data").join("predictions.csv"),
            root,
        }
    }

    pub fn processed(&self, file_name: &str) -> PathBuf {
        self.processed_data.join(file_name)
    }

    pub fn best_pipeline(&self) -> PathBuf {
        self.models.join("best_pipeline.bin")
    }

    pub fn best_params(&self) -> PathBuf {
        self.models.join("best_params.json")
    }

    pub fn scores(&self) -> PathBuf {
        self.metrics.join("scores.json")
    }

    /// Default config location, `<root>/params.toml`
    pub fn params_file(&self) -> PathBuf {
        self.root.join("params.toml")
    }
}

/// Configuration, paths and the logging span of one run
#[derive(Debug, Clone)]
pub struct RunContext {
    pub config: RunConfig,
    pub paths: ProjectPaths,
    pub span: Span,
}

impl RunContext {
    pub fn new(config: RunConfig, paths: ProjectPaths) -> Self {
        let run_id = chrono::Utc::now().format("%Y%m%dT%H%M%S").to_string();
        let span = tracing::info_span!("run", run_id = %run_id);
        Self { config, paths, span }
    }

    /// Resolve paths under `root` and load the config, from `params` when
    /// given or `<root>/params.toml` otherwise
    pub fn load(root: &Path, params: Option<&Path>) -> Result<Self> {
        let paths = ProjectPaths::new(root);
        let params_file = params
            .map(Path::to_path_buf)
            .unwrap_or_else(|| paths.params_file());
        let config = RunConfig::load(&params_file)?;
        Ok(Self::new(config, paths))
    }

    /// Replace the config, keeping paths and span
    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }
}
