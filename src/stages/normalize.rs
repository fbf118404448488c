//! Standalone scaling of the split feature files

use super::{X_TEST, X_TEST_SCALED, X_TRAIN, X_TRAIN_SCALED};
use crate::context::RunContext;
use crate::error::Result;
use crate::preprocessing::{classify, Scaler, ScalerType};
use crate::utils::{DataLoader, DataSaver, StagedFiles};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct NormalizeOutcome {
    pub strategy: ScalerType,
    /// Columns that were scaled; everything else is copied unchanged
    pub scaled_columns: Vec<String>,
    pub written: Vec<PathBuf>,
}

/// Fit a scaler on the numeric columns of the training features and write
/// scaled copies of both feature files
pub fn run(ctx: &RunContext) -> Result<NormalizeOutcome> {
    let _guard = ctx.span.enter();
    let paths = &ctx.paths;
    let strategy = ctx.config.preprocessing.numeric_strategy;

    let loader = DataLoader::new();
    let train = loader.load_csv(&paths.processed(X_TRAIN))?;
    let test = loader.load_csv(&paths.processed(X_TEST))?;

    let numeric = classify(&train).numeric;
    let columns: Vec<&str> = numeric.iter().map(String::as_str).collect();

    info!(strategy = ?strategy, columns = columns.len(), "Normalizing features");

    let mut scaler = Scaler::new(strategy);
    let mut train_scaled = scaler.fit_transform(&train, &columns)?;
    let mut test_scaled = scaler.transform(&test)?;

    let mut staged = StagedFiles::new();
    staged.stage(&paths.processed(X_TRAIN_SCALED), &DataSaver::csv_bytes(&mut train_scaled)?)?;
    staged.stage(&paths.processed(X_TEST_SCALED), &DataSaver::csv_bytes(&mut test_scaled)?)?;
    let written = staged.commit()?;

    Ok(NormalizeOutcome {
        strategy,
        scaled_columns: numeric,
        written,
    })
}
