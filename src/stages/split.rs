//! Train/test split of the raw dataset

use super::{X_TEST, X_TRAIN, Y_TEST, Y_TRAIN};
use crate::context::RunContext;
use crate::error::{TabfitError, Result};
use crate::utils::{DataLoader, DataSaver, StagedFiles};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::{Path, PathBuf};
use tracing::info;

/// What the split stage read and wrote
#[derive(Debug, Clone)]
pub struct SplitOutcome {
    pub source: PathBuf,
    pub target: String,
    pub train_rows: usize,
    pub test_rows: usize,
    pub written: Vec<PathBuf>,
}

/// First `*.csv` file in `dir`, by file name
pub fn find_raw_csv(dir: &Path) -> Result<PathBuf> {
    let not_found = || {
        TabfitError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no CSV file in {}", dir.display()),
        ))
    };

    if !dir.is_dir() {
        return Err(not_found());
    }

    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();
    candidates.sort();

    candidates.into_iter().next().ok_or_else(not_found)
}

/// Row indices of the test and train sides, in that order
pub fn split_indices(n_rows: usize, test_size: f64, shuffle: bool, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    let n_test = (test_size * n_rows as f64).ceil() as usize;
    if n_test == 0 || n_test >= n_rows {
        return Err(TabfitError::DataError(format!(
            "test_size {} leaves an empty side with {} rows",
            test_size, n_rows
        )));
    }

    let mut indices: Vec<usize> = (0..n_rows).collect();
    if shuffle {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        indices.shuffle(&mut rng);
    }

    let train = indices.split_off(n_test);
    Ok((indices, train))
}

fn take(df: &DataFrame, rows: &[usize]) -> Result<DataFrame> {
    let idx = IdxCa::from_vec("idx".into(), rows.iter().map(|&i| i as IdxSize).collect());
    Ok(df.take(&idx)?)
}

/// Split the raw dataset into train and test files. The last column is the
/// target.
pub fn run(ctx: &RunContext) -> Result<SplitOutcome> {
    let _guard = ctx.span.enter();
    let paths = &ctx.paths;
    let settings = &ctx.config.split;

    let source = find_raw_csv(&paths.raw_data)?;
    let df = DataLoader::new().load_csv(&source)?;
    if df.width() < 2 {
        return Err(TabfitError::DataError(format!(
            "{} needs at least one feature and a target column, found {} columns",
            source.display(),
            df.width()
        )));
    }

    let target = df
        .get_column_names()
        .last()
        .map(|name| name.to_string())
        .ok_or_else(|| TabfitError::DataError(format!("{} has no columns", source.display())))?;

    info!(
        source = %source.display(),
        rows = df.height(),
        target = %target,
        "Splitting dataset"
    );

    let (test_rows, train_rows) =
        split_indices(df.height(), settings.test_size, settings.shuffle, ctx.config.random_seed)?;

    let features = df.drop(&target)?;
    let labels = df.select([target.as_str()])?;

    let mut staged = StagedFiles::new();
    for (name, frame, rows) in [
        (X_TRAIN, &features, &train_rows),
        (X_TEST, &features, &test_rows),
        (Y_TRAIN, &labels, &train_rows),
        (Y_TEST, &labels, &test_rows),
    ] {
        let mut part = take(frame, rows)?;
        staged.stage(&paths.processed(name), &DataSaver::csv_bytes(&mut part)?)?;
    }
    let written = staged.commit()?;

    info!(train = train_rows.len(), test = test_rows.len(), "Split written");

    Ok(SplitOutcome {
        source,
        target,
        train_rows: train_rows.len(),
        test_rows: test_rows.len(),
        written,
    })
}
