//! CSV loading and saving, and all-or-nothing file output

use crate::error::{TabfitError, Result};
use ndarray::Array1;
use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

/// Rows scanned to infer column dtypes
const INFER_SCHEMA_LENGTH: usize = 1000;

/// Reads tables and targets from CSV files
#[derive(Debug, Clone, Default)]
pub struct DataLoader;

impl DataLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a CSV file with a header row
    pub fn load_csv(&self, path: &Path) -> Result<DataFrame> {
        if !path.is_file() {
            return Err(TabfitError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )));
        }

        let df = CsvReadOptions::default()
            .with_infer_schema_length(Some(INFER_SCHEMA_LENGTH))
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;
        Ok(df)
    }

    /// Load a target vector: the first column of a CSV file
    pub fn load_target(&self, path: &Path) -> Result<Array1<f64>> {
        let df = self.load_csv(path)?;
        let column = df.get_columns().first().ok_or_else(|| {
            TabfitError::DataError(format!("{} has no columns", path.display()))
        })?;
        column_to_target(column)
    }
}

/// Convert a numeric column to a target vector; nulls are rejected
pub fn column_to_target(column: &Column) -> Result<Array1<f64>> {
    let series = column
        .as_materialized_series()
        .cast(&DataType::Float64)
        .map_err(|e| TabfitError::DataError(format!("target '{}': {}", column.name(), e)))?;
    let ca = series.f64()?;

    if ca.null_count() > 0 {
        return Err(TabfitError::DataError(format!(
            "target '{}' has {} missing values",
            column.name(),
            ca.null_count()
        )));
    }

    Ok(ca.into_no_null_iter().collect())
}

/// Serializes tables and targets to CSV
pub struct DataSaver;

impl DataSaver {
    /// CSV bytes of a table, header included
    pub fn csv_bytes(df: &mut DataFrame) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        CsvWriter::new(&mut buffer).include_header(true).finish(df)?;
        Ok(buffer)
    }
}

/// Distinguishes the temporary files of concurrent writers in one process
static STAGE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Hidden sibling of `path` unique to this process and call
fn unique_sibling(path: &Path, suffix: &str) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let seq = STAGE_SEQ.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{}.{}.{}.{}", file_name, std::process::id(), seq, suffix))
}

/// Files written to temporary siblings and moved into place together.
///
/// Nothing reaches its final path until [`StagedFiles::commit`]; dropping an
/// uncommitted set removes its temporary files. A failed commit puts back
/// whatever the targets held before.
#[derive(Debug, Default)]
pub struct StagedFiles {
    staged: Vec<(PathBuf, PathBuf)>,
}

/// A target already moved into place, with the file it replaced
struct Replaced {
    path: PathBuf,
    backup: Option<PathBuf>,
}

impl StagedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `bytes` to a temporary file next to `path`
    pub fn stage(&mut self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = unique_sibling(path, "tmp");
        self.staged.push((tmp.clone(), path.to_path_buf()));
        fs::write(&tmp, bytes)?;
        Ok(())
    }

    /// Move every staged file into place, in staging order.
    ///
    /// Existing targets are set aside first. If any move fails, targets
    /// already replaced get their previous contents back and the error is
    /// returned.
    pub fn commit(mut self) -> Result<Vec<PathBuf>> {
        let mut replaced: Vec<Replaced> = Vec::with_capacity(self.staged.len());

        for (tmp, path) in &self.staged {
            let backup = if path.is_file() {
                let backup = unique_sibling(path, "bak");
                if let Err(e) = fs::rename(path, &backup) {
                    restore(&replaced);
                    return Err(e.into());
                }
                Some(backup)
            } else {
                None
            };

            let moved = fs::rename(tmp, path);
            replaced.push(Replaced {
                path: path.clone(),
                backup,
            });
            if let Err(e) = moved {
                restore(&replaced);
                return Err(e.into());
            }
        }

        for entry in &replaced {
            if let Some(backup) = &entry.backup {
                let _ = fs::remove_file(backup);
            }
        }
        self.staged.clear();
        Ok(replaced.into_iter().map(|r| r.path).collect())
    }
}

/// Undo a partial commit, newest first
fn restore(replaced: &[Replaced]) {
    for entry in replaced.iter().rev() {
        let outcome = match &entry.backup {
            Some(backup) => fs::rename(backup, &entry.path),
            None => match fs::remove_file(&entry.path) {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                other => other,
            },
        };
        if let Err(e) = outcome {
            warn!(path = %entry.path.display(), error = %e, "Could not restore file after failed commit");
        }
    }
}

impl Drop for StagedFiles {
    fn drop(&mut self) {
        for (tmp, _) in &self.staged {
            let _ = fs::remove_file(tmp);
        }
    }
}
