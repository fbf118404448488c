//! Test-set evaluation of the persisted pipeline

use super::{X_TEST, Y_TEST};
use crate::context::RunContext;
use crate::error::{TabfitError, Result};
use crate::training::{compute, Metric, MetricsReport, Predictive, RegressionPipeline};
use crate::utils::{DataLoader, DataSaver, StagedFiles};
use ndarray::Array1;
use polars::prelude::*;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct Evaluation {
    pub rows: usize,
    pub metrics: MetricsReport,
    pub written: Vec<PathBuf>,
}

/// Test features with `y_true`, `y_pred` and `error = y_true - y_pred`
/// appended
pub fn predictions_frame(x: &DataFrame, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<DataFrame> {
    if y_true.len() != y_pred.len() || x.height() != y_true.len() {
        return Err(TabfitError::LengthMismatch {
            expected: x.height(),
            actual: y_pred.len(),
        });
    }

    let error: Vec<f64> = y_true.iter().zip(y_pred.iter()).map(|(t, p)| t - p).collect();
    let mut frame = x.clone();
    frame.with_column(Series::new("y_true".into(), y_true.to_vec()))?;
    frame.with_column(Series::new("y_pred".into(), y_pred.to_vec()))?;
    frame.with_column(Series::new("error".into(), error))?;
    Ok(frame)
}

/// Score the saved pipeline on the test split, then write the predictions
/// table and the metrics JSON
pub fn run(ctx: &RunContext) -> Result<Evaluation> {
    let _guard = ctx.span.enter();
    let paths = &ctx.paths;

    let pipeline = RegressionPipeline::load(&paths.best_pipeline())?;
    let loader = DataLoader::new();
    let x = loader.load_csv(&paths.processed(X_TEST))?;
    let y = loader.load_target(&paths.processed(Y_TEST))?;

    let y_pred = pipeline.predict(&x)?;
    let metrics = compute(&y, &y_pred, &Metric::ALL)?;

    for (metric, value) in metrics.iter() {
        info!(metric = %metric, value, "Test metric");
    }

    let mut predictions = predictions_frame(&x, &y, &y_pred)?;
    let scores_json = serde_json::to_string_pretty(&metrics)?;

    let mut staged = StagedFiles::new();
    staged.stage(&paths.predictions, &DataSaver::csv_bytes(&mut predictions)?)?;
    staged.stage(&paths.scores(), scores_json.as_bytes())?;
    let written = staged.commit()?;

    info!(rows = x.height(), path = %paths.scores().display(), "Evaluation written");

    Ok(Evaluation {
        rows: x.height(),
        metrics,
        written,
    })
}
