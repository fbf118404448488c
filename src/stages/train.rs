//! Model selection over the training split and artifact persistence

use super::{X_TRAIN, Y_TRAIN};
use crate::context::RunContext;
use crate::error::Result;
use crate::preprocessing::{classify, ColumnTransformer};
use crate::training::{FamilySummary, HyperParams, ModelRegistry, ModelSelector, Scoring};
use crate::utils::{DataLoader, StagedFiles};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

/// Contents of `best_params.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingMetadata {
    pub model_name: String,
    pub best_params: HyperParams,
    pub best_score: f64,
    pub scoring: Scoring,
    pub cv_folds: usize,
    pub n_candidates: usize,
    pub n_features_out: usize,
    pub families: Vec<FamilySummary>,
    /// RFC 3339 timestamp
    pub trained_at: String,
}

/// Select the best model on the training split and persist it together with
/// its metadata. Nothing is written unless both serialize.
pub fn run(ctx: &RunContext, registry: &ModelRegistry) -> Result<TrainingMetadata> {
    let _guard = ctx.span.enter();
    let paths = &ctx.paths;

    let loader = DataLoader::new();
    let x = loader.load_csv(&paths.processed(X_TRAIN))?;
    let y = loader.load_target(&paths.processed(Y_TRAIN))?;

    let classification = classify(&x);
    info!(
        rows = x.height(),
        numeric = classification.numeric.len(),
        categorical = classification.categorical.len(),
        families = ctx.config.models.len(),
        "Training"
    );

    let preprocessor = ColumnTransformer::build(&classification);
    let selection = ModelSelector::new(registry, ctx).select(&ctx.config.models, &preprocessor, &x, &y)?;

    let metadata = TrainingMetadata {
        model_name: selection.family.clone(),
        best_params: selection.params.clone(),
        best_score: selection.score,
        scoring: ctx.config.grid_search.scoring,
        cv_folds: ctx.config.grid_search.cv,
        n_candidates: selection.n_candidates,
        n_features_out: selection.pipeline.n_features_out(),
        families: selection.families.clone(),
        trained_at: chrono::Utc::now().to_rfc3339(),
    };

    let artifact = selection.pipeline.to_bytes()?;
    let metadata_json = serde_json::to_string_pretty(&metadata)?;

    let mut staged = StagedFiles::new();
    staged.stage(&paths.best_pipeline(), &artifact)?;
    staged.stage(&paths.best_params(), metadata_json.as_bytes())?;
    let written: Vec<PathBuf> = staged.commit()?;

    for path in &written {
        info!(path = %path.display(), "Wrote artifact");
    }

    Ok(metadata)
}
