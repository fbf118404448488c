//! Batch stages of a run
//!
//! Each stage reads its inputs from the project layout in a [`RunContext`],
//! logs inside the context's span and writes its outputs all-or-nothing.
//!
//! - [`split`] - raw CSV to train/test feature and target files
//! - [`normalize`] - standalone scaled copies of the feature files
//! - [`train`] - model selection and the persisted pipeline
//! - [`evaluate`] - test-set predictions and metrics

pub mod evaluate;
pub mod normalize;
pub mod split;
pub mod train;

use crate::context::RunContext;
use crate::error::Result;
use crate::training::ModelRegistry;

pub use evaluate::Evaluation;
pub use normalize::NormalizeOutcome;
pub use split::SplitOutcome;
pub use train::TrainingMetadata;

pub const X_TRAIN: &str = "X_train.csv";
pub const X_TEST: &str = "X_test.csv";
pub const Y_TRAIN: &str = "y_train.csv";
pub const Y_TEST: &str = "y_test.csv";
pub const X_TRAIN_SCALED: &str = "X_train_scaled.csv";
pub const X_TEST_SCALED: &str = "X_test_scaled.csv";

/// Outputs of a full run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub split: SplitOutcome,
    pub normalize: NormalizeOutcome,
    pub training: TrainingMetadata,
    pub evaluation: Evaluation,
}

/// Run split, normalize, train and evaluate in order
pub fn run_all(ctx: &RunContext, registry: &ModelRegistry) -> Result<RunSummary> {
    let split = split::run(ctx)?;
    let normalize = normalize::run(ctx)?;
    let training = train::run(ctx, registry)?;
    let evaluation = evaluate::run(ctx)?;

    Ok(RunSummary {
        split,
        normalize,
        training,
        evaluation,
    })
}
