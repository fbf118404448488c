//! Exhaustive grid search scored by k-fold cross-validation

use super::cross_validation::{CVResults, CrossValidator};
use super::metrics::{check_lengths, mean_absolute_error, mean_squared_error, r2_score};
use super::models::{Fittable, Predictive};
use super::pipeline::RegressionPipeline;
use super::registry::{FamilyEntry, HyperParams};
use crate::config::{GridSearchConfig, ParamGrid, Parallelism};
use crate::error::{TabfitError, Result};
use crate::preprocessing::ColumnTransformer;
use ndarray::Array1;
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Cross-validation scoring rule; higher is always better
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scoring {
    #[default]
    NegMeanSquaredError,
    NegRootMeanSquaredError,
    NegMeanAbsoluteError,
    R2,
}

impl Scoring {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scoring::NegMeanSquaredError => "neg_mean_squared_error",
            Scoring::NegRootMeanSquaredError => "neg_root_mean_squared_error",
            Scoring::NegMeanAbsoluteError => "neg_mean_absolute_error",
            Scoring::R2 => "r2",
        }
    }

    pub fn score(&self, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
        check_lengths(y_true, y_pred)?;
        Ok(match self {
            Scoring::NegMeanSquaredError => -mean_squared_error(y_true, y_pred),
            Scoring::NegRootMeanSquaredError => -mean_squared_error(y_true, y_pred).sqrt(),
            Scoring::NegMeanAbsoluteError => -mean_absolute_error(y_true, y_pred),
            Scoring::R2 => r2_score(y_true, y_pred),
        })
    }
}

impl fmt::Display for Scoring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scoring {
    type Err = TabfitError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "neg_mean_squared_error" => Ok(Scoring::NegMeanSquaredError),
            "neg_root_mean_squared_error" => Ok(Scoring::NegRootMeanSquaredError),
            "neg_mean_absolute_error" => Ok(Scoring::NegMeanAbsoluteError),
            "r2" => Ok(Scoring::R2),
            other => Err(TabfitError::ConfigError(format!("unknown scoring '{}'", other))),
        }
    }
}

/// Knobs of one search run
#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub folds: usize,
    pub scoring: Scoring,
    pub parallelism: Parallelism,
    /// Seed for estimators and fold shuffling
    pub seed: u64,
    pub shuffle: bool,
    /// Wall-clock budget for one family
    pub budget: Option<Duration>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            folds: 5,
            scoring: Scoring::default(),
            parallelism: Parallelism::Auto,
            seed: 42,
            shuffle: false,
            budget: None,
        }
    }
}

impl SearchSettings {
    pub fn from_config(config: &GridSearchConfig, seed: u64) -> Result<Self> {
        Ok(Self {
            folds: config.cv,
            scoring: config.scoring,
            parallelism: config.n_jobs,
            seed,
            shuffle: config.shuffle,
            budget: config.budget()?,
        })
    }

    pub fn with_folds(mut self, folds: usize) -> Self {
        self.folds = folds;
        self
    }

    pub fn with_scoring(mut self, scoring: Scoring) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn with_parallelism(mut self, parallelism: Parallelism) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = Some(budget);
        self
    }

    /// A worker pool of the configured size
    pub fn thread_pool(&self) -> Result<rayon::ThreadPool> {
        let threads = match self.parallelism {
            Parallelism::Auto => 0,
            Parallelism::Threads(n) => n,
        };
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| TabfitError::ResourceError(format!("cannot build worker pool: {}", e)))
    }
}

/// Cross-validated score of one grid point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateScore {
    pub params: HyperParams,
    /// -inf when any fold failed
    pub mean_score: f64,
    pub std_score: f64,
    pub fold_scores: Vec<f64>,
}

/// Outcome of searching one family
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub family: String,
    pub best_params: HyperParams,
    pub best_score: f64,
    pub n_candidates: usize,
    /// Every grid point, in enumeration order
    pub candidates: Vec<CandidateScore>,
}

/// Every combination of a grid. Names iterate sorted and the last name
/// varies fastest.
pub fn enumerate_grid(grid: &ParamGrid) -> Vec<HyperParams> {
    let mut combos = vec![HyperParams::new()];
    for (name, values) in grid {
        combos = combos
            .iter()
            .flat_map(|prefix| {
                values.iter().map(move |value| {
                    let mut params = prefix.clone();
                    params.insert(name.clone(), value.clone());
                    params
                })
            })
            .collect();
    }
    combos
}

/// One cross-validation fold, sliced once and shared by all candidates
struct Fold {
    train_x: DataFrame,
    train_y: Array1<f64>,
    test_x: DataFrame,
    test_y: Array1<f64>,
}

impl Fold {
    fn slice(x: &DataFrame, y: &Array1<f64>, train: &[usize], test: &[usize]) -> Result<Self> {
        Ok(Self {
            train_x: take_rows(x, train)?,
            train_y: train.iter().map(|&i| y[i]).collect(),
            test_x: take_rows(x, test)?,
            test_y: test.iter().map(|&i| y[i]).collect(),
        })
    }
}

fn take_rows(x: &DataFrame, rows: &[usize]) -> Result<DataFrame> {
    let idx = IdxCa::from_vec("idx".into(), rows.iter().map(|&i| i as IdxSize).collect());
    Ok(x.take(&idx)?)
}

/// Grid search over one family
#[derive(Debug, Clone)]
pub struct GridSearch {
    settings: SearchSettings,
}

impl GridSearch {
    pub fn new(settings: SearchSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// Score every grid point and return the best one.
    ///
    /// (candidate, fold) pairs run on a worker pool of the configured size.
    /// Scores are gathered before aggregation, so results do not depend on
    /// completion order.
    pub fn search(
        &self,
        preprocessor: &ColumnTransformer,
        family: &FamilyEntry,
        grid: &ParamGrid,
        x: &DataFrame,
        y: &Array1<f64>,
    ) -> Result<SearchResult> {
        family.validate_grid(grid)?;
        if x.height() != y.len() {
            return Err(TabfitError::LengthMismatch {
                expected: x.height(),
                actual: y.len(),
            });
        }

        let candidates = enumerate_grid(grid);
        let mut splitter = CrossValidator::k_fold(self.settings.folds, self.settings.shuffle);
        if self.settings.shuffle {
            splitter = splitter.with_random_state(self.settings.seed);
        }
        let splits = splitter.split(x.height())?;

        info!(
            family = family.name(),
            candidates = candidates.len(),
            folds = splits.len(),
            scoring = %self.settings.scoring,
            "Starting grid search"
        );

        let folds: Vec<Fold> = splits
            .iter()
            .map(|s| Fold::slice(x, y, &s.train_indices, &s.test_indices))
            .collect::<Result<_>>()?;

        let jobs: Vec<(usize, usize)> = (0..candidates.len())
            .flat_map(|c| (0..folds.len()).map(move |f| (c, f)))
            .collect();

        let started = Instant::now();
        // A budget reaching past the end of the clock means no deadline
        let deadline = self.settings.budget.and_then(|b| started.checked_add(b));
        let pool = self.settings.thread_pool()?;

        let scores: Vec<f64> = pool.install(|| {
            jobs.par_iter()
                .map(|&(c, f)| {
                    if deadline.is_some_and(|d| Instant::now() >= d) {
                        return Err(TabfitError::ResourceError(format!(
                            "{} exceeded its search budget of {:.1}s",
                            family.name(),
                            self.settings.budget.map_or(0.0, |b| b.as_secs_f64())
                        )));
                    }
                    self.score_job(preprocessor, family, &candidates[c], &folds[f], f)
                })
                .collect::<Result<Vec<f64>>>()
        })?;

        let n_folds = folds.len();
        let candidate_scores: Vec<CandidateScore> = candidates
            .into_iter()
            .zip(scores.chunks(n_folds))
            .map(|(params, fold_scores)| {
                let cv = CVResults::from_scores(fold_scores.to_vec());
                CandidateScore {
                    params,
                    mean_score: cv.mean_score,
                    std_score: cv.std_score,
                    fold_scores: cv.scores,
                }
            })
            .collect();

        // Strictly greater, so the first enumerated candidate wins ties
        let mut best: Option<&CandidateScore> = None;
        for candidate in &candidate_scores {
            if candidate.mean_score.is_finite()
                && best.map_or(true, |b| candidate.mean_score > b.mean_score)
            {
                best = Some(candidate);
            }
        }
        let best = best.ok_or_else(|| TabfitError::NoViableCandidate(family.name().to_string()))?;

        info!(
            family = family.name(),
            best_score = best.mean_score,
            best_params = %best.params,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Grid search finished"
        );

        Ok(SearchResult {
            family: family.name().to_string(),
            best_params: best.params.clone(),
            best_score: best.mean_score,
            n_candidates: candidate_scores.len(),
            candidates: candidate_scores,
        })
    }

    /// Fit a fresh pipeline on one fold and score it on the held-out rows.
    /// Recoverable failures score negative infinity.
    fn score_job(
        &self,
        preprocessor: &ColumnTransformer,
        family: &FamilyEntry,
        params: &HyperParams,
        fold: &Fold,
        fold_idx: usize,
    ) -> Result<f64> {
        let outcome = family.build(params, self.settings.seed).and_then(|estimator| {
            let mut pipeline = RegressionPipeline::new(preprocessor.clone(), estimator);
            pipeline.fit(&fold.train_x, &fold.train_y)?;
            let pred = pipeline.predict(&fold.test_x)?;
            let score = self.settings.scoring.score(&fold.test_y, &pred)?;
            if score.is_finite() {
                Ok(score)
            } else {
                Err(TabfitError::NumericalError(format!("non-finite score {}", score)))
            }
        });

        match outcome {
            Ok(score) => {
                debug!(family = family.name(), params = %params, fold = fold_idx, score, "Scored fold");
                Ok(score)
            }
            Err(e) if e.is_recoverable() => {
                warn!(
                    family = family.name(),
                    params = %params,
                    fold = fold_idx,
                    error = %e,
                    "Candidate failed, scoring as -inf"
                );
                Ok(f64::NEG_INFINITY)
            }
            Err(e) => Err(e),
        }
    }
}
