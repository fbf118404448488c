//! Cross-family model selection

use super::models::Fittable;
use super::pipeline::RegressionPipeline;
use super::registry::{FamilyEntry, HyperParams, ModelRegistry};
use super::search::{GridSearch, SearchSettings};
use crate::config::FamilySpec;
use crate::context::RunContext;
use crate::error::{TabfitError, Result};
use crate::preprocessing::ColumnTransformer;
use ndarray::Array1;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Best result of one searched family
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilySummary {
    pub family: String,
    pub best_score: f64,
    pub best_params: HyperParams,
    pub n_candidates: usize,
}

/// Winner of a selection run, refit on the full training data
#[derive(Debug, Clone)]
pub struct Selection {
    pub family: String,
    pub params: HyperParams,
    pub score: f64,
    /// Grid points evaluated across all families
    pub n_candidates: usize,
    /// One entry per family, in declaration order
    pub families: Vec<FamilySummary>,
    pub pipeline: RegressionPipeline,
}

/// Runs a grid search per family and keeps the overall best
pub struct ModelSelector<'a> {
    registry: &'a ModelRegistry,
    ctx: &'a RunContext,
}

impl<'a> ModelSelector<'a> {
    pub fn new(registry: &'a ModelRegistry, ctx: &'a RunContext) -> Self {
        Self { registry, ctx }
    }

    /// Search every family in declaration order and refit the winner.
    ///
    /// All family names and grids are checked before any search starts. A
    /// family replaces the running best only with a strictly greater score,
    /// so the first declared family wins ties.
    pub fn select(
        &self,
        families: &[FamilySpec],
        preprocessor: &ColumnTransformer,
        x: &DataFrame,
        y: &Array1<f64>,
    ) -> Result<Selection> {
        if families.is_empty() {
            return Err(TabfitError::NoCandidateFamilies);
        }

        let resolved: Vec<(&FamilySpec, &FamilyEntry)> = families
            .iter()
            .map(|spec| {
                let entry = self
                    .registry
                    .resolve(&spec.name)
                    .map_err(|e| e.in_family(&spec.name))?;
                entry
                    .validate_grid(&spec.params)
                    .map_err(|e| e.in_family(&spec.name))?;
                Ok((spec, entry))
            })
            .collect::<Result<_>>()?;

        let seed = self.ctx.config.random_seed;
        let search = GridSearch::new(SearchSettings::from_config(&self.ctx.config.grid_search, seed)?);

        let mut summaries = Vec::with_capacity(resolved.len());
        let mut best: Option<(usize, f64)> = None;

        for (idx, (spec, entry)) in resolved.iter().enumerate() {
            let result = search
                .search(preprocessor, entry, &spec.params, x, y)
                .map_err(|e| e.in_family(&spec.name))?;

            info!(
                family = %spec.name,
                best_score = result.best_score,
                best_params = %result.best_params,
                "Family searched"
            );

            if best.map_or(true, |(_, score)| result.best_score > score) {
                best = Some((idx, result.best_score));
            }
            summaries.push(FamilySummary {
                family: result.family,
                best_score: result.best_score,
                best_params: result.best_params,
                n_candidates: result.n_candidates,
            });
        }

        // Every search either errors or returns a finite best, so a winner exists
        let (winner_idx, score) = best.ok_or(TabfitError::NoCandidateFamilies)?;
        let (spec, entry) = resolved[winner_idx];
        let params = summaries[winner_idx].best_params.clone();

        info!(family = %spec.name, score, params = %params, "Selected model");

        let estimator = entry.build(&params, seed).map_err(|e| e.in_family(&spec.name))?;
        let mut pipeline = RegressionPipeline::new(preprocessor.clone(), estimator);
        search
            .settings()
            .thread_pool()?
            .install(|| pipeline.fit(x, y))
            .map_err(|e| e.in_family(&spec.name))?;

        Ok(Selection {
            family: spec.name.clone(),
            params,
            score,
            n_candidates: summaries.iter().map(|s| s.n_candidates).sum(),
            families: summaries,
            pipeline,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ParamValue, Parallelism, RunConfig};
    use crate::context::ProjectPaths;
    use crate::preprocessing::classify;
    use crate::training::models::Predictive;
    use polars::prelude::*;

    fn context() -> (RunContext, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RunConfig::default();
        config.grid_search.cv = 2;
        config.grid_search.n_jobs = Parallelism::Threads(2);
        (RunContext::new(config, ProjectPaths::new(dir.path())), dir)
    }

    fn data() -> (DataFrame, Array1<f64>) {
        let xs: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let y: Array1<f64> = xs.iter().map(|v| if *v < 10.0 { 1.0 } else { 5.0 }).collect();
        (df!("x" => &xs).unwrap(), y)
    }

    #[test]
    fn test_empty_family_list() {
        let (x, y) = data();
        let registry = ModelRegistry::with_defaults();
        let (ctx, _dir) = context();
        let err = ModelSelector::new(&registry, &ctx)
            .select(&[], &ColumnTransformer::build(&classify(&x)), &x, &y)
            .unwrap_err();
        assert!(matches!(err, TabfitError::NoCandidateFamilies));
    }

    #[test]
    fn test_unknown_family_fails_before_search() {
        let (x, y) = data();
        let registry = ModelRegistry::with_defaults();
        let (ctx, _dir) = context();
        let families = vec![
            FamilySpec::new("DecisionTree").with_param("max_depth", vec![ParamValue::Int(1)]),
            FamilySpec::new("Prophet").with_param("k", vec![ParamValue::Int(1)]),
        ];
        let err = ModelSelector::new(&registry, &ctx)
            .select(&families, &ColumnTransformer::build(&classify(&x)), &x, &y)
            .unwrap_err();
        match err {
            TabfitError::Family { family, source } => {
                assert_eq!(family, "Prophet");
                assert!(matches!(*source, TabfitError::UnknownModelFamily(_)));
            }
            other => panic!("unexpected error {}", other),
        }
    }

    #[test]
    fn test_winner_is_refit() {
        let (x, y) = data();
        let registry = ModelRegistry::with_defaults();
        let (ctx, _dir) = context();
        let families = vec![
            FamilySpec::new("DecisionTree").with_param("max_depth", vec![ParamValue::Int(1), ParamValue::Int(3)]),
            FamilySpec::new("GradientBoosting").with_param("n_estimators", vec![ParamValue::Int(5)]),
        ];

        let selection = ModelSelector::new(&registry, &ctx)
            .select(&families, &ColumnTransformer::build(&classify(&x)), &x, &y)
            .unwrap();

        assert_eq!(selection.families.len(), 2);
        assert_eq!(selection.n_candidates, 3);
        assert!(selection.pipeline.is_fitted());
        assert!(selection.score.is_finite());
        let pred = selection.pipeline.predict(&x).unwrap();
        assert_eq!(pred.len(), 20);
    }
}
