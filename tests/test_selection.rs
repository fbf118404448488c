//! Integration tests for grid search and cross-family model selection

use ndarray::Array1;
use polars::prelude::*;
use tabfit::config::{FamilySpec, ParamValue, Parallelism, RunConfig};
use tabfit::context::{ProjectPaths, RunContext};
use tabfit::preprocessing::{classify, ColumnTransformer};
use tabfit::training::{
    DecisionTree, Estimator, GridSearch, ModelRegistry, ModelSelector, ParamKind, Predictive,
    RegressionPipeline, SearchSettings,
};
use tabfit::TabfitError;
use tempfile::TempDir;

fn dataset(n: usize) -> (DataFrame, Array1<f64>) {
    let zones = ["north", "south", "east"];
    let a: Vec<f64> = (0..n).map(|i| (i % 10) as f64).collect();
    let b: Vec<f64> = (0..n).map(|i| ((i * 7) % 13) as f64 / 2.0).collect();
    let zone: Vec<&str> = (0..n).map(|i| zones[i % 3]).collect();
    let y: Array1<f64> = (0..n)
        .map(|i| 2.0 * a[i] + b[i] + if zone[i] == "east" { 5.0 } else { 0.0 })
        .collect();

    let df = df!("a" => &a, "b" => &b, "zone" => &zone).unwrap();
    (df, y)
}

/// The directory guard must outlive the context
fn context(folds: usize, parallelism: Parallelism) -> (RunContext, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = RunConfig::default();
    config.grid_search.cv = folds;
    config.grid_search.n_jobs = parallelism;
    (RunContext::new(config, ProjectPaths::new(dir.path())), dir)
}

fn depth_grid(name: &str, depths: &[i64]) -> FamilySpec {
    FamilySpec::new(name).with_param(
        "max_depth",
        depths.iter().map(|d| ParamValue::Int(*d)).collect(),
    )
}

/// Registry with two families that build identical trees
fn twin_registry() -> ModelRegistry {
    let mut registry = ModelRegistry::new();
    for name in ["Alpha", "Beta"] {
        registry.register(name, &[("max_depth", ParamKind::OptionalInt)], |p, seed| {
            Ok(Estimator::DecisionTree(
                DecisionTree::new()
                    .with_max_depth(p.opt_usize_or("max_depth", None)?)
                    .with_random_state(seed),
            ))
        });
    }
    registry
}

// ============================================================================
// End to end
// ============================================================================

#[test]
fn test_two_families_end_to_end() {
    let (x, y) = dataset(40);
    let classification = classify(&x);
    assert_eq!(classification.numeric.len(), 2);
    assert_eq!(classification.categorical.len(), 1);

    let registry = ModelRegistry::with_defaults();
    let (ctx, _dir) = context(2, Parallelism::Auto);
    let families = vec![
        FamilySpec::new("RandomForest")
            .with_param("n_estimators", vec![ParamValue::Int(5), ParamValue::Int(10)])
            .with_param("max_depth", vec![ParamValue::Int(4)]),
        depth_grid("DecisionTree", &[2, 5]),
    ];

    let selection = ModelSelector::new(&registry, &ctx)
        .select(&families, &ColumnTransformer::build(&classification), &x, &y)
        .unwrap();

    assert_eq!(selection.n_candidates, 4);
    assert_eq!(selection.families.len(), 2);
    assert!(selection.score.is_finite());
    assert!(families.iter().any(|f| f.name == selection.family));

    let single = df!("a" => &[4.0], "b" => &[1.5], "zone" => &["east"]).unwrap();
    let pred = selection.pipeline.predict(&single).unwrap();
    assert_eq!(pred.len(), 1);
    assert!(pred[0].is_finite());
}

#[test]
fn test_artifact_round_trip() {
    let (x, y) = dataset(30);
    let registry = ModelRegistry::with_defaults();
    let (ctx, _dir) = context(3, Parallelism::Threads(2));
    let families = vec![FamilySpec::new("GradientBoosting")
        .with_param("n_estimators", vec![ParamValue::Int(20)])
        .with_param("learning_rate", vec![ParamValue::Float(0.2)])];

    let selection = ModelSelector::new(&registry, &ctx)
        .select(&families, &ColumnTransformer::build(&classify(&x)), &x, &y)
        .unwrap();

    let bytes = selection.pipeline.to_bytes().unwrap();
    let restored = RegressionPipeline::from_bytes(&bytes).unwrap();
    assert_eq!(restored.predict(&x).unwrap(), selection.pipeline.predict(&x).unwrap());
}

// ============================================================================
// Ordering and determinism
// ============================================================================

#[test]
fn test_tie_goes_to_first_declared_family() {
    let (x, y) = dataset(24);
    let registry = twin_registry();
    let (ctx, _dir) = context(3, Parallelism::Threads(1));
    let pre = ColumnTransformer::build(&classify(&x));

    let forward = vec![depth_grid("Alpha", &[3]), depth_grid("Beta", &[3])];
    let selection = ModelSelector::new(&registry, &ctx).select(&forward, &pre, &x, &y).unwrap();
    assert_eq!(selection.families[0].best_score, selection.families[1].best_score);
    assert_eq!(selection.family, "Alpha");

    let reversed = vec![depth_grid("Beta", &[3]), depth_grid("Alpha", &[3])];
    let selection = ModelSelector::new(&registry, &ctx).select(&reversed, &pre, &x, &y).unwrap();
    assert_eq!(selection.family, "Beta");
}

#[test]
fn test_search_is_deterministic_across_pool_sizes() {
    let (x, y) = dataset(36);
    let registry = ModelRegistry::with_defaults();
    let family = registry.resolve("RandomForest").unwrap();
    let grid = FamilySpec::new("RandomForest")
        .with_param("n_estimators", vec![ParamValue::Int(4), ParamValue::Int(8)])
        .with_param("max_features", vec![ParamValue::Str("sqrt".into())])
        .params;
    let pre = ColumnTransformer::build(&classify(&x));

    let run = |parallelism| {
        let settings = SearchSettings::default()
            .with_folds(3)
            .with_shuffle(true)
            .with_seed(11)
            .with_parallelism(parallelism);
        GridSearch::new(settings).search(&pre, family, &grid, &x, &y).unwrap()
    };

    let serial = run(Parallelism::Threads(1));
    let parallel = run(Parallelism::Threads(4));
    let again = run(Parallelism::Threads(1));

    let scores = |r: &tabfit::training::SearchResult| -> Vec<Vec<f64>> {
        r.candidates.iter().map(|c| c.fold_scores.clone()).collect()
    };
    assert_eq!(scores(&serial), scores(&parallel));
    assert_eq!(scores(&serial), scores(&again));
    assert_eq!(serial.best_params, parallel.best_params);
}

// ============================================================================
// Failure policy
// ============================================================================

#[test]
fn test_family_without_viable_candidate_aborts_run() {
    let (x, y) = dataset(20);
    let registry = ModelRegistry::with_defaults();
    let (ctx, _dir) = context(2, Parallelism::Auto);
    let families = vec![
        depth_grid("DecisionTree", &[3]),
        FamilySpec::new("GradientBoosting").with_param("learning_rate", vec![ParamValue::Float(-0.5)]),
    ];

    let err = ModelSelector::new(&registry, &ctx)
        .select(&families, &ColumnTransformer::build(&classify(&x)), &x, &y)
        .unwrap_err();

    match err {
        TabfitError::Family { family, source } => {
            assert_eq!(family, "GradientBoosting");
            assert!(matches!(*source, TabfitError::NoViableCandidate(_)));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_empty_grid_is_rejected_upfront() {
    let (x, y) = dataset(20);
    let registry = ModelRegistry::with_defaults();
    let (ctx, _dir) = context(2, Parallelism::Auto);
    let families = vec![depth_grid("DecisionTree", &[3]), FamilySpec::new("RandomForest")];

    let err = ModelSelector::new(&registry, &ctx)
        .select(&families, &ColumnTransformer::build(&classify(&x)), &x, &y)
        .unwrap_err();
    assert!(matches!(
        err,
        TabfitError::Family { ref source, .. } if matches!(**source, TabfitError::EmptySearchSpace(_))
    ));
}

#[test]
fn test_unrecoverable_factory_error_is_fatal() {
    let (x, y) = dataset(20);
    let mut registry = ModelRegistry::new();
    registry.register("Broken", &[("k", ParamKind::Int)], |_, _| {
        Err(TabfitError::DataError("factory cannot build".to_string()))
    });
    let (ctx, _dir) = context(2, Parallelism::Auto);
    let families = vec![FamilySpec::new("Broken").with_param("k", vec![ParamValue::Int(1)])];

    let err = ModelSelector::new(&registry, &ctx)
        .select(&families, &ColumnTransformer::build(&classify(&x)), &x, &y)
        .unwrap_err();
    assert!(matches!(
        err,
        TabfitError::Family { ref source, .. } if matches!(**source, TabfitError::DataError(_))
    ));
}

#[test]
fn test_target_length_mismatch() {
    let (x, _) = dataset(20);
    let y = Array1::zeros(19);
    let registry = ModelRegistry::with_defaults();
    let (ctx, _dir) = context(2, Parallelism::Auto);

    let err = ModelSelector::new(&registry, &ctx)
        .select(&[depth_grid("DecisionTree", &[2])], &ColumnTransformer::build(&classify(&x)), &x, &y)
        .unwrap_err();
    assert!(matches!(
        err,
        TabfitError::Family { ref source, .. }
            if matches!(**source, TabfitError::LengthMismatch { expected: 20, actual: 19 })
    ));
}
