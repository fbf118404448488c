//! Integration tests for the batch stages over a temporary project directory

use std::fs;
use tabfit::context::RunContext;
use tabfit::stages::{self, X_TEST, X_TEST_SCALED, X_TRAIN, X_TRAIN_SCALED, Y_TEST, Y_TRAIN};
use tabfit::training::{ModelRegistry, Predictive, RegressionPipeline};
use tabfit::utils::DataLoader;
use tabfit::TabfitError;
use tempfile::TempDir;

const PARAMS: &str = r#"
random_seed = 7

[split]
test_size = 0.25

[preprocessing]
numeric_strategy = "robust"

[grid_search]
cv = 3
n_jobs = 2

[[models]]
name = "DecisionTree"
[models.params]
max_depth = [2, "none"]

[[models]]
name = "RandomForest"
[models.params]
n_estimators = [5]
max_depth = [4]
"#;

/// A project root with `params.toml` and a raw CSV, removed when the guard drops
fn project() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("data").join("raw_data")).unwrap();
    fs::write(root.join("params.toml"), PARAMS).unwrap();

    let mut csv = String::from("area,rooms,zone,price\n");
    for i in 0..40 {
        let zone = ["north", "south", "east"][i % 3];
        let area = 40 + (i * 7) % 90;
        let rooms = 1 + i % 4;
        let price = area as f64 * 2.5 + rooms as f64 * 10.0 + if zone == "east" { 30.0 } else { 0.0 };
        csv.push_str(&format!("{},{},{},{}\n", area, rooms, zone, price));
    }
    fs::write(root.join("data").join("raw_data").join("houses.csv"), csv).unwrap();
    dir
}

#[test]
fn test_full_run() {
    let dir = project();
    let root = dir.path();
    let ctx = RunContext::load(root, None).unwrap();
    let registry = ModelRegistry::with_defaults();

    let summary = stages::run_all(&ctx, &registry).unwrap();

    assert_eq!(summary.split.target, "price");
    assert_eq!(summary.split.test_rows, 10);
    assert_eq!(summary.split.train_rows, 30);
    assert_eq!(summary.normalize.scaled_columns, vec!["area", "rooms"]);
    assert_eq!(summary.training.n_candidates, 3);
    assert_eq!(summary.training.cv_folds, 3);
    assert_eq!(summary.evaluation.rows, 10);

    for file in [X_TRAIN, X_TEST, Y_TRAIN, Y_TEST, X_TRAIN_SCALED, X_TEST_SCALED] {
        assert!(ctx.paths.processed(file).is_file(), "{} missing", file);
    }
    assert!(ctx.paths.best_pipeline().is_file());
    assert!(ctx.paths.predictions.is_file());

    let pipeline = RegressionPipeline::load(&ctx.paths.best_pipeline()).unwrap();
    let x_test = DataLoader::new().load_csv(&ctx.paths.processed(X_TEST)).unwrap();
    assert_eq!(pipeline.predict(&x_test).unwrap().len(), 10);

}

#[test]
fn test_split_is_reproducible() {
    let dir = project();
    let root = dir.path();
    let ctx = RunContext::load(root, None).unwrap();

    stages::split::run(&ctx).unwrap();
    let first = fs::read(ctx.paths.processed(X_TRAIN)).unwrap();
    stages::split::run(&ctx).unwrap();
    let second = fs::read(ctx.paths.processed(X_TRAIN)).unwrap();
    assert_eq!(first, second);

    let mut config = ctx.config.clone();
    config.random_seed = 8;
    let reseeded = ctx.clone().with_config(config);
    stages::split::run(&reseeded).unwrap();
    let third = fs::read(ctx.paths.processed(X_TRAIN)).unwrap();
    assert_ne!(first, third);

}

#[test]
fn test_training_metadata_file() {
    let dir = project();
    let root = dir.path();
    let ctx = RunContext::load(root, None).unwrap();
    stages::split::run(&ctx).unwrap();
    let metadata = stages::train::run(&ctx, &ModelRegistry::with_defaults()).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(ctx.paths.best_params()).unwrap()).unwrap();
    assert_eq!(json["model_name"], metadata.model_name.as_str());
    assert_eq!(json["scoring"], "neg_mean_squared_error");
    assert_eq!(json["cv_folds"], 3);
    assert_eq!(json["families"].as_array().unwrap().len(), 2);
    assert!(json["best_score"].as_f64().unwrap().is_finite());
    assert!(json["trained_at"].as_str().is_some());

}

#[test]
fn test_evaluate_writes_scores() {
    let dir = project();
    let root = dir.path();
    let ctx = RunContext::load(root, None).unwrap();
    stages::split::run(&ctx).unwrap();
    stages::train::run(&ctx, &ModelRegistry::with_defaults()).unwrap();
    stages::evaluate::run(&ctx).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(ctx.paths.scores()).unwrap()).unwrap();
    let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
    for key in ["mse", "rmse", "mae", "r2", "mape"] {
        assert!(keys.contains(&key), "{} missing", key);
    }

    let predictions = DataLoader::new().load_csv(&ctx.paths.predictions).unwrap();
    assert_eq!(predictions.height(), 10);
    for column in ["y_true", "y_pred", "error"] {
        assert!(predictions.column(column).is_ok());
    }

}

#[test]
fn test_train_without_families_writes_nothing() {
    let dir = project();
    let root = dir.path();
    fs::write(root.join("params.toml"), "random_seed = 1\n").unwrap();
    let ctx = RunContext::load(root, None).unwrap();
    stages::split::run(&ctx).unwrap();

    let err = stages::train::run(&ctx, &ModelRegistry::with_defaults()).unwrap_err();
    assert!(matches!(err, TabfitError::NoCandidateFamilies));
    assert!(!ctx.paths.best_pipeline().exists());
    assert!(!ctx.paths.best_params().exists());

}

#[test]
fn test_missing_raw_data() {
    let dir = project();
    let root = dir.path();
    fs::remove_dir_all(root.join("data").join("raw_data")).unwrap();
    let ctx = RunContext::load(root, None).unwrap();

    let err = stages::split::run(&ctx).unwrap_err();
    assert!(matches!(err, TabfitError::IoError(_)));

}

#[test]
fn test_bad_params_file_names_the_file() {
    let dir = project();
    let root = dir.path();
    fs::write(root.join("params.toml"), "[split]\ntest_size = 1.5\n").unwrap();

    let err = RunContext::load(root, None).unwrap_err();
    assert!(matches!(err, TabfitError::ConfigError(_)));
    assert!(err.to_string().contains("params.toml"));

}
