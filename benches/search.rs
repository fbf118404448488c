use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array1;
use polars::prelude::*;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use tabfit::config::{ParamGrid, ParamValue, Parallelism};
use tabfit::preprocessing::{classify, ColumnTransformer};
use tabfit::training::{GridSearch, ModelRegistry, SearchSettings};

fn create_regression_data(n_rows: usize, n_features: usize) -> (DataFrame, Array1<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(0);

    let columns: Vec<Vec<f64>> = (0..n_features)
        .map(|_| (0..n_rows).map(|_| rng.gen::<f64>() * 10.0).collect())
        .collect();

    // Target is the sum of features plus noise
    let target: Array1<f64> = (0..n_rows)
        .map(|i| columns.iter().map(|c| c[i]).sum::<f64>() + rng.gen::<f64>() * 0.1)
        .collect();

    let series: Vec<Column> = columns
        .into_iter()
        .enumerate()
        .map(|(i, values)| Column::new(format!("feature_{}", i).into(), values))
        .collect();

    (DataFrame::new(series).unwrap(), target)
}

fn bench_grid_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_search");
    group.sample_size(10);

    let registry = ModelRegistry::with_defaults();
    let family = registry.resolve("DecisionTree").unwrap();
    let mut grid = ParamGrid::new();
    grid.insert(
        "max_depth".to_string(),
        vec![ParamValue::Int(3), ParamValue::Int(6), ParamValue::Str("none".into())],
    );
    grid.insert(
        "min_samples_leaf".to_string(),
        vec![ParamValue::Int(1), ParamValue::Int(5)],
    );

    for n_rows in [500, 2000].iter() {
        let (x, y) = create_regression_data(*n_rows, 8);
        let pre = ColumnTransformer::build(&classify(&x));

        for threads in [1usize, 4] {
            let settings = SearchSettings::default()
                .with_folds(5)
                .with_parallelism(Parallelism::Threads(threads));
            let search = GridSearch::new(settings);

            group.bench_with_input(
                BenchmarkId::new(format!("decision_tree_{}t", threads), n_rows),
                &(x.clone(), y.clone()),
                |b, (x, y)| {
                    b.iter(|| search.search(&pre, family, &grid, black_box(x), black_box(y)).unwrap())
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_grid_search);
criterion_main!(benches);
