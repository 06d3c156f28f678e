use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use stacking_ensemble::prelude::*;

fn create_classification_data(n_rows: usize, n_features: usize, n_classes: usize) -> (Array2<f64>, Array1<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    // Class k is centred at k on every feature
    let y = Array1::from_shape_fn(n_rows, |i| (i % n_classes) as f64);
    let x = Array2::from_shape_fn((n_rows, n_features), |(i, _)| y[i] + rng.gen::<f64>() - 0.5);
    (x, y)
}

fn build_stack(config: StackingConfig) -> StackingClassifier {
    StackingClassifier::new(
        vec![
            Box::new(RandomForestClassifier::new(20).with_random_state(1)),
            Box::new(GaussianNB::new()),
            Box::new(LogisticRegression::new().with_max_iter(200)),
        ],
        Box::new(LogisticRegression::new()),
    )
    .with_config(config)
}

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("stacking_fit");
    group.sample_size(10);

    for n_rows in [300, 1000, 3000].iter() {
        let (x, y) = create_classification_data(*n_rows, 8, 3);

        group.bench_with_input(BenchmarkId::new("labels", n_rows), &(x.clone(), y.clone()), |b, (x, y)| {
            b.iter(|| {
                let mut stack = build_stack(StackingConfig::default());
                stack.fit(black_box(x), black_box(y)).unwrap()
            })
        });

        group.bench_with_input(BenchmarkId::new("out_of_fold", n_rows), &(x, y), |b, (x, y)| {
            b.iter(|| {
                let mut stack = build_stack(StackingConfig::new().with_use_probas(true).with_cv_folds(3));
                stack.fit(black_box(x), black_box(y)).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_predict(c: &mut Criterion) {
    let mut group = c.benchmark_group("stacking_predict");

    // Train once
    let (train_x, train_y) = create_classification_data(1000, 8, 3);
    let mut stack = build_stack(StackingConfig::new().with_use_probas(true).with_average_probas(false));
    stack.fit(&train_x, &train_y).unwrap();

    for n_rows in [100, 1000, 10000].iter() {
        let (x, _) = create_classification_data(*n_rows, 8, 3);

        group.bench_with_input(BenchmarkId::new("predict_proba", n_rows), &x, |b, x| {
            b.iter(|| stack.predict_proba(black_box(x)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fit, bench_predict);
criterion_main!(benches);
