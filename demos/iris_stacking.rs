//! Stacking on iris: cross-validated accuracy of the base classifiers and of
//! the stacked ensemble, followed by a small grid search.
//!
//! Run with `RUST_LOG=info cargo run --example iris_stacking`.

use ndarray::s;
use stacking_ensemble::prelude::*;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stacking_ensemble=info".into()),
        )
        .init();

    let iris = load_iris();
    let x = iris.data.slice(s![.., 1..3]).to_owned();
    let y = iris.target.clone();

    let rf = RandomForestClassifier::new(10).with_random_state(1);
    let nb = GaussianNB::new();
    let lr = LogisticRegression::new();

    let stack = StackingClassifier::new(
        vec![Box::new(rf.clone()), Box::new(nb.clone())],
        Box::new(lr.clone()),
    )
    .with_config(StackingConfig::new().with_use_probas(true).with_verbose(1));

    println!("3-fold cross validation:\n");
    let candidates: Vec<(&str, Box<dyn Classifier>)> = vec![
        ("Random Forest", Box::new(rf)),
        ("Naive Bayes", Box::new(nb)),
        ("Logistic Regression", Box::new(lr)),
        ("StackingClassifier", Box::new(stack.clone())),
    ];
    for (label, model) in &candidates {
        let scores = cross_val_score(model.as_ref(), &x, &y, 3)?;
        println!(
            "Accuracy: {:.2} (+/- {:.2}) [{}]",
            scores.mean_score, scores.std_score, label
        );
    }

    let mut grid = ParamGrid::new();
    grid.insert(
        "meta-logisticregression__C".to_string(),
        vec![ParamValue::Float(0.1), ParamValue::Float(10.0)],
    );
    grid.insert(
        "randomforestclassifier__n_estimators".to_string(),
        vec![ParamValue::Int(10), ParamValue::Int(50)],
    );

    let mut quiet = stack;
    quiet.set_param("verbose", &ParamValue::Int(0))?;
    let mut search = GridSearchCV::new(Box::new(quiet), grid)
        .with_config(GridSearchConfig::new().with_verbose(1));
    search.fit(&x, &y)?;

    println!("\nGrid search:\n");
    for result in search.cv_results() {
        println!(
            "{:.3} +/- {:.2} (rank {}) {:?}",
            result.mean_test_score, result.std_test_score, result.rank_test_score, result.params
        );
    }
    if let (Some(params), Some(score)) = (search.best_params(), search.best_score()) {
        println!("\nBest parameters: {:?}", params);
        println!("Accuracy: {:.2}", score);
    }

    Ok(())
}
