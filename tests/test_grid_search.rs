//! Integration test: grid search over stacking parameters

use ndarray::{s, Array1, Array2};
use stacking_ensemble::prelude::*;

fn iris_two_features() -> (Array2<f64>, Array1<f64>) {
    let iris = load_iris();
    (iris.data.slice(s![.., 1..3]).to_owned(), iris.target)
}

#[test]
fn test_grid_search_stacking() {
    let (x, y) = iris_two_features();
    let stack = StackingClassifier::new(
        vec![
            Box::new(RandomForestClassifier::default().with_random_state(1)),
            Box::new(GaussianNB::new()),
        ],
        Box::new(LogisticRegression::new()),
    );

    let mut grid = ParamGrid::new();
    grid.insert(
        "meta-logisticregression__C".to_string(),
        vec![ParamValue::Float(0.1), ParamValue::Float(10.0)],
    );
    grid.insert(
        "randomforestclassifier__n_estimators".to_string(),
        vec![ParamValue::Int(10), ParamValue::Int(50)],
    );

    let mut search = GridSearchCV::new(Box::new(stack), grid)
        .with_config(GridSearchConfig::new().with_cv_folds(5).with_refit(true));
    search.fit(&x, &y).unwrap();

    let results = search.cv_results();
    assert_eq!(results.len(), 4);

    let expected = [(0.1, 10), (0.1, 50), (10.0, 10), (10.0, 50)];
    for (result, (c, n)) in results.iter().zip(expected.iter()) {
        assert_eq!(result.params["meta-logisticregression__C"], ParamValue::Float(*c));
        assert_eq!(result.params["randomforestclassifier__n_estimators"], ParamValue::Int(*n));
        assert_eq!(result.split_scores.len(), 5);
        assert!(result.mean_test_score > 0.85, "{:?}", result);
        assert!((1..=4).contains(&result.rank_test_score));
    }
    assert!(results.iter().any(|r| r.rank_test_score == 1));

    let best_score = search.best_score().unwrap();
    assert!(results.iter().all(|r| r.mean_test_score <= best_score));
    let best_index = search.best_index().unwrap();
    assert_eq!(results[best_index].rank_test_score, 1);
    assert_eq!(search.best_params(), Some(&results[best_index].params));

    let best = search.best_estimator().unwrap();
    assert!(best.is_fitted());
    assert_eq!(
        best.get_params()["meta-logisticregression__C"],
        results[best_index].params["meta-logisticregression__C"]
    );

    let proba = search.predict_proba(&x).unwrap();
    assert_eq!(proba.dim(), (150, 3));
    for row in proba.rows() {
        assert!((row.sum() - 1.0).abs() < 1e-9);
    }
}

#[test]
fn test_grid_search_enumerated_names() {
    let (x, y) = iris_two_features();
    let stack = StackingClassifier::new(
        vec![
            Box::new(RandomForestClassifier::new(10).with_random_state(1)),
            Box::new(RandomForestClassifier::new(10).with_random_state(2)),
            Box::new(GaussianNB::new()),
        ],
        Box::new(LogisticRegression::new()),
    );

    let mut grid = ParamGrid::new();
    grid.insert("randomforestclassifier-1__n_estimators".to_string(), vec![ParamValue::Int(5), ParamValue::Int(10)]);
    grid.insert("randomforestclassifier-2__n_estimators".to_string(), vec![ParamValue::Int(5)]);
    grid.insert("meta-logisticregression__C".to_string(), vec![ParamValue::Float(10.0)]);

    let mut search = GridSearchCV::new(Box::new(stack), grid)
        .with_config(GridSearchConfig::new().with_cv_folds(3).with_parallel(false));
    search.fit(&x, &y).unwrap();

    assert_eq!(search.cv_results().len(), 2);
    assert!(search.best_score().unwrap() > 0.85);
    assert_eq!(search.predict(&x).unwrap().len(), 150);
}

#[test]
fn test_grid_search_rejects_unknown_key() {
    let (x, y) = iris_two_features();
    let stack = StackingClassifier::new(
        vec![Box::new(GaussianNB::new())],
        Box::new(LogisticRegression::new()),
    );

    let mut grid = ParamGrid::new();
    grid.insert("randomforestclassifier__n_estimators".to_string(), vec![ParamValue::Int(10)]);

    let mut search = GridSearchCV::new(Box::new(stack), grid);
    let err = search.fit(&x, &y).unwrap_err();
    assert!(matches!(err, EnsembleError::UnknownParameter { .. }));
    assert!(search.best_estimator().is_none());
}

#[test]
fn test_param_grid_from_json() {
    let grid: ParamGrid = serde_json::from_str(
        r#"{"meta-logisticregression__C": [0.1, 10.0], "use_probas": [true, false]}"#,
    )
    .unwrap();

    assert_eq!(grid["meta-logisticregression__C"], vec![ParamValue::Float(0.1), ParamValue::Float(10.0)]);
    assert_eq!(grid["use_probas"], vec![ParamValue::Bool(true), ParamValue::Bool(false)]);
}
