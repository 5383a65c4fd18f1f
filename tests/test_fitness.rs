//! Integration test: fitness evaluation end-to-end

use featsel::prelude::*;
use ndarray::Array2;

/// Four-column dataset where columns 0 and 2 carry the signal
/// (target = 2*x0 + x2) and columns 1 and 3 are uncorrelated noise.
fn signal_and_noise_dataset(n_rows: usize) -> SharedDataset<InMemoryDataset> {
    let x = Array2::from_shape_fn((n_rows, 4), |(i, j)| match j {
        0 => i as f64 * 0.01,
        1 => (i as f64 * 1.7).sin() * 0.3,
        2 => (i % 7) as f64 * 0.1,
        _ => (i as f64 * 0.9).cos() * 0.2,
    });
    let y = Array2::from_shape_fn((n_rows, 1), |(i, _)| {
        i as f64 * 0.01 * 2.0 + (i % 7) as f64 * 0.1
    });

    let mut dataset = InMemoryDataset::new(x, y, Some(42)).unwrap();
    dataset.shuffle(SplitRatio::default()).unwrap();
    SharedDataset::new(dataset).unwrap()
}

fn subset_fitness(
    data: SharedDataset<InMemoryDataset>,
) -> FeatureSubsetFitness<InMemoryDataset, MlpFactory> {
    let config = SubsetFitnessConfig::new()
        .with_hidden_layers(vec![LayerSpec::new(8, Activation::Tanh)])
        .with_learning_rate(0.01)
        .with_max_epochs(200);
    FeatureSubsetFitness::new(data, MlpFactory::new(Some(7)), config).unwrap()
}

#[test]
fn test_subset_evaluation_returns_finite_fitness() {
    let fitness = subset_fitness(signal_and_noise_dataset(60));
    let candidate: ColumnIndexMap = [("a", 0), ("c", 2)].into_iter().collect();

    let result = fitness.evaluate(&candidate, &WorkerContext::single());
    assert!(result.is_ok(), "evaluation should succeed: {:?}", result.err());

    let value = result.unwrap();
    assert!(value.is_finite() && value >= 0.0);
}

#[test]
fn test_identical_evaluations_reproduce() {
    let fitness = subset_fitness(signal_and_noise_dataset(60));
    let candidate: ColumnIndexMap = [("a", 0), ("c", 2)].into_iter().collect();
    let worker = WorkerContext::new(3, 4).unwrap();

    let first = fitness.evaluate(&candidate, &worker).unwrap();
    let second = fitness.evaluate(&candidate, &worker).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_informative_subset_beats_noise_subset() {
    let fitness = subset_fitness(signal_and_noise_dataset(80));

    let informative: ColumnIndexMap = [("a", 0), ("c", 2)].into_iter().collect();
    let noise_only: ColumnIndexMap = [("b", 1), ("d", 3)].into_iter().collect();

    let signal_rmse = fitness
        .evaluate(&informative, &WorkerContext::single())
        .unwrap();
    let noise_rmse = fitness
        .evaluate(&noise_only, &WorkerContext::single())
        .unwrap();

    assert!(
        signal_rmse < noise_rmse,
        "signal columns ({}) should score better than noise columns ({})",
        signal_rmse,
        noise_rmse
    );
}

#[test]
fn test_empty_mapping_fails_before_training() {
    let data = signal_and_noise_dataset(60);
    let config = SubsetFitnessConfig::new().with_shuffle(true);
    let fitness = FeatureSubsetFitness::new(data.clone(), MlpFactory::new(Some(7)), config).unwrap();

    let err = fitness
        .evaluate(&ColumnIndexMap::new(), &WorkerContext::single())
        .unwrap_err();
    assert!(matches!(err, FeatselError::EmptyFeatureSetError));

    // failed fast: not even the reshuffle side effect happened
    assert_eq!(data.version(), 0);
}

#[test]
fn test_out_of_range_column_fails() {
    let fitness = subset_fitness(signal_and_noise_dataset(60));
    let candidate: ColumnIndexMap = [("a", 99)].into_iter().collect();

    let err = fitness
        .evaluate(&candidate, &WorkerContext::single())
        .unwrap_err();
    assert!(matches!(err, FeatselError::ShapeOrTypeError(_)));
}

#[test]
fn test_shuffling_config_bumps_snapshot_version() {
    let data = signal_and_noise_dataset(60);
    let config = SubsetFitnessConfig::new()
        .with_shuffle(true)
        .with_split_ratio(SplitRatio::new(0.6, 0.25, 0.15).unwrap())
        .with_hidden_layers(vec![LayerSpec::new(4, Activation::Tanh)])
        .with_max_epochs(20);
    let fitness = FeatureSubsetFitness::new(data.clone(), MlpFactory::new(Some(7)), config).unwrap();

    let candidate: ColumnIndexMap = [("a", 0)].into_iter().collect();
    assert_eq!(data.version(), 0);

    fitness
        .evaluate(&candidate, &WorkerContext::single())
        .unwrap();
    assert_eq!(data.version(), 1);

    fitness
        .evaluate(&candidate, &WorkerContext::single())
        .unwrap();
    assert_eq!(data.version(), 2);
}

#[test]
fn test_population_evaluation_across_worker_pool() {
    let fitness = subset_fitness(signal_and_noise_dataset(60));

    let candidates: Vec<ColumnIndexMap> = vec![
        [("a", 0)].into_iter().collect(),
        [("c", 2)].into_iter().collect(),
        [("a", 0), ("c", 2)].into_iter().collect(),
        ColumnIndexMap::new(), // fails without poisoning the batch
        [("b", 1), ("d", 3)].into_iter().collect(),
    ];

    let results = evaluate_population(&fitness, &candidates, 2).unwrap();
    assert_eq!(results.len(), 5);

    for (i, result) in results.iter().enumerate() {
        if i == 3 {
            assert!(matches!(
                result.as_ref().unwrap_err(),
                FeatselError::EmptyFeatureSetError
            ));
        } else {
            assert!(result.is_ok(), "candidate {} failed: {:?}", i, result);
        }
    }
}

#[test]
fn test_cancelled_evaluation_reports_cancelled() {
    let token = CancelToken::new();
    token.cancel();

    let fitness = subset_fitness(signal_and_noise_dataset(60)).with_cancel(token);
    let candidate: ColumnIndexMap = [("a", 0)].into_iter().collect();

    let err = fitness
        .evaluate(&candidate, &WorkerContext::single())
        .unwrap_err();
    assert!(matches!(err, FeatselError::Cancelled));
}

#[test]
fn test_hyperparameter_fitness_scores_candidate() {
    let data = signal_and_noise_dataset(60);
    let fitness =
        HyperparameterFitness::new(data, MlpFactory::new(Some(7)), HyperFitnessConfig::new())
            .unwrap();

    let candidate = HyperparameterSet::new(
        0.01,
        150,
        0.9,
        vec![LayerSpec::new(8, Activation::Tanh)],
    );
    let value = fitness
        .evaluate(&candidate, &WorkerContext::single())
        .unwrap();
    assert!(value.is_finite() && value >= 0.0);
}

#[test]
fn test_hyperparameter_fitness_rejects_invalid_candidate() {
    let data = signal_and_noise_dataset(60);
    let fitness =
        HyperparameterFitness::new(data, MlpFactory::new(Some(7)), HyperFitnessConfig::new())
            .unwrap();

    let candidate = HyperparameterSet::new(0.0, 150, 0.9, Vec::new());
    let err = fitness
        .evaluate(&candidate, &WorkerContext::single())
        .unwrap_err();
    assert!(matches!(err, FeatselError::InvalidParameter { .. }));
}
