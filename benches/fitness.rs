use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use featsel::prelude::*;
use ndarray::Array2;
use rand::prelude::*;

fn create_dataset(n_rows: usize, n_features: usize) -> SharedDataset<InMemoryDataset> {
    let mut rng = StdRng::seed_from_u64(42);

    let x = Array2::from_shape_fn((n_rows, n_features), |_| rng.gen::<f64>());
    let y = Array2::from_shape_fn((n_rows, 1), |(i, _)| {
        x.row(i).iter().sum::<f64>() * 0.1 + rng.gen::<f64>() * 0.01
    });

    let mut dataset = InMemoryDataset::new(x, y, Some(42)).unwrap();
    dataset.shuffle(SplitRatio::default()).unwrap();
    SharedDataset::new(dataset).unwrap()
}

fn bench_subset_fitness(c: &mut Criterion) {
    let mut group = c.benchmark_group("subset_fitness");
    group.sample_size(10);

    for n_rows in [200, 1000].iter() {
        let data = create_dataset(*n_rows, 8);
        let config = SubsetFitnessConfig::new()
            .with_hidden_layers(vec![LayerSpec::new(8, Activation::Tanh)])
            .with_max_epochs(50);
        let fitness =
            FeatureSubsetFitness::new(data, MlpFactory::new(Some(7)), config).unwrap();
        let candidate: ColumnIndexMap = [("a", 0), ("b", 3), ("c", 5)].into_iter().collect();

        group.bench_with_input(
            BenchmarkId::new("evaluate", n_rows),
            &candidate,
            |b, candidate| {
                b.iter(|| {
                    fitness
                        .evaluate(black_box(candidate), &WorkerContext::single())
                        .unwrap()
                })
            },
        );
    }

    group.finish();
}

fn bench_metrics(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let y_hat: Vec<f64> = (0..10_000).map(|_| rng.gen::<f64>()).collect();
    let y: Vec<f64> = (0..10_000).map(|_| rng.gen::<f64>()).collect();

    c.bench_function("rmse_10k", |b| {
        b.iter(|| rmse(black_box(&y_hat), black_box(&y)).unwrap())
    });
    c.bench_function("median_absolute_error_10k", |b| {
        b.iter(|| median_absolute_error(black_box(&y_hat), black_box(&y)).unwrap())
    });
}

criterion_group!(benches, bench_subset_fitness, bench_metrics);
criterion_main!(benches);
