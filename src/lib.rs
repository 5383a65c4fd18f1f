//! featsel - Fitness evaluation core for evolutionary model search
//!
//! This crate provides the cost-function side of a feature-subset selector
//! driven by an external evolutionary optimizer (genetic algorithm or
//! bee-colony style):
//!
//! - [`metrics`] - Scalar error metrics (RMSE, MAE, median absolute error, R²)
//! - [`data`] - Data partitions, column selection, versioned shared snapshots
//! - [`model`] - Feed-forward model collaborator seam and reference MLP
//! - [`fitness`] - Optimizer-facing cost functions and worker-pool fan-out
//!
//! The optimizer driver, the model's training internals and the dataset
//! manager are collaborators behind traits; reference implementations of the
//! latter two ([`model::MlpTrainer`], [`data::InMemoryDataset`]) are
//! included.

pub mod data;
pub mod error;
pub mod fitness;
pub mod metrics;
pub mod model;

pub use error::{FeatselError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::data::{
        ColumnIndexMap, DataProvider, DataSplit, InMemoryDataset, SharedDataset, SplitRatio,
        SplitSnapshot,
    };
    pub use crate::error::{FeatselError, Result};
    pub use crate::fitness::{
        evaluate_population, CostFunction, FeatureSubsetFitness, HyperFitnessConfig,
        HyperparameterFitness, HyperparameterSet, SubsetFitnessConfig, WorkerContext,
    };
    pub use crate::metrics::{
        mean_absolute_error, median_absolute_error, r_squared, rmse, ValueSeries,
    };
    pub use crate::model::{
        Activation, CancelToken, LayerSpec, MlpFactory, MlpTrainer, ModelFactory, ModelTrainer,
        TrainOptions,
    };
}
