//! Optimizer-facing cost functions
//!
//! Provides the fitness signal consumed by an external evolutionary driver
//! (genetic algorithm or bee-colony style):
//! - [`FeatureSubsetFitness`] - scores candidate input-column subsets
//! - [`HyperparameterFitness`] - scores candidate hyperparameter sets
//! - [`CostFunction`] - the contract both implement
//! - [`evaluate_population`] - rayon fan-out over a fixed worker pool
//!
//! Evaluation of a single candidate is synchronous and blocking; parallelism
//! happens only at the driver level, and every evaluation is self-contained:
//! it depends only on the candidate it was given and the data snapshot
//! captured at entry.

mod config;
mod hyper;
mod subset;

pub use config::{HyperFitnessConfig, SubsetFitnessConfig};
pub use hyper::{HyperparameterFitness, HyperparameterSet};
pub use subset::FeatureSubsetFitness;

use rayon::prelude::*;

use crate::error::{FeatselError, Result};

/// Explicit identity of the worker evaluating one candidate.
///
/// Passed in by the dispatching pool rather than read from ambient runtime
/// state, so slot assignment is a pure function of worker identity and pool
/// size and re-runs reproduce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerContext {
    worker_id: usize,
    pool_size: usize,
}

impl WorkerContext {
    pub fn new(worker_id: usize, pool_size: usize) -> Result<Self> {
        if pool_size == 0 {
            return Err(FeatselError::ConcurrencyBindingError(
                "worker pool size must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            worker_id,
            pool_size,
        })
    }

    /// Context for single-worker (non-parallel) evaluation.
    pub fn single() -> Self {
        Self {
            worker_id: 0,
            pool_size: 1,
        }
    }

    /// The model slot this worker owns.
    pub fn slot(&self) -> usize {
        self.worker_id % self.pool_size
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }
}

/// Scalar cost function consumed by a search optimizer. Lower is better.
///
/// Implementations must be safe to call concurrently from multiple workers;
/// failures propagate as errors, never as numeric sentinels.
pub trait CostFunction {
    type Candidate;

    fn evaluate(&self, candidate: &Self::Candidate, worker: &WorkerContext) -> Result<f64>;
}

/// Evaluate a batch of candidates across a fixed-size worker pool.
///
/// Each candidate's worker identity is its index in the batch, so slot
/// assignment (index mod pool size) is reproducible run to run. Results come
/// back in candidate order; no ordering of completion times is implied.
pub fn evaluate_population<C>(
    cost: &C,
    candidates: &[C::Candidate],
    pool_size: usize,
) -> Result<Vec<Result<f64>>>
where
    C: CostFunction + Sync,
    C::Candidate: Sync,
{
    if pool_size == 0 {
        return Err(FeatselError::ConcurrencyBindingError(
            "worker pool size must be at least 1".to_string(),
        ));
    }

    Ok(candidates
        .par_iter()
        .enumerate()
        .map(|(worker_id, candidate)| {
            let worker = WorkerContext::new(worker_id, pool_size)?;
            cost.evaluate(candidate, &worker)
        })
        .collect())
}
