//! Data partitions, column selection, and the dataset collaborator seam
//!
//! Provides:
//! - [`DataSplit`] - learn/validation/test partition triple
//! - [`ColumnIndexMap`] - ordered candidate feature-subset representation
//! - [`DataProvider`] - the external partition-manager contract
//! - [`InMemoryDataset`] - reference provider with seeded shuffling
//! - [`SharedDataset`] - versioned snapshots over one serialized owner

use std::sync::Arc;

use ndarray::Array2;
use parking_lot::RwLock;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{FeatselError, Result};

/// Learn/validation/test fractions of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitRatio {
    pub learn: f64,
    pub valid: f64,
    pub test: f64,
}

impl SplitRatio {
    pub fn new(learn: f64, valid: f64, test: f64) -> Result<Self> {
        let ratio = Self { learn, valid, test };
        ratio.validate()?;
        Ok(ratio)
    }

    /// Check fractions are non-negative and sum to 1.
    pub fn validate(&self) -> Result<()> {
        if self.learn < 0.0 || self.valid < 0.0 || self.test < 0.0 {
            return Err(FeatselError::ConfigError(format!(
                "split fractions must be non-negative, got ({}, {}, {})",
                self.learn, self.valid, self.test
            )));
        }
        let total = self.learn + self.valid + self.test;
        if (total - 1.0).abs() > 1e-9 {
            return Err(FeatselError::ConfigError(format!(
                "split fractions must sum to 1, got {}",
                total
            )));
        }
        Ok(())
    }
}

impl Default for SplitRatio {
    fn default() -> Self {
        Self {
            learn: 0.65,
            valid: 0.25,
            test: 0.10,
        }
    }
}

/// Ordered mapping from parameter name to input-column index.
///
/// Iteration order is insertion order and is caller-visible: it decides the
/// column order of the reduced feature matrix, and therefore which input
/// neuron receives which original feature. Re-inserting an existing name
/// updates its index in place without moving it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnIndexMap {
    entries: Vec<(String, usize)>,
}

impl ColumnIndexMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update a parameter's column index.
    pub fn insert(&mut self, name: impl Into<String>, index: usize) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, idx)) => *idx = index,
            None => self.entries.push((name, index)),
        }
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, idx)| *idx)
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(n, idx)| (n.as_str(), *idx))
    }

    /// Column indices in insertion order.
    pub fn indices(&self) -> Vec<usize> {
        self.entries.iter().map(|(_, idx)| *idx).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, usize)> for ColumnIndexMap {
    fn from_iter<I: IntoIterator<Item = (S, usize)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (name, index) in iter {
            map.insert(name, index);
        }
        map
    }
}

/// One packaged learn/validation/test snapshot.
///
/// Rows are samples; `*_x` columns are input features, `*_y` columns are
/// output dimensions.
#[derive(Debug, Clone)]
pub struct DataSplit {
    pub learn_x: Array2<f64>,
    pub learn_y: Array2<f64>,
    pub valid_x: Array2<f64>,
    pub valid_y: Array2<f64>,
    pub test_x: Array2<f64>,
    pub test_y: Array2<f64>,
}

impl DataSplit {
    pub fn new(
        learn_x: Array2<f64>,
        learn_y: Array2<f64>,
        valid_x: Array2<f64>,
        valid_y: Array2<f64>,
        test_x: Array2<f64>,
        test_y: Array2<f64>,
    ) -> Result<Self> {
        for (name, x, y) in [
            ("learn", &learn_x, &learn_y),
            ("valid", &valid_x, &valid_y),
            ("test", &test_x, &test_y),
        ] {
            if x.nrows() != y.nrows() {
                return Err(FeatselError::DataError(format!(
                    "{} partition has {} input rows but {} target rows",
                    name,
                    x.nrows(),
                    y.nrows()
                )));
            }
        }
        for (name, x) in [("valid", &valid_x), ("test", &test_x)] {
            if x.ncols() != learn_x.ncols() {
                return Err(FeatselError::DataError(format!(
                    "{} partition has {} input columns but learn has {}",
                    name,
                    x.ncols(),
                    learn_x.ncols()
                )));
            }
        }
        for (name, y) in [("valid", &valid_y), ("test", &test_y)] {
            if y.ncols() != learn_y.ncols() {
                return Err(FeatselError::DataError(format!(
                    "{} partition has {} target columns but learn has {}",
                    name,
                    y.ncols(),
                    learn_y.ncols()
                )));
            }
        }

        Ok(Self {
            learn_x,
            learn_y,
            valid_x,
            valid_y,
            test_x,
            test_y,
        })
    }

    /// Number of input feature columns.
    pub fn n_features(&self) -> usize {
        self.learn_x.ncols()
    }

    /// Number of output dimensions.
    pub fn n_outputs(&self) -> usize {
        self.learn_y.ncols()
    }
}

/// Contract for the external dataset/partition manager.
pub trait DataProvider: Send + Sync {
    /// Reassign rows to learn/validation/test partitions.
    fn shuffle(&mut self, ratio: SplitRatio) -> Result<()>;

    /// Package the current assignment into a fresh [`DataSplit`].
    fn package_sets(&self) -> Result<DataSplit>;
}

/// In-memory dataset with seeded row shuffling.
#[derive(Debug, Clone)]
pub struct InMemoryDataset {
    x: Array2<f64>,
    y: Array2<f64>,
    learn_rows: Vec<usize>,
    valid_rows: Vec<usize>,
    test_rows: Vec<usize>,
    rng: ChaCha8Rng,
}

impl InMemoryDataset {
    /// Create a dataset from full input/target matrices.
    ///
    /// The initial assignment splits rows in order with the default ratio;
    /// call [`DataProvider::shuffle`] for a randomized assignment.
    pub fn new(x: Array2<f64>, y: Array2<f64>, random_state: Option<u64>) -> Result<Self> {
        if x.nrows() != y.nrows() {
            return Err(FeatselError::DataError(format!(
                "input matrix has {} rows but target matrix has {}",
                x.nrows(),
                y.nrows()
            )));
        }
        if x.nrows() == 0 || x.ncols() == 0 || y.ncols() == 0 {
            return Err(FeatselError::DataError(
                "dataset must have at least one row, one feature and one output".to_string(),
            ));
        }

        let rng = match random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let mut dataset = Self {
            x,
            y,
            learn_rows: Vec::new(),
            valid_rows: Vec::new(),
            test_rows: Vec::new(),
            rng,
        };
        dataset.assign((0..dataset.x.nrows()).collect(), SplitRatio::default())?;
        Ok(dataset)
    }

    fn assign(&mut self, order: Vec<usize>, ratio: SplitRatio) -> Result<()> {
        ratio.validate()?;
        let n = order.len();
        let n_learn = (n as f64 * ratio.learn).round() as usize;
        let n_valid = (n as f64 * ratio.valid).round() as usize;
        if n_learn == 0 || n_valid == 0 || n_learn + n_valid >= n {
            return Err(FeatselError::DataError(format!(
                "split of {} rows with ratio ({}, {}, {}) leaves an empty partition",
                n, ratio.learn, ratio.valid, ratio.test
            )));
        }

        self.learn_rows = order[..n_learn].to_vec();
        self.valid_rows = order[n_learn..n_learn + n_valid].to_vec();
        self.test_rows = order[n_learn + n_valid..].to_vec();
        Ok(())
    }

    fn gather_rows(matrix: &Array2<f64>, rows: &[usize]) -> Array2<f64> {
        let n_cols = matrix.ncols();
        let mut values = Vec::with_capacity(rows.len() * n_cols);
        for &row in rows {
            values.extend(matrix.row(row).iter().copied());
        }
        Array2::from_shape_vec((rows.len(), n_cols), values)
            .expect("gathered rows match matrix width")
    }
}

impl DataProvider for InMemoryDataset {
    fn shuffle(&mut self, ratio: SplitRatio) -> Result<()> {
        let mut order: Vec<usize> = (0..self.x.nrows()).collect();
        order.shuffle(&mut self.rng);
        self.assign(order, ratio)
    }

    fn package_sets(&self) -> Result<DataSplit> {
        DataSplit::new(
            Self::gather_rows(&self.x, &self.learn_rows),
            Self::gather_rows(&self.y, &self.learn_rows),
            Self::gather_rows(&self.x, &self.valid_rows),
            Self::gather_rows(&self.y, &self.valid_rows),
            Self::gather_rows(&self.x, &self.test_rows),
            Self::gather_rows(&self.y, &self.test_rows),
        )
    }
}

/// An immutable snapshot captured at evaluation entry.
#[derive(Debug, Clone)]
pub struct SplitSnapshot {
    pub version: u64,
    pub data: Arc<DataSplit>,
}

struct SharedState<P> {
    provider: P,
    version: u64,
    current: Arc<DataSplit>,
}

/// Shared dataset handle with versioned, immutable snapshots.
///
/// All reshuffle+repackage operations are serialized behind one write lock;
/// readers hold `Arc` snapshots and are never affected by a concurrent
/// reshuffle.
pub struct SharedDataset<P: DataProvider> {
    state: Arc<RwLock<SharedState<P>>>,
}

impl<P: DataProvider> Clone for SharedDataset<P> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<P: DataProvider> SharedDataset<P> {
    /// Wrap a provider, packaging its current assignment as version 0.
    pub fn new(provider: P) -> Result<Self> {
        let current = Arc::new(provider.package_sets()?);
        Ok(Self {
            state: Arc::new(RwLock::new(SharedState {
                provider,
                version: 0,
                current,
            })),
        })
    }

    /// Capture the current snapshot.
    pub fn snapshot(&self) -> SplitSnapshot {
        let state = self.state.read();
        SplitSnapshot {
            version: state.version,
            data: Arc::clone(&state.current),
        }
    }

    /// Reshuffle, repackage and bump the version; returns the new snapshot.
    pub fn reshuffle(&self, ratio: SplitRatio) -> Result<SplitSnapshot> {
        let mut state = self.state.write();
        state.provider.shuffle(ratio)?;
        let repackaged = Arc::new(state.provider.package_sets()?);
        state.version += 1;
        state.current = Arc::clone(&repackaged);
        Ok(SplitSnapshot {
            version: state.version,
            data: repackaged,
        })
    }

    pub fn version(&self) -> u64 {
        self.state.read().version
    }
}
