//! Feed-forward model collaborator seam and reference MLP trainer
//!
//! The fitness core only depends on the [`ModelTrainer`] and
//! [`ModelFactory`] traits; [`MlpTrainer`] is the in-crate reference
//! implementation. Topology is assembled layer by layer (`add_layer`) and
//! frozen with `connect_layers`; training monitors a held-out validation
//! partition and stops early when it stops improving.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use crate::error::{FeatselError, Result};
use crate::metrics;

/// Activation function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    /// Rectified Linear Unit
    ReLU,
    /// Sigmoid
    Sigmoid,
    /// Hyperbolic tangent
    Tanh,
    /// Linear (identity)
    Linear,
    /// Softmax (for output layer)
    Softmax,
}

impl Default for Activation {
    fn default() -> Self {
        Self::ReLU
    }
}

impl Activation {
    fn apply(self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::ReLU => z.mapv(|v| v.max(0.0)),
            Activation::Sigmoid => z.mapv(|v| 1.0 / (1.0 + (-v).exp())),
            Activation::Tanh => z.mapv(|v| v.tanh()),
            Activation::Linear => z.clone(),
            Activation::Softmax => {
                let mut result = z.clone();
                for mut row in result.rows_mut() {
                    let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                    let exp_sum: f64 = row.iter().map(|&v| (v - max).exp()).sum();
                    for v in row.iter_mut() {
                        *v = (*v - max).exp() / exp_sum;
                    }
                }
                result
            }
        }
    }

    fn derivative(self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::ReLU => z.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
            Activation::Sigmoid => {
                let sig = Activation::Sigmoid.apply(z);
                &sig * &(1.0 - &sig)
            }
            Activation::Tanh => {
                let t = z.mapv(|v| v.tanh());
                1.0 - &t * &t
            }
            Activation::Linear => Array2::ones(z.raw_dim()),
            Activation::Softmax => Array2::ones(z.raw_dim()),
        }
    }
}

/// One layer of a feed-forward topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub width: usize,
    pub activation: Activation,
}

impl LayerSpec {
    pub fn new(width: usize, activation: Activation) -> Self {
        Self { width, activation }
    }
}

/// Cooperative cancellation flag, checked between training epochs.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Per-fit training options.
#[derive(Debug, Clone)]
pub struct TrainOptions {
    /// Gradient step size
    pub learning_rate: f64,
    /// Dropout retention probability for hidden activations
    pub keep_prob: f64,
    /// Upper bound on training epochs
    pub max_epochs: usize,
    /// Cancellation point between epochs
    pub cancel: Option<CancelToken>,
}

impl TrainOptions {
    pub fn new(learning_rate: f64, keep_prob: f64, max_epochs: usize) -> Self {
        Self {
            learning_rate,
            keep_prob,
            max_epochs,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.learning_rate <= 0.0 || !self.learning_rate.is_finite() {
            return Err(FeatselError::InvalidParameter {
                name: "learning_rate".to_string(),
                value: self.learning_rate.to_string(),
                reason: "must be a positive finite number".to_string(),
            });
        }
        if !(self.keep_prob > 0.0 && self.keep_prob <= 1.0) {
            return Err(FeatselError::InvalidParameter {
                name: "keep_prob".to_string(),
                value: self.keep_prob.to_string(),
                reason: "must be in (0, 1]".to_string(),
            });
        }
        if self.max_epochs == 0 {
            return Err(FeatselError::InvalidParameter {
                name: "max_epochs".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map_or(false, CancelToken::is_cancelled)
    }
}

/// Contract for the feed-forward model collaborator.
pub trait ModelTrainer {
    /// Append a layer to the topology.
    fn add_layer(&mut self, width: usize, activation: Activation) -> Result<()>;

    /// Freeze the topology into a single feed-forward graph.
    fn connect_layers(&mut self) -> Result<()>;

    /// Train with validation-monitored early stopping.
    fn fit_validation(
        &mut self,
        train_x: &Array2<f64>,
        train_y: &Array2<f64>,
        valid_x: &Array2<f64>,
        valid_y: &Array2<f64>,
        opts: &TrainOptions,
    ) -> Result<()>;

    /// Produce predictions for an input matrix.
    fn predict(&self, x: &Array2<f64>) -> Result<Array2<f64>>;
}

/// Builds one model instance per worker slot.
///
/// Instances are created fresh per evaluation; the slot id lets a pooling
/// runtime reuse per-slot resources and lets seeded factories reproduce
/// per-slot randomness across runs.
pub trait ModelFactory: Send + Sync {
    type Model: ModelTrainer;

    fn build(&self, slot: usize) -> Self::Model;
}

/// Reference multi-layer perceptron trainer.
#[derive(Debug, Clone)]
pub struct MlpTrainer {
    layers: Vec<LayerSpec>,
    connected: bool,
    weights: Vec<Array2<f64>>,
    biases: Vec<Array1<f64>>,
    batch_size: usize,
    patience: usize,
    momentum: f64,
    rng: Xoshiro256PlusPlus,
    is_fitted: bool,
}

impl MlpTrainer {
    pub fn new(random_state: Option<u64>) -> Self {
        let rng = match random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        Self {
            layers: Vec::new(),
            connected: false,
            weights: Vec::new(),
            biases: Vec::new(),
            batch_size: 32,
            patience: 10,
            momentum: 0.9,
            rng,
            is_fitted: false,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_patience(mut self, patience: usize) -> Self {
        self.patience = patience;
        self
    }

    pub fn with_momentum(mut self, momentum: f64) -> Self {
        self.momentum = momentum;
        self
    }

    fn input_width(&self) -> usize {
        self.layers.first().map(|l| l.width).unwrap_or(0)
    }

    fn output_width(&self) -> usize {
        self.layers.last().map(|l| l.width).unwrap_or(0)
    }

    fn initialize_weights(&mut self) {
        self.weights.clear();
        self.biases.clear();

        for pair in self.layers.windows(2) {
            let n_in = pair[0].width;
            let n_out = pair[1].width;

            // Xavier/Glorot initialization
            let scale = (2.0 / (n_in + n_out) as f64).sqrt();
            let values: Vec<f64> = (0..n_in * n_out)
                .map(|_| self.rng.gen::<f64>() * 2.0 * scale - scale)
                .collect();

            self.weights.push(
                Array2::from_shape_vec((n_in, n_out), values)
                    .expect("weight buffer matches layer dimensions"),
            );
            self.biases.push(Array1::zeros(n_out));
        }
    }

    /// Forward pass without dropout.
    fn forward(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut a = x.clone();
        for (i, (w, b)) in self.weights.iter().zip(self.biases.iter()).enumerate() {
            let z = a.dot(w) + b;
            a = self.layers[i + 1].activation.apply(&z);
        }
        a
    }

    /// Forward pass with inverted dropout on hidden activations.
    ///
    /// Returns per-layer activations, pre-activation values, and the
    /// dropout masks applied to each hidden layer (None for the output).
    fn forward_train(
        &mut self,
        x: &Array2<f64>,
        keep_prob: f64,
    ) -> (Vec<Array2<f64>>, Vec<Array2<f64>>, Vec<Option<Array2<f64>>>) {
        let n_links = self.weights.len();
        let mut activations = vec![x.clone()];
        let mut z_values = Vec::with_capacity(n_links);
        let mut masks = Vec::with_capacity(n_links);

        for i in 0..n_links {
            let z = activations[i].dot(&self.weights[i]) + &self.biases[i];
            let mut a = self.layers[i + 1].activation.apply(&z);
            z_values.push(z);

            let is_hidden = i + 1 < n_links;
            if is_hidden && keep_prob < 1.0 {
                let mask = Array2::from_shape_fn(a.raw_dim(), |_| {
                    if self.rng.gen::<f64>() < keep_prob {
                        1.0 / keep_prob
                    } else {
                        0.0
                    }
                });
                a = a * &mask;
                masks.push(Some(mask));
            } else {
                masks.push(None);
            }

            activations.push(a);
        }

        (activations, z_values, masks)
    }

    fn backward(
        &self,
        y: &Array2<f64>,
        activations: &[Array2<f64>],
        z_values: &[Array2<f64>],
        masks: &[Option<Array2<f64>>],
    ) -> Vec<(Array2<f64>, Array1<f64>)> {
        let n = y.nrows() as f64;
        let n_links = self.weights.len();
        let mut gradients = Vec::with_capacity(n_links);

        // MSE gradient at the output
        let output = activations.last().expect("forward pass ran");
        let mut delta = (output - y) / n
            * self.layers[n_links].activation.derivative(&z_values[n_links - 1]);

        for i in (0..n_links).rev() {
            let a_prev = &activations[i];
            let grad_w = a_prev.t().dot(&delta);
            let grad_b = delta.sum_axis(Axis(0));
            gradients.push((grad_w, grad_b));

            if i > 0 {
                delta = delta.dot(&self.weights[i].t())
                    * self.layers[i].activation.derivative(&z_values[i - 1]);
                if let Some(mask) = &masks[i - 1] {
                    delta = delta * mask;
                }
            }
        }

        gradients.reverse();
        gradients
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

    fn check_pair(&self, name: &str, x: &Array2<f64>, y: &Array2<f64>) -> Result<()> {
        if x.ncols() != self.input_width() {
            return Err(FeatselError::ShapeOrTypeError(format!(
                "{} inputs have {} columns, input layer expects {}",
                name,
                x.ncols(),
                self.input_width()
            )));
        }
        if y.ncols() != self.output_width() {
            return Err(FeatselError::ShapeOrTypeError(format!(
                "{} targets have {} columns, output layer expects {}",
                name,
                y.ncols(),
                self.output_width()
            )));
        }
        if x.nrows() != y.nrows() {
            return Err(FeatselError::ShapeOrTypeError(format!(
                "{} partition has {} input rows but {} target rows",
                name,
                x.nrows(),
                y.nrows()
            )));
        }
        Ok(())
    }
}

impl ModelTrainer for MlpTrainer {
    fn add_layer(&mut self, width: usize, activation: Activation) -> Result<()> {
        if self.connected {
            return Err(FeatselError::TrainingError(
                "cannot add layers after connect_layers".to_string(),
            ));
        }
        if width == 0 {
            return Err(FeatselError::InvalidParameter {
                name: "width".to_string(),
                value: "0".to_string(),
                reason: "layers must have at least one neuron".to_string(),
            });
        }
        self.layers.push(LayerSpec::new(width, activation));
        Ok(())
    }

    fn connect_layers(&mut self) -> Result<()> {
        if self.layers.len() < 2 {
            return Err(FeatselError::TrainingError(format!(
                "topology needs at least an input and an output layer, got {}",
                self.layers.len()
            )));
        }
        self.connected = true;
        Ok(())
    }

    fn fit_validation(
        &mut self,
        train_x: &Array2<f64>,
        train_y: &Array2<f64>,
        valid_x: &Array2<f64>,
        valid_y: &Array2<f64>,
        opts: &TrainOptions,
    ) -> Result<()> {
        if !self.connected {
            return Err(FeatselError::TrainingError(
                "connect_layers must be called before fitting".to_string(),
            ));
        }
        opts.validate()?;
        self.check_pair("train", train_x, train_y)?;
        self.check_pair("valid", valid_x, valid_y)?;
        if train_x.nrows() == 0 {
            return Err(FeatselError::TrainingError(
                "training partition is empty".to_string(),
            ));
        }

        self.initialize_weights();

        let mut velocities_w: Vec<Array2<f64>> = self
            .weights
            .iter()
            .map(|w| Array2::zeros(w.raw_dim()))
            .collect();
        let mut velocities_b: Vec<Array1<f64>> = self
            .biases
            .iter()
            .map(|b| Array1::zeros(b.len()))
            .collect();

        let n_train = train_x.nrows();
        let mut best_valid_loss = f64::INFINITY;
        let mut patience_counter = 0;

        for _epoch in 0..opts.max_epochs {
            if opts.is_cancelled() {
                return Err(FeatselError::Cancelled);
            }

            let mut indices: Vec<usize> = (0..n_train).collect();
            indices.shuffle(&mut self.rng);

            for batch_start in (0..n_train).step_by(self.batch_size) {
                let batch_end = (batch_start + self.batch_size).min(n_train);
                let batch_indices = &indices[batch_start..batch_end];

                let x_batch = Self::gather_rows(train_x, batch_indices);
                let y_batch = Self::gather_rows(train_y, batch_indices);

                let (activations, z_values, masks) =
                    self.forward_train(&x_batch, opts.keep_prob);
                let gradients = self.backward(&y_batch, &activations, &z_values, &masks);

                for (i, (grad_w, grad_b)) in gradients.into_iter().enumerate() {
                    velocities_w[i] =
                        &velocities_w[i] * self.momentum - &grad_w * opts.learning_rate;
                    velocities_b[i] =
                        &velocities_b[i] * self.momentum - &grad_b * opts.learning_rate;

                    self.weights[i] = &self.weights[i] + &velocities_w[i];
                    self.biases[i] = &self.biases[i] + &velocities_b[i];
                }
            }

            if valid_x.nrows() > 0 {
                let valid_pred = self.forward(valid_x);
                let valid_loss = metrics::rmse(&valid_pred, valid_y)?;

                if valid_loss < best_valid_loss {
                    best_valid_loss = valid_loss;
                    patience_counter = 0;
                } else {
                    patience_counter += 1;
                    if patience_counter >= self.patience {
                        break;
                    }
                }
            }
        }

        self.is_fitted = true;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(FeatselError::ModelNotFitted);
        }
        if x.ncols() != self.input_width() {
            return Err(FeatselError::ShapeOrTypeError(format!(
                "inputs have {} columns, input layer expects {}",
                x.ncols(),
                self.input_width()
            )));
        }
        Ok(self.forward(x))
    }
}

/// Factory producing seeded [`MlpTrainer`] instances per worker slot.
#[derive(Debug, Clone)]
pub struct MlpFactory {
    random_state: Option<u64>,
    batch_size: usize,
    patience: usize,
}

impl MlpFactory {
    pub fn new(random_state: Option<u64>) -> Self {
        Self {
            random_state,
            batch_size: 32,
            patience: 10,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_patience(mut self, patience: usize) -> Self {
        self.patience = patience;
        self
    }
}

impl ModelFactory for MlpFactory {
    type Model = MlpTrainer;

    fn build(&self, slot: usize) -> MlpTrainer {
        // offset the seed per slot so parallel workers draw distinct but
        // reproducible weight streams
        let seed = self.random_state.map(|s| s.wrapping_add(slot as u64));
        MlpTrainer::new(seed)
            .with_batch_size(self.batch_size)
            .with_patience(self.patience)
    }
}
