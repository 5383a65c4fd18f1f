//! Hyperparameter cost function

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::data::{DataProvider, SharedDataset, SplitSnapshot};
use crate::error::{FeatselError, Result};
use crate::fitness::{CostFunction, HyperFitnessConfig, WorkerContext};
use crate::metrics;
use crate::model::{CancelToken, LayerSpec, ModelFactory, ModelTrainer, TrainOptions};

/// One candidate hyperparameter vector for the tuning optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyperparameterSet {
    /// Gradient step size
    pub learning_rate: f64,
    /// Upper bound on validation-monitored training epochs
    pub validation_max_epochs: usize,
    /// Dropout retention probability
    pub keep_prob: f64,
    /// Hidden layers in order
    pub hidden_layers: Vec<LayerSpec>,
}

impl HyperparameterSet {
    pub fn new(
        learning_rate: f64,
        validation_max_epochs: usize,
        keep_prob: f64,
        hidden_layers: Vec<LayerSpec>,
    ) -> Self {
        Self {
            learning_rate,
            validation_max_epochs,
            keep_prob,
            hidden_layers,
        }
    }

    pub fn validate(&self) -> Result<()> {
        TrainOptions::new(self.learning_rate, self.keep_prob, self.validation_max_epochs)
            .validate()?;
        if let Some(layer) = self.hidden_layers.iter().find(|l| l.width == 0) {
            return Err(FeatselError::InvalidParameter {
                name: "hidden_layers".to_string(),
                value: format!("{:?}", layer),
                reason: "hidden layers must have at least one neuron".to_string(),
            });
        }
        Ok(())
    }
}

/// Scores a candidate hyperparameter set by training a model on the full
/// feature matrices of the current snapshot and measuring mean absolute
/// error on the held-out test partition. Lower is better.
pub struct HyperparameterFitness<P: DataProvider, F: ModelFactory> {
    data: SharedDataset<P>,
    factory: F,
    config: HyperFitnessConfig,
    cancel: Option<CancelToken>,
}

impl<P: DataProvider, F: ModelFactory> HyperparameterFitness<P, F> {
    pub fn new(data: SharedDataset<P>, factory: F, config: HyperFitnessConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            data,
            factory,
            config,
            cancel: None,
        })
    }

    /// Install a cancellation token checked between training epochs.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn capture_snapshot(&self) -> Result<SplitSnapshot> {
        if self.config.shuffle {
            self.data.reshuffle(self.config.split_ratio)
        } else {
            Ok(self.data.snapshot())
        }
    }
}

impl<P: DataProvider, F: ModelFactory> CostFunction for HyperparameterFitness<P, F> {
    type Candidate = HyperparameterSet;

    fn evaluate(&self, candidate: &HyperparameterSet, worker: &WorkerContext) -> Result<f64> {
        candidate.validate()?;

        let snapshot = self.capture_snapshot()?;
        let split = snapshot.data.as_ref();

        let slot = worker.slot();
        let mut model = self.factory.build(slot);
        model.add_layer(split.n_features(), self.config.input_activation)?;
        for layer in &candidate.hidden_layers {
            model.add_layer(layer.width, layer.activation)?;
        }
        model.add_layer(split.n_outputs(), self.config.output_activation)?;
        model.connect_layers()?;

        let mut opts = TrainOptions::new(
            candidate.learning_rate,
            candidate.keep_prob,
            candidate.validation_max_epochs,
        );
        if let Some(token) = &self.cancel {
            opts = opts.with_cancel(token.clone());
        }
        model.fit_validation(
            &split.learn_x,
            &split.learn_y,
            &split.valid_x,
            &split.valid_y,
            &opts,
        )?;

        let predictions = model.predict(&split.test_x)?;
        let fitness = metrics::mean_absolute_error(&predictions, &split.test_y)?;

        if !fitness.is_finite() {
            warn!(slot, fitness, "training diverged");
            return Err(FeatselError::TrainingError(
                "training diverged: test error is not finite".to_string(),
            ));
        }

        debug!(
            slot,
            version = snapshot.version,
            fitness,
            "evaluated hyperparameter set"
        );
        Ok(fitness)
    }
}
