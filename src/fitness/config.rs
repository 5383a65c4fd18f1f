//! Fitness evaluation configuration

use serde::{Deserialize, Serialize};

use crate::data::SplitRatio;
use crate::error::{FeatselError, Result};
use crate::model::{Activation, LayerSpec, TrainOptions};

/// Configuration for [`super::FeatureSubsetFitness`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubsetFitnessConfig {
    /// Reshuffle the shared dataset before each evaluation
    pub shuffle: bool,

    /// Split ratio used when reshuffling
    pub split_ratio: SplitRatio,

    /// Activation recorded for the input layer
    pub input_activation: Activation,

    /// Activation of the output layer
    pub output_activation: Activation,

    /// Hidden layers in order, each with its own width and activation
    pub hidden_layers: Vec<LayerSpec>,

    /// Gradient step size
    pub learning_rate: f64,

    /// Dropout retention probability
    pub keep_prob: f64,

    /// Upper bound on validation-monitored training epochs
    pub validation_max_epochs: usize,
}

impl Default for SubsetFitnessConfig {
    fn default() -> Self {
        Self {
            shuffle: false,
            split_ratio: SplitRatio::default(),
            input_activation: Activation::ReLU,
            output_activation: Activation::Linear,
            hidden_layers: vec![
                LayerSpec::new(5, Activation::ReLU),
                LayerSpec::new(5, Activation::ReLU),
            ],
            learning_rate: 0.01,
            keep_prob: 1.0,
            validation_max_epochs: 500,
        }
    }
}

impl SubsetFitnessConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to enable per-evaluation reshuffling
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Builder method to set the reshuffle split ratio
    pub fn with_split_ratio(mut self, ratio: SplitRatio) -> Self {
        self.split_ratio = ratio;
        self
    }

    /// Builder method to set the hidden-layer stack
    pub fn with_hidden_layers(mut self, layers: Vec<LayerSpec>) -> Self {
        self.hidden_layers = layers;
        self
    }

    /// Builder method to set input/output activations
    pub fn with_activations(mut self, input: Activation, output: Activation) -> Self {
        self.input_activation = input;
        self.output_activation = output;
        self
    }

    /// Builder method to set the learning rate
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Builder method to set the dropout retention probability
    pub fn with_keep_prob(mut self, keep_prob: f64) -> Self {
        self.keep_prob = keep_prob;
        self
    }

    /// Builder method to set the training epoch ceiling
    pub fn with_max_epochs(mut self, max_epochs: usize) -> Self {
        self.validation_max_epochs = max_epochs;
        self
    }

    pub(crate) fn train_options(&self) -> TrainOptions {
        TrainOptions::new(self.learning_rate, self.keep_prob, self.validation_max_epochs)
    }

    pub fn validate(&self) -> Result<()> {
        self.split_ratio.validate()?;
        self.train_options().validate()?;
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

/// Configuration for [`super::HyperparameterFitness`].
///
/// Topology and training hyperparameters come from the candidate itself;
/// this only fixes the data handling and the outer activations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HyperFitnessConfig {
    /// Reshuffle the shared dataset before each evaluation
    pub shuffle: bool,

    /// Split ratio used when reshuffling
    pub split_ratio: SplitRatio,

    /// Activation recorded for the input layer
    pub input_activation: Activation,

    /// Activation of the output layer
    pub output_activation: Activation,
}

impl Default for HyperFitnessConfig {
    fn default() -> Self {
        Self {
            shuffle: false,
            split_ratio: SplitRatio::default(),
            input_activation: Activation::ReLU,
            output_activation: Activation::Linear,
        }
    }
}

impl HyperFitnessConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to enable per-evaluation reshuffling
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Builder method to set the reshuffle split ratio
    pub fn with_split_ratio(mut self, ratio: SplitRatio) -> Self {
        self.split_ratio = ratio;
        self
    }

    /// Builder method to set input/output activations
    pub fn with_activations(mut self, input: Activation, output: Activation) -> Self {
        self.input_activation = input;
        self.output_activation = output;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.split_ratio.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SubsetFitnessConfig::default().validate().is_ok());
        assert!(HyperFitnessConfig::default().validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = SubsetFitnessConfig::new()
            .with_shuffle(true)
            .with_learning_rate(0.05)
            .with_keep_prob(0.8)
            .with_max_epochs(100)
            .with_hidden_layers(vec![LayerSpec::new(12, Activation::Tanh)]);

        assert!(config.shuffle);
        assert_eq!(config.learning_rate, 0.05);
        assert_eq!(config.hidden_layers.len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SubsetFitnessConfig::new().with_keep_prob(0.0);
        assert!(config.validate().is_err());

        let config = SubsetFitnessConfig::new()
            .with_hidden_layers(vec![LayerSpec::new(0, Activation::ReLU)]);
        assert!(config.validate().is_err());
    }
}
