//! Feature-subset cost function

use ndarray::{Array2, Axis};
use tracing::{debug, warn};

use crate::data::{ColumnIndexMap, DataProvider, SharedDataset, SplitSnapshot};
use crate::error::{FeatselError, Result};
use crate::fitness::{CostFunction, SubsetFitnessConfig, WorkerContext};
use crate::metrics;
use crate::model::{CancelToken, ModelFactory, ModelTrainer};

/// Scores a candidate input-column subset by training a feed-forward model
/// on the reduced feature matrices and measuring RMSE on the held-out test
/// partition. Lower is better.
pub struct FeatureSubsetFitness<P: DataProvider, F: ModelFactory> {
    data: SharedDataset<P>,
    factory: F,
    config: SubsetFitnessConfig,
    cancel: Option<CancelToken>,
}

impl<P: DataProvider, F: ModelFactory> FeatureSubsetFitness<P, F> {
    pub fn new(data: SharedDataset<P>, factory: F, config: SubsetFitnessConfig) -> Result<Self> {
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

    pub fn config(&self) -> &SubsetFitnessConfig {
        &self.config
    }

    fn capture_snapshot(&self) -> Result<SplitSnapshot> {
        if self.config.shuffle {
            self.data.reshuffle(self.config.split_ratio)
        } else {
            Ok(self.data.snapshot())
        }
    }
}

/// Extract the mapped columns, in mapping iteration order, as a reduced
/// feature matrix. The order decides which input neuron receives which
/// original feature.
pub(crate) fn select_columns(matrix: &Array2<f64>, map: &ColumnIndexMap) -> Result<Array2<f64>> {
    for (name, index) in map.iter() {
        if index >= matrix.ncols() {
            return Err(FeatselError::ShapeOrTypeError(format!(
                "column index {} for parameter '{}' exceeds matrix width {}",
                index,
                name,
                matrix.ncols()
            )));
        }
    }
    Ok(matrix.select(Axis(1), &map.indices()))
}

impl<P: DataProvider, F: ModelFactory> CostFunction for FeatureSubsetFitness<P, F> {
    type Candidate = ColumnIndexMap;

    fn evaluate(&self, parameters: &ColumnIndexMap, worker: &WorkerContext) -> Result<f64> {
        if parameters.is_empty() {
            return Err(FeatselError::EmptyFeatureSetError);
        }

        let snapshot = self.capture_snapshot()?;
        let split = snapshot.data.as_ref();

        let learn_x = select_columns(&split.learn_x, parameters)?;
        let valid_x = select_columns(&split.valid_x, parameters)?;
        let test_x = select_columns(&split.test_x, parameters)?;

        let slot = worker.slot();
        let mut model = self.factory.build(slot);
        model.add_layer(parameters.len(), self.config.input_activation)?;
        for layer in &self.config.hidden_layers {
            model.add_layer(layer.width, layer.activation)?;
        }
        model.add_layer(split.n_outputs(), self.config.output_activation)?;
        model.connect_layers()?;

        let mut opts = self.config.train_options();
        if let Some(token) = &self.cancel {
            opts = opts.with_cancel(token.clone());
        }
        model.fit_validation(&learn_x, &split.learn_y, &valid_x, &split.valid_y, &opts)?;

        let predictions = model.predict(&test_x)?;
        let fitness = metrics::rmse(&predictions, &split.test_y)?;

        if !fitness.is_finite() {
            warn!(slot, fitness, "training diverged");
            return Err(FeatselError::TrainingError(
                "training diverged: test error is not finite".to_string(),
            ));
        }

        debug!(
            slot,
            version = snapshot.version,
            columns = parameters.len(),
            fitness,
            "evaluated feature subset"
        );
        Ok(fitness)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_select_columns_follows_mapping_order() {
        let matrix = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let map: ColumnIndexMap = [("a", 0), ("b", 2)].into_iter().collect();

        let reduced = select_columns(&matrix, &map).unwrap();
        assert_eq!(reduced, array![[1.0, 3.0], [4.0, 6.0]]);

        // reversed mapping order reverses the reduced columns
        let reversed: ColumnIndexMap = [("b", 2), ("a", 0)].into_iter().collect();
        let reduced = select_columns(&matrix, &reversed).unwrap();
        assert_eq!(reduced, array![[3.0, 1.0], [6.0, 4.0]]);
    }

    #[test]
    fn test_select_columns_rejects_out_of_range_index() {
        let matrix = array![[1.0, 2.0], [3.0, 4.0]];
        let map: ColumnIndexMap = [("a", 5)].into_iter().collect();

        let err = select_columns(&matrix, &map).unwrap_err();
        assert!(matches!(err, FeatselError::ShapeOrTypeError(_)));
    }
}
