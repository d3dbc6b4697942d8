pub mod tensor;
pub mod layer;
pub mod loss;
pub mod optimizer;

use tensor::Tensor;
use layer::{Layer, Dense};
use loss::Loss;
use optimizer::Optimizer;

pub struct Sequential {
    pub layers: Vec<Box<dyn Layer>>,
    pub loss: Box<dyn Loss>,
    pub optimizer: Box<dyn Optimizer>
}

impl Sequential {
    pub fn new(layers: Vec<Box<dyn Layer>>, loss: Box<dyn Loss>, optimizer: Box<dyn Optimizer>) -> Self {
        Self {
            layers,
            loss,
            optimizer
        }
    }

    pub fn predict(&mut self, input: &Tensor) -> Tensor {
        let mut output = input.clone();
        for layer in &mut self.layers {
            output = layer.forward(&output);
        }
        output
    }

    // one optimizer step towards y_batch, returns the loss before the step
    pub fn train_on_batch(&mut self, x_batch: &Tensor, y_batch: &Tensor) -> f32 {
        let y_pred = self.predict(x_batch);
        let loss = self.loss.calculate(&y_pred, y_batch);
        let mut d_output = self.loss.gradient(&y_pred, y_batch);
        for layer in self.layers.iter_mut().rev() {
            d_output = layer.backward(&d_output);
        }
        self.optimizer.step(&mut self.layers);
        loss
    }

    pub fn dense_layers(&self) -> impl Iterator<Item = &Dense> {
        self.layers.iter().filter_map(|layer| layer.as_any().downcast_ref::<Dense>())
    }

    // weights and biases of every dense layer, in layer order
    pub fn parameters(&self) -> Vec<Tensor> {
        self.dense_layers()
            .flat_map(|dense| [dense.weights.clone(), dense.biases.clone()])
            .collect()
    }

    // returns false and leaves self untouched when the shapes do not line up
    pub fn set_parameters(&mut self, parameters: &[Tensor]) -> bool {
        let shapes_match = self.dense_layers().count() * 2 == parameters.len()
            && self.dense_layers().zip(parameters.chunks(2)).all(|(dense, pair)| {
                dense.weights.shape() == pair[0].shape() && dense.biases.shape() == pair[1].shape()
            });
        if !shapes_match {
            return false;
        }

        let dense_layers = self.layers.iter_mut().filter_map(|layer| layer.as_any_mut().downcast_mut::<Dense>());
        for (dense, pair) in dense_layers.zip(parameters.chunks(2)) {
            dense.weights = pair[0].clone();
            dense.biases = pair[1].clone();
        }
        true
    }

    pub fn copy_weights_from(&mut self, other: &Self) {
        for (self_layer, other_layer) in self.layers.iter_mut().zip(other.layers.iter()) {
            if let (Some(self_dense), Some(other_dense)) = (self_layer.as_any_mut().downcast_mut::<Dense>(), other_layer.as_any().downcast_ref::<Dense>()) {
                self_dense.weights = other_dense.weights.clone();
                self_dense.biases = other_dense.biases.clone();
            }
        }
    }
}

impl Clone for Sequential {
    fn clone(&self) -> Self {
        Self {
            layers: self.layers.iter().map(|layer| layer.clone_box()).collect(),
            loss: self.loss.clone_box(),
            optimizer: self.optimizer.clone_box()
        }
    }
}
