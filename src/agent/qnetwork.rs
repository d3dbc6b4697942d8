// 11 -> 128 -> 128 -> 4 ReLU network. Training keeps two: the online one is
// stepped by the optimizer, the target one only ever receives exact copies.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::OptimizerKind;
use crate::error::{Error, Result};
use crate::game::{Action, State, ACTION_DIM, STATE_DIM};
use crate::sequential::layer::{Dense, Layer, ReLU};
use crate::sequential::loss::MeanSquaredError;
use crate::sequential::optimizer::{Adam, Optimizer, SGD};
use crate::sequential::tensor::Tensor;
use crate::sequential::Sequential;

pub const HIDDEN_DIMS: [usize; 2] = [128, 128];

// optimizer settings for a loaded network that is only evaluated
const INFERENCE_OPTIMIZER: OptimizerKind = OptimizerKind::Adam;
const INFERENCE_LEARNING_RATE: f32 = 1e-3;

// on-disk layout; the header is checked before the layers are trusted
#[derive(Serialize, Deserialize)]
struct SavedModel {
    input_dim: usize,
    hidden_dims: Vec<usize>,
    output_dim: usize,
    layers: Vec<Box<dyn Layer>>
}

#[derive(Clone)]
pub struct QNetwork {
    model: Sequential
}

fn build_optimizer(kind: OptimizerKind, learning_rate: f32) -> Box<dyn Optimizer> {
    match kind {
        OptimizerKind::Adam => Box::new(Adam::new(learning_rate)),
        OptimizerKind::Sgd => Box::new(SGD::new(learning_rate))
    }
}

fn layer_dims() -> Vec<usize> {
    let mut dims = vec![STATE_DIM];
    dims.extend(HIDDEN_DIMS);
    dims.push(ACTION_DIM);
    dims
}

impl QNetwork {
    pub fn new<R: Rng + ?Sized>(optimizer: OptimizerKind, learning_rate: f32, rng: &mut R) -> Self {
        let dims = layer_dims();
        let mut layers: Vec<Box<dyn Layer>> = Vec::new();
        for (i, pair) in dims.windows(2).enumerate() {
            layers.push(Box::new(Dense::new(pair[0], pair[1], rng)));
            if i + 2 < dims.len() {
                layers.push(Box::new(ReLU::new()));
            }
        }

        Self::from_layers(layers, optimizer, learning_rate)
    }

    fn from_layers(layers: Vec<Box<dyn Layer>>, optimizer: OptimizerKind, learning_rate: f32) -> Self {
        Self {
            model: Sequential::new(
                layers,
                Box::new(MeanSquaredError),
                build_optimizer(optimizer, learning_rate)
            )
        }
    }

    // (n, 11) states to (n, 4) action values
    pub fn forward(&mut self, states: &Tensor) -> Result<Tensor> {
        check_state_dim(states)?;
        Ok(self.model.predict(states))
    }

    pub fn q_values(&mut self, state: &State) -> Result<[f32; ACTION_DIM]> {
        let output = self.forward(&Tensor::from_rows(std::slice::from_ref(state)))?;
        let mut q_values = [0.0; ACTION_DIM];
        q_values.copy_from_slice(output.row(0));
        Ok(q_values)
    }

    // ties resolve to the lowest action index
    pub fn best_action(&mut self, state: &State) -> Result<Action> {
        let output = self.forward(&Tensor::from_rows(std::slice::from_ref(state)))?;
        Action::from_index(output.argmax_rows()[0])
    }

    // one optimizer step on the MSE towards targets, returns the loss before it
    pub fn update(&mut self, states: &Tensor, targets: &Tensor) -> Result<f32> {
        check_state_dim(states)?;
        let expected = (states.rows(), ACTION_DIM);
        if targets.shape() != expected {
            return Err(Error::TargetShape {
                expected,
                got: targets.shape()
            });
        }
        Ok(self.model.train_on_batch(states, targets))
    }

    pub fn snapshot(&self) -> Vec<Tensor> {
        self.model.parameters()
    }

    pub fn restore(&mut self, parameters: &[Tensor]) -> Result<()> {
        if self.model.set_parameters(parameters) {
            Ok(())
        } else {
            Err(Error::Architecture(format!(
                "cannot restore {} tensors into a {:?} network",
                parameters.len(),
                layer_dims()
            )))
        }
    }

    pub fn sync_from(&mut self, other: &QNetwork) {
        self.model.copy_weights_from(&other.model);
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let saved = SavedModel {
            input_dim: STATE_DIM,
            hidden_dims: HIDDEN_DIMS.to_vec(),
            output_dim: ACTION_DIM,
            layers: self.model.layers.iter().map(|layer| layer.clone_box()).collect()
        };

        let file = File::create(path).map_err(|e| Error::io("create model file", path, e))?;
        bincode::serialize_into(BufWriter::new(file), &saved)?;
        info!(path = %path.display(), "saved model");
        Ok(())
    }

    // for evaluation and play, where the optimizer is never stepped
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_optimizer(path, INFERENCE_OPTIMIZER, INFERENCE_LEARNING_RATE)
    }

    // for resuming training with a chosen update rule
    pub fn load_with_optimizer(path: &Path, optimizer: OptimizerKind, learning_rate: f32) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::io("open model file", path, e))?;
        let saved: SavedModel = bincode::deserialize_from(BufReader::new(file))?;

        if saved.input_dim != STATE_DIM
            || saved.hidden_dims != HIDDEN_DIMS
            || saved.output_dim != ACTION_DIM
        {
            return Err(Error::Architecture(format!(
                "expected {}-{:?}-{}, found {}-{:?}-{}",
                STATE_DIM, HIDDEN_DIMS, ACTION_DIM, saved.input_dim, saved.hidden_dims, saved.output_dim
            )));
        }
        check_layers(&saved.layers)?;

        info!(path = %path.display(), "loaded model");
        Ok(Self::from_layers(saved.layers, optimizer, learning_rate))
    }
}

fn check_state_dim(states: &Tensor) -> Result<()> {
    if states.cols() != STATE_DIM {
        return Err(Error::StateDimension {
            expected: STATE_DIM,
            got: states.cols()
        });
    }
    Ok(())
}

// dense(11,128) relu dense(128,128) relu dense(128,4)
fn check_layers(layers: &[Box<dyn Layer>]) -> Result<()> {
    let dims = layer_dims();
    let expected_len = 2 * (dims.len() - 1) - 1;
    if layers.len() != expected_len {
        return Err(Error::Architecture(format!(
            "expected {} layers, found {}",
            expected_len,
            layers.len()
        )));
    }

    for (i, layer) in layers.iter().enumerate() {
        if i % 2 == 1 {
            if layer.as_any().downcast_ref::<ReLU>().is_none() {
                return Err(Error::Architecture(format!("layer {} should be a ReLU", i)));
            }
            continue;
        }
        let Some(dense) = layer.as_any().downcast_ref::<Dense>() else {
            return Err(Error::Architecture(format!("layer {} should be dense", i)));
        };
        let expected = (dims[i / 2], dims[i / 2 + 1]);
        if dense.weights.shape() != expected || dense.biases.shape() != (1, expected.1) {
            return Err(Error::Architecture(format!(
                "dense layer {} has weights {:?}, expected {:?}",
                i,
                dense.weights.shape(),
                expected
            )));
        }
    }
    Ok(())
}
