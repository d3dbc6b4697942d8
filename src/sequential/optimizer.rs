use super::layer::{Layer, Dense};
use super::tensor::Tensor;

pub trait Optimizer: Send {
    fn step(&mut self, layers: &mut [Box<dyn Layer>]);
    fn clone_box(&self) -> Box<dyn Optimizer>;
}


// SGD

#[derive(Clone, Debug)]
pub struct SGD {
    learning_rate: f32
}

impl SGD {
    pub fn new(learning_rate: f32) -> Self {
        Self {
            learning_rate
        }
    }
}

impl Optimizer for SGD {
    fn step(&mut self, layers: &mut [Box<dyn Layer>]) {
        let lr = self.learning_rate;
        for layer in layers {
            if let Some(dense_layer) = layer.as_any_mut().downcast_mut::<Dense>() {
                if let (Some(d_weights), Some(d_biases)) = (&dense_layer.d_weights, &dense_layer.d_biases) {
                    let new_weights = dense_layer.weights.map2(d_weights, |w, dw| w - lr * dw);
                    let new_biases = dense_layer.biases.map2(d_biases, |b, db| b - lr * db);

                    dense_layer.weights = new_weights;
                    dense_layer.biases = new_biases;
                }
            }
        }
    }

    fn clone_box(&self) -> Box<dyn Optimizer> {
        Box::new(self.clone())
    }
}


// Adam

#[derive(Clone, Debug)]
struct Moments {
    weights: (Tensor, Tensor),
    biases: (Tensor, Tensor)
}

impl Moments {
    fn for_layer(layer: &Dense) -> Self {
        let (w_rows, w_cols) = layer.weights.shape();
        let (b_rows, b_cols) = layer.biases.shape();
        Self {
            weights: (Tensor::zeros(w_rows, w_cols), Tensor::zeros(w_rows, w_cols)),
            biases: (Tensor::zeros(b_rows, b_cols), Tensor::zeros(b_rows, b_cols))
        }
    }
}

#[derive(Clone, Debug)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    t: i32,
    moments: Vec<Moments> // one entry per dense layer, in layer order
}

impl Adam {
    pub fn new(learning_rate: f32) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            t: 0,
            moments: Vec::new()
        }
    }
}

fn adam_update(param: &mut Tensor, grad: &Tensor, moments: &mut (Tensor, Tensor), hp: (f32, f32, f32), step_size: f32, bias_correction2: f32) {
    let (beta1, beta2, epsilon) = hp;
    let (m, v) = moments;

    let params = param.write();
    let grads = grad.read();
    let first = m.write();
    let second = v.write();
    for i in 0..params.len() {
        let g = grads[i];
        first[i] = beta1 * first[i] + (1.0 - beta1) * g;
        second[i] = beta2 * second[i] + (1.0 - beta2) * g * g;
        let denom = second[i].sqrt() / bias_correction2 + epsilon;
        params[i] -= step_size * first[i] / denom;
    }
}

impl Optimizer for Adam {
    fn step(&mut self, layers: &mut [Box<dyn Layer>]) {
        self.t += 1;
        let hp = (self.beta1, self.beta2, self.epsilon);
        let step_size = self.learning_rate / (1.0 - self.beta1.powi(self.t));
        let bias_correction2 = (1.0 - self.beta2.powi(self.t)).sqrt();

        let mut dense_index = 0;
        for layer in layers {
            let Some(dense_layer) = layer.as_any_mut().downcast_mut::<Dense>() else {
                continue;
            };
            if self.moments.len() <= dense_index {
                self.moments.push(Moments::for_layer(dense_layer));
            }

            if let (Some(d_weights), Some(d_biases)) = (&dense_layer.d_weights, &dense_layer.d_biases) {
                let moments = &mut self.moments[dense_index];
                adam_update(&mut dense_layer.weights, d_weights, &mut moments.weights, hp, step_size, bias_correction2);
                adam_update(&mut dense_layer.biases, d_biases, &mut moments.biases, hp, step_size, bias_correction2);
            }
            dense_index += 1;
        }
    }

    fn clone_box(&self) -> Box<dyn Optimizer> {
        Box::new(self.clone())
    }
}
