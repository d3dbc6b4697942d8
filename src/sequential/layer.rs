use super::tensor::Tensor;
use std::any::Any;
use rand::Rng;
use serde::{Serialize, Deserialize};

#[typetag::serde]
pub trait Layer: Send {
    fn forward(&mut self, input: &Tensor) -> Tensor;
    fn backward(&mut self, d_output: &Tensor) -> Tensor;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn as_any(&self) -> &dyn Any;
    fn clone_box(&self) -> Box<dyn Layer>;
}


// dense layer

#[derive(Serialize, Deserialize, Clone)]
pub struct Dense {
    pub weights: Tensor,
    pub biases: Tensor,
    #[serde(skip)]
    cached_input: Option<Tensor>, // for back propagation
    #[serde(skip)]
    pub d_weights: Option<Tensor>,
    #[serde(skip)]
    pub d_biases: Option<Tensor>
}

impl Dense {
    // He-normal weights, zero biases
    pub fn new<R: Rng + ?Sized>(input_size: usize, output_size: usize, rng: &mut R) -> Self {
        let std = (2.0 / input_size.max(1) as f32).sqrt();
        Self::from_parameters(
            Tensor::random(input_size, output_size, std, rng),
            Tensor::zeros(1, output_size)
        )
    }

    pub fn from_parameters(weights: Tensor, biases: Tensor) -> Self {
        assert_eq!(biases.shape(), (1, weights.cols()), "biases must be (1, output_size)");
        Self {
            weights,
            biases,
            cached_input: None,
            d_weights: None,
            d_biases: None
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.rows()
    }

    pub fn output_size(&self) -> usize {
        self.weights.cols()
    }
}

#[typetag::serde]
impl Layer for Dense {
    fn forward(&mut self, input: &Tensor) -> Tensor {
        self.cached_input = Some(input.clone());
        input.matmul(&self.weights).add_row(&self.biases)
    }

    fn backward(&mut self, d_output: &Tensor) -> Tensor {
        if let Some(cached_input) = &self.cached_input {
            // dL/dW = input.T @ dL/dY
            self.d_weights = Some(cached_input.t_matmul(d_output));

            // dL/db = dL/dY.sum(axis=0)
            self.d_biases = Some(d_output.column_sums());

            // dL/dX = dL/dY @ weights.T
            d_output.matmul_t(&self.weights)
        } else {
            panic!("complete forward pass first.");
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_box(&self) -> Box<dyn Layer> {
        Box::new(self.clone())
    }
}


// relu layer

#[derive(Serialize, Deserialize, Clone, Default)]
pub struct ReLU {
    #[serde(skip)]
    cached_input: Option<Tensor>
}

impl ReLU {
    pub fn new() -> Self {
        Self::default()
    }
}

#[typetag::serde]
impl Layer for ReLU {
    fn forward(&mut self, input: &Tensor) -> Tensor {
        self.cached_input = Some(input.clone());
        input.map(|x| x.max(0.0))
    }

    fn backward(&mut self, d_output: &Tensor) -> Tensor {
        if let Some(cached_input) = &self.cached_input {
            cached_input.map2(d_output, |input_val, output_val| {
                if input_val > 0.0 {
                    output_val
                } else {
                    0.0
                }
            })
        } else {
            panic!("complete forward pass first.");
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_box(&self) -> Box<dyn Layer> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn assert_vec_approx_eq(a: &[f32], b: &[f32]) {
        let tolerance = 1e-6;
        assert_eq!(a.len(), b.len(), "vectors have different lengths");
        for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
            assert!((x - y).abs() < tolerance, "mismatch at index {}: {} vs {}", i, x, y);
        }
    }

    fn fixed_dense() -> Dense {
        Dense::from_parameters(
            Tensor::from_vec(vec![10.0, 20.0, 30.0, 40.0], 2, 2),
            Tensor::from_vec(vec![1.0, 2.0], 1, 2)
        )
    }

    #[test]
    fn test_dense_new_shapes() {
        let layer = Dense::new(11, 128, &mut StdRng::seed_from_u64(1));
        assert_eq!(layer.weights.shape(), (11, 128));
        assert_eq!(layer.biases.read(), &[0.0; 128]);
        assert_eq!((layer.input_size(), layer.output_size()), (11, 128));
    }

    #[test]
    fn test_dense_forward() {
        let input = Tensor::from_vec(vec![1.0, 2.0], 1, 2);
        let mut layer = fixed_dense();

        // [1, 2] @ [[10, 20], [30, 40]] + [1, 2] = [71, 102]
        let output = layer.forward(&input);

        assert_eq!(output.shape(), (1, 2));
        assert_vec_approx_eq(output.read(), &[71.0, 102.0]);
    }

    #[test]
    fn test_dense_backward() {
        let input = Tensor::from_vec(vec![1.0, 2.0], 1, 2);
        let d_output = Tensor::from_vec(vec![5.0, 8.0], 1, 2);
        let mut layer = fixed_dense();

        layer.forward(&input);

        // [5, 8] @ [[10, 30], [20, 40]] = [210, 470]
        let d_input = layer.backward(&d_output);
        assert_eq!(d_input.shape(), (1, 2));
        assert_vec_approx_eq(d_input.read(), &[210.0, 470.0]);

        // [[1], [2]] @ [[5, 8]]
        assert_vec_approx_eq(layer.d_weights.as_ref().unwrap().read(), &[5.0, 8.0, 10.0, 16.0]);
        assert_vec_approx_eq(layer.d_biases.as_ref().unwrap().read(), &[5.0, 8.0]);
    }

    #[test]
    #[should_panic(expected = "complete forward pass first.")]
    fn test_dense_backward_without_forward() {
        let mut layer = fixed_dense();
        layer.backward(&Tensor::zeros(1, 2));
    }

    #[test]
    fn test_relu_forward_and_backward() {
        let input = Tensor::from_vec(vec![-10.0, -0.5, 0.0, 0.5, 10.0], 1, 5);
        let mut layer = ReLU::new();

        let output = layer.forward(&input);
        assert_vec_approx_eq(output.read(), &[0.0, 0.0, 0.0, 0.5, 10.0]);

        let d_input = layer.backward(&Tensor::from_vec(vec![1.0; 5], 1, 5));
        assert_vec_approx_eq(d_input.read(), &[0.0, 0.0, 0.0, 1.0, 1.0]);
    }
}
