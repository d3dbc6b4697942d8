use super::tensor::Tensor;

pub trait Loss: Send {
    fn calculate(&self, y_pred: &Tensor, y_true: &Tensor) -> f32;
    fn gradient(&self, y_pred: &Tensor, y_true: &Tensor) -> Tensor;
    fn clone_box(&self) -> Box<dyn Loss>;
}


// mean squared error, averaged over the batch dimension

#[derive(Clone, Copy, Debug, Default)]
pub struct MeanSquaredError;

impl Loss for MeanSquaredError {
    fn calculate(&self, y_pred: &Tensor, y_true: &Tensor) -> f32 {
        let batch_size = y_pred.rows();
        if batch_size == 0 {
            return 0.0;
        }
        let diff = y_pred.map2(y_true, |pred_x, true_x| pred_x - true_x);
        diff.read().iter().map(|x| x * x).sum::<f32>() / batch_size as f32
    }

    fn gradient(&self, y_pred: &Tensor, y_true: &Tensor) -> Tensor {
        let scale = 2.0 / y_pred.rows().max(1) as f32;
        y_pred.map2(y_true, move |pred_x, true_x| scale * (pred_x - true_x))
    }

    fn clone_box(&self) -> Box<dyn Loss> {
        Box::new(*self)
    }
}
