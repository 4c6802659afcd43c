//! # Tensor Statistics

use burn::prelude::{Backend, Tensor};
use burn::tensor::ElementConversion;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Summary statistics of a tensor's values.
///
/// `std` is the population standard deviation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TensorStats {
    /// Number of elements.
    pub numel: usize,

    /// Mean.
    pub mean: f64,

    /// Population standard deviation.
    pub std: f64,

    /// Minimum.
    pub min: f64,

    /// Maximum.
    pub max: f64,
}

impl TensorStats {
    /// Compute the stats of a tensor.
    ///
    /// # Panics
    ///
    /// If the tensor is empty.
    pub fn of<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Self {
        let numel = tensor.shape().num_elements();
        assert!(numel > 0, "TensorStats of an empty tensor");

        let x: Tensor<B, 1> = tensor.flatten(0, D - 1);
        let mean: f64 = x.clone().mean().into_scalar().elem();
        let var: f64 = x
            .clone()
            .sub_scalar(mean)
            .powf_scalar(2.0)
            .mean()
            .into_scalar()
            .elem();

        Self {
            numel,
            mean,
            std: var.sqrt(),
            min: x.clone().min().into_scalar().elem(),
            max: x.max().into_scalar().elem(),
        }
    }
}

impl fmt::Display for TensorStats {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(
            f,
            "numel={} mean={:.4} std={:.4} min={:.4} max={:.4}",
            self.numel, self.mean, self.std, self.min, self.max
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use hamcrest::prelude::*;

    #[test]
    fn test_tensor_stats() {
        type B = NdArray<f32>;
        let device = Default::default();

        let tensor: Tensor<B, 2> = Tensor::from_floats([[1.0, 2.0], [3.0, 4.0]], &device);
        let stats = TensorStats::of(tensor);

        assert_eq!(stats.numel, 4);
        assert_that!(stats.mean, close_to(2.5, 1e-6));
        assert_that!(stats.std, close_to(1.25f64.sqrt(), 1e-6));
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 4.0);

        assert_eq!(
            stats.to_string(),
            "numel=4 mean=2.5000 std=1.1180 min=1.0000 max=4.0000"
        );
    }

    #[test]
    #[should_panic(expected = "empty tensor")]
    fn test_empty_tensor_panics() {
        type B = NdArray<f32>;
        let tensor: Tensor<B, 1> = Tensor::zeros([0], &Default::default());
        TensorStats::of(tensor);
    }
}
