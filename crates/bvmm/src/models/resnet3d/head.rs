//! # Classifier Head
//!
//! Maps pooled ``[batch, in_features]`` features to ``[batch, num_classes]``:
//!
//! ```text
//! norm1 -> drop1(ps / 2) -> fc1(-> hidden) -> act
//!   -> norm2 -> drop2(ps) -> fc2(-> num_classes, no bias) -> [softmax]
//! ```

use crate::compat::activation_wrapper::{Activation, ActivationConfig};
use burn::nn::{BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig};
use burn::prelude::{Backend, Config, Module, Tensor};
use burn::tensor::activation::softmax;

/// Default hidden width of the head.
pub const DEFAULT_HEAD_HIDDEN: usize = 256;

/// [`ClassifierHead3d`] Config.
#[derive(Config, Debug)]
pub struct ClassifierHead3dConfig {
    /// Pooled feature width.
    pub in_features: usize,

    /// Number of classes.
    pub num_classes: usize,

    /// Hidden width.
    #[config(default = "DEFAULT_HEAD_HIDDEN")]
    pub hidden: usize,

    /// Dropout probability; the first dropout uses ``ps / 2``.
    #[config(default = 0.5)]
    pub ps: f64,

    /// Hidden activation.
    #[config(default = "ActivationConfig::Relu")]
    pub activation: ActivationConfig,

    /// Apply a softmax over the class dimension.
    #[config(default = false)]
    pub final_softmax: bool,
}

impl ClassifierHead3dConfig {
    /// Check the config.
    pub fn try_validate(&self) -> anyhow::Result<()> {
        if !(0.0..=1.0).contains(&self.ps) {
            anyhow::bail!("ps must be a probability in [0, 1]: {}", self.ps);
        }
        Ok(())
    }

    /// Initialize a [`ClassifierHead3d`].
    pub fn try_init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> anyhow::Result<ClassifierHead3d<B>> {
        self.try_validate()?;
        Ok(ClassifierHead3d {
            norm1: BatchNormConfig::new(self.in_features).init(device),
            drop1: DropoutConfig::new(self.ps / 2.0).init(),
            fc1: LinearConfig::new(self.in_features, self.hidden).init(device),
            act: self.activation.init(device),
            norm2: BatchNormConfig::new(self.hidden).init(device),
            drop2: DropoutConfig::new(self.ps).init(),
            fc2: LinearConfig::new(self.hidden, self.num_classes)
                .with_bias(false)
                .init(device),
            final_softmax: self.final_softmax,
        })
    }
}

/// Two-layer classifier head.
#[derive(Module, Debug)]
pub struct ClassifierHead3d<B: Backend> {
    /// Input feature norm.
    pub norm1: BatchNorm<B, 0>,

    /// Input dropout; ``ps / 2``.
    pub drop1: Dropout,

    /// Hidden projection.
    pub fc1: Linear<B>,

    /// Hidden activation.
    pub act: Activation<B>,

    /// Hidden feature norm.
    pub norm2: BatchNorm<B, 0>,

    /// Hidden dropout; ``ps``.
    pub drop2: Dropout,

    /// Class projection; no bias.
    pub fc2: Linear<B>,

    /// Apply a softmax over the class dimension.
    pub final_softmax: bool,
}

impl<B: Backend> ClassifierHead3d<B> {
    /// The number of output classes.
    pub fn num_classes(&self) -> usize {
        self.fc2.weight.shape().dims[1]
    }

    /// The pooled feature width.
    pub fn in_features(&self) -> usize {
        self.fc1.weight.shape().dims[0]
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_features]``.
    ///
    /// # Returns
    ///
    /// ``[batch, num_classes]``
    pub fn forward(
        &self,
        input: Tensor<B, 2>,
    ) -> Tensor<B, 2> {
        let x = self.norm1.forward(input);
        let x = self.drop1.forward(x);
        let x = self.fc1.forward(x);
        let x = self.act.forward(x);
        let x = self.norm2.forward(x);
        let x = self.drop2.forward(x);
        let x = self.fc2.forward(x);

        if self.final_softmax {
            softmax(x, 1)
        } else {
            x
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::assert_close;
    use burn::backend::{Autodiff, NdArray};
    use burn::tensor::Distribution;

    #[test]
    fn test_head_config() {
        let config = ClassifierHead3dConfig::new(512, 101);
        assert_eq!(config.hidden, 256);
        assert_eq!(config.ps, 0.5);
        assert!(!config.final_softmax);
        assert!(config.try_validate().is_ok());
        assert!(config.with_ps(1.5).try_validate().is_err());
    }

    #[test]
    fn test_head() {
        type B = NdArray<f32>;
        let device = Default::default();

        let head: ClassifierHead3d<B> = ClassifierHead3dConfig::new(16, 7)
            .with_ps(0.2)
            .try_init(&device)
            .unwrap();
        assert_eq!(head.in_features(), 16);
        assert_eq!(head.num_classes(), 7);
        assert!(head.fc1.bias.is_some());
        assert!(head.fc2.bias.is_none());
        assert_eq!(head.drop1.prob, 0.1);
        assert_eq!(head.drop2.prob, 0.2);

        let output = head.forward(Tensor::random([3, 16], Distribution::Default, &device));
        assert_eq!(output.dims(), [3, 7]);
    }

    #[test]
    fn test_head_softmax_autodiff() {
        type B = Autodiff<NdArray<f32>>;
        let device = Default::default();

        let head: ClassifierHead3d<B> = ClassifierHead3dConfig::new(16, 5)
            .with_final_softmax(true)
            .try_init(&device)
            .unwrap();

        let output = head.forward(Tensor::random([4, 16], Distribution::Default, &device));
        assert_eq!(output.dims(), [4, 5]);

        let sums = output.sum_dim(1);
        assert_close(sums, Tensor::ones([4, 1], &device), 1e-5);
    }
}
