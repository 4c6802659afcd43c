//! # Adaptive Average Pooling

use burn::config::Config;
use burn::module::Module;
use burn::prelude::{Backend, Tensor};

/// [`AdaptiveAvgPool3d`] Config.
#[derive(Config, Debug)]
pub struct AdaptiveAvgPool3dConfig {
    /// The ``[depth, height, width]`` of the output.
    #[config(default = "[1, 1, 1]")]
    pub output_size: [usize; 3],
}

impl AdaptiveAvgPool3dConfig {
    /// Initialize an [`AdaptiveAvgPool3d`].
    pub fn init(&self) -> AdaptiveAvgPool3d {
        AdaptiveAvgPool3d {
            output_size: self.output_size,
        }
    }
}

/// Adaptive 3d average pooling.
///
/// Output bin ``i`` of an axis with ``in`` inputs and ``out`` outputs
/// averages the inputs in ``floor(i*in/out)..ceil((i+1)*in/out)``;
/// bins may overlap when ``in`` is not a multiple of ``out``.
///
/// Maps ``[batch, channels, depth, height, width]`` to
/// ``[batch, channels, out_depth, out_height, out_width]``.
#[derive(Module, Clone, Debug)]
pub struct AdaptiveAvgPool3d {
    /// The ``[depth, height, width]`` of the output.
    pub output_size: [usize; 3],
}

impl AdaptiveAvgPool3d {
    /// Forward Pass.
    pub fn forward<B: Backend>(
        &self,
        input: Tensor<B, 5>,
    ) -> Tensor<B, 5> {
        let [batch, channels, depth, height, width] = input.dims();
        let [out_depth, out_height, out_width] = self.output_size;

        if self.output_size == [1, 1, 1] {
            return input.mean_dim(4).mean_dim(3).mean_dim(2);
        }

        let depth_slices = (0..out_depth)
            .map(|d| {
                let (d0, d1) = adaptive_bin(d, depth, out_depth);
                let height_slices = (0..out_height)
                    .map(|h| {
                        let (h0, h1) = adaptive_bin(h, height, out_height);
                        let width_slices = (0..out_width)
                            .map(|w| {
                                let (w0, w1) = adaptive_bin(w, width, out_width);
                                input
                                    .clone()
                                    .slice([0..batch, 0..channels, d0..d1, h0..h1, w0..w1])
                                    .mean_dim(4)
                                    .mean_dim(3)
                                    .mean_dim(2)
                            })
                            .collect();
                        Tensor::cat(width_slices, 4)
                    })
                    .collect();
                Tensor::cat(height_slices, 3)
            })
            .collect();
        Tensor::cat(depth_slices, 2)
    }
}

/// The ``[start, end)`` input range of adaptive output bin ``index``.
pub fn adaptive_bin(
    index: usize,
    input_size: usize,
    output_size: usize,
) -> (usize, usize) {
    let start = (index * input_size) / output_size;
    let end = ((index + 1) * input_size).div_ceil(output_size);
    (start, end)
}
