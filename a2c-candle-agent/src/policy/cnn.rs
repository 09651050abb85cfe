use a2c_core::error::A2cError;
use anyhow::Result;
use candle_core::{Module, Tensor};
use candle_nn::{
    conv::Conv2dConfig,
    conv2d, linear,
    sequential::{seq, Sequential},
    VarBuilder,
};

/// `(kernel, stride)` of the convolution layers.
const CONVS: [(usize, usize); 3] = [(8, 4), (4, 2), (3, 1)];

/// Convolutional torso, which has the same architecture of the DQN paper.
///
/// Pixel values are divided by 255. Frames are stacked along the channel axis.
pub struct Cnn {
    seq: Sequential,
}

impl Cnn {
    fn stride(s: usize) -> Conv2dConfig {
        Conv2dConfig {
            stride: s,
            ..Default::default()
        }
    }

    /// Returns `(channels, height, width)` of a frame and the spatial size after the
    /// convolution layers.
    pub fn out_hw(frame_shape: &[usize]) -> Result<((usize, usize, usize), (usize, usize))> {
        let (c, h, w) = match *frame_shape {
            [h, w] => (1, h, w),
            [c, h, w] => (c, h, w),
            _ => {
                return Err(A2cError::InvalidConfig(format!(
                    "frame shape {:?} is not an image",
                    frame_shape
                ))
                .into())
            }
        };
        let (mut oh, mut ow) = (h, w);
        for (k, s) in CONVS {
            if oh < k || ow < k {
                return Err(A2cError::InvalidConfig(format!(
                    "frame shape {:?} is too small for the convolution layers",
                    frame_shape
                ))
                .into());
            }
            oh = (oh - k) / s + 1;
            ow = (ow - k) / s + 1;
        }
        Ok(((c, h, w), (oh, ow)))
    }

    /// Builds the torso with `out_dim` output features.
    pub fn build(
        vb: VarBuilder,
        frame_shape: &[usize],
        n_stack: usize,
        out_dim: usize,
    ) -> Result<Self> {
        let ((c, h, w), (oh, ow)) = Self::out_hw(frame_shape)?;
        let in_channels = n_stack * c;
        let seq = seq()
            .add_fn(move |xs| {
                let b = xs.dim(0)?;
                xs.reshape((b, in_channels, h, w))? / 255.0
            })
            .add(conv2d(
                in_channels,
                32,
                CONVS[0].0,
                Self::stride(CONVS[0].1),
                vb.pp("c1"),
            )?)
            .add_fn(|xs| xs.relu())
            .add(conv2d(32, 64, CONVS[1].0, Self::stride(CONVS[1].1), vb.pp("c2"))?)
            .add_fn(|xs| xs.relu())
            .add(conv2d(64, 64, CONVS[2].0, Self::stride(CONVS[2].1), vb.pp("c3"))?)
            .add_fn(|xs| xs.relu()?.flatten_from(1))
            .add(linear(64 * oh * ow, out_dim, vb.pp("l1"))?)
            .add_fn(|xs| xs.relu());

        Ok(Self { seq })
    }
}

impl Module for Cnn {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        self.seq.forward(xs)
    }
}
