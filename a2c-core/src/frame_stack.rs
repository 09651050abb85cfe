//! Rolling buffer of stacked frames.
use crate::error::A2cError;
use anyhow::Result;
use ndarray::{s, Array2, Array3, Axis};

/// Keeps the latest `n_stack` frames of every environment instance.
///
/// The buffer has shape `[n_envs, n_stack, frame_len]`. Slot `n_stack - 1` holds
/// the newest frame; slot `0` the oldest.
#[derive(Debug, Clone)]
pub struct FrameStack {
    buf: Array3<f32>,
}

impl FrameStack {
    /// Creates a buffer filled with zero frames.
    pub fn new(n_envs: usize, n_stack: usize, frame_len: usize) -> Self {
        Self {
            buf: Array3::zeros((n_envs, n_stack, frame_len)),
        }
    }

    /// The number of stacked frames.
    pub fn n_stack(&self) -> usize {
        self.buf.len_of(Axis(1))
    }

    /// Shifts the frames of every instance one slot towards the oldest, dropping
    /// the oldest, and writes `frames` (`[n_envs, frame_len]`) into the newest slot.
    pub fn update(&mut self, frames: &Array2<f32>) -> Result<()> {
        let (n_envs, n_stack, frame_len) = self.buf.dim();
        if frames.dim() != (n_envs, frame_len) {
            return Err(A2cError::ShapeMismatch(format!(
                "frames {:?}, expected {:?}",
                frames.dim(),
                (n_envs, frame_len)
            ))
            .into());
        }

        for j in 0..n_stack - 1 {
            let (mut dst, src) = self
                .buf
                .multi_slice_mut((s![.., j, ..], s![.., j + 1, ..]));
            dst.assign(&src);
        }
        self.buf.slice_mut(s![.., n_stack - 1, ..]).assign(frames);
        Ok(())
    }

    /// Zeroes all frames of instance `ix`.
    pub fn zero(&mut self, ix: usize) {
        self.buf.index_axis_mut(Axis(0), ix).fill(0.0);
    }

    /// Zeroes all frames of every instance.
    pub fn clear(&mut self) {
        self.buf.fill(0.0);
    }

    /// Stacked observations, `[n_envs, n_stack, frame_len]`.
    pub fn obs(&self) -> &Array3<f32> {
        &self.buf
    }
}
