//! Vectorized environment.
use super::VecStep;
use anyhow::Result;
use ndarray::Array2;

/// `N` environment instances behind a batched reset/step interface.
///
/// Each call of [`VecEnv::step`] advances every instance by exactly one step.
/// Instances whose episodes end are reset by the implementation, so that
/// callers can keep stepping without special handling.
pub trait VecEnv {
    /// The number of instances.
    fn n_envs(&self) -> usize;

    /// Shape of a single frame.
    fn frame_shape(&self) -> &[usize];

    /// The number of discrete actions.
    fn n_actions(&self) -> usize;

    /// The number of elements in a single frame.
    fn frame_len(&self) -> usize {
        self.frame_shape().iter().product()
    }

    /// Resets every instance and returns the first frames, `[n_envs, frame_len]`.
    fn reset(&mut self) -> Result<Array2<f32>>;

    /// Applies one action per instance.
    fn step(&mut self, acts: &[usize]) -> Result<VecStep>;
}
