//! Environment.
use super::Step;
use crate::record::Record;
use anyhow::Result;

/// Represents a single environment instance, typically an MDP.
///
/// Observations are frames flattened into `Vec<f32>` whose length is the product
/// of [`Env::frame_shape`]. Actions are indices of a discrete action space.
pub trait Env {
    /// Configurations.
    type Config: Clone;

    /// Builds an environment with a given random seed.
    fn build(config: &Self::Config, seed: i64) -> Result<Self>
    where
        Self: Sized;

    /// Shape of a single frame.
    fn frame_shape(&self) -> Vec<usize>;

    /// The number of discrete actions.
    fn n_actions(&self) -> usize;

    /// Starts a new episode and returns its first frame.
    fn reset(&mut self) -> Result<Vec<f32>>;

    /// Performes an environment step.
    ///
    /// The episode is not reset by this method even if it ends.
    fn step(&mut self, act: usize) -> Result<(Step, Record)>;
}
