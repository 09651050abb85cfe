//! Environment step.
use crate::record::Record;
use ndarray::Array2;

/// Represents the outcome `(o_t+1, r_t, done_t)` of applying an action.
#[derive(Debug, Clone)]
pub struct Step {
    /// Observation after the action.
    pub obs: Vec<f32>,

    /// Reward.
    pub reward: f32,

    /// Flag denoting if the episode ended with this step.
    pub is_done: bool,
}

impl Step {
    /// Constructs a [`Step`] object.
    pub fn new(obs: Vec<f32>, reward: f32, is_done: bool) -> Self {
        Self {
            obs,
            reward,
            is_done,
        }
    }
}

/// Batched outcome of stepping every instance of a [`VecEnv`](super::VecEnv).
#[derive(Debug, Clone)]
pub struct VecStep {
    /// Observations, `[n_envs, frame_len]`.
    ///
    /// For an instance with `is_done[i] == true`, the row holds the first frame
    /// of its next episode, not the terminal frame.
    pub obs: Array2<f32>,

    /// Rewards.
    pub reward: Vec<f32>,

    /// Flags denoting if the episodes ended.
    pub is_done: Vec<bool>,

    /// Additional information emitted by the environments.
    pub info: Vec<Record>,
}
