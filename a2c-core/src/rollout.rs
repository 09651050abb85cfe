//! Rollout batch.
use ndarray::{Array2, Array3};

/// `T` timesteps of `N` environment instances, flattened instance-major.
///
/// Element `(env, t)` is stored at index `env * n_steps + t` in every per-step field
/// and along the first axis of `obs`.
#[derive(Debug, Clone)]
pub struct RolloutBatch {
    /// The number of instances `N`.
    pub n_envs: usize,

    /// The number of timesteps `T`.
    pub n_steps: usize,

    /// Stacked observations at acting time, `[N * T, n_stack, frame_len]`.
    pub obs: Array3<f32>,

    /// Recurrent states at the start of the rollout, `[N, state_dim]`.
    pub states: Array2<f32>,

    /// Bootstrapped discounted returns.
    pub returns: Vec<f32>,

    /// Done flags entering each timestep.
    pub masks: Vec<bool>,

    /// Actions taken.
    pub actions: Vec<usize>,

    /// State values at acting time.
    pub values: Vec<f32>,

    /// Per-action values of the taken actions at acting time.
    pub q_values: Vec<f32>,
}

impl RolloutBatch {
    /// `N * T`.
    pub fn len(&self) -> usize {
        self.n_envs * self.n_steps
    }

    /// Returns `true` if the batch holds no step.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flat index of `(env, t)`.
    #[inline]
    pub fn index(&self, env: usize, t: usize) -> usize {
        env * self.n_steps + t
    }
}
