//! Actor-critic models.
use crate::{
    record::{Record, RecordValue},
    RolloutBatch,
};
use anyhow::Result;
use ndarray::{Array2, Array3};
use std::path::{Path, PathBuf};

/// Output of [`ActorCritic::step`].
#[derive(Debug, Clone)]
pub struct StepOutput {
    /// Sampled actions, one per instance.
    pub actions: Vec<usize>,

    /// State-value estimates.
    pub values: Vec<f32>,

    /// Per-action value estimates, `[n_envs, n_actions]`.
    pub q_values: Array2<f32>,

    /// Recurrent states after consuming the observations, `[n_envs, state_dim]`.
    pub states: Array2<f32>,
}

/// A policy producing an action distribution, a state value and per-action values.
///
/// Observations are stacked frames, `[n_envs, n_stack, frame_len]`.
/// Recurrent states are opaque rows, `[n_envs, state_dim]`; `state_dim` is zero
/// for feed-forward policies. `masks[i] == true` means the history of instance `i`
/// has to be discarded before consuming `obs[i]`.
pub trait ActorCritic {
    /// Recurrent states at the start of training, `[n_envs, state_dim]`.
    fn initial_state(&self) -> Array2<f32>;

    /// Samples actions. Does not change the parameters.
    fn step(
        &mut self,
        obs: &Array3<f32>,
        states: &Array2<f32>,
        masks: &[bool],
    ) -> Result<StepOutput>;

    /// Returns state values without sampling.
    fn value(&self, obs: &Array3<f32>, states: &Array2<f32>, masks: &[bool]) -> Result<Vec<f32>>;
}

/// Losses computed in an optimization step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossStats {
    /// Policy gradient loss.
    pub policy_loss: f32,

    /// Value loss.
    pub value_loss: f32,

    /// Entropy of the action distribution.
    pub entropy: f32,
}

impl From<LossStats> for Record {
    fn from(stats: LossStats) -> Self {
        Record::from_slice(&[
            ("policy_loss", RecordValue::Scalar(stats.policy_loss)),
            ("value_loss", RecordValue::Scalar(stats.value_loss)),
            ("policy_entropy", RecordValue::Scalar(stats.entropy)),
        ])
    }
}

/// A trainable [`ActorCritic`].
pub trait Agent: ActorCritic {
    /// Performs exactly one parameter update with the given rollout.
    fn train(&mut self, batch: &RolloutBatch) -> Result<LossStats>;

    /// Returns information on the latest update, e.g., the learning rate.
    fn train_record(&self) -> Record {
        Record::empty()
    }

    /// Saves a snapshot of the parameters and returns its path.
    fn save(&mut self) -> Result<PathBuf>;

    /// Restores the parameters from a snapshot.
    fn load(&mut self, path: &Path) -> Result<()>;
}
