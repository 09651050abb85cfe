//! Environment instances stepped one after another in the caller's thread.
use super::{stack_frames, step_with_reset};
use crate::{error::A2cError, Env, VecEnv, VecStep};
use anyhow::Result;
use ndarray::Array2;

/// The [`VecEnv`] contract without worker threads.
///
/// Instance `i` is built with seed `seed + i`.
pub struct SequentialVecEnv<E: Env> {
    envs: Vec<E>,
    frame_shape: Vec<usize>,
    n_actions: usize,
}

impl<E: Env> SequentialVecEnv<E> {
    /// Builds `n_envs` environment instances.
    pub fn build(config: &E::Config, n_envs: usize, seed: i64) -> Result<Self> {
        let envs = (0..n_envs)
            .map(|i| E::build(config, seed + i as i64))
            .collect::<Result<Vec<_>>>()?;
        let first = envs
            .first()
            .ok_or_else(|| A2cError::InvalidConfig("n_envs must be positive".to_string()))?;
        let frame_shape = first.frame_shape();
        let n_actions = first.n_actions();

        Ok(Self {
            envs,
            frame_shape,
            n_actions,
        })
    }
}

impl<E: Env> VecEnv for SequentialVecEnv<E> {
    fn n_envs(&self) -> usize {
        self.envs.len()
    }

    fn frame_shape(&self) -> &[usize] {
        &self.frame_shape
    }

    fn n_actions(&self) -> usize {
        self.n_actions
    }

    fn reset(&mut self) -> Result<Array2<f32>> {
        let frames = self
            .envs
            .iter_mut()
            .map(|env| env.reset())
            .collect::<Result<Vec<_>>>()?;
        stack_frames(frames, self.frame_len())
    }

    fn step(&mut self, acts: &[usize]) -> Result<VecStep> {
        if acts.len() != self.envs.len() {
            return Err(A2cError::ShapeMismatch(format!(
                "{} actions for {} environments",
                acts.len(),
                self.envs.len()
            ))
            .into());
        }

        let n = self.envs.len();
        let (mut frames, mut reward, mut is_done, mut info) = (
            Vec::with_capacity(n),
            Vec::with_capacity(n),
            Vec::with_capacity(n),
            Vec::with_capacity(n),
        );
        for (env, &act) in self.envs.iter_mut().zip(acts) {
            let (step, record) = step_with_reset(env, act)?;
            frames.push(step.obs);
            reward.push(step.reward);
            is_done.push(step.is_done);
            info.push(record);
        }

        Ok(VecStep {
            obs: stack_frames(frames, self.frame_len())?,
            reward,
            is_done,
            info,
        })
    }
}
