//! Rollout collection.
use crate::{
    bootstrapped_returns, error::A2cError, ActorCritic, FrameStack, RolloutBatch, VecEnv,
};
use anyhow::Result;
use log::trace;
use ndarray::{Array2, Array3, Axis};

/// Outcome of advancing every instance by one step.
#[derive(Debug, Clone)]
pub struct Transition {
    /// Stacked observations the actions were taken on, `[n_envs, n_stack, frame_len]`.
    pub obs: Array3<f32>,

    /// Done flags entering the step.
    pub masks: Vec<bool>,

    /// Actions taken.
    pub actions: Vec<usize>,

    /// State values of `obs`.
    pub values: Vec<f32>,

    /// Per-action values of the taken actions.
    pub q_values: Vec<f32>,

    /// Rewards.
    pub rewards: Vec<f32>,

    /// Flags denoting if the step ended an episode.
    pub dones: Vec<bool>,
}

/// Drives fixed-length rollouts over every instance of a [`VecEnv`].
///
/// The runner owns the frame buffers, the recurrent states and the done flags of all
/// instances; they carry over from one call of [`Runner::run`] to the next. An instance
/// whose episode ends within a rollout has its frame buffer zeroed and keeps stepping,
/// so a rollout may span several episodes of the same instance.
pub struct Runner<V: VecEnv> {
    env: V,
    n_steps: usize,
    gamma: f32,
    frames: FrameStack,
    initial_state: Array2<f32>,
    states: Array2<f32>,
    dones: Vec<bool>,
}

impl<V: VecEnv> Runner<V> {
    /// Constructs a runner and resets every instance.
    pub fn new<M: ActorCritic>(
        env: V,
        model: &M,
        n_steps: usize,
        n_stack: usize,
        gamma: f32,
    ) -> Result<Self> {
        let n_envs = env.n_envs();
        if n_steps == 0 || n_stack == 0 {
            return Err(A2cError::InvalidConfig(format!(
                "n_steps = {}, n_stack = {}",
                n_steps, n_stack
            ))
            .into());
        }
        let initial_state = model.initial_state();
        if initial_state.nrows() != n_envs {
            return Err(A2cError::ShapeMismatch(format!(
                "initial state has {} rows for {} environments",
                initial_state.nrows(),
                n_envs
            ))
            .into());
        }

        let frames = FrameStack::new(n_envs, n_stack, env.frame_len());
        let mut runner = Self {
            env,
            n_steps,
            gamma,
            frames,
            states: initial_state.clone(),
            initial_state,
            dones: vec![false; n_envs],
        };
        runner.reset()?;
        Ok(runner)
    }

    /// The number of instances.
    pub fn n_envs(&self) -> usize {
        self.env.n_envs()
    }

    /// The number of steps of a rollout.
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// Starts new episodes in every instance.
    pub fn reset(&mut self) -> Result<()> {
        self.frames.clear();
        let obs = self.env.reset()?;
        self.frames.update(&obs)?;
        self.states = self.initial_state.clone();
        self.dones.fill(false);
        Ok(())
    }

    /// Advances every instance by one step.
    ///
    /// The stacked observations are captured before stepping, and the frame buffer
    /// of a finished instance is zeroed only after that capture.
    pub fn advance<M: ActorCritic>(&mut self, model: &mut M) -> Result<Transition> {
        let n_envs = self.n_envs();
        let obs = self.frames.obs().clone();
        let out = model.step(&obs, &self.states, &self.dones)?;
        if out.actions.len() != n_envs || out.values.len() != n_envs {
            return Err(A2cError::ShapeMismatch(format!(
                "model produced {} actions and {} values for {} environments",
                out.actions.len(),
                out.values.len(),
                n_envs
            ))
            .into());
        }
        let q_values = out
            .actions
            .iter()
            .enumerate()
            .map(|(i, &a)| {
                out.q_values.get((i, a)).copied().ok_or_else(|| {
                    A2cError::ShapeMismatch(format!("no per-action value for action {}", a))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let step = self.env.step(&out.actions)?;
        let masks = std::mem::replace(&mut self.dones, step.is_done.clone());
        self.states = out.states;
        for (i, &done) in step.is_done.iter().enumerate() {
            if done {
                self.frames.zero(i);
            }
        }
        self.frames.update(&step.obs)?;

        Ok(Transition {
            obs,
            masks,
            actions: out.actions,
            values: out.values,
            q_values,
            rewards: step.reward,
            dones: step.is_done,
        })
    }

    /// Collects `n_steps` steps of every instance.
    pub fn run<M: ActorCritic>(&mut self, model: &mut M) -> Result<RolloutBatch> {
        let (n_envs, n_steps) = (self.n_envs(), self.n_steps);
        let (_, n_stack, frame_len) = self.frames.obs().dim();
        let states = self.states.clone();

        let transitions = (0..n_steps)
            .map(|_| self.advance(model))
            .collect::<Result<Vec<_>>>()?;
        let last_values = model.value(self.frames.obs(), &self.states, &self.dones)?;
        if last_values.len() != n_envs {
            return Err(A2cError::ShapeMismatch(format!(
                "{} bootstrap values for {} environments",
                last_values.len(),
                n_envs
            ))
            .into());
        }

        let mut obs = Array3::zeros((n_envs * n_steps, n_stack, frame_len));
        let len = n_envs * n_steps;
        let (mut returns, mut masks, mut actions, mut values, mut q_values) = (
            Vec::with_capacity(len),
            Vec::with_capacity(len),
            Vec::with_capacity(len),
            Vec::with_capacity(len),
            Vec::with_capacity(len),
        );
        for env in 0..n_envs {
            let rewards = transitions.iter().map(|tr| tr.rewards[env]).collect::<Vec<_>>();
            let dones = transitions.iter().map(|tr| tr.dones[env]).collect::<Vec<_>>();
            returns.extend(bootstrapped_returns(
                &rewards,
                &dones,
                last_values[env],
                self.gamma,
            ));
            for (t, tr) in transitions.iter().enumerate() {
                obs.index_axis_mut(Axis(0), env * n_steps + t)
                    .assign(&tr.obs.index_axis(Axis(0), env));
                masks.push(tr.masks[env]);
                actions.push(tr.actions[env]);
                values.push(tr.values[env]);
                q_values.push(tr.q_values[env]);
            }
        }
        trace!("Collected a rollout of {} steps", len);

        Ok(RolloutBatch {
            n_envs,
            n_steps,
            obs,
            states,
            returns,
            masks,
            actions,
            values,
            q_values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dummy::{ConstantModel, ScriptedEnv, ScriptedEnvConfig},
        SequentialVecEnv,
    };
    use ndarray::s;

    fn assert_close(a: &[f32], b: &[f32]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-5, "{:?} != {:?}", a, b);
        }
    }

    fn runner(
        config: &ScriptedEnvConfig,
        n_envs: usize,
        n_steps: usize,
        value: f32,
    ) -> Result<(Runner<SequentialVecEnv<ScriptedEnv>>, ConstantModel)> {
        let env = SequentialVecEnv::<ScriptedEnv>::build(config, n_envs, 0)?;
        let model = ConstantModel::new(n_envs, 2, 0, value);
        let runner = Runner::new(env, &model, n_steps, 4, 0.9)?;
        Ok((runner, model))
    }

    #[test]
    fn test_returns_of_two_instances() -> Result<()> {
        let config = ScriptedEnvConfig::new(vec![1])
            .rewards(vec![vec![1., 1., 0.], vec![1., 0., 1.]])
            .dones(vec![vec![false, false, true], vec![false, true, false]]);
        let (mut runner, mut model) = runner(&config, 2, 3, 5.0)?;
        let batch = runner.run(&mut model)?;

        assert_eq!(batch.len(), 6);
        assert_close(&batch.returns[0..3], &[1.9, 1.0, 0.0]);
        assert_close(&batch.returns[3..6], &[1.0, 0.0, 5.5]);
        assert_eq!(batch.masks, vec![false, false, false, false, false, true]);
        Ok(())
    }

    #[test]
    fn test_masks_are_dones_entering_each_step() -> Result<()> {
        let dones = vec![false, true, true, false, false, true, false];
        let config = ScriptedEnvConfig::new(vec![1])
            .rewards(vec![vec![3., -1., 0.5]])
            .dones(vec![dones.clone()]);
        let (mut runner, mut model) = runner(&config, 1, 5, 0.0)?;

        let first = runner.run(&mut model)?;
        let second = runner.run(&mut model)?;
        let masks = [first.masks, second.masks].concat();

        // Nothing is done before the first step
        let mut expected = vec![false];
        expected.extend((0..9).map(|t| dones[t % dones.len()]));
        assert_eq!(masks, expected);
        Ok(())
    }

    #[test]
    fn test_terminal_frame_is_captured_before_zeroing() -> Result<()> {
        let config = ScriptedEnvConfig::new(vec![2])
            .rewards(vec![vec![0.]])
            .dones(vec![vec![false, false, true]]);
        let (mut runner, mut model) = runner(&config, 1, 4, 0.0)?;
        let batch = runner.run(&mut model)?;

        // Step 2 acts on the frames [0, -1, 1, 2]
        assert_eq!(batch.obs.slice(s![2, .., 0]).to_vec(), vec![0., -1., 1., 2.]);

        // Step 3 acts on three zero frames and the first frame of a new episode
        assert_eq!(batch.obs.slice(s![3, .., 0]).to_vec(), vec![0., 0., 0., -1.]);
        Ok(())
    }

    #[test]
    fn test_recurrent_state_is_gated_by_masks() -> Result<()> {
        let config = ScriptedEnvConfig::new(vec![1])
            .rewards(vec![vec![0.]])
            .dones(vec![vec![false, true]]);
        let (mut runner, mut model) = runner(&config, 1, 2, 0.0)?;
        let first = runner.run(&mut model)?;
        let second = runner.run(&mut model)?;

        assert_eq!(first.states[[0, 0]], 0.0);
        // Two steps were counted before the end of the episode was observed
        assert_eq!(second.states[[0, 0]], 2.0);
        assert_eq!(second.masks, vec![true, false]);
        Ok(())
    }

    #[test]
    fn test_reset_clears_done_flags() -> Result<()> {
        let config = ScriptedEnvConfig::new(vec![1]).dones(vec![vec![true]]);
        let (mut runner, mut model) = runner(&config, 1, 1, 0.0)?;
        runner.run(&mut model)?;
        runner.reset()?;
        let tr = runner.advance(&mut model)?;
        assert_eq!(tr.masks, vec![false]);
        assert_eq!(tr.obs.slice(s![0, .., 0]).to_vec(), vec![0., 0., 0., -1.]);
        Ok(())
    }

    #[test]
    fn test_initial_state_must_match_instances() -> Result<()> {
        let env = SequentialVecEnv::<ScriptedEnv>::build(&ScriptedEnvConfig::new(vec![1]), 2, 0)?;
        let model = ConstantModel::new(3, 2, 0, 0.0);
        assert!(Runner::new(env, &model, 5, 4, 0.99).is_err());
        Ok(())
    }
}
