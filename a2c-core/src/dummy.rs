//! Deterministic environments and models used for tests.
use crate::{
    error::A2cError,
    record::{Record, RecordValue},
    ActorCritic, Env, Step, StepOutput,
};
use anyhow::Result;
use ndarray::{Array2, Array3, Axis};

/// Configuration of [`ScriptedEnv`].
#[derive(Clone, Debug)]
pub struct ScriptedEnvConfig {
    /// Shape of a frame.
    pub frame_shape: Vec<usize>,

    /// Reward scripts, one row per instance.
    pub rewards: Vec<Vec<f32>>,

    /// Done scripts, one row per instance.
    pub dones: Vec<Vec<bool>>,

    /// The number of actions.
    pub n_actions: usize,

    /// Action rewarded with an extra `1.0`, if any.
    pub rewarded_action: Option<usize>,

    /// Step index at which [`Env::step`] fails.
    pub fail_at: Option<usize>,
}

impl ScriptedEnvConfig {
    /// An environment that never ends an episode and gives zero rewards.
    pub fn new(frame_shape: Vec<usize>) -> Self {
        Self {
            frame_shape,
            rewards: vec![vec![0.0]],
            dones: vec![vec![false]],
            n_actions: 2,
            rewarded_action: None,
            fail_at: None,
        }
    }

    /// Sets the reward scripts.
    pub fn rewards(mut self, rewards: Vec<Vec<f32>>) -> Self {
        self.rewards = rewards;
        self
    }

    /// Sets the done scripts.
    pub fn dones(mut self, dones: Vec<Vec<bool>>) -> Self {
        self.dones = dones;
        self
    }

    /// Sets the number of actions.
    pub fn n_actions(mut self, n_actions: usize) -> Self {
        self.n_actions = n_actions;
        self
    }

    /// Sets the action rewarded with an extra `1.0`.
    pub fn rewarded_action(mut self, act: Option<usize>) -> Self {
        self.rewarded_action = act;
        self
    }

    /// Sets the step index at which stepping fails.
    pub fn fail_at(mut self, ix: Option<usize>) -> Self {
        self.fail_at = ix;
        self
    }
}

/// An environment replaying fixed reward and done sequences.
///
/// The instance built with seed `s` replays row `s % n_rows` of the scripts.
/// Scripts cycle over the steps taken since the instance was built, regardless of
/// resets. The first frame of an episode is filled with `-1.0`; the frame after the
/// `n`-th step since build is filled with `n`.
pub struct ScriptedEnv {
    config: ScriptedEnvConfig,
    row: usize,
    n_steps: usize,
}

impl ScriptedEnv {
    fn frame(&self, v: f32) -> Vec<f32> {
        vec![v; self.config.frame_shape.iter().product()]
    }
}

impl Env for ScriptedEnv {
    type Config = ScriptedEnvConfig;

    fn build(config: &Self::Config, seed: i64) -> Result<Self> {
        let rows = config.rewards.len().min(config.dones.len());
        if rows == 0
            || config.rewards.iter().any(|r| r.is_empty())
            || config.dones.iter().any(|d| d.is_empty())
        {
            return Err(A2cError::InvalidConfig("empty script".to_string()).into());
        }
        Ok(Self {
            config: config.clone(),
            row: seed.unsigned_abs() as usize % rows,
            n_steps: 0,
        })
    }

    fn frame_shape(&self) -> Vec<usize> {
        self.config.frame_shape.clone()
    }

    fn n_actions(&self) -> usize {
        self.config.n_actions
    }

    fn reset(&mut self) -> Result<Vec<f32>> {
        Ok(self.frame(-1.0))
    }

    fn step(&mut self, act: usize) -> Result<(Step, Record)> {
        if self.config.fail_at == Some(self.n_steps) {
            return Err(anyhow::anyhow!("scripted failure at step {}", self.n_steps));
        }
        let rewards = &self.config.rewards[self.row];
        let dones = &self.config.dones[self.row];
        let mut reward = rewards[self.n_steps % rewards.len()];
        if self.config.rewarded_action == Some(act) {
            reward += 1.0;
        }
        let is_done = dones[self.n_steps % dones.len()];
        self.n_steps += 1;

        let record = Record::from_slice(&[("act", RecordValue::Scalar(act as f32))]);
        Ok((Step::new(self.frame(self.n_steps as f32), reward, is_done), record))
    }
}

/// An [`ActorCritic`] with fixed outputs.
///
/// Every instance takes `action`, and every state and per-action value is `value`.
/// The recurrent state is a single column counting the steps since the last mask.
#[derive(Debug, Clone)]
pub struct ConstantModel {
    n_envs: usize,
    n_actions: usize,
    action: usize,
    value: f32,
}

impl ConstantModel {
    /// Constructs a model.
    pub fn new(n_envs: usize, n_actions: usize, action: usize, value: f32) -> Self {
        Self {
            n_envs,
            n_actions,
            action,
            value,
        }
    }
}

impl ActorCritic for ConstantModel {
    fn initial_state(&self) -> Array2<f32> {
        Array2::zeros((self.n_envs, 1))
    }

    fn step(
        &mut self,
        obs: &Array3<f32>,
        states: &Array2<f32>,
        masks: &[bool],
    ) -> Result<StepOutput> {
        let n = obs.len_of(Axis(0));
        let mut next = states.clone();
        for (i, mut row) in next.axis_iter_mut(Axis(0)).enumerate() {
            let prev = if masks[i] { 0.0 } else { row[0] };
            row[0] = prev + 1.0;
        }
        Ok(StepOutput {
            actions: vec![self.action; n],
            values: vec![self.value; n],
            q_values: Array2::from_elem((n, self.n_actions), self.value),
            states: next,
        })
    }

    fn value(&self, obs: &Array3<f32>, _states: &Array2<f32>, _masks: &[bool]) -> Result<Vec<f32>> {
        Ok(vec![self.value; obs.len_of(Axis(0))])
    }
}
