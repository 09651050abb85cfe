//! Configuration of A2C agent.
use crate::{opt::OptimizerConfig, policy::PolicyConfig, Device};
use a2c_core::{error::A2cError, LrSchedule};
use anyhow::Result;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::{Path, PathBuf},
};

/// Baseline subtracted in the advantage weighting the policy gradient.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy, Default)]
pub enum Advantage {
    /// Captured per-action value of the taken action minus the return.
    #[default]
    ReturnBaseline,

    /// Captured per-action value of the taken action minus the captured state value.
    ValueBaseline,
}

/// Configuration of [`A2c`](super::A2c).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct A2cConfig {
    /// Configuration of the policy network.
    pub policy: PolicyConfig,

    /// Configuration of the optimizer.
    pub opt_config: OptimizerConfig,

    /// The number of environment instances.
    pub n_envs: usize,

    /// The number of environment workers, which must be `n_envs`.
    pub n_procs: usize,

    /// Rollout length.
    pub n_steps: usize,

    /// Discount factor.
    pub gamma: f32,

    /// Coefficient of the policy gradient loss.
    pub pg_coef: f64,

    /// Coefficient of the entropy bonus.
    pub ent_coef: f64,

    /// Coefficient of the value loss.
    pub vf_coef: f64,

    /// Threshold of the global norm of gradients; no clipping if `None`.
    pub max_grad_norm: Option<f32>,

    /// Horizon of the learning rate schedule in timesteps.
    pub total_timesteps: usize,

    /// Learning rate schedule.
    pub lr_schedule: LrSchedule,

    /// Baseline of the advantage.
    #[serde(default)]
    pub advantage: Advantage,

    /// Directory of parameter snapshots.
    pub model_dir: PathBuf,

    /// The number of snapshots kept.
    pub n_keep: usize,

    /// Seed of action sampling.
    pub seed: u64,

    /// Device of the parameters.
    #[serde(default)]
    pub device: Device,
}

impl A2cConfig {
    /// Creates a configuration with default hyperparameters.
    pub fn new(policy: PolicyConfig, n_envs: usize, model_dir: impl AsRef<Path>) -> Self {
        Self {
            policy,
            opt_config: OptimizerConfig::default(),
            n_envs,
            n_procs: n_envs,
            n_steps: 5,
            gamma: 0.99,
            pg_coef: 1.0,
            ent_coef: 0.01,
            vf_coef: 0.5,
            max_grad_norm: Some(0.5),
            total_timesteps: 80_000_000,
            lr_schedule: LrSchedule::Linear,
            advantage: Advantage::ReturnBaseline,
            model_dir: model_dir.as_ref().to_path_buf(),
            n_keep: 5,
            seed: 0,
            device: Device::Cpu,
        }
    }

    /// Sets the configuration of the optimizer.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Sets the number of environment workers.
    pub fn n_procs(mut self, v: usize) -> Self {
        self.n_procs = v;
        self
    }

    /// Sets the rollout length.
    pub fn n_steps(mut self, v: usize) -> Self {
        self.n_steps = v;
        self
    }

    /// Discount factor.
    pub fn discount_factor(mut self, v: f32) -> Self {
        self.gamma = v;
        self
    }

    /// Sets the coefficients of the policy gradient, entropy and value losses.
    pub fn coefs(mut self, pg_coef: f64, ent_coef: f64, vf_coef: f64) -> Self {
        self.pg_coef = pg_coef;
        self.ent_coef = ent_coef;
        self.vf_coef = vf_coef;
        self
    }

    /// Sets the threshold of gradient clipping.
    pub fn max_grad_norm(mut self, v: Option<f32>) -> Self {
        self.max_grad_norm = v;
        self
    }

    /// Sets the horizon of the learning rate schedule.
    pub fn total_timesteps(mut self, v: usize) -> Self {
        self.total_timesteps = v;
        self
    }

    /// Sets the learning rate schedule.
    pub fn lr_schedule(mut self, v: LrSchedule) -> Self {
        self.lr_schedule = v;
        self
    }

    /// Sets the baseline of the advantage.
    pub fn advantage(mut self, v: Advantage) -> Self {
        self.advantage = v;
        self
    }

    /// Sets the number of snapshots kept.
    pub fn n_keep(mut self, v: usize) -> Self {
        self.n_keep = v;
        self
    }

    /// Sets the seed of action sampling.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Device.
    pub fn device(mut self, device: &candle_core::Device) -> Self {
        self.device = device.into();
        self
    }

    /// Rejects inconsistent configurations.
    pub fn validate(&self) -> Result<()> {
        if self.n_envs == 0 || self.n_steps == 0 || self.n_keep == 0 {
            return Err(A2cError::InvalidConfig(format!(
                "n_envs = {}, n_steps = {}, n_keep = {}",
                self.n_envs, self.n_steps, self.n_keep
            ))
            .into());
        }
        if self.n_procs != self.n_envs {
            return Err(A2cError::InvalidConfig(format!(
                "n_procs = {} differs from n_envs = {}",
                self.n_procs, self.n_envs
            ))
            .into());
        }
        if self.max_grad_norm.is_some_and(|v| v <= 0.0) {
            return Err(A2cError::InvalidConfig("max_grad_norm must be positive".into()).into());
        }
        self.policy.validate()
    }

    /// Constructs [`A2cConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of A2C agent from {:?}", path_);
        Ok(b)
    }

    /// Saves [`A2cConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of A2C agent into {:?}", path_);
        Ok(())
    }
}
