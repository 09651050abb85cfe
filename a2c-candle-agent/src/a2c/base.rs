//! A2C agent.
use super::{A2cConfig, Advantage};
use crate::{
    opt::Optimizer,
    policy::{ActorCriticNet, PolicyOutput, PolicyView},
    util::{
        array2_to_tensor, array3_to_tensor, clip_grad_norm, entropy, flags_to_tensor,
        gather_actions, global_grad_norm, neg_log_prob, sample_categorical, tensor_to_array2,
    },
    ComputeContext,
};
use a2c_core::{
    error::A2cError,
    record::{Record, RecordValue},
    ActorCritic, Agent, CheckpointManager, Env, LossStats, RolloutBatch, Scheduler, StepOutput,
    SubprocVecEnv,
};
use anyhow::{anyhow, Result};
use candle_core::Tensor;
use log::{info, trace};
use ndarray::{Array2, Array3};
use rand::{rngs::SmallRng, SeedableRng};
use std::path::{Path, PathBuf};

/// Synchronous advantage actor-critic agent.
///
/// The policy is evaluated with a step view of `n_envs` instances by one step to act
/// and a training view of `n_envs` instances by `n_steps` steps to compute losses.
/// Both views read the parameters of one [`ComputeContext`]; an update through the
/// training view is complete when [`Agent::train`] returns.
///
/// The loss of a rollout is
///
/// ```text
/// pg_coef * mean(adv * -log pi(a)) - ent_coef * mean(H[pi]) + vf_coef * mean((Q(a) - R)^2)
/// ```
///
/// where `adv` is computed from the per-action values captured while acting (see
/// [`Advantage`]) and `Q(a)` is the per-action value of the taken action under the
/// training view.
pub struct A2c {
    config: A2cConfig,
    ctx: ComputeContext,
    net: ActorCriticNet,
    opt: Optimizer,
    train_view: PolicyView,
    scheduler: Scheduler,
    checkpoints: CheckpointManager,
    rng: SmallRng,
    n_consumed: usize,
    lr: f64,
    grad_norm: f32,
}

impl A2c {
    /// Constructs an agent.
    ///
    /// The configuration is validated before the computation context is opened.
    pub fn build(config: A2cConfig) -> Result<Self> {
        config.validate()?;
        let ctx = ComputeContext::new(config.device, config.n_procs)?;
        let net = ActorCriticNet::build(ctx.var_builder(), config.policy.clone())?;
        let opt = config.opt_config.build(ctx.varmap().all_vars())?;
        let scheduler = Scheduler::new(
            config.opt_config.lr(),
            config.total_timesteps,
            config.lr_schedule,
        );
        let checkpoints = CheckpointManager::new(&config.model_dir, config.n_keep)?;
        info!(
            "Built A2C agent with {} policy, {} variables",
            config.policy.kind,
            ctx.varmap().all_vars().len()
        );

        Ok(Self {
            train_view: PolicyView::train(config.n_envs, config.n_steps),
            rng: SmallRng::seed_from_u64(config.seed),
            lr: config.opt_config.lr(),
            config,
            ctx,
            net,
            opt,
            scheduler,
            checkpoints,
            n_consumed: 0,
            grad_norm: 0.0,
        })
    }

    /// Configuration of the agent.
    pub fn config(&self) -> &A2cConfig {
        &self.config
    }

    /// The computation context holding the parameters.
    pub fn context(&self) -> &ComputeContext {
        &self.ctx
    }

    /// Snapshot manager.
    pub fn checkpoints(&self) -> &CheckpointManager {
        &self.checkpoints
    }

    /// Timesteps consumed by updates so far.
    pub fn n_consumed(&self) -> usize {
        self.n_consumed
    }

    /// Spawns the pool of environment workers for training.
    ///
    /// The pool has one worker per instance, `n_procs` of the computation context.
    pub fn build_env_pool<E>(&self, env_config: &E::Config, seed: i64) -> Result<SubprocVecEnv<E>>
    where
        E: Env + 'static,
        E::Config: Send + 'static,
    {
        SubprocVecEnv::build(env_config, self.ctx.n_procs(), seed)
    }

    /// Tears down the computation context.
    pub fn close(self) {
        let Self { ctx, .. } = self;
        ctx.close();
    }

    fn states_tensor(&self, states: &Array2<f32>, n_envs: usize) -> Result<Option<Tensor>> {
        let state_dim = self.config.policy.state_dim();
        if states.dim() != (n_envs, state_dim) {
            return Err(A2cError::ShapeMismatch(format!(
                "states {:?}, expected {:?}",
                states.dim(),
                (n_envs, state_dim)
            ))
            .into());
        }
        match state_dim {
            0 => Ok(None),
            _ => Ok(Some(array2_to_tensor(states, self.ctx.device())?)),
        }
    }

    fn forward(
        &self,
        view: &PolicyView,
        obs: &Array3<f32>,
        states: &Array2<f32>,
        masks: &[bool],
    ) -> Result<PolicyOutput> {
        let device = self.ctx.device();
        let obs = array3_to_tensor(obs, device)?;
        let states = self.states_tensor(states, view.n_envs)?;
        let masks = flags_to_tensor(masks, device)?;
        self.net.forward(view, &obs, states.as_ref(), &masks)
    }

    /// Returns the total loss and its terms.
    fn losses(&self, batch: &RolloutBatch) -> Result<(Tensor, LossStats)> {
        let device = self.ctx.device();
        let n = batch.len();
        let out = self.forward(&self.train_view, &batch.obs, &batch.states, &batch.masks)?;

        let actions = Tensor::from_iter(batch.actions.iter().map(|&a| a as u32), device)?;
        let returns = Tensor::from_slice(&batch.returns, (n,), device)?;
        let q_captured = Tensor::from_slice(&batch.q_values, (n,), device)?;
        let adv = match self.config.advantage {
            Advantage::ReturnBaseline => (q_captured - &returns)?,
            Advantage::ValueBaseline => {
                (q_captured - Tensor::from_slice(&batch.values, (n,), device)?)?
            }
        };

        let pg_loss = (adv * neg_log_prob(&out.logits, &actions)?)?.mean_all()?;
        let q_acted = gather_actions(&out.q, &actions)?;
        let vf_loss = (q_acted - &returns)?.sqr()?.mean_all()?;
        let ent = entropy(&out.logits)?.mean_all()?;
        let loss = ((pg_loss.affine(self.config.pg_coef, 0.0)?
            - ent.affine(self.config.ent_coef, 0.0)?)?
            + vf_loss.affine(self.config.vf_coef, 0.0)?)?;

        let stats = LossStats {
            policy_loss: pg_loss.to_scalar::<f32>()?,
            value_loss: vf_loss.to_scalar::<f32>()?,
            entropy: ent.to_scalar::<f32>()?,
        };
        Ok((loss, stats))
    }
}

impl ActorCritic for A2c {
    fn initial_state(&self) -> Array2<f32> {
        Array2::zeros((self.config.n_envs, self.config.policy.state_dim()))
    }

    fn step(
        &mut self,
        obs: &Array3<f32>,
        states: &Array2<f32>,
        masks: &[bool],
    ) -> Result<StepOutput> {
        let view = PolicyView::step(obs.dim().0);
        let out = self.forward(&view, obs, states, masks)?;
        let logits = tensor_to_array2(&out.logits)?;
        let actions = sample_categorical(&logits, &mut self.rng);
        let next_states = match &out.states {
            Some(s) => tensor_to_array2(s)?,
            None => states.clone(),
        };

        Ok(StepOutput {
            actions,
            values: out.values()?.to_vec1()?,
            q_values: tensor_to_array2(&out.q)?,
            states: next_states,
        })
    }

    fn value(&self, obs: &Array3<f32>, states: &Array2<f32>, masks: &[bool]) -> Result<Vec<f32>> {
        let view = PolicyView::step(obs.dim().0);
        let out = self.forward(&view, obs, states, masks)?;
        Ok(out.values()?.to_vec1()?)
    }
}

impl Agent for A2c {
    fn train(&mut self, batch: &RolloutBatch) -> Result<LossStats> {
        if (batch.n_envs, batch.n_steps) != (self.train_view.n_envs, self.train_view.n_steps) {
            return Err(A2cError::ShapeMismatch(format!(
                "rollout of {} x {}, expected {} x {}",
                batch.n_envs, batch.n_steps, self.train_view.n_envs, self.train_view.n_steps
            ))
            .into());
        }

        self.lr = self.scheduler.value_at(self.n_consumed);
        self.opt.set_learning_rate(self.lr);

        let (loss, stats) = self.losses(batch)?;
        let mut grads = loss.backward()?;
        let vars = self.ctx.varmap().all_vars();
        self.grad_norm = match self.config.max_grad_norm {
            Some(max_norm) => clip_grad_norm(&mut grads, &vars, max_norm)?,
            None => global_grad_norm(&grads, &vars)?,
        };
        self.opt.step(&grads)?;
        self.n_consumed += batch.len();
        trace!(
            "Updated parameters with lr {}, grad norm {}",
            self.lr,
            self.grad_norm
        );

        Ok(stats)
    }

    fn train_record(&self) -> Record {
        Record::from_slice(&[
            ("lr", RecordValue::Scalar(self.lr as f32)),
            ("grad_norm", RecordValue::Scalar(self.grad_norm)),
        ])
    }

    fn save(&mut self) -> Result<PathBuf> {
        let varmap = self.ctx.varmap();
        self.checkpoints.save(|path| {
            varmap.save(path)?;
            Ok(())
        })
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        CheckpointManager::ensure_exists(path)?;
        let malformed = |reason: String| A2cError::MalformedCheckpoint {
            path: path.to_path_buf(),
            reason,
        };
        let loaded = candle_core::safetensors::load(path, self.ctx.device())
            .map_err(|e| malformed(e.to_string()))?;

        let data = self
            .ctx
            .varmap()
            .data()
            .lock()
            .map_err(|_| anyhow!("Parameter store is poisoned"))?;
        if let Some(name) = loaded.keys().find(|k| !data.contains_key(*k)) {
            return Err(malformed(format!("unexpected parameter {}", name)).into());
        }

        // Every parameter is checked before any of them is assigned
        let mut assignments = Vec::with_capacity(data.len());
        for (name, var) in data.iter() {
            let t = loaded
                .get(name)
                .ok_or_else(|| malformed(format!("missing parameter {}", name)))?;
            if t.dims() != var.dims() {
                return Err(malformed(format!(
                    "parameter {} has shape {:?}, expected {:?}",
                    name,
                    t.dims(),
                    var.dims()
                ))
                .into());
            }
            assignments.push((var, t.to_dtype(var.dtype())?));
        }
        for (var, t) in assignments {
            var.set(&t)?;
        }
        info!("Model loaded from {:?}", path);
        Ok(())
    }
}
