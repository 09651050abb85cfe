//! Train [`Agent`].
mod config;
use crate::{
    record::{Record, RecordValue::Scalar, Recorder},
    util::explained_variance,
    Agent, EvalReport, Evaluator, Runner, VecEnv,
};
use anyhow::Result;
pub use config::TrainerConfig;
use log::info;
use std::time::SystemTime;

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Manages the training loop.
///
/// # Training loop
///
/// Given an agent implementing [`Agent`], a [`Runner`] collecting rollouts of
/// `N` instances and `T` steps, an [`Evaluator`] and a [`Recorder`]:
///
/// 1. `n_updates = total_timesteps / (N * T)`; start a timer.
/// 2. For `update` in `1..=n_updates`:
///     1. Collect a rollout with [`Runner::run()`].
///     2. Do exactly one optimization step with [`Agent::train()`].
///     3. `fps = update * N * T / elapsed`.
///     4. If `update % log_interval == 0` or `update == 1`, write `nupdates`,
///        `total_timesteps`, `fps`, the losses, `explained_variance` of the captured
///        per-action values against the returns and [`Agent::train_record()`]
///        to the recorder.
///     5. If `update % eval_interval == 0` or `update == 1`, evaluate the agent,
///        write the result to the recorder and save a snapshot with [`Agent::save()`].
/// 3. Evaluate and save once more.
///
/// An interval of zero disables the corresponding periodic action, except for the
/// first update.
///
/// # Interaction of objects
///
/// ```mermaid
/// graph LR
///     A[Agent]-->|actions|B[Runner]
///     B-->|VecEnv::step|C[VecEnv]
///     C-->|VecStep|B
///     B -->|RolloutBatch|A
///     A -->|Record|D[Recorder]
/// ```
pub struct Trainer {
    /// The number of environment steps to consume.
    total_timesteps: usize,

    /// Interval of recording training statistics in updates.
    log_interval: usize,

    /// Interval of evaluation in updates.
    eval_interval: usize,
}

fn is_due(update: usize, interval: usize) -> bool {
    update == 1 || (interval > 0 && update % interval == 0)
}

impl Trainer {
    /// Constructs a trainer.
    pub fn build(config: TrainerConfig) -> Self {
        Self {
            total_timesteps: config.total_timesteps,
            log_interval: config.log_interval,
            eval_interval: config.eval_interval,
        }
    }

    fn evaluate_and_save<A, W>(
        agent: &mut A,
        evaluator: &mut Evaluator<W>,
        recorder: &mut dyn Recorder,
        update: usize,
        n_batch: usize,
    ) -> Result<EvalReport>
    where
        A: Agent,
        W: VecEnv,
    {
        info!("Starts evaluation of the trained model");
        let report = evaluator.evaluate(agent)?;
        let mut record = Record::from_slice(&[
            ("nupdates", Scalar(update as f32)),
            ("total_timesteps", Scalar((update * n_batch) as f32)),
        ]);
        record.merge_inplace(report.clone().into());
        recorder.write(record);
        agent.save()?;
        Ok(report)
    }

    /// Trains the agent and returns the result of the final evaluation.
    pub fn train<A, V, W>(
        &mut self,
        agent: &mut A,
        runner: &mut Runner<V>,
        evaluator: &mut Evaluator<W>,
        recorder: &mut dyn Recorder,
    ) -> Result<EvalReport>
    where
        A: Agent,
        V: VecEnv,
        W: VecEnv,
    {
        let n_batch = runner.n_envs() * runner.n_steps();
        let n_updates = self.total_timesteps / n_batch;
        let timer = SystemTime::now();
        info!("Starts training loop of {} updates", n_updates);

        for update in 1..=n_updates {
            let batch = runner.run(agent)?;
            let stats = agent.train(&batch)?;
            let secs = timer.elapsed()?.as_secs_f32();
            let fps = (update * n_batch) as f32 / secs.max(f32::EPSILON);

            if is_due(update, self.log_interval) {
                let ev = explained_variance(&batch.q_values, &batch.returns);
                let mut record = Record::from_slice(&[
                    ("nupdates", Scalar(update as f32)),
                    ("total_timesteps", Scalar((update * n_batch) as f32)),
                    ("fps", Scalar(fps.floor())),
                    ("explained_variance", Scalar(ev)),
                ]);
                record.merge_inplace(stats.into());
                record.merge_inplace(agent.train_record());
                recorder.write(record);
            }

            if is_due(update, self.eval_interval) {
                Self::evaluate_and_save(agent, evaluator, recorder, update, n_batch)?;
            }
        }

        Self::evaluate_and_save(agent, evaluator, recorder, n_updates, n_batch)
    }
}
