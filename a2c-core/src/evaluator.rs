//! Evaluate [`ActorCritic`].
mod config;
use crate::{
    discount_with_dones,
    record::{Record, RecordValue},
    ActorCritic, Runner, VecEnv,
};
use anyhow::Result;
pub use config::EvaluatorConfig;
use log::info;

/// Result of [`Evaluator::evaluate`].
#[derive(Debug, Clone, PartialEq)]
pub struct EvalReport {
    /// Mean of the per-instance scores over all passes, timed-out instances included.
    pub avg_score: f32,

    /// The number of environment steps over all instances.
    pub total_steps: usize,

    /// The number of evaluated episodes.
    pub total_episodes: usize,

    /// The number of instances that did not finish an episode within a pass.
    pub n_timeouts: usize,
}

impl From<EvalReport> for Record {
    fn from(report: EvalReport) -> Self {
        Record::from_slice(&[
            ("eval_avg_score", RecordValue::Scalar(report.avg_score)),
            ("eval_steps", RecordValue::Scalar(report.total_steps as f32)),
            ("eval_episodes", RecordValue::Scalar(report.total_episodes as f32)),
            ("eval_n_timeouts", RecordValue::Scalar(report.n_timeouts as f32)),
        ])
    }
}

/// Runs a policy without training and reports undiscounted scores.
///
/// Evaluation proceeds in passes. Each pass resets every instance and steps until all
/// of them have finished an episode at least once or `max_steps` steps were taken.
/// The score of an instance is the undiscounted sum of rewards of its first episode in
/// the pass; an instance that never finishes contributes its partial sum and counts as
/// a timeout. Passes are repeated while fewer than `max_steps` pass steps and fewer
/// than `n_episodes` episodes were evaluated.
pub struct Evaluator<V: VecEnv> {
    config: EvaluatorConfig,
    runner: Runner<V>,
}

impl<V: VecEnv> Evaluator<V> {
    /// Constructs an evaluator stepping `env` with `n_stack` stacked frames.
    pub fn new<M: ActorCritic>(
        config: EvaluatorConfig,
        env: V,
        model: &M,
        n_stack: usize,
    ) -> Result<Self> {
        Ok(Self {
            config,
            runner: Runner::new(env, model, 1, n_stack, 1.0)?,
        })
    }

    /// Evaluates `model`. The parameters of the model are not changed.
    pub fn evaluate<M: ActorCritic>(&mut self, model: &mut M) -> Result<EvalReport> {
        let n_envs = self.runner.n_envs();
        let EvaluatorConfig {
            max_steps,
            n_episodes,
        } = self.config;
        let mut scores = vec![];
        let (mut steps, mut total_episodes, mut n_timeouts) = (0, 0, 0);

        while steps < max_steps && total_episodes < n_episodes {
            self.runner.reset()?;
            let mut rewards = vec![Vec::new(); n_envs];
            let mut dones = vec![Vec::new(); n_envs];
            let mut finished = vec![false; n_envs];
            let mut pass_steps = 0;

            while pass_steps < max_steps {
                let tr = self.runner.advance(model)?;
                pass_steps += 1;
                for i in 0..n_envs {
                    rewards[i].push(tr.rewards[i]);
                    dones[i].push(tr.dones[i]);
                    finished[i] |= tr.dones[i];
                }
                if finished.iter().all(|&f| f) {
                    break;
                }
            }

            for i in 0..n_envs {
                let score = discount_with_dones(&rewards[i], &dones[i], 1.0);
                scores.push(score.first().copied().unwrap_or(0.0));
                if !finished[i] {
                    n_timeouts += 1;
                }
            }
            steps += pass_steps;
            total_episodes += n_envs;
        }

        let avg_score = scores.iter().sum::<f32>() / scores.len() as f32;
        let report = EvalReport {
            avg_score,
            total_steps: steps * n_envs,
            total_episodes,
            n_timeouts,
        };
        info!(
            "Evaluation complete: score {}, {} steps, {} episodes, {} timeouts",
            report.avg_score, report.total_steps, report.total_episodes, report.n_timeouts
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dummy::{ConstantModel, ScriptedEnv, ScriptedEnvConfig},
        SequentialVecEnv,
    };

    fn evaluator(
        config: EvaluatorConfig,
        env_config: &ScriptedEnvConfig,
        n_envs: usize,
    ) -> Result<(Evaluator<SequentialVecEnv<ScriptedEnv>>, ConstantModel)> {
        let env = SequentialVecEnv::<ScriptedEnv>::build(env_config, n_envs, 0)?;
        let model = ConstantModel::new(n_envs, 2, 0, 0.0);
        Ok((Evaluator::new(config, env, &model, 4)?, model))
    }

    #[test]
    fn test_single_episode() -> Result<()> {
        let env_config = ScriptedEnvConfig::new(vec![1])
            .rewards(vec![vec![1.0, 0.5, 0.0, 2.0]])
            .dones(vec![vec![false, false, false, true]]);
        let config = EvaluatorConfig::default().max_steps(10).n_episodes(1);
        let (mut evaluator, mut model) = evaluator(config, &env_config, 1)?;
        let report = evaluator.evaluate(&mut model)?;

        assert_eq!(report.total_steps, 4);
        assert_eq!(report.total_episodes, 1);
        assert_eq!(report.n_timeouts, 0);
        assert!((report.avg_score - 3.5).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_timeouts_and_partial_scores() -> Result<()> {
        // The first instance finishes after 2 steps, the second never does
        let env_config = ScriptedEnvConfig::new(vec![1])
            .rewards(vec![vec![1.0], vec![0.5]])
            .dones(vec![vec![false, true], vec![false]]);
        let config = EvaluatorConfig::default().max_steps(3).n_episodes(100);
        let (mut evaluator, mut model) = evaluator(config, &env_config, 2)?;
        let report = evaluator.evaluate(&mut model)?;

        // One pass of 3 steps exhausts the step budget
        assert_eq!(report.total_steps, 6);
        assert_eq!(report.total_episodes, 2);
        assert_eq!(report.n_timeouts, 1);
        assert!((report.avg_score - (2.0 + 1.5) / 2.0).abs() < 1e-6);

        let record: Record = report.into();
        assert_eq!(record.get_scalar("eval_n_timeouts")?, 1.0);
        Ok(())
    }

    #[test]
    fn test_multiple_passes() -> Result<()> {
        let env_config = ScriptedEnvConfig::new(vec![1])
            .rewards(vec![vec![1.0]])
            .dones(vec![vec![true]]);
        let config = EvaluatorConfig::default().max_steps(10).n_episodes(3);
        let (mut evaluator, mut model) = evaluator(config, &env_config, 1)?;
        let report = evaluator.evaluate(&mut model)?;

        assert_eq!(report.total_steps, 3);
        assert_eq!(report.total_episodes, 3);
        assert_eq!(report.avg_score, 1.0);
        Ok(())
    }
}
