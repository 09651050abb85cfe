use a2c_candle_agent::{
    policy::{PolicyConfig, PolicyKind},
    A2c, A2cConfig,
};
use a2c_core::{
    dummy::{ScriptedEnv, ScriptedEnvConfig},
    error::A2cError,
    record::BufferedRecorder,
    ActorCritic, Agent, Evaluator, EvaluatorConfig, Runner, SequentialVecEnv, Trainer,
    TrainerConfig, VecEnv,
};
use anyhow::Result;
use std::{collections::BTreeMap, path::Path};
use tempdir::TempDir;

const N_ENVS: usize = 2;
const N_STACK: usize = 2;

fn env_config() -> ScriptedEnvConfig {
    ScriptedEnvConfig::new(vec![3])
        .rewards(vec![vec![0.0]])
        .dones(vec![vec![false, false, false, true]])
        .rewarded_action(Some(1))
}

fn mlp_config(model_dir: &Path) -> A2cConfig {
    let policy = PolicyConfig::new(PolicyKind::Mlp, vec![3], N_STACK, 2).mlp_units(vec![16]);
    A2cConfig::new(policy, N_ENVS, model_dir)
        .n_steps(5)
        .total_timesteps(100)
        .n_keep(2)
        .seed(42)
}

fn params(agent: &A2c) -> Result<BTreeMap<String, Vec<f32>>> {
    let data = agent
        .context()
        .varmap()
        .data()
        .lock()
        .map_err(|_| anyhow::anyhow!("poisoned"))?;
    let mut params = BTreeMap::new();
    for (name, var) in data.iter() {
        params.insert(name.clone(), var.as_tensor().flatten_all()?.to_vec1::<f32>()?);
    }
    Ok(params)
}

fn runner(agent: &A2c, n_steps: usize) -> Result<Runner<SequentialVecEnv<ScriptedEnv>>> {
    let env = SequentialVecEnv::<ScriptedEnv>::build(&env_config(), N_ENVS, 0)?;
    Runner::new(env, agent, n_steps, N_STACK, 0.99)
}

#[test]
fn test_train_mlp_on_scripted_env() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = TempDir::new("a2c_train")?;
    let mut agent = A2c::build(mlp_config(dir.path()))?;
    let before = params(&agent)?;

    let env = agent.build_env_pool::<ScriptedEnv>(&env_config(), 0)?;
    assert_eq!(env.n_envs(), agent.context().n_procs());
    let mut runner = Runner::new(env, &agent, 5, N_STACK, 0.99)?;
    let env = SequentialVecEnv::<ScriptedEnv>::build(&env_config(), N_ENVS, 100)?;
    let eval_config = EvaluatorConfig::default().max_steps(20).n_episodes(4);
    let mut evaluator = Evaluator::new(eval_config, env, &agent, N_STACK)?;
    let mut trainer = Trainer::build(
        TrainerConfig::default()
            .total_timesteps(100)
            .log_interval(5)
            .eval_interval(5),
    );
    let mut recorder = BufferedRecorder::new();

    let report = trainer.train(&mut agent, &mut runner, &mut evaluator, &mut recorder)?;
    assert_eq!(agent.n_consumed(), 100);
    assert!(report.total_episodes >= 4);
    assert!(report.avg_score.is_finite());

    let train_records = recorder
        .iter()
        .filter(|r| r.get("policy_loss").is_some())
        .collect::<Vec<_>>();
    // updates 1, 5 and 10
    assert_eq!(train_records.len(), 3);
    for r in train_records {
        assert!(r.get_scalar("value_loss")?.is_finite());
        assert!(r.get_scalar("policy_entropy")? >= 0.0);
        assert!(r.get_scalar("grad_norm")?.is_finite());
    }

    // Four snapshots were written, the latest two are kept
    assert_eq!(agent.checkpoints().list()?.len(), 2);
    assert_ne!(params(&agent)?, before);
    agent.close();
    Ok(())
}

#[test]
fn test_save_and_load_restore_parameters() -> Result<()> {
    let dir = TempDir::new("a2c_save_load")?;
    let mut agent = A2c::build(mlp_config(dir.path()))?;
    let saved = params(&agent)?;
    let path = agent.save()?;
    assert!(path.starts_with(dir.path()));
    assert!(path
        .file_name()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.starts_with("model-")));

    let mut runner = runner(&agent, 5)?;
    let batch = runner.run(&mut agent)?;
    agent.train(&batch)?;
    assert_ne!(params(&agent)?, saved);

    agent.load(&path)?;
    assert_eq!(params(&agent)?, saved);

    // Training continues from the loaded parameters
    let batch = runner.run(&mut agent)?;
    agent.train(&batch)?;
    Ok(())
}

#[test]
fn test_load_missing_checkpoint() -> Result<()> {
    let dir = TempDir::new("a2c_missing")?;
    let mut agent = A2c::build(mlp_config(dir.path()))?;
    let err = agent.load(&dir.path().join("model-none")).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<A2cError>(),
        Some(A2cError::CheckpointNotFound(_))
    ));
    Ok(())
}

#[test]
fn test_load_malformed_checkpoint_keeps_parameters() -> Result<()> {
    let dir = TempDir::new("a2c_malformed")?;
    let mut agent = A2c::build(mlp_config(dir.path()))?;
    let before = params(&agent)?;

    let garbage = dir.path().join("garbage");
    std::fs::write(&garbage, b"not a snapshot")?;
    let err = agent.load(&garbage).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<A2cError>(),
        Some(A2cError::MalformedCheckpoint { .. })
    ));
    assert_eq!(params(&agent)?, before);

    // A snapshot of a network with other layer sizes
    let other_dir = TempDir::new("a2c_other")?;
    let policy = PolicyConfig::new(PolicyKind::Mlp, vec![3], N_STACK, 2).mlp_units(vec![32]);
    let mut other = A2c::build(A2cConfig::new(policy, N_ENVS, other_dir.path()))?;
    let path = other.save()?;
    let err = agent.load(&path).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<A2cError>(),
        Some(A2cError::MalformedCheckpoint { .. })
    ));
    assert_eq!(params(&agent)?, before);
    Ok(())
}

#[test]
fn test_lstm_policy_carries_states() -> Result<()> {
    let dir = TempDir::new("a2c_lstm")?;
    let policy = PolicyConfig::new(PolicyKind::CnnLstm, vec![36, 36], N_STACK, 2)
        .hidden(16)
        .lstm_units(8);
    let config = A2cConfig::new(policy, N_ENVS, dir.path()).n_steps(3);
    let mut agent = A2c::build(config)?;
    assert_eq!(agent.initial_state().dim(), (N_ENVS, 16));

    let env_config = ScriptedEnvConfig::new(vec![36, 36]).dones(vec![vec![false, true]]);
    let env = SequentialVecEnv::<ScriptedEnv>::build(&env_config, N_ENVS, 0)?;
    let mut runner = Runner::new(env, &agent, 3, N_STACK, 0.99)?;

    let batch = runner.run(&mut agent)?;
    assert!(batch.states.iter().all(|&s| s == 0.0));
    let stats = agent.train(&batch)?;
    assert!(stats.value_loss.is_finite());

    let batch = runner.run(&mut agent)?;
    assert_eq!(batch.states.dim(), (N_ENVS, 16));
    agent.train(&batch)?;
    Ok(())
}

#[test]
fn test_learning_rate_decays_linearly() -> Result<()> {
    let dir = TempDir::new("a2c_lr")?;
    let config = mlp_config(dir.path()).total_timesteps(20);
    let lr = config.opt_config.lr();
    let mut agent = A2c::build(config)?;
    let mut runner = runner(&agent, 5)?;

    let mut lrs = vec![];
    for _ in 0..3 {
        let batch = runner.run(&mut agent)?;
        agent.train(&batch)?;
        lrs.push(agent.train_record().get_scalar("lr")?);
    }
    assert!((lrs[0] - lr as f32).abs() < 1e-9);
    assert!((lrs[1] - 0.5 * lr as f32).abs() < 1e-9);
    assert_eq!(lrs[2], 0.0);
    Ok(())
}

#[test]
fn test_rollout_shape_is_checked() -> Result<()> {
    let dir = TempDir::new("a2c_shape")?;
    let mut agent = A2c::build(mlp_config(dir.path()))?;
    let mut runner = runner(&agent, 3)?;
    let batch = runner.run(&mut agent)?;
    let err = agent.train(&batch).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<A2cError>(),
        Some(A2cError::ShapeMismatch(_))
    ));
    Ok(())
}

#[test]
fn test_invalid_configs_are_rejected() -> Result<()> {
    let dir = TempDir::new("a2c_invalid")?;
    assert!(A2c::build(mlp_config(dir.path()).n_procs(3)).is_err());

    let yaml = "kind: gru\nframe_shape: [3]\nn_stack: 2\nn_actions: 2\n";
    assert!(serde_yaml::from_str::<PolicyConfig>(yaml).is_err());
    let yaml = yaml.replace("gru", "mlp");
    assert_eq!(
        serde_yaml::from_str::<PolicyConfig>(&yaml)?.kind,
        PolicyKind::Mlp
    );
    Ok(())
}
