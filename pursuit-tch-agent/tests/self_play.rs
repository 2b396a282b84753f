use anyhow::Result;
use pursuit_core::{
    dummy::{ChaseEnv, ChaseEnvConfig, CHASE_N_ACTIONS},
    error::PursuitError,
    record::{BufferedRecorder, RecordValue},
    AgentMap, PursuitEnv, TransitionBuffer,
};
use pursuit_tch_agent::{
    mlp::{Mlp, MlpConfig},
    net::{Net, NetConfig},
    opt::OptimizerConfig,
    ppo::PpoConfig,
    self_play::{AgentState, SelfPlayConfig, SelfPlayTrainer},
};
use tch::Device;
use tempdir::TempDir;

fn agent(
    shapes: &[Vec<usize>],
    buffer: TransitionBuffer,
) -> Result<AgentState<Mlp, Mlp>> {
    let combined = shapes
        .iter()
        .chain(shapes.iter())
        .cloned()
        .collect::<Vec<_>>();
    let p_config = NetConfig::<MlpConfig>::default()
        .model_config(MlpConfig::from_obs_shapes(
            shapes,
            vec![8],
            CHASE_N_ACTIONS as i64,
        ))
        .opt_config(OptimizerConfig::Adam { lr: 0.001 });
    let v_config = NetConfig::<MlpConfig>::default()
        .model_config(MlpConfig::from_obs_shapes(&combined, vec![8], 1))
        .opt_config(OptimizerConfig::Adam { lr: 0.001 });

    Ok(AgentState::new(
        Net::build(p_config, Device::Cpu)?,
        Net::build(v_config, Device::Cpu)?,
        buffer,
    ))
}

fn config(out_dir: &TempDir) -> SelfPlayConfig {
    SelfPlayConfig::default()
        .out_dir(out_dir.path().to_string_lossy())
        .run_name("chase")
        .num_envs(4)
        .train_steps(8)
        .iterations(2)
        .eval_steps(2)
        .max_eval_steps(5)
        .save_every(1)
        .ppo_config(
            PpoConfig::default()
                .train_iters(2)
                .train_batch_size(8)
                .seed(7),
        )
}

fn agents(
    config: &SelfPlayConfig,
    shapes: &[Vec<usize>],
) -> Result<AgentMap<AgentState<Mlp, Mlp>>> {
    Ok(AgentMap::new(
        agent(shapes, config.build_buffer(shapes, CHASE_N_ACTIONS))?,
        agent(shapes, config.build_buffer(shapes, CHASE_N_ACTIONS))?,
    ))
}

#[test]
fn test_self_play_records_and_checkpoints() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    tch::manual_seed(42);

    let tmp_dir = TempDir::new("self_play")?;
    let config = config(&tmp_dir);
    let env_config = ChaseEnvConfig {
        num_envs: 4,
        ..Default::default()
    };
    let mut env = ChaseEnv::build(&env_config, 0)?;
    let mut eval_env = ChaseEnv::build(
        &ChaseEnvConfig {
            num_envs: 1,
            ..Default::default()
        },
        1,
    )?;
    let shapes = env.obs_shapes();
    let mut agents = agents(&config, &shapes)?;
    let mut recorder = BufferedRecorder::new();

    let mut trainer = SelfPlayTrainer::build(config.clone());
    trainer.train(&mut env, &mut eval_env, &mut agents, &mut recorder)?;

    assert_eq!(recorder.len(), 2);
    for (i, record) in recorder.iter().enumerate() {
        assert_eq!(record.get_scalar("iteration")?, i as f32);
        assert!(matches!(
            record.get("datetime"),
            Some(RecordValue::DateTime(_))
        ));
        for role in ["player", "pursuer"] {
            for key in [
                "avg_p_loss",
                "avg_v_loss",
                "avg_eval_episode_return",
                "avg_eval_entropy",
            ] {
                let v = record.get_scalar(&format!("{}_{}", role, key))?;
                assert!(v.is_finite(), "{}_{} = {}", role, key, v);
            }
        }
    }

    // Buffers are cleared after training
    assert!(agents.player.buffer.is_empty());
    assert!(agents.pursuer.buffer.is_empty());

    let checkpoint_dir = config.checkpoint_dir();
    for iter in 0..2 {
        for role in ["player", "pursuer"] {
            for net in ["p_net", "v_net"] {
                let path = checkpoint_dir.join(format!("{}-{}-{}.pt", role, net, iter));
                assert!(path.exists(), "{:?} not found", path);
            }
        }
    }

    Ok(())
}

#[test]
fn test_self_play_without_evaluation() -> Result<()> {
    tch::manual_seed(42);

    let tmp_dir = TempDir::new("self_play_no_eval")?;
    let config = config(&tmp_dir).iterations(1).eval_steps(0).save_every(0);
    let env_config = ChaseEnvConfig {
        num_envs: 4,
        ..Default::default()
    };
    let mut env = ChaseEnv::build(&env_config, 0)?;
    let mut eval_env = ChaseEnv::build(&env_config, 1)?;
    let shapes = env.obs_shapes();
    let mut agents = agents(&config, &shapes)?;
    let mut recorder = BufferedRecorder::new();

    SelfPlayTrainer::build(config.clone()).train(
        &mut env,
        &mut eval_env,
        &mut agents,
        &mut recorder,
    )?;

    assert_eq!(recorder.len(), 1);
    let record = recorder.iter().next().unwrap();
    assert!(record.get_scalar("player_avg_p_loss").is_ok());
    assert!(record.get_scalar("player_avg_eval_episode_return").is_err());
    assert!(!config.checkpoint_dir().join("player-p_net-0.pt").exists());
    Ok(())
}

#[test]
fn test_unwritable_out_dir_is_ignored() -> Result<()> {
    tch::manual_seed(42);

    // A regular file stands where the output directory would be created
    let tmp_dir = TempDir::new("self_play_unwritable")?;
    let file = tmp_dir.path().join("not_a_dir");
    std::fs::write(&file, b"")?;
    let config = config(&tmp_dir)
        .out_dir(file.join("runs").to_string_lossy())
        .iterations(2)
        .save_every(0);
    let env_config = ChaseEnvConfig {
        num_envs: 4,
        ..Default::default()
    };
    let mut env = ChaseEnv::build(&env_config, 0)?;
    let mut eval_env = ChaseEnv::build(&env_config, 1)?;
    let shapes = env.obs_shapes();
    let mut agents = agents(&config, &shapes)?;
    let mut recorder = BufferedRecorder::new();

    SelfPlayTrainer::build(config.clone()).train(
        &mut env,
        &mut eval_env,
        &mut agents,
        &mut recorder,
    )?;

    assert_eq!(recorder.len(), 2);
    assert!(!config.checkpoint_dir().exists());
    assert!(std::fs::metadata(&file)?.is_file());
    Ok(())
}

#[test]
fn test_missing_env_state_is_an_error() -> Result<()> {
    tch::manual_seed(42);

    let tmp_dir = TempDir::new("self_play_missing_state")?;
    let config = config(&tmp_dir);
    let env_config = ChaseEnvConfig {
        num_envs: 4,
        fail_after: Some(3),
        ..Default::default()
    };
    let mut env = ChaseEnv::build(&env_config, 0)?;
    let mut eval_env = ChaseEnv::build(&env_config, 1)?;
    let shapes = env.obs_shapes();
    let mut agents = agents(&config, &shapes)?;
    let mut recorder = BufferedRecorder::new();

    let err = SelfPlayTrainer::build(config)
        .train(&mut env, &mut eval_env, &mut agents, &mut recorder)
        .unwrap_err();
    assert_eq!(
        err.downcast_ref::<PursuitError>(),
        Some(&PursuitError::MissingEnvState("step".to_string()))
    );
    assert!(recorder.is_empty());
    Ok(())
}

#[test]
fn test_buffer_size_mismatch_is_an_error() -> Result<()> {
    let tmp_dir = TempDir::new("self_play_mismatch")?;
    let config = config(&tmp_dir);
    let env_config = ChaseEnvConfig {
        num_envs: 2,
        ..Default::default()
    };
    let mut env = ChaseEnv::build(&env_config, 0)?;
    let mut eval_env = ChaseEnv::build(&env_config, 1)?;
    let shapes = env.obs_shapes();
    // Buffers of 4 slots for 2 instances
    let mut agents = agents(&config, &shapes)?;
    let mut recorder = BufferedRecorder::new();

    let err = SelfPlayTrainer::build(config)
        .train(&mut env, &mut eval_env, &mut agents, &mut recorder)
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PursuitError>(),
        Some(PursuitError::ShapeMismatch {
            expected: 2,
            got: 4,
            ..
        })
    ));
    Ok(())
}
