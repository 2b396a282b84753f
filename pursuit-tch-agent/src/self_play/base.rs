use super::SelfPlayConfig;
use crate::{
    model::{ModelBase, SubModel},
    net::Net,
    ppo::{entropy, sample_actions, Ppo},
    tensor::{obs_to_tensors, to_vec_f32, to_vec_i64},
};
use anyhow::Result;
use chrono::Local;
use log::{info, warn};
use pursuit_core::{
    error::PursuitError,
    record::{
        Record,
        RecordValue::{DateTime, Scalar},
        Recorder,
    },
    AgentMap, AgentRole, ObsBatch, PursuitEnv, TransitionBuffer,
};
use serde::{de::DeserializeOwned, Serialize};
use std::{fs, path::Path};
use tch::{no_grad, Tensor};

/// Networks and rollout buffer of one agent.
pub struct AgentState<P, V>
where
    P: SubModel<Input = [Tensor], Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + Clone,
    V: SubModel<Input = [Tensor], Output = Tensor>,
    V::Config: DeserializeOwned + Serialize + Clone,
{
    /// Policy network, taking the observations of the agent.
    pub policy: Net<P>,

    /// Value network, taking the combined observations of both agents.
    pub value: Net<V>,

    /// Rollout buffer.
    pub buffer: TransitionBuffer,
}

impl<P, V> AgentState<P, V>
where
    P: SubModel<Input = [Tensor], Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + Clone,
    V: SubModel<Input = [Tensor], Output = Tensor>,
    V::Config: DeserializeOwned + Serialize + Clone,
{
    /// Bundles the networks and the buffer of an agent.
    pub fn new(policy: Net<P>, value: Net<V>, buffer: TransitionBuffer) -> Self {
        Self {
            policy,
            value,
            buffer,
        }
    }

    /// Samples an action for every item of `obs` and returns `(actions, logits)`.
    fn act(&self, obs: &ObsBatch) -> Result<(Vec<i64>, Tensor)> {
        let xs = obs_to_tensors(obs, self.policy.device());
        let (actions, logits) = no_grad(|| {
            let logits = self.policy.forward(&xs);
            (sample_actions(&logits, None), logits)
        });
        Ok((to_vec_i64(&actions)?, logits))
    }
}

/// Creates a directory, logging the failure instead of returning it.
fn create_dir_best_effort(path: &Path) {
    if let Err(e) = fs::create_dir_all(path) {
        warn!("Failed to create directory {:?}: {}", path, e);
    }
}

/// Runs the sampling, training and evaluation loop of both agents.
///
/// Each iteration:
///
/// 1. Steps the environment `train_steps` times, sampling the actions of
///    both agents from their policies, and fills the buffers. The
///    observations following the last step are inserted as bootstrap
///    observations.
/// 2. Trains each agent with [`Ppo`], pairing its buffer with the buffer
///    of its partner, then clears both buffers.
/// 3. Evaluates both agents over `eval_steps` episodes of the evaluation
///    environment, following its first instance.
/// 4. Writes a timestamped record with the average losses per pass, the
///    average evaluation return and the average policy entropy of each agent.
/// 5. Every `save_every` iterations, saves all networks to
///    `out_dir/run_name/checkpoints/{agent}-{p,v}_net-{iteration}.pt`.
///
/// The environment is reset once before the first iteration; sampling
/// continues from the last observations in later iterations.
pub struct SelfPlayTrainer {
    config: SelfPlayConfig,
    ppo: Ppo,
}

impl SelfPlayTrainer {
    /// Constructs the trainer.
    pub fn build(config: SelfPlayConfig) -> Self {
        let ppo = Ppo::build(config.ppo_config.clone());
        Self { config, ppo }
    }

    /// Configuration.
    pub fn config(&self) -> &SelfPlayConfig {
        &self.config
    }

    /// Trains both agents.
    pub fn train<E, P, V, R>(
        &mut self,
        env: &mut E,
        eval_env: &mut E,
        agents: &mut AgentMap<AgentState<P, V>>,
        recorder: &mut R,
    ) -> Result<()>
    where
        E: PursuitEnv,
        P: SubModel<Input = [Tensor], Output = Tensor>,
        P::Config: DeserializeOwned + Serialize + Clone,
        V: SubModel<Input = [Tensor], Output = Tensor>,
        V::Config: DeserializeOwned + Serialize + Clone,
        R: Recorder,
    {
        for role in AgentRole::ALL {
            let buffer = &agents[role].buffer;
            if buffer.num_envs() != env.num_envs() {
                return Err(PursuitError::ShapeMismatch {
                    what: format!("number of environments of the {} buffer", role),
                    expected: env.num_envs(),
                    got: buffer.num_envs(),
                }
                .into());
            }
        }

        let checkpoint_dir = self.config.checkpoint_dir();
        create_dir_best_effort(&Path::new(&self.config.out_dir).join(&self.config.run_name));
        create_dir_best_effort(&checkpoint_dir);

        let mut obs = env
            .reset()?
            .ok_or_else(|| PursuitError::MissingEnvState("reset".to_string()))?;

        for iter in 0..self.config.iterations {
            obs = self.collect(env, agents, obs)?;

            let mut record = Record::from_scalar("iteration", iter as f32);
            record.insert("datetime", DateTime(Local::now()));
            record.merge_inplace(self.train_agents(agents)?);
            record.merge_inplace(self.evaluate(eval_env, agents)?);
            info!(
                "Iteration {}: player return = {:?}, pursuer return = {:?}",
                iter,
                record.get_scalar("player_avg_eval_episode_return").ok(),
                record.get_scalar("pursuer_avg_eval_episode_return").ok(),
            );
            recorder.write(record);

            if self.config.save_every > 0 && iter % self.config.save_every == 0 {
                for role in AgentRole::ALL {
                    let agent = &agents[role];
                    agent
                        .policy
                        .save(checkpoint_dir.join(format!("{}-p_net-{}.pt", role, iter)))?;
                    agent
                        .value
                        .save(checkpoint_dir.join(format!("{}-v_net-{}.pt", role, iter)))?;
                }
            }
        }
        recorder.flush();

        Ok(())
    }

    /// Fills the buffers of both agents and returns the last observations.
    fn collect<E, P, V>(
        &self,
        env: &mut E,
        agents: &mut AgentMap<AgentState<P, V>>,
        mut obs: AgentMap<ObsBatch>,
    ) -> Result<AgentMap<ObsBatch>>
    where
        E: PursuitEnv,
        P: SubModel<Input = [Tensor], Output = Tensor>,
        P::Config: DeserializeOwned + Serialize + Clone,
        V: SubModel<Input = [Tensor], Output = Tensor>,
        V::Config: DeserializeOwned + Serialize + Clone,
    {
        for _ in 0..self.config.train_steps {
            let mut actions = AgentMap::<Vec<i64>>::default();
            let mut logits = AgentMap::<Vec<f32>>::default();
            for role in AgentRole::ALL {
                let (a, l) = agents[role].act(&obs[role])?;
                actions[role] = a;
                logits[role] = to_vec_f32(&l)?;
            }

            let step = env
                .step(&actions)?
                .ok_or_else(|| PursuitError::MissingEnvState("step".to_string()))?;

            for role in AgentRole::ALL {
                agents[role].buffer.insert_step(
                    &obs[role],
                    &actions[role],
                    &logits[role],
                    &step.reward[role],
                    &step.is_terminated[role],
                    &step.is_truncated[role],
                )?;
            }
            obs = step.obs;
        }

        for role in AgentRole::ALL {
            agents[role].buffer.insert_final_step(&obs[role])?;
        }

        Ok(obs)
    }

    /// Trains each agent against the buffer of its partner, then clears the buffers.
    fn train_agents<P, V>(&mut self, agents: &mut AgentMap<AgentState<P, V>>) -> Result<Record>
    where
        P: SubModel<Input = [Tensor], Output = Tensor>,
        P::Config: DeserializeOwned + Serialize + Clone,
        V: SubModel<Input = [Tensor], Output = Tensor>,
        V::Config: DeserializeOwned + Serialize + Clone,
    {
        let train_iters = self.config.ppo_config.get_train_iters().max(1) as f32;
        let mut record = Record::empty();

        for role in AgentRole::ALL {
            let (agent, partner) = agents.split_mut(role);
            let (p_loss, v_loss) = self.ppo.train(
                &mut agent.policy,
                &mut agent.value,
                &agent.buffer,
                &partner.buffer,
            )?;
            record.insert(format!("{}_avg_p_loss", role), Scalar(p_loss / train_iters));
            record.insert(format!("{}_avg_v_loss", role), Scalar(v_loss / train_iters));
        }

        for role in AgentRole::ALL {
            agents[role].buffer.clear();
        }

        Ok(record)
    }

    /// Runs evaluation episodes on the first instance of `eval_env`.
    fn evaluate<E, P, V>(
        &self,
        eval_env: &mut E,
        agents: &AgentMap<AgentState<P, V>>,
    ) -> Result<Record>
    where
        E: PursuitEnv,
        P: SubModel<Input = [Tensor], Output = Tensor>,
        P::Config: DeserializeOwned + Serialize + Clone,
        V: SubModel<Input = [Tensor], Output = Tensor>,
        V::Config: DeserializeOwned + Serialize + Clone,
    {
        let mut record = Record::empty();
        if self.config.eval_steps == 0 {
            return Ok(record);
        }

        let mut return_total = AgentMap::new(0f32, 0f32);
        let mut entropy_total = AgentMap::new(0f32, 0f32);

        for _ in 0..self.config.eval_steps {
            let mut obs = eval_env
                .reset()?
                .ok_or_else(|| PursuitError::MissingEnvState("reset".to_string()))?;
            let mut entropy_sum = AgentMap::new(0f32, 0f32);
            let mut steps_taken = 0;

            for _ in 0..self.config.max_eval_steps {
                let mut actions = AgentMap::<Vec<i64>>::default();
                for role in AgentRole::ALL {
                    let (a, logits) = agents[role].act(&obs[role])?;
                    actions[role] = a;
                    entropy_sum[role] += entropy(&logits)?[0];
                }

                let step = eval_env
                    .step(&actions)?
                    .ok_or_else(|| PursuitError::MissingEnvState("step".to_string()))?;
                steps_taken += 1;
                for role in AgentRole::ALL {
                    return_total[role] += step.reward[role][0];
                }

                let done = step.is_done(0);
                obs = step.obs;
                if done {
                    break;
                }
            }

            for role in AgentRole::ALL {
                entropy_total[role] += entropy_sum[role] / steps_taken.max(1) as f32;
            }
        }

        let n = self.config.eval_steps as f32;
        for role in AgentRole::ALL {
            record.insert(
                format!("{}_avg_eval_episode_return", role),
                Scalar(return_total[role] / n),
            );
            record.insert(
                format!("{}_avg_eval_entropy", role),
                Scalar(entropy_total[role] / n),
            );
        }

        Ok(record)
    }
}
