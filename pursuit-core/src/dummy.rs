//! A small deterministic chase game, used for tests.
//!
//! Both agents move on a line of `size` cells. The pursuer catches the
//! player by reaching its cell, which terminates the episode. Episodes are
//! truncated after `max_steps` steps. Finished instances reset themselves.
use crate::{
    base::{AgentMap, AgentRole, EnvStep, ObsBatch, PursuitEnv},
    error::PursuitError,
};
use anyhow::Result;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Number of actions: move left, stay, move right.
pub const CHASE_N_ACTIONS: usize = 3;

/// Configuration of [`ChaseEnv`].
#[derive(Debug, Clone)]
pub struct ChaseEnvConfig {
    /// Number of instances.
    pub num_envs: usize,

    /// Number of cells.
    pub size: i64,

    /// Steps after which an episode is truncated.
    pub max_steps: usize,

    /// If set, [`PursuitEnv::step`] returns no state once this many steps were taken.
    pub fail_after: Option<usize>,
}

impl Default for ChaseEnvConfig {
    fn default() -> Self {
        Self {
            num_envs: 4,
            size: 8,
            max_steps: 16,
            fail_after: None,
        }
    }
}

/// A vectorized chase game.
pub struct ChaseEnv {
    config: ChaseEnvConfig,
    rng: StdRng,
    pos: AgentMap<Vec<i64>>,
    t: Vec<usize>,
    n_steps: usize,
}

impl ChaseEnv {
    fn reset_instance(&mut self, i: usize) {
        let size = self.config.size;
        let p = self.rng.gen_range(0..size);
        self.pos.player[i] = p;
        self.pos.pursuer[i] = (p + size / 2) % size;
        self.t[i] = 0;
    }

    fn observe(&self) -> Result<AgentMap<ObsBatch>> {
        let shapes = self.obs_shapes();
        let size = self.config.size as f32;
        let max_steps = self.config.max_steps as f32;
        let observe_role = |role: AgentRole| {
            let own = &self.pos[role];
            let other = &self.pos[role.partner()];
            let positions = own
                .iter()
                .zip(other.iter())
                .flat_map(|(&a, &b)| [a as f32 / size, b as f32 / size])
                .collect();
            let time = self.t.iter().map(|&t| t as f32 / max_steps).collect();
            ObsBatch::from_channels(&shapes, vec![positions, time])
        };

        Ok(AgentMap::new(
            observe_role(AgentRole::Player)?,
            observe_role(AgentRole::Pursuer)?,
        ))
    }
}

impl PursuitEnv for ChaseEnv {
    type Config = ChaseEnvConfig;

    fn build(config: &Self::Config, seed: i64) -> Result<Self> {
        let n = config.num_envs;
        let mut env = Self {
            config: config.clone(),
            rng: StdRng::seed_from_u64(seed as _),
            pos: AgentMap::new(vec![0; n], vec![0; n]),
            t: vec![0; n],
            n_steps: 0,
        };
        for i in 0..n {
            env.reset_instance(i);
        }
        Ok(env)
    }

    fn num_envs(&self) -> usize {
        self.config.num_envs
    }

    fn obs_shapes(&self) -> Vec<Vec<usize>> {
        vec![vec![2], vec![1]]
    }

    fn n_actions(&self) -> usize {
        CHASE_N_ACTIONS
    }

    fn reset(&mut self) -> Result<Option<AgentMap<ObsBatch>>> {
        for i in 0..self.config.num_envs {
            self.reset_instance(i);
        }
        Ok(Some(self.observe()?))
    }

    fn step(&mut self, actions: &AgentMap<Vec<i64>>) -> Result<Option<EnvStep>> {
        if self.config.fail_after == Some(self.n_steps) {
            return Ok(None);
        }
        let n = self.config.num_envs;
        for role in AgentRole::ALL {
            if actions[role].len() != n {
                return Err(PursuitError::ShapeMismatch {
                    what: format!("{} actions", role),
                    expected: n,
                    got: actions[role].len(),
                }
                .into());
            }
        }

        let mut reward = AgentMap::new(vec![0f32; n], vec![0f32; n]);
        let mut is_terminated = AgentMap::new(vec![0i8; n], vec![0i8; n]);
        let mut is_truncated = AgentMap::new(vec![0i8; n], vec![0i8; n]);
        let last = self.config.size - 1;

        for i in 0..n {
            for role in AgentRole::ALL {
                let a = actions[role][i].clamp(0, CHASE_N_ACTIONS as i64 - 1);
                self.pos[role][i] = (self.pos[role][i] + a - 1).clamp(0, last);
            }
            self.t[i] += 1;

            let caught = self.pos.player[i] == self.pos.pursuer[i];
            let truncated = !caught && self.t[i] >= self.config.max_steps;
            if caught {
                reward.player[i] = -1.;
                reward.pursuer[i] = 1.;
            } else {
                reward.player[i] = 0.1;
                reward.pursuer[i] = -0.1;
            }
            for role in AgentRole::ALL {
                is_terminated[role][i] = caught as i8;
                is_truncated[role][i] = truncated as i8;
            }
            if caught || truncated {
                self.reset_instance(i);
            }
        }
        self.n_steps += 1;

        Ok(Some(EnvStep {
            obs: self.observe()?,
            reward,
            is_terminated,
            is_truncated,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chase_env_step() -> Result<()> {
        let config = ChaseEnvConfig {
            num_envs: 3,
            size: 4,
            max_steps: 2,
            fail_after: Some(2),
        };
        let mut env = ChaseEnv::build(&config, 0)?;
        let obs = env.reset()?.unwrap();
        assert_eq!(obs.player.len(), 3);
        assert_eq!(obs.pursuer.shapes(), &[vec![2], vec![1]]);

        let actions = AgentMap::new(vec![1; 3], vec![1; 3]);
        let step = env.step(&actions)?.unwrap();
        assert!(step.reward.player.iter().all(|&r| r == 0.1));
        assert!(step.is_truncated.player.iter().all(|&f| f == 0));

        let step = env.step(&actions)?.unwrap();
        assert!(step.is_truncated.pursuer.iter().all(|&f| f == 1));
        assert!((0..3).all(|i| step.is_done(i)));

        assert!(env.step(&actions)?.is_none());
        Ok(())
    }
}
