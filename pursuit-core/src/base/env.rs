//! Environment.
use super::{AgentMap, ObsBatch};
use anyhow::Result;

/// Outcome of one step of a vectorized two-agent environment.
///
/// Every vector has one entry per environment instance.
#[derive(Debug, Clone)]
pub struct EnvStep {
    /// Observations after the step.
    pub obs: AgentMap<ObsBatch>,

    /// Rewards.
    pub reward: AgentMap<Vec<f32>>,

    /// Flag denoting if an episode is terminated.
    pub is_terminated: AgentMap<Vec<i8>>,

    /// Flag denoting if an episode is truncated.
    pub is_truncated: AgentMap<Vec<i8>>,
}

impl EnvStep {
    /// Returns `true` if any agent's episode in instance `i` has terminated or been truncated.
    pub fn is_done(&self, i: usize) -> bool {
        self.is_terminated.iter().any(|(_, v)| v[i] == 1)
            || self.is_truncated.iter().any(|(_, v)| v[i] == 1)
    }
}

/// A vectorized pursuit game stepping `num_envs()` instances at once.
///
/// Instances that finish an episode are expected to reset themselves;
/// the observation returned for such an instance is the first observation
/// of the next episode.
///
/// `reset` and `step` return `Ok(None)` when the underlying game produced
/// no state. Callers treat this as fatal.
pub trait PursuitEnv {
    /// Configurations.
    type Config: Clone;

    /// Builds an environment with a given random seed.
    fn build(config: &Self::Config, seed: i64) -> Result<Self>
    where
        Self: Sized;

    /// Number of environment instances.
    fn num_envs(&self) -> usize;

    /// Per-item shapes of the observation channels of an agent.
    fn obs_shapes(&self) -> Vec<Vec<usize>>;

    /// Number of discrete actions of an agent.
    fn n_actions(&self) -> usize;

    /// Resets all instances.
    fn reset(&mut self) -> Result<Option<AgentMap<ObsBatch>>>;

    /// Applies one action per agent and instance.
    fn step(&mut self, actions: &AgentMap<Vec<i64>>) -> Result<Option<EnvStep>>;
}
