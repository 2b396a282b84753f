//! Configuration of [`SelfPlayTrainer`](super::SelfPlayTrainer).
use crate::ppo::PpoConfig;
use anyhow::Result;
use pursuit_core::TransitionBuffer;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::{Path, PathBuf},
};

/// Configuration of [`SelfPlayTrainer`](super::SelfPlayTrainer).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct SelfPlayConfig {
    pub(super) out_dir: String,
    pub(super) run_name: String,
    pub(super) num_envs: usize,
    pub(super) train_steps: usize,
    pub(super) iterations: usize,
    pub(super) eval_steps: usize,
    pub(super) max_eval_steps: usize,
    pub(super) save_every: usize,
    pub(super) ppo_config: PpoConfig,
}

impl Default for SelfPlayConfig {
    fn default() -> Self {
        Self {
            out_dir: "./runs".to_string(),
            run_name: "testing".to_string(),
            num_envs: 256,
            train_steps: 128,
            iterations: 1000,
            eval_steps: 8,
            max_eval_steps: 500,
            save_every: 100,
            ppo_config: PpoConfig::default(),
        }
    }
}

impl SelfPlayConfig {
    /// Output directory.
    pub fn out_dir(mut self, v: impl Into<String>) -> Self {
        self.out_dir = v.into();
        self
    }

    /// Name of the run, a subdirectory of the output directory.
    pub fn run_name(mut self, v: impl Into<String>) -> Self {
        self.run_name = v.into();
        self
    }

    /// Number of environment instances stepped at once during sampling.
    pub fn num_envs(mut self, v: usize) -> Self {
        self.num_envs = v;
        self
    }

    /// Number of steps sampled per iteration, the horizon of the buffers.
    pub fn train_steps(mut self, v: usize) -> Self {
        self.train_steps = v;
        self
    }

    /// Number of sampling and training iterations.
    pub fn iterations(mut self, v: usize) -> Self {
        self.iterations = v;
        self
    }

    /// Number of evaluation episodes per iteration.
    pub fn eval_steps(mut self, v: usize) -> Self {
        self.eval_steps = v;
        self
    }

    /// Maximum number of steps of an evaluation episode.
    pub fn max_eval_steps(mut self, v: usize) -> Self {
        self.max_eval_steps = v;
        self
    }

    /// Interval of iterations between checkpoints.
    pub fn save_every(mut self, v: usize) -> Self {
        self.save_every = v;
        self
    }

    /// Configuration of the PPO trainer.
    pub fn ppo_config(mut self, v: PpoConfig) -> Self {
        self.ppo_config = v;
        self
    }

    /// Directory holding the checkpoints of the run.
    pub fn checkpoint_dir(&self) -> PathBuf {
        Path::new(&self.out_dir)
            .join(&self.run_name)
            .join("checkpoints")
    }

    /// Constructs an empty buffer of `num_envs` slots and `train_steps` steps.
    pub fn build_buffer(&self, obs_shapes: &[Vec<usize>], n_actions: usize) -> TransitionBuffer {
        TransitionBuffer::new(obs_shapes, n_actions, self.num_envs, self.train_steps)
    }

    /// Constructs [`SelfPlayConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`SelfPlayConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
