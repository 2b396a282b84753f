//! Configuration of the PPO trainer.
use crate::Device;
use anyhow::Result;
use pursuit_core::SamplingOrder;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Constructs [`Ppo`](super::Ppo).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct PpoConfig {
    pub(super) discount: f32,
    pub(super) lambda: f32,
    pub(super) epsilon: f64,
    pub(super) entropy_coeff: f64,
    pub(super) gradient_clip: f64,
    pub(super) gradient_steps: usize,
    pub(super) use_masks: bool,
    pub(super) train_iters: usize,
    pub(super) train_batch_size: usize,
    pub(super) sampling: SamplingOrder,
    pub(super) seed: Option<u64>,
    pub(super) device: Device,
}

impl Default for PpoConfig {
    fn default() -> Self {
        Self {
            discount: 0.98,
            lambda: 0.95,
            epsilon: 0.2,
            entropy_coeff: 0.0,
            gradient_clip: 1.0,
            gradient_steps: 1,
            use_masks: false,
            train_iters: 2,
            train_batch_size: 512,
            sampling: SamplingOrder::Shuffled,
            seed: None,
            device: Device::Cpu,
        }
    }
}

impl PpoConfig {
    /// Discount factor applied to rewards.
    pub fn discount(mut self, v: f32) -> Self {
        self.discount = v;
        self
    }

    /// Lambda of generalized advantage estimation.
    pub fn lambda(mut self, v: f32) -> Self {
        self.lambda = v;
        self
    }

    /// Clipping parameter of the surrogate objective.
    pub fn epsilon(mut self, v: f64) -> Self {
        self.epsilon = v;
        self
    }

    /// Coefficient of the entropy bonus.
    pub fn entropy_coeff(mut self, v: f64) -> Self {
        self.entropy_coeff = v;
        self
    }

    /// Maximum global norm of gradients.
    pub fn gradient_clip(mut self, v: f64) -> Self {
        self.gradient_clip = v;
        self
    }

    /// Number of minibatches whose gradients are accumulated per optimizer step.
    pub fn gradient_steps(mut self, v: usize) -> Self {
        self.gradient_steps = v;
        self
    }

    /// Whether recorded action masks are applied to the logits.
    pub fn use_masks(mut self, v: bool) -> Self {
        self.use_masks = v;
        self
    }

    /// Number of passes over the buffer per training call.
    pub fn train_iters(mut self, v: usize) -> Self {
        self.train_iters = v;
        self
    }

    /// Minibatch size.
    pub fn train_batch_size(mut self, v: usize) -> Self {
        self.train_batch_size = v;
        self
    }

    /// Order in which minibatches visit the buffer.
    pub fn sampling(mut self, v: SamplingOrder) -> Self {
        self.sampling = v;
        self
    }

    /// Random seed of minibatch shuffling.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = Some(v);
        self
    }

    /// Device on which training runs.
    pub fn device(mut self, v: Device) -> Self {
        self.device = v;
        self
    }

    /// Returns the number of passes over the buffer per training call.
    pub fn get_train_iters(&self) -> usize {
        self.train_iters
    }

    /// Returns the device on which training runs.
    pub fn get_device(&self) -> Device {
        self.device
    }

    /// Constructs [`PpoConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`PpoConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
