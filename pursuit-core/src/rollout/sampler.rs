//! Joint minibatch sampling over the buffers of two agents.
use super::{gae::check_partner, AdvantageEstimator, AdvantageTable, TransitionBuffer, ValueFunction};
use crate::{base::ObsBatch, error::PursuitError};
use anyhow::Result;
use log::trace;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};

/// Order in which transitions are visited within one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum SamplingOrder {
    /// A fresh random permutation on every pass.
    #[default]
    Shuffled,

    /// Step-major order, `t * num_envs + e`.
    Sequential,
}

/// A training minibatch.
///
/// Item `i` of every field refers to the same (slot, step) transition.
#[derive(Debug, Clone)]
pub struct Minibatch {
    /// Observations of the owning agent.
    pub obs: ObsBatch,

    /// Observations of the owning agent followed by those of the partner.
    pub obs_combined: ObsBatch,

    /// Taken actions.
    pub actions: Vec<i64>,

    /// Action logits recorded at collection time, `n_actions` per item.
    pub action_logits: Vec<f32>,

    /// Value targets.
    pub returns: Vec<f32>,

    /// Advantages.
    pub advantages: Vec<f32>,

    /// Action masks, `n_actions` per item, `true` marking an invalid action.
    pub action_masks: Vec<bool>,

    /// Number of discrete actions.
    pub n_actions: usize,
}

impl Minibatch {
    /// Number of transitions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns `true` if the minibatch holds no transition.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Lazy sequence of minibatches covering every transition of a buffer once.
pub struct Minibatches<'a> {
    buffer: &'a TransitionBuffer,
    other: &'a TransitionBuffer,
    table: AdvantageTable,
    ixs: Vec<usize>,
    batch_size: usize,
    pos: usize,
}

impl<'a> Minibatches<'a> {
    /// Advantages and returns this pass was built from.
    pub fn table(&self) -> &AdvantageTable {
        &self.table
    }

    fn batch(&self, ixs: &[usize]) -> Minibatch {
        let obs = self.buffer.sample_obs(ixs);
        let obs_combined = obs.concat_channels(&self.other.sample_obs(ixs));
        let (returns, advantages) = self.table.sample(ixs);

        Minibatch {
            obs,
            obs_combined,
            actions: self.buffer.sample_act(ixs),
            action_logits: self.buffer.sample_action_logits(ixs),
            returns,
            advantages,
            action_masks: self.buffer.sample_action_masks(ixs),
            n_actions: self.buffer.n_actions(),
        }
    }
}

impl<'a> Iterator for Minibatches<'a> {
    type Item = Minibatch;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.ixs.len() {
            return None;
        }
        let end = (self.pos + self.batch_size).min(self.ixs.len());
        let batch = self.batch(&self.ixs[self.pos..end]);
        trace!("Minibatch [{}, {}) of {}", self.pos, end, self.ixs.len());
        self.pos = end;
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.ixs.len() - self.pos;
        let n = (rest + self.batch_size - 1) / self.batch_size;
        (n, Some(n))
    }
}

impl<'a> ExactSizeIterator for Minibatches<'a> {}

/// Draws minibatches jointly from the buffer of an agent and the buffer of its partner.
pub struct JointSampler {
    order: SamplingOrder,
    rng: StdRng,
}

impl JointSampler {
    /// Constructs a sampler. Without a seed, the shuffling RNG is seeded from entropy.
    pub fn new(order: SamplingOrder, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { order, rng }
    }

    /// Sampling order.
    pub fn order(&self) -> SamplingOrder {
        self.order
    }

    /// Starts one pass over `buffer`.
    ///
    /// Advantages are estimated here, once per pass, with `value_fn` applied to
    /// the combined observations of `buffer` and `other`. The buffers must
    /// have the same number of slots and horizon and both must be filled.
    pub fn samples_global<'a, V: ValueFunction + ?Sized>(
        &mut self,
        buffer: &'a TransitionBuffer,
        other: &'a TransitionBuffer,
        batch_size: usize,
        discount: f32,
        lambda: f32,
        value_fn: &V,
    ) -> Result<Minibatches<'a>> {
        if batch_size == 0 {
            return Err(PursuitError::InvalidBatchSize(batch_size).into());
        }
        check_partner(buffer, other)?;

        let table = AdvantageEstimator::estimate(buffer, other, value_fn, discount, lambda)?;
        let mut ixs = (0..buffer.num_envs() * buffer.horizon()).collect::<Vec<_>>();
        if self.order == SamplingOrder::Shuffled {
            ixs.shuffle(&mut self.rng);
        }

        Ok(Minibatches {
            buffer,
            other,
            table,
            ixs,
            batch_size,
            pos: 0,
        })
    }
}

impl TransitionBuffer {
    /// Starts one pass over this buffer paired with the partner buffer `other`.
    ///
    /// See [`JointSampler::samples_global`].
    pub fn samples_global<'a, V: ValueFunction + ?Sized>(
        &'a self,
        batch_size: usize,
        discount: f32,
        lambda: f32,
        value_fn: &V,
        other: &'a TransitionBuffer,
        sampler: &mut JointSampler,
    ) -> Result<Minibatches<'a>> {
        sampler.samples_global(self, other, batch_size, discount, lambda, value_fn)
    }
}
