#![warn(missing_docs)]
//! Rollout storage and advantage estimation for two-agent pursuit training.
//!
//! This crate is independent of any tensor backend. It provides the
//! [`TransitionBuffer`] filled by the sampling loop, the
//! [`AdvantageEstimator`] computing GAE targets, and the [`JointSampler`]
//! pairing the experience of an agent with that of its partner.
pub mod dummy;
pub mod error;
pub mod record;

mod base;
pub use base::{numel, AgentMap, AgentRole, EnvStep, ObsBatch, PursuitEnv};

mod rollout;
pub use rollout::{
    compute_gae, AdvantageEstimator, AdvantageTable, JointSampler, Minibatch, Minibatches,
    SamplingOrder, TransitionBuffer, ValueFunction,
};
