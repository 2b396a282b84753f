//! Rollout storage, advantage estimation and joint minibatch sampling.
mod buffer;
mod gae;
mod sampler;
pub use buffer::TransitionBuffer;
pub use gae::{compute_gae, AdvantageEstimator, AdvantageTable, ValueFunction};
pub use sampler::{JointSampler, Minibatch, Minibatches, SamplingOrder};
