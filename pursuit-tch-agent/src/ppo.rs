//! Proximal policy optimization with a centralized value function.
//!
//! The policy of an agent is trained on its own observations, while its
//! value network is trained on the combined observations of both agents.
mod action;
mod base;
mod config;
mod loss;
pub use action::{entropy, sample_actions};
pub use base::Ppo;
pub use config::PpoConfig;
pub use loss::{
    apply_action_mask, categorical_entropy, categorical_log_prob, clipped_surrogate, policy_loss,
    value_loss,
};
