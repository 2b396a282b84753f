//! Self-play training of the player and the pursuer.
mod base;
mod config;
pub use base::{AgentState, SelfPlayTrainer};
pub use config::SelfPlayConfig;
