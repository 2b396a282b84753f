//! Core functionalities.
mod env;
mod obs;
mod role;
pub use env::{EnvStep, PursuitEnv};
pub use obs::{numel, ObsBatch};
pub use role::{AgentMap, AgentRole};
