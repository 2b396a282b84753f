//! Trainable networks and their frozen snapshots.
mod base;
mod config;
mod snapshot;
pub use base::Net;
pub use config::NetConfig;
pub use snapshot::ValueSnapshot;
