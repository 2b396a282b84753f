//! PPO training of a player and a pursuer, implemented with [tch](https://crates.io/crates/tch).
pub mod mlp;
pub mod model;
pub mod net;
pub mod opt;
pub mod ppo;
pub mod self_play;
pub mod tensor;

mod device;
pub use device::Device;
