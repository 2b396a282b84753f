use pursuit_core::numel;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`Mlp`](super::Mlp).
pub struct MlpConfig {
    pub(super) in_dim: i64,
    pub(super) units: Vec<i64>,
    pub(super) out_dim: i64,
}

impl MlpConfig {
    /// Creates a configuration.
    pub fn new(in_dim: i64, units: Vec<i64>, out_dim: i64) -> Self {
        Self {
            in_dim,
            units,
            out_dim,
        }
    }

    /// Creates a configuration whose input is the flattened concatenation
    /// of observation channels with the given per-item shapes.
    pub fn from_obs_shapes(shapes: &[Vec<usize>], units: Vec<i64>, out_dim: i64) -> Self {
        let in_dim = shapes.iter().map(|s| numel(s)).sum::<usize>() as i64;
        Self::new(in_dim, units, out_dim)
    }

    /// Input dimension.
    pub fn in_dim(&self) -> i64 {
        self.in_dim
    }

    /// Output dimension.
    pub fn out_dim(&self) -> i64 {
        self.out_dim
    }
}
