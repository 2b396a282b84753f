//! Action selection from policy logits.
use super::loss::{apply_action_mask, categorical_entropy};
use crate::tensor;
use anyhow::Result;
use tch::{Kind, Tensor};

/// Samples one action per row of `logits` from the categorical distribution.
///
/// If `mask` is given, actions marked `true` are never sampled.
pub fn sample_actions(logits: &Tensor, mask: Option<&Tensor>) -> Tensor {
    let logits = match mask {
        Some(mask) => apply_action_mask(logits, mask),
        None => logits.shallow_clone(),
    };
    logits
        .softmax(-1, Kind::Float)
        .multinomial(1, true)
        .squeeze_dim(-1)
}

/// Entropy of the categorical distribution of each row of `logits`, on the host.
pub fn entropy(logits: &Tensor) -> Result<Vec<f32>> {
    tensor::to_vec_f32(&categorical_entropy(logits))
}
