//! Loss functions of the PPO trainer.
use tch::{Kind, Tensor};

/// Sets the logits of invalid actions to negative infinity.
///
/// `mask` is a boolean tensor of the shape of `logits`, `true` marking an invalid action.
pub fn apply_action_mask(logits: &Tensor, mask: &Tensor) -> Tensor {
    logits.masked_fill(mask, f64::NEG_INFINITY)
}

/// Log-probabilities of `actions` under the categorical distributions given by `logits`.
///
/// `logits` has shape `[batch, n_actions]` and `actions` has shape `[batch]`.
pub fn categorical_log_prob(logits: &Tensor, actions: &Tensor) -> Tensor {
    logits
        .log_softmax(-1, Kind::Float)
        .gather(-1, &actions.unsqueeze(-1), false)
        .squeeze_dim(-1)
}

/// Entropies of the categorical distributions given by `logits`, of shape `[batch]`.
///
/// Log-probabilities are clamped to the smallest finite `f32`, so that
/// masked actions contribute zero instead of NaN.
pub fn categorical_entropy(logits: &Tensor) -> Tensor {
    let logp = logits
        .log_softmax(-1, Kind::Float)
        .clamp_min(f32::MIN as f64);
    let p = logp.exp();
    -(p * logp).sum_dim_intlist(Some([-1].as_slice()), false, Kind::Float)
}

/// Elementwise clipped surrogate objective.
///
/// Returns `min(ratio * adv, (1 + epsilon * sign(adv)) * adv)`. The clip is
/// keyed on the sign of the advantage rather than on the ratio.
pub fn clipped_surrogate(ratio: &Tensor, advantages: &Tensor, epsilon: f64) -> Tensor {
    let term1 = ratio * advantages;
    let term2 = (advantages.sign() * epsilon + 1.0) * advantages;
    term1.min_other(&term2)
}

/// Negated mean of the clipped surrogate objective.
pub fn policy_loss(
    new_logp: &Tensor,
    old_logp: &Tensor,
    advantages: &Tensor,
    epsilon: f64,
) -> Tensor {
    let ratio = (new_logp - old_logp).exp();
    -clipped_surrogate(&ratio, advantages, epsilon).mean(Kind::Float)
}

/// Mean squared error between value predictions and returns.
///
/// Predictions of shape `[batch, 1]` are flattened to `[batch]`.
pub fn value_loss(pred: &Tensor, returns: &Tensor) -> Tensor {
    let diff = pred.flatten(0, -1) - returns;
    (&diff * &diff).mean(Kind::Float)
}
