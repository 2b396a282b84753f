//! Generalized advantage estimation.
use super::TransitionBuffer;
use crate::{base::ObsBatch, error::PursuitError};
use anyhow::Result;
use log::trace;

/// Batched value estimates over combined observations.
///
/// Implementors must not change between calls made within one training call,
/// so that advantage targets stay stationary across epochs.
pub trait ValueFunction {
    /// Returns one value per item of `obs`.
    fn values(&self, obs: &ObsBatch) -> Result<Vec<f32>>;
}

/// Computes advantages and returns of a single slot by backward recursion.
///
/// `values[t]` is the value estimate of the observation at step `t` and
/// `bootstrap_value` is the estimate of the observation following the last step.
/// A terminated step stops both bootstrapping and the accumulation of
/// advantages from later steps. Truncated steps do not affect the recursion.
///
/// Returns `(advantages, returns)`. All slices must have the length of `rewards`.
pub fn compute_gae(
    rewards: &[f32],
    values: &[f32],
    is_terminated: &[i8],
    is_truncated: &[i8],
    bootstrap_value: f32,
    discount: f32,
    lambda: f32,
) -> Result<(Vec<f32>, Vec<f32>), PursuitError> {
    let horizon = rewards.len();
    for (what, len) in [
        ("values", values.len()),
        ("terminated flags", is_terminated.len()),
        ("truncated flags", is_truncated.len()),
    ] {
        if len != horizon {
            return Err(PursuitError::ShapeMismatch {
                what: what.to_string(),
                expected: horizon,
                got: len,
            });
        }
    }
    let mut advantages = vec![0f32; horizon];
    let mut returns = vec![0f32; horizon];
    let mut a = 0f32;

    for t in (0..horizon).rev() {
        let not_done = 1. - is_terminated[t] as f32;
        let next_value = if t + 1 < horizon {
            values[t + 1]
        } else {
            bootstrap_value
        };
        let delta = rewards[t] + discount * next_value * not_done - values[t];
        a = delta + discount * lambda * not_done * a;
        advantages[t] = a;
        returns[t] = a + values[t];
    }

    Ok((advantages, returns))
}

/// Per-slot, per-step advantages and returns of a buffer.
///
/// Laid out step-major like [`TransitionBuffer`].
#[derive(Debug, Clone)]
pub struct AdvantageTable {
    num_envs: usize,
    advantages: Vec<f32>,
    returns: Vec<f32>,
}

impl AdvantageTable {
    /// Advantage of slot `e` at step `t`.
    pub fn advantage(&self, t: usize, e: usize) -> f32 {
        self.advantages[t * self.num_envs + e]
    }

    /// Return of slot `e` at step `t`.
    pub fn ret(&self, t: usize, e: usize) -> f32 {
        self.returns[t * self.num_envs + e]
    }

    /// All advantages.
    pub fn advantages(&self) -> &[f32] {
        &self.advantages
    }

    /// All returns.
    pub fn returns(&self) -> &[f32] {
        &self.returns
    }

    /// Returns and advantages at flat indices.
    pub fn sample(&self, ixs: &[usize]) -> (Vec<f32>, Vec<f32>) {
        let returns = ixs.iter().map(|&ix| self.returns[ix]).collect();
        let advantages = ixs.iter().map(|&ix| self.advantages[ix]).collect();
        (returns, advantages)
    }
}

/// Fails unless `other` has the grid of `buffer`.
pub(crate) fn check_partner(buffer: &TransitionBuffer, other: &TransitionBuffer) -> Result<()> {
    let expected = (buffer.num_envs(), buffer.horizon());
    let got = (other.num_envs(), other.horizon());
    if expected != got {
        return Err(PursuitError::PartnerMismatch { expected, got }.into());
    }
    Ok(())
}

/// Builds [`AdvantageTable`]s from filled buffers.
pub struct AdvantageEstimator;

impl AdvantageEstimator {
    /// Estimates advantages and returns of every transition in `buffer`.
    ///
    /// Value estimates are taken on the combined observations of `buffer`
    /// and the partner buffer `other`, one step row at a time, the last
    /// row being the bootstrap observations.
    pub fn estimate<V: ValueFunction + ?Sized>(
        buffer: &TransitionBuffer,
        other: &TransitionBuffer,
        value_fn: &V,
        discount: f32,
        lambda: f32,
    ) -> Result<AdvantageTable> {
        check_partner(buffer, other)?;
        buffer.ensure_ready()?;
        other.ensure_ready()?;

        let num_envs = buffer.num_envs();
        let horizon = buffer.horizon();

        // values[t * num_envs + e], including the bootstrap row
        let mut values = Vec::with_capacity((horizon + 1) * num_envs);
        for t in 0..=horizon {
            let combined = buffer.obs_row(t).pair(&other.obs_row(t))?;
            let v = value_fn.values(&combined)?;
            if v.len() != num_envs {
                return Err(PursuitError::ShapeMismatch {
                    what: "value estimates".to_string(),
                    expected: num_envs,
                    got: v.len(),
                }
                .into());
            }
            values.extend(v);
        }
        trace!("Evaluated {} value rows", horizon + 1);

        let mut advantages = vec![0f32; horizon * num_envs];
        let mut returns = vec![0f32; horizon * num_envs];
        for e in 0..num_envs {
            let r = (0..horizon).map(|t| buffer.reward(t, e)).collect::<Vec<_>>();
            let v = (0..horizon).map(|t| values[t * num_envs + e]).collect::<Vec<_>>();
            let te = (0..horizon).map(|t| buffer.is_terminated(t, e)).collect::<Vec<_>>();
            let tr = (0..horizon).map(|t| buffer.is_truncated(t, e)).collect::<Vec<_>>();
            let bootstrap_value = values[horizon * num_envs + e];

            let (adv, ret) = compute_gae(&r, &v, &te, &tr, bootstrap_value, discount, lambda)?;
            for t in 0..horizon {
                advantages[t * num_envs + e] = adv[t];
                returns[t * num_envs + e] = ret[t];
            }
        }

        Ok(AdvantageTable {
            num_envs,
            advantages,
            returns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DISCOUNT: f32 = 0.98;
    const LAMBDA: f32 = 0.95;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_zero_rewards_constant_value() {
        let (adv, ret) = compute_gae(&[0.; 6], &[0.5; 6], &[0; 6], &[0; 6], 0.5, 1.0, LAMBDA).unwrap();
        assert!(adv.iter().all(|&a| a == 0.));
        assert!(ret.iter().all(|&r| r == 0.5));
    }

    #[test]
    fn test_single_step_td_error() {
        let (adv, ret) = compute_gae(&[1.], &[0.2], &[0], &[0], 0.5, DISCOUNT, LAMBDA).unwrap();
        assert!(approx_eq(adv[0], 1. + DISCOUNT * 0.5 - 0.2));
        assert!(approx_eq(ret[0], adv[0] + 0.2));

        let (adv, _) = compute_gae(&[1.], &[0.2], &[1], &[0], 0.5, DISCOUNT, LAMBDA).unwrap();
        assert!(approx_eq(adv[0], 0.8));
    }

    #[test]
    fn test_termination_resets_recursion() {
        let rewards = [0.1, -0.3, 1.0, 0.2, 0.5];
        let values = [0.3, 0.1, -0.2, 0.4, 0.6];
        let terminated = [0, 0, 1, 0, 0];
        let (adv, _) = compute_gae(&rewards, &values, &terminated, &[0; 5], 0.7, DISCOUNT, LAMBDA).unwrap();

        let mut rewards_p = rewards;
        rewards_p[0] = 10.;
        let mut values_p = values;
        values_p[1] = -3.;
        let (adv_p, _) = compute_gae(&rewards_p, &values_p, &terminated, &[0; 5], 0.7, DISCOUNT, LAMBDA).unwrap();

        assert_eq!(adv[3], adv_p[3]);
        assert_eq!(adv[4], adv_p[4]);
        assert_ne!(adv[0], adv_p[0]);
    }

    #[test]
    fn test_truncation_does_not_reset_recursion() {
        let rewards = [0.1, -0.3, 1.0, 0.2, 0.5];
        let values = [0.3, 0.1, -0.2, 0.4, 0.6];
        let (adv, _) = compute_gae(&rewards, &values, &[0; 5], &[0; 5], 0.7, DISCOUNT, LAMBDA).unwrap();
        let (adv_tr, _) = compute_gae(&rewards, &values, &[0; 5], &[0, 0, 1, 0, 0], 0.7, DISCOUNT, LAMBDA).unwrap();
        let (adv_te, _) = compute_gae(&rewards, &values, &[0, 0, 1, 0, 0], &[0; 5], 0.7, DISCOUNT, LAMBDA).unwrap();

        assert_eq!(adv, adv_tr);
        assert_ne!(adv[2], adv_te[2]);
    }

    #[test]
    fn test_mismatched_lengths_are_rejected() {
        let err = compute_gae(&[0.; 4], &[0.; 3], &[0; 4], &[0; 4], 0., DISCOUNT, LAMBDA);
        assert_eq!(
            err,
            Err(PursuitError::ShapeMismatch {
                what: "values".to_string(),
                expected: 4,
                got: 3,
            })
        );

        let err = compute_gae(&[0.; 4], &[0.; 4], &[0; 4], &[0; 5], 0., DISCOUNT, LAMBDA);
        assert!(matches!(
            err,
            Err(PursuitError::ShapeMismatch { expected: 4, got: 5, .. })
        ));
    }

    /// Value of an item is the first element of its first channel.
    struct FirstElement;

    impl ValueFunction for FirstElement {
        fn values(&self, obs: &ObsBatch) -> Result<Vec<f32>> {
            let n = crate::base::numel(&obs.shapes()[0]);
            Ok(obs.channel(0).chunks(n).map(|c| c[0]).collect())
        }
    }

    fn filled(num_envs: usize, horizon: usize) -> Result<TransitionBuffer> {
        let shapes = vec![vec![1]];
        let mut buffer = TransitionBuffer::new(&shapes, 2, num_envs, horizon);
        for t in 0..horizon {
            let obs = ObsBatch::from_channels(&shapes, vec![vec![t as f32; num_envs]])?;
            let reward = (0..num_envs).map(|e| e as f32).collect::<Vec<_>>();
            let mut terminated = vec![0; num_envs];
            terminated[0] = (t == 1) as i8;
            buffer.insert_step(
                &obs,
                &vec![0; num_envs],
                &vec![0.; num_envs * 2],
                &reward,
                &terminated,
                &vec![0; num_envs],
            )?;
        }
        let obs = ObsBatch::from_channels(&shapes, vec![vec![horizon as f32; num_envs]])?;
        buffer.insert_final_step(&obs)?;
        Ok(buffer)
    }

    #[test]
    fn test_estimate_matches_per_slot_recursion() -> Result<()> {
        let buffer = filled(3, 4)?;
        let other = filled(3, 4)?;
        let table = AdvantageEstimator::estimate(&buffer, &other, &FirstElement, DISCOUNT, LAMBDA)?;

        for e in 0..3 {
            let r = vec![e as f32; 4];
            let v = vec![0., 1., 2., 3.];
            let te = if e == 0 { vec![0, 1, 0, 0] } else { vec![0; 4] };
            let (adv, ret) = compute_gae(&r, &v, &te, &[0; 4], 4., DISCOUNT, LAMBDA).unwrap();
            for t in 0..4 {
                assert!(approx_eq(table.advantage(t, e), adv[t]));
                assert!(approx_eq(table.ret(t, e), ret[t]));
            }
        }
        Ok(())
    }

    #[test]
    fn test_estimate_rejects_mismatched_partner() -> Result<()> {
        let buffer = filled(3, 4)?;
        let other = filled(2, 4)?;
        let err = AdvantageEstimator::estimate(&buffer, &other, &FirstElement, DISCOUNT, LAMBDA)
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<PursuitError>(),
            Some(&PursuitError::PartnerMismatch {
                expected: (3, 4),
                got: (2, 4)
            })
        );
        Ok(())
    }
}
