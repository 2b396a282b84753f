//! Fixed-horizon rollout storage.
use crate::{base::ObsBatch, error::PursuitError};
use anyhow::Result;
use log::{debug, info, trace};

fn check_len(what: &str, expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(PursuitError::ShapeMismatch {
            what: what.to_string(),
            expected,
            got,
        }
        .into());
    }
    Ok(())
}

/// Stores one trajectory segment of `horizon` steps for each of `num_envs`
/// environment instances (slots), followed by one bootstrap observation per slot.
///
/// All slots are written together: [`TransitionBuffer::insert_step`] appends
/// one transition to every slot and advances a shared step cursor. Data is
/// laid out step-major, the transition of slot `e` at step `t` being item
/// `t * num_envs + e`. The observation row `t = horizon` holds the bootstrap
/// observations.
///
/// Lifecycle: fill with `horizon` calls of `insert_step` and one call of
/// [`TransitionBuffer::insert_final_step`], sample for training, then
/// [`TransitionBuffer::clear`] before the next collection phase.
pub struct TransitionBuffer {
    obs_shapes: Vec<Vec<usize>>,
    n_actions: usize,
    num_envs: usize,
    horizon: usize,

    /// Step cursor.
    i: usize,
    has_bootstrap: bool,

    obs: ObsBatch,
    act: Vec<i64>,
    action_logits: Vec<f32>,
    action_masks: Vec<bool>,
    reward: Vec<f32>,
    is_terminated: Vec<i8>,
    is_truncated: Vec<i8>,
}

impl TransitionBuffer {
    /// Constructs an empty buffer.
    ///
    /// `obs_shapes` are the per-item shapes of the observation channels of
    /// the agent owning this buffer.
    pub fn new(obs_shapes: &[Vec<usize>], n_actions: usize, num_envs: usize, horizon: usize) -> Self {
        let n = num_envs * horizon;

        info!("Construct transition buffer");
        info!("Num. of envs   = {}", num_envs);
        info!("Horizon        = {}", horizon);
        info!("Num. of actions = {}", n_actions);

        Self {
            obs_shapes: obs_shapes.to_vec(),
            n_actions,
            num_envs,
            horizon,
            i: 0,
            has_bootstrap: false,
            obs: ObsBatch::zeros(obs_shapes, n + num_envs),
            act: vec![0; n],
            action_logits: vec![0.; n * n_actions],
            action_masks: vec![false; n * n_actions],
            reward: vec![0.; n],
            is_terminated: vec![0; n],
            is_truncated: vec![0; n],
        }
    }

    /// Inserts one step for every slot, with all actions marked valid.
    ///
    /// `obs` is the observation the action was taken at. Flags are `1` when set.
    pub fn insert_step(
        &mut self,
        obs: &ObsBatch,
        act: &[i64],
        action_logits: &[f32],
        reward: &[f32],
        is_terminated: &[i8],
        is_truncated: &[i8],
    ) -> Result<()> {
        let masks = vec![false; self.num_envs * self.n_actions];
        self.insert_step_masked(obs, act, action_logits, reward, is_terminated, is_truncated, &masks)
    }

    /// Inserts one step for every slot together with action-validity masks.
    ///
    /// `action_masks` has `num_envs * n_actions` entries, `true` marking an invalid action.
    #[allow(clippy::too_many_arguments)]
    pub fn insert_step_masked(
        &mut self,
        obs: &ObsBatch,
        act: &[i64],
        action_logits: &[f32],
        reward: &[f32],
        is_terminated: &[i8],
        is_truncated: &[i8],
        action_masks: &[bool],
    ) -> Result<()> {
        if self.i >= self.horizon {
            return Err(PursuitError::CapacityExceeded(self.horizon).into());
        }

        let n = self.num_envs;
        obs.check(&self.obs_shapes, n)?;
        check_len("actions", n, act.len())?;
        check_len("action logits", n * self.n_actions, action_logits.len())?;
        check_len("action masks", n * self.n_actions, action_masks.len())?;
        check_len("rewards", n, reward.len())?;
        check_len("terminated flags", n, is_terminated.len())?;
        check_len("truncated flags", n, is_truncated.len())?;

        let ix = self.i * n;
        let ix_a = ix * self.n_actions;
        self.obs.write(ix, obs);
        self.act[ix..ix + n].copy_from_slice(act);
        self.action_logits[ix_a..ix_a + n * self.n_actions].copy_from_slice(action_logits);
        self.action_masks[ix_a..ix_a + n * self.n_actions].copy_from_slice(action_masks);
        self.reward[ix..ix + n].copy_from_slice(reward);
        self.is_terminated[ix..ix + n].copy_from_slice(is_terminated);
        self.is_truncated[ix..ix + n].copy_from_slice(is_truncated);

        self.i += 1;
        trace!("Inserted step {} of {}", self.i, self.horizon);

        Ok(())
    }

    /// Inserts the bootstrap observation of every slot.
    ///
    /// Must be called exactly once, after `horizon` steps were inserted.
    pub fn insert_final_step(&mut self, obs: &ObsBatch) -> Result<()> {
        if self.i != self.horizon {
            return Err(PursuitError::NotFilled {
                filled: self.i,
                horizon: self.horizon,
            }
            .into());
        }
        if self.has_bootstrap {
            return Err(PursuitError::BootstrapAlreadySet.into());
        }
        obs.check(&self.obs_shapes, self.num_envs)?;

        self.obs.write(self.horizon * self.num_envs, obs);
        self.has_bootstrap = true;

        Ok(())
    }

    /// Empties all slots and resets the step cursor.
    pub fn clear(&mut self) {
        self.i = 0;
        self.has_bootstrap = false;
        debug!("Cleared transition buffer");
    }

    /// Fails unless the buffer holds `horizon` steps and the bootstrap observations.
    pub fn ensure_ready(&self) -> Result<()> {
        if self.i != self.horizon {
            return Err(PursuitError::NotFilled {
                filled: self.i,
                horizon: self.horizon,
            }
            .into());
        }
        if !self.has_bootstrap {
            return Err(PursuitError::MissingBootstrap.into());
        }
        Ok(())
    }

    /// Number of environment instances.
    pub fn num_envs(&self) -> usize {
        self.num_envs
    }

    /// Number of steps per slot.
    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Number of discrete actions.
    pub fn n_actions(&self) -> usize {
        self.n_actions
    }

    /// Per-item shapes of the observation channels.
    pub fn obs_shapes(&self) -> &[Vec<usize>] {
        &self.obs_shapes
    }

    /// Number of steps written since the last clear.
    pub fn len(&self) -> usize {
        self.i
    }

    /// Returns `true` if no step has been written since the last clear.
    pub fn is_empty(&self) -> bool {
        self.i == 0
    }

    /// Returns `true` if `horizon` steps have been written.
    pub fn is_full(&self) -> bool {
        self.i == self.horizon
    }

    /// Returns `true` if the bootstrap observations have been written.
    pub fn has_bootstrap(&self) -> bool {
        self.has_bootstrap
    }

    /// Observations of step `t` for all slots. `t == horizon` gives the bootstrap row.
    pub fn obs_row(&self, t: usize) -> ObsBatch {
        self.obs.slice(t * self.num_envs, self.num_envs)
    }

    /// Observations at flat indices `ixs` (`t * num_envs + e`).
    pub fn sample_obs(&self, ixs: &[usize]) -> ObsBatch {
        self.obs.sample(ixs)
    }

    /// Actions at flat indices.
    pub fn sample_act(&self, ixs: &[usize]) -> Vec<i64> {
        ixs.iter().map(|&ix| self.act[ix]).collect()
    }

    /// Recorded action logits at flat indices, `n_actions` values per index.
    pub fn sample_action_logits(&self, ixs: &[usize]) -> Vec<f32> {
        let n = self.n_actions;
        ixs.iter()
            .flat_map(|&ix| self.action_logits[ix * n..(ix + 1) * n].iter().copied())
            .collect()
    }

    /// Action masks at flat indices, `n_actions` values per index.
    pub fn sample_action_masks(&self, ixs: &[usize]) -> Vec<bool> {
        let n = self.n_actions;
        ixs.iter()
            .flat_map(|&ix| self.action_masks[ix * n..(ix + 1) * n].iter().copied())
            .collect()
    }

    /// Reward of slot `e` at step `t`.
    pub fn reward(&self, t: usize, e: usize) -> f32 {
        self.reward[t * self.num_envs + e]
    }

    /// Terminated flag of slot `e` at step `t`.
    pub fn is_terminated(&self, t: usize, e: usize) -> i8 {
        self.is_terminated[t * self.num_envs + e]
    }

    /// Truncated flag of slot `e` at step `t`.
    pub fn is_truncated(&self, t: usize, e: usize) -> i8 {
        self.is_truncated[t * self.num_envs + e]
    }

    /// Sum of rewards written since the last clear.
    pub fn sum_rewards(&self) -> f32 {
        self.reward[..self.i * self.num_envs].iter().sum()
    }

    /// Number of terminated flags written since the last clear.
    pub fn num_terminated_flags(&self) -> usize {
        self.is_terminated[..self.i * self.num_envs]
            .iter()
            .map(|&f| f as usize)
            .sum()
    }

    /// Number of truncated flags written since the last clear.
    pub fn num_truncated_flags(&self) -> usize {
        self.is_truncated[..self.i * self.num_envs]
            .iter()
            .map(|&f| f as usize)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NUM_ENVS: usize = 2;
    const HORIZON: usize = 3;
    const N_ACTIONS: usize = 4;

    fn shapes() -> Vec<Vec<usize>> {
        vec![vec![3], vec![2, 2]]
    }

    fn obs(v: f32) -> ObsBatch {
        ObsBatch::from_channels(
            &shapes(),
            vec![vec![v; NUM_ENVS * 3], vec![v; NUM_ENVS * 4]],
        )
        .unwrap()
    }

    fn insert(buffer: &mut TransitionBuffer, v: f32) -> Result<()> {
        buffer.insert_step(
            &obs(v),
            &[0, 1],
            &[0.; NUM_ENVS * N_ACTIONS],
            &[v; NUM_ENVS],
            &[0; NUM_ENVS],
            &[0; NUM_ENVS],
        )
    }

    fn error_of(r: Result<()>) -> PursuitError {
        r.unwrap_err().downcast::<PursuitError>().unwrap()
    }

    #[test]
    fn test_capacity_exceeded() -> Result<()> {
        let mut buffer = TransitionBuffer::new(&shapes(), N_ACTIONS, NUM_ENVS, HORIZON);
        for t in 0..HORIZON {
            insert(&mut buffer, t as f32)?;
        }
        assert!(buffer.is_full());
        assert_eq!(
            error_of(insert(&mut buffer, 9.)),
            PursuitError::CapacityExceeded(HORIZON)
        );
        Ok(())
    }

    #[test]
    fn test_final_step_requires_full_buffer() -> Result<()> {
        let mut buffer = TransitionBuffer::new(&shapes(), N_ACTIONS, NUM_ENVS, HORIZON);
        insert(&mut buffer, 0.)?;
        assert_eq!(
            error_of(buffer.insert_final_step(&obs(1.))),
            PursuitError::NotFilled {
                filled: 1,
                horizon: HORIZON
            }
        );
        assert_eq!(error_of(buffer.ensure_ready()), PursuitError::NotFilled { filled: 1, horizon: HORIZON });

        for t in 1..HORIZON {
            insert(&mut buffer, t as f32)?;
        }
        assert_eq!(error_of(buffer.ensure_ready()), PursuitError::MissingBootstrap);
        buffer.insert_final_step(&obs(7.))?;
        buffer.ensure_ready()?;
        assert_eq!(
            error_of(buffer.insert_final_step(&obs(7.))),
            PursuitError::BootstrapAlreadySet
        );
        assert_eq!(buffer.obs_row(HORIZON).channel(0), &[7.; NUM_ENVS * 3]);
        Ok(())
    }

    #[test]
    fn test_shape_mismatch() {
        let mut buffer = TransitionBuffer::new(&shapes(), N_ACTIONS, NUM_ENVS, HORIZON);
        let r = buffer.insert_step(
            &obs(0.),
            &[0, 1, 2],
            &[0.; NUM_ENVS * N_ACTIONS],
            &[0.; NUM_ENVS],
            &[0; NUM_ENVS],
            &[0; NUM_ENVS],
        );
        assert!(matches!(error_of(r), PursuitError::ShapeMismatch { .. }));

        let wrong_obs = ObsBatch::from_channels(&[vec![3]], vec![vec![0.; 6]]).unwrap();
        assert!(matches!(
            error_of(buffer.insert_final_step(&wrong_obs)),
            PursuitError::NotFilled { .. }
        ));
        assert_eq!(buffer.len(), 0);
    }

    #[test]
    fn test_layout_and_clear() -> Result<()> {
        let mut buffer = TransitionBuffer::new(&shapes(), N_ACTIONS, NUM_ENVS, HORIZON);
        for t in 0..HORIZON {
            insert(&mut buffer, t as f32)?;
        }
        buffer.insert_final_step(&obs(3.))?;

        assert_eq!(buffer.reward(2, 1), 2.);
        assert_eq!(buffer.sample_act(&[2, 3]), vec![0, 1]);
        assert_eq!(buffer.sample_obs(&[5]).channel(1), &[2.; 4]);
        assert_eq!(buffer.sum_rewards(), 6.);

        buffer.clear();
        assert!(buffer.is_empty());
        assert!(!buffer.has_bootstrap());
        assert_eq!(buffer.sum_rewards(), 0.);
        assert_eq!(error_of(buffer.ensure_ready()), PursuitError::NotFilled { filled: 0, horizon: HORIZON });
        insert(&mut buffer, 5.)?;
        assert_eq!(buffer.len(), 1);
        Ok(())
    }
}
