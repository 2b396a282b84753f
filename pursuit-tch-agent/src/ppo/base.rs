use super::{
    loss::{apply_action_mask, categorical_entropy, categorical_log_prob, policy_loss, value_loss},
    PpoConfig,
};
use crate::{
    model::SubModel,
    net::Net,
    tensor::{masks_to_tensor, obs_to_tensors, per_action_to_tensor},
};
use anyhow::{ensure, Result};
use log::{debug, info, trace};
use pursuit_core::{
    record::{Record, RecordValue},
    JointSampler, Minibatch, TransitionBuffer,
};
use serde::{de::DeserializeOwned, Serialize};
use std::convert::TryFrom;
use tch::{no_grad, Device, Kind, Tensor};

/// PPO trainer of one agent.
///
/// A call of [`Ppo::train`] freezes a snapshot of the value network, then
/// runs `train_iters` passes over the buffer of the agent. Advantages are
/// estimated at the start of each pass with the snapshot, on the combined
/// observations of the agent and its partner.
///
/// Both losses are divided by `gradient_steps`, and gradients of
/// `gradient_steps` consecutive minibatches are summed before each
/// clipped optimizer step. The counter restarts every pass.
pub struct Ppo {
    config: PpoConfig,
    sampler: JointSampler,
    device: Device,
}

impl Ppo {
    /// Constructs [`Ppo`].
    pub fn build(config: PpoConfig) -> Self {
        let sampler = JointSampler::new(config.sampling, config.seed);
        let device = config.device.into();

        info!("Construct PPO trainer");
        info!("Device           = {:?}", device);
        info!("Train iterations = {}", config.train_iters);
        info!("Batch size       = {}", config.train_batch_size);
        info!("Gradient steps   = {}", config.gradient_steps);

        Self {
            config,
            sampler,
            device,
        }
    }

    /// Configuration.
    pub fn config(&self) -> &PpoConfig {
        &self.config
    }

    /// Trains `policy` and `value` on `buffer`, paired with the partner buffer `other`.
    ///
    /// Returns the policy and value losses summed over all minibatches of all passes.
    pub fn train<P, V>(
        &mut self,
        policy: &mut Net<P>,
        value: &mut Net<V>,
        buffer: &TransitionBuffer,
        other: &TransitionBuffer,
    ) -> Result<(f32, f32)>
    where
        P: SubModel<Input = [Tensor], Output = Tensor>,
        P::Config: DeserializeOwned + Serialize + Clone,
        V: SubModel<Input = [Tensor], Output = Tensor>,
        V::Config: DeserializeOwned + Serialize + Clone,
    {
        let record = self.train_with_record(policy, value, buffer, other)?;
        Ok((
            record.get_scalar("policy_loss")?,
            record.get_scalar("value_loss")?,
        ))
    }

    /// Same as [`Ppo::train`], returning a record with `policy_loss`,
    /// `value_loss`, `n_minibatches` and `n_opts`.
    pub fn train_with_record<P, V>(
        &mut self,
        policy: &mut Net<P>,
        value: &mut Net<V>,
        buffer: &TransitionBuffer,
        other: &TransitionBuffer,
    ) -> Result<Record>
    where
        P: SubModel<Input = [Tensor], Output = Tensor>,
        P::Config: DeserializeOwned + Serialize + Clone,
        V: SubModel<Input = [Tensor], Output = Tensor>,
        V::Config: DeserializeOwned + Serialize + Clone,
    {
        ensure!(
            self.config.gradient_steps > 0,
            "gradient_steps must be positive"
        );
        let gradient_steps = self.config.gradient_steps;

        policy.train();
        value.train();
        if self.device != Device::Cpu {
            policy.to_device(self.device);
            value.to_device(self.device);
        }
        let snapshot = value.snapshot()?;

        let mut total_p_loss = 0f32;
        let mut total_v_loss = 0f32;
        let mut n_minibatches = 0;
        let n_opts_start = policy.n_opts();

        policy.zero_grad();
        value.zero_grad();

        for epoch in 0..self.config.train_iters {
            let batches = buffer.samples_global(
                self.config.train_batch_size,
                self.config.discount,
                self.config.lambda,
                &snapshot,
                other,
                &mut self.sampler,
            )?;

            let mut epoch_p_loss = 0f32;
            let mut epoch_v_loss = 0f32;
            for (i, batch) in batches.enumerate() {
                let (p_loss, v_loss) = self.accumulate_gradients(policy, value, &batch)?;
                epoch_p_loss += p_loss;
                epoch_v_loss += v_loss;
                n_minibatches += 1;

                if (i + 1) % gradient_steps == 0 {
                    policy.clip_grad_norm(self.config.gradient_clip);
                    policy.step();
                    value.clip_grad_norm(self.config.gradient_clip);
                    value.step();
                    policy.zero_grad();
                    value.zero_grad();
                }
            }

            debug!(
                "Epoch {}: policy loss = {}, value loss = {}",
                epoch, epoch_p_loss, epoch_v_loss
            );
            total_p_loss += epoch_p_loss;
            total_v_loss += epoch_v_loss;
        }

        if self.device != Device::Cpu {
            policy.to_device(Device::Cpu);
            value.to_device(Device::Cpu);
        }
        policy.eval();
        value.eval();

        Ok(Record::from_slice(&[
            ("policy_loss", RecordValue::Scalar(total_p_loss)),
            ("value_loss", RecordValue::Scalar(total_v_loss)),
            ("n_minibatches", RecordValue::Scalar(n_minibatches as f32)),
            (
                "n_opts",
                RecordValue::Scalar((policy.n_opts() - n_opts_start) as f32),
            ),
        ]))
    }

    /// Computes both losses of a minibatch and adds their gradients to the accumulated ones.
    fn accumulate_gradients<P, V>(
        &self,
        policy: &mut Net<P>,
        value: &mut Net<V>,
        batch: &Minibatch,
    ) -> Result<(f32, f32)>
    where
        P: SubModel<Input = [Tensor], Output = Tensor>,
        P::Config: DeserializeOwned + Serialize + Clone,
        V: SubModel<Input = [Tensor], Output = Tensor>,
        V::Config: DeserializeOwned + Serialize + Clone,
    {
        let device = self.device;
        let gradient_steps = self.config.gradient_steps as f64;

        let obs = obs_to_tensors(&batch.obs, device);
        let obs_combined = obs_to_tensors(&batch.obs_combined, device);
        let actions = Tensor::from_slice(&batch.actions).to(device);
        let returns = Tensor::from_slice(&batch.returns).to(device);
        let advantages = Tensor::from_slice(&batch.advantages).to(device);
        let mut old_logits = per_action_to_tensor(&batch.action_logits, batch.n_actions, device);
        let mut new_logits = policy.forward(&obs);
        trace!(
            "Minibatch of {} items: logits {:?}",
            batch.len(),
            new_logits.size()
        );

        if self.config.use_masks {
            let mask = masks_to_tensor(&batch.action_masks, batch.n_actions, device);
            old_logits = apply_action_mask(&old_logits, &mask);
            new_logits = apply_action_mask(&new_logits, &mask);
        }

        // Policy
        let old_logp = no_grad(|| categorical_log_prob(&old_logits, &actions));
        let new_logp = categorical_log_prob(&new_logits, &actions);
        let entropy = categorical_entropy(&new_logits).mean(Kind::Float);
        let p_loss = policy_loss(&new_logp, &old_logp, &advantages, self.config.epsilon)
            / gradient_steps
            - entropy * self.config.entropy_coeff;
        p_loss.backward();

        // Value
        let v_loss = value_loss(&value.forward(&obs_combined), &returns) / gradient_steps;
        v_loss.backward();

        Ok((f32::try_from(&p_loss)?, f32::try_from(&v_loss)?))
    }
}
