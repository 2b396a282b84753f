//! Conversion between buffer data and tensors.
use anyhow::Result;
use pursuit_core::ObsBatch;
use std::convert::TryFrom;
use tch::{Device, Kind, Tensor};

/// Converts an observation batch to one tensor per channel, of shape `[len, shape..]`.
pub fn obs_to_tensors(obs: &ObsBatch, device: Device) -> Vec<Tensor> {
    obs.shapes()
        .iter()
        .enumerate()
        .map(|(c, s)| {
            let mut shape = vec![obs.len() as i64];
            shape.extend(s.iter().map(|&d| d as i64));
            Tensor::from_slice(obs.channel(c))
                .view(shape.as_slice())
                .to(device)
        })
        .collect()
}

/// Converts flat per-action values to a tensor of shape `[len, n_actions]`.
pub fn per_action_to_tensor(v: &[f32], n_actions: usize, device: Device) -> Tensor {
    Tensor::from_slice(v).view([-1, n_actions as i64]).to(device)
}

/// Converts flat action masks to a boolean tensor of shape `[len, n_actions]`.
pub fn masks_to_tensor(masks: &[bool], n_actions: usize, device: Device) -> Tensor {
    Tensor::from_slice(masks).view([-1, n_actions as i64]).to(device)
}

/// Copies a tensor to a flat `f32` vector on the host.
pub fn to_vec_f32(t: &Tensor) -> Result<Vec<f32>> {
    let t = t.to_device(Device::Cpu).to_kind(Kind::Float).flatten(0, -1);
    Ok(Vec::<f32>::try_from(&t)?)
}

/// Copies a tensor to a flat `i64` vector on the host.
pub fn to_vec_i64(t: &Tensor) -> Result<Vec<i64>> {
    let t = t.to_device(Device::Cpu).to_kind(Kind::Int64).flatten(0, -1);
    Ok(Vec::<i64>::try_from(&t)?)
}
