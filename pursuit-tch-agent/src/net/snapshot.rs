use crate::{model::SubModel, tensor};
use anyhow::Result;
use pursuit_core::{ObsBatch, ValueFunction};
use tch::{nn, no_grad, Device, Tensor};

/// A frozen deep copy of a value network.
///
/// Parameters live in their own [`nn::VarStore`] and do not require gradients,
/// so updates of the source network never reach the snapshot.
pub struct ValueSnapshot<M>
where
    M: SubModel<Input = [Tensor], Output = Tensor>,
{
    pub(super) device: Device,
    pub(super) var_store: nn::VarStore,
    pub(super) model: M,
}

impl<M> ValueSnapshot<M>
where
    M: SubModel<Input = [Tensor], Output = Tensor>,
{
    /// Value estimates of the given input, computed without gradients.
    pub fn forward(&self, xs: &[Tensor]) -> Tensor {
        let xs = xs.iter().map(|x| x.to(self.device)).collect::<Vec<_>>();
        no_grad(|| self.model.forward(&xs))
    }

    /// Parameters of the snapshot.
    pub fn var_store(&self) -> &nn::VarStore {
        &self.var_store
    }
}

impl<M> ValueFunction for ValueSnapshot<M>
where
    M: SubModel<Input = [Tensor], Output = Tensor>,
{
    fn values(&self, obs: &ObsBatch) -> Result<Vec<f32>> {
        let xs = tensor::obs_to_tensors(obs, self.device);
        tensor::to_vec_f32(&self.forward(&xs))
    }
}
