use super::{NetConfig, ValueSnapshot};
use crate::{
    model::{ModelBase, SubModel},
    opt::Optimizer,
};
use anyhow::{Context, Result};
use log::{info, trace};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use tch::{nn, Device, Tensor};

/// A trainable network: a model, its parameters and its optimizer.
///
/// Used for both the policy network, which outputs action logits, and the
/// value network, which outputs one value per item.
pub struct Net<M>
where
    M: SubModel<Input = [Tensor], Output = Tensor>,
    M::Config: DeserializeOwned + Serialize + Clone,
{
    device: Device,
    var_store: nn::VarStore,
    model: M,
    opt: Optimizer,
    n_opts: usize,
    train: bool,
}

impl<M> Net<M>
where
    M: SubModel<Input = [Tensor], Output = Tensor>,
    M::Config: DeserializeOwned + Serialize + Clone,
{
    /// Constructs [`Net`].
    pub fn build(config: NetConfig<M::Config>, device: Device) -> Result<Self> {
        let model_config = config.model_config.context("model_config is not set.")?;
        let var_store = nn::VarStore::new(device);
        let model = M::build(&var_store, model_config);
        let opt = config.opt_config.build(&var_store)?;

        Ok(Self {
            device,
            var_store,
            model,
            opt,
            n_opts: 0,
            train: false,
        })
    }

    /// Forward pass. Inputs are moved to the device of the network.
    pub fn forward(&self, xs: &[Tensor]) -> Tensor {
        let xs = xs.iter().map(|x| x.to(self.device)).collect::<Vec<_>>();
        self.model.forward(&xs)
    }

    /// Zeroes the accumulated gradients.
    pub fn zero_grad(&mut self) {
        self.opt.zero_grad();
    }

    /// Clips the accumulated gradients by their global norm.
    pub fn clip_grad_norm(&mut self, max: f64) {
        self.opt.clip_grad_norm(max);
    }

    /// Applies one optimizer step with the accumulated gradients.
    pub fn step(&mut self) {
        self.opt.step();
        self.n_opts += 1;
        trace!("Optimization step {}", self.n_opts);
    }

    /// Number of optimizer steps applied so far.
    pub fn n_opts(&self) -> usize {
        self.n_opts
    }

    /// Sets the network to training mode.
    ///
    /// The mode is a flag read through [`Net::is_train`]; [`Net::forward`]
    /// does not pass it to the model, so models with train-dependent layers
    /// such as dropout must not rely on it. [`Mlp`](crate::mlp::Mlp) has none.
    pub fn train(&mut self) {
        self.train = true;
    }

    /// Sets the network to evaluation mode.
    pub fn eval(&mut self) {
        self.train = false;
    }

    /// Returns `true` in training mode.
    pub fn is_train(&self) -> bool {
        self.train
    }

    /// Device of the parameters.
    pub fn device(&self) -> Device {
        self.device
    }

    /// Moves the parameters to `device`.
    pub fn to_device(&mut self, device: Device) {
        self.var_store.set_device(device);
        self.device = device;
    }

    /// Takes a frozen deep copy of the network.
    pub fn snapshot(&self) -> Result<ValueSnapshot<M>> {
        let mut var_store = nn::VarStore::new(self.device);
        let model = self.model.clone_with_var_store(&var_store);
        var_store.copy(&self.var_store)?;
        var_store.freeze();

        Ok(ValueSnapshot {
            device: self.device,
            var_store,
            model,
        })
    }
}

impl<M> ModelBase for Net<M>
where
    M: SubModel<Input = [Tensor], Output = Tensor>,
    M::Config: DeserializeOwned + Serialize + Clone,
{
    fn get_var_store_mut(&mut self) -> &mut nn::VarStore {
        &mut self.var_store
    }

    fn get_var_store(&self) -> &nn::VarStore {
        &self.var_store
    }

    fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        self.var_store.save(&path)?;
        info!("Save network to {:?}", path.as_ref());
        for (name, _) in self.var_store.variables().iter() {
            trace!("Save variable {}", name);
        }
        Ok(())
    }

    fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        self.var_store.load(&path)?;
        info!("Load network from {:?}", path.as_ref());
        Ok(())
    }
}
