//! Optimizers.
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tch::nn::{self, Adam, AdamW, OptimizerConfig as _, VarStore};

/// Configures an optimizer of a policy or value network.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub enum OptimizerConfig {
    /// Adam optimizer.
    Adam {
        /// Learning rate.
        lr: f64,
    },

    /// AdamW optimizer.
    AdamW {
        /// Learning rate.
        lr: f64,
        /// Coefficient of the running average of the gradient.
        beta1: f64,
        /// Coefficient of the running average of the squared gradient.
        beta2: f64,
        /// Weight decay.
        wd: f64,
        /// Term added to the denominator.
        eps: f64,
        /// Whether to use the AMSGrad variant.
        amsgrad: bool,
    },
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::Adam { lr: 0.001 }
    }
}

impl OptimizerConfig {
    /// Constructs an optimizer over the trainable variables of `vs`.
    pub fn build(&self, vs: &VarStore) -> Result<Optimizer> {
        let opt = match *self {
            Self::Adam { lr } => Adam::default().build(vs, lr)?,
            Self::AdamW {
                lr,
                beta1,
                beta2,
                wd,
                eps,
                amsgrad,
            } => AdamW {
                beta1,
                beta2,
                wd,
                eps,
                amsgrad,
            }
            .build(vs, lr)?,
        };
        Ok(Optimizer {
            opt,
            lr: self.lr(),
        })
    }

    /// Learning rate.
    pub fn lr(&self) -> f64 {
        match *self {
            Self::Adam { lr } | Self::AdamW { lr, .. } => lr,
        }
    }
}

/// Optimizer of the variables of one network.
///
/// Gradients accumulate over backward passes until [`Optimizer::zero_grad`].
pub struct Optimizer {
    opt: nn::Optimizer,
    lr: f64,
}

impl Optimizer {
    /// Learning rate.
    pub fn lr(&self) -> f64 {
        self.lr
    }

    /// Zeroes the gradients of the optimized variables.
    pub fn zero_grad(&mut self) {
        self.opt.zero_grad();
    }

    /// Clips the gradients of the optimized variables by their global norm.
    pub fn clip_grad_norm(&mut self, max: f64) {
        self.opt.clip_grad_norm(max);
    }

    /// Updates the optimized variables with their current gradients.
    pub fn step(&mut self) {
        self.opt.step();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{nn::Module, Device, Kind, Tensor};

    #[test]
    fn test_accumulated_step_moves_parameters() -> Result<()> {
        tch::manual_seed(42);
        let vs = VarStore::new(Device::Cpu);
        let linear = nn::linear(vs.root() / "ln", 3, 1, Default::default());
        let mut opt = OptimizerConfig::Adam { lr: 0.01 }.build(&vs)?;
        assert_eq!(opt.lr(), 0.01);

        let before = Vec::<f32>::try_from(&linear.ws.flatten(0, -1))?;
        let xs = Tensor::ones([4, 3], (Kind::Float, Device::Cpu));
        opt.zero_grad();
        for _ in 0..2 {
            linear.forward(&xs).sum(Kind::Float).backward();
        }
        opt.clip_grad_norm(1.0);
        opt.step();

        let after = Vec::<f32>::try_from(&linear.ws.flatten(0, -1))?;
        assert!(before.iter().zip(after.iter()).all(|(b, a)| b != a));
        Ok(())
    }
}
