use super::MlpConfig;
use crate::model::SubModel;
use tch::{nn, nn::Module, Tensor};

/// Multilayer perceptron with ReLU activation function.
///
/// Every input channel is flattened to `[batch, -1]` and the channels are
/// concatenated before the first layer.
pub struct Mlp {
    config: MlpConfig,
    seq: nn::Sequential,
}

impl Mlp {
    fn create_net(var_store: &nn::VarStore, config: &MlpConfig) -> nn::Sequential {
        let p = &(var_store.root() / "mlp");
        let mut seq = nn::seq();
        let mut in_dim = config.in_dim;

        for (i, &out_dim) in config.units.iter().enumerate() {
            seq = seq.add(nn::linear(
                p / format!("{}{}", "ln", i),
                in_dim,
                out_dim,
                Default::default(),
            ));
            seq = seq.add_fn(|x| x.relu());
            in_dim = out_dim;
        }

        seq.add(nn::linear(
            p / format!("{}{}", "ln", config.units.len()),
            in_dim,
            config.out_dim,
            Default::default(),
        ))
    }
}

impl SubModel for Mlp {
    type Config = MlpConfig;
    type Input = [Tensor];
    type Output = Tensor;

    fn forward(&self, xs: &[Tensor]) -> Tensor {
        let xs = xs.iter().map(|x| x.flatten(1, -1)).collect::<Vec<_>>();
        self.seq.forward(&Tensor::cat(&xs, -1))
    }

    fn build(var_store: &nn::VarStore, config: Self::Config) -> Self {
        let seq = Self::create_net(var_store, &config);
        Self { config, seq }
    }

    fn clone_with_var_store(&self, var_store: &nn::VarStore) -> Self {
        let config = self.config.clone();
        let seq = Self::create_net(var_store, &config);
        Self { config, seq }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{Device, Kind};

    #[test]
    fn test_forward_concatenates_channels() {
        tch::manual_seed(42);
        let vs = nn::VarStore::new(Device::Cpu);
        let config = MlpConfig::from_obs_shapes(&[vec![2], vec![3, 2]], vec![16], 4);
        assert_eq!(config.in_dim(), 8);

        let mlp = Mlp::build(&vs, config);
        let xs = [
            Tensor::zeros([5, 2], (Kind::Float, Device::Cpu)),
            Tensor::ones([5, 3, 2], (Kind::Float, Device::Cpu)),
        ];
        assert_eq!(mlp.forward(&xs).size(), vec![5, 4]);
    }
}
