//! Action-value network using tch-rs (PyTorch bindings).
//!
//! Same architecture as [`Mlp`](super::Mlp) (ReLU hidden layers, linear head,
//! Adam on mean squared error) but backed by libtorch. Only available with
//! the `rl-nn` feature.

use std::path::Path;

use tch::{nn, nn::Module, nn::OptimizerConfig, Device, Kind, Tensor};

use super::approximator::QFunction;
use super::error::ModelError;

/// MLP Q-network over a private [`nn::VarStore`].
///
/// Two networks built with the same layer sizes share variable names, which
/// is what lets [`QFunction::copy_from`] copy one store into the other.
pub struct TorchQNetwork {
    vs: nn::VarStore,
    net: nn::Sequential,
    optimizer: nn::Optimizer,
    layer_sizes: Vec<usize>,
}

impl TorchQNetwork {
    /// Creates a network with the given layer widths, input to output.
    pub fn new(layer_sizes: &[usize], learning_rate: f64, device: Device) -> Result<Self, ModelError> {
        if layer_sizes.len() < 2 {
            return Err(ModelError::LayoutMismatch {
                expected: "at least input and output sizes".into(),
                found: format!("{layer_sizes:?}"),
            });
        }
        let vs = nn::VarStore::new(device);
        let root = vs.root();
        let last = layer_sizes.len() - 2;
        let mut net = nn::seq();
        for (i, w) in layer_sizes.windows(2).enumerate() {
            net = net.add(nn::linear(
                &root / format!("l{}", i + 1),
                w[0] as i64,
                w[1] as i64,
                Default::default(),
            ));
            if i < last {
                net = net.add_fn(|x| x.relu());
            }
        }
        let optimizer = nn::Adam::default().build(&vs, learning_rate)?;
        Ok(Self {
            vs,
            net,
            optimizer,
            layer_sizes: layer_sizes.to_vec(),
        })
    }

    pub fn layer_sizes(&self) -> &[usize] {
        &self.layer_sizes
    }

    fn batch_tensor(&self, rows: &[Vec<f64>], width: usize) -> Tensor {
        let flat: Vec<f32> = rows
            .iter()
            .flat_map(|r| r.iter().map(|&v| v as f32))
            .collect();
        Tensor::from_slice(&flat)
            .reshape([rows.len() as i64, width as i64])
            .to_device(self.vs.device())
    }
}

impl QFunction for TorchQNetwork {
    fn input_dim(&self) -> usize {
        self.layer_sizes[0]
    }

    fn output_dim(&self) -> usize {
        self.layer_sizes[self.layer_sizes.len() - 1]
    }

    fn predict(&self, state: &[f64]) -> Vec<f64> {
        self.predict_batch(&[state.to_vec()])
            .pop()
            .unwrap_or_default()
    }

    fn predict_batch(&self, states: &[Vec<f64>]) -> Vec<Vec<f64>> {
        if states.is_empty() {
            return Vec::new();
        }
        let input = self.batch_tensor(states, self.input_dim());
        let output = tch::no_grad(|| self.net.forward(&input)).to_kind(Kind::Double);
        let flat = Vec::<f64>::try_from(output.flatten(0, -1)).unwrap_or_default();
        flat.chunks(self.output_dim()).map(<[f64]>::to_vec).collect()
    }

    fn fit_batch(&mut self, states: &[Vec<f64>], targets: &[Vec<f64>]) -> f64 {
        if states.is_empty() {
            return 0.0;
        }
        let input = self.batch_tensor(states, self.input_dim());
        let target = self.batch_tensor(targets, self.output_dim());
        let loss = self
            .net
            .forward(&input)
            .mse_loss(&target, tch::Reduction::Mean);
        self.optimizer.zero_grad();
        loss.backward();
        self.optimizer.step();
        f64::try_from(&loss).unwrap_or(0.0)
    }

    fn copy_from(&mut self, other: &Self) -> Result<(), ModelError> {
        if self.layer_sizes != other.layer_sizes {
            return Err(ModelError::LayoutMismatch {
                expected: format!("{:?}", self.layer_sizes),
                found: format!("{:?}", other.layer_sizes),
            });
        }
        self.vs.copy(&other.vs)?;
        Ok(())
    }

    fn save(&self, path: &Path) -> Result<(), ModelError> {
        self.vs.save(path)?;
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<(), ModelError> {
        self.vs.load(path)?;
        Ok(())
    }
}
