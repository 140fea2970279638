//! Action-value function approximators.
//!
//! [`QFunction`] is the seam between the agent and its function approximator.
//! [`Mlp`] is the built-in implementation: a dense ReLU network with a linear
//! head, trained with Adam on mean squared error. With the `rl-nn` feature a
//! libtorch-backed network is available as well.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use ndarray::{Array, Array1, Array2, Axis, Dimension, Zip};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::error::ModelError;

/// A trainable map from a state vector to one value per action.
pub trait QFunction {
    /// Expected length of a state vector.
    fn input_dim(&self) -> usize;

    /// Number of action values produced.
    fn output_dim(&self) -> usize;

    /// Action values for a single state.
    ///
    /// Callers must pass exactly [`Self::input_dim`] features.
    fn predict(&self, state: &[f64]) -> Vec<f64>;

    /// Action values for a batch of states.
    fn predict_batch(&self, states: &[Vec<f64>]) -> Vec<Vec<f64>> {
        states.iter().map(|s| self.predict(s)).collect()
    }

    /// One optimisation pass over the batch toward `targets`.
    ///
    /// Returns the mean squared error before the update.
    fn fit_batch(&mut self, states: &[Vec<f64>], targets: &[Vec<f64>]) -> f64;

    /// Overwrites every parameter with `other`'s.
    fn copy_from(&mut self, other: &Self) -> Result<(), ModelError>;

    fn save(&self, path: &Path) -> Result<(), ModelError>;

    fn load(&mut self, path: &Path) -> Result<(), ModelError>;
}

/// Fully connected layer mapping a row of `inputs` features to `outputs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Dense {
    /// Shape `(inputs, outputs)`.
    weights: Array2<f64>,
    biases: Array1<f64>,
}

impl Dense {
    /// Glorot-uniform weights, zero biases.
    fn glorot<R: Rng>(inputs: usize, outputs: usize, rng: &mut R) -> Self {
        let limit = (6.0 / (inputs + outputs).max(1) as f64).sqrt();
        Self {
            weights: Array2::from_shape_fn((inputs, outputs), |_| rng.gen_range(-limit..=limit)),
            biases: Array1::zeros(outputs),
        }
    }

    fn inputs(&self) -> usize {
        self.weights.nrows()
    }

    fn outputs(&self) -> usize {
        self.weights.ncols()
    }

    /// Affine map of a `(batch, inputs)` matrix.
    fn forward(&self, x: &Array2<f64>) -> Array2<f64> {
        x.dot(&self.weights) + &self.biases
    }

    fn is_well_formed(&self) -> bool {
        self.biases.len() == self.outputs()
    }
}

/// First and second moment estimates for one layer.
#[derive(Debug, Clone)]
struct Moments {
    m_w: Array2<f64>,
    v_w: Array2<f64>,
    m_b: Array1<f64>,
    v_b: Array1<f64>,
}

impl Moments {
    fn for_layer(layer: &Dense) -> Self {
        Self {
            m_w: Array2::zeros(layer.weights.raw_dim()),
            v_w: Array2::zeros(layer.weights.raw_dim()),
            m_b: Array1::zeros(layer.biases.raw_dim()),
            v_b: Array1::zeros(layer.biases.raw_dim()),
        }
    }
}

#[derive(Debug, Clone)]
struct Adam {
    step: i32,
    moments: Vec<Moments>,
}

impl Adam {
    const BETA1: f64 = 0.9;
    const BETA2: f64 = 0.999;
    const EPSILON: f64 = 1e-7;

    fn for_layers(layers: &[Dense]) -> Self {
        Self {
            step: 0,
            moments: layers.iter().map(Moments::for_layer).collect(),
        }
    }

    /// Bias-corrected step size for the next update.
    fn next_rate(&mut self, learning_rate: f64) -> f64 {
        self.step += 1;
        let t = self.step;
        learning_rate * (1.0 - Self::BETA2.powi(t)).sqrt() / (1.0 - Self::BETA1.powi(t))
    }

    fn update<D: Dimension>(
        params: &mut Array<f64, D>,
        grads: &Array<f64, D>,
        m: &mut Array<f64, D>,
        v: &mut Array<f64, D>,
        lr_t: f64,
    ) {
        Zip::from(params)
            .and(grads)
            .and(m)
            .and(v)
            .for_each(|p, &g, m, v| {
                *m = Self::BETA1 * *m + (1.0 - Self::BETA1) * g;
                *v = Self::BETA2 * *v + (1.0 - Self::BETA2) * g * g;
                *p -= lr_t * *m / (v.sqrt() + Self::EPSILON);
            });
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct MlpFile {
    layer_sizes: Vec<usize>,
    layers: Vec<Dense>,
}

/// Dense ReLU network with a linear output layer.
#[derive(Debug, Clone)]
pub struct Mlp {
    layers: Vec<Dense>,
    learning_rate: f64,
    optimizer: Adam,
}

impl Mlp {
    /// Builds a network with the given layer widths, input to output.
    pub fn new<R: Rng>(layer_sizes: &[usize], learning_rate: f64, rng: &mut R) -> Result<Self, ModelError> {
        if layer_sizes.len() < 2 {
            return Err(ModelError::LayoutMismatch {
                expected: "at least input and output sizes".into(),
                found: format!("{layer_sizes:?}"),
            });
        }
        let layers: Vec<Dense> = layer_sizes
            .windows(2)
            .map(|w| Dense::glorot(w[0], w[1], rng))
            .collect();
        let optimizer = Adam::for_layers(&layers);
        Ok(Self {
            layers,
            learning_rate,
            optimizer,
        })
    }

    /// Layer widths, input to output.
    pub fn layer_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![self.input_dim()];
        sizes.extend(self.layers.iter().map(Dense::outputs));
        sizes
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Activations of every layer for a `(batch, inputs)` matrix; index 0 is
    /// the input itself.
    fn forward_trace(&self, x: Array2<f64>) -> Vec<Array2<f64>> {
        let last = self.layers.len() - 1;
        let mut activations = Vec::with_capacity(self.layers.len() + 1);
        activations.push(x);
        for (l, layer) in self.layers.iter().enumerate() {
            let mut out = layer.forward(&activations[l]);
            if l < last {
                out.mapv_inplace(|v| v.max(0.0));
            }
            activations.push(out);
        }
        activations
    }

    fn to_matrix(rows: &[Vec<f64>], width: usize) -> Array2<f64> {
        Array2::from_shape_fn((rows.len(), width), |(r, c)| rows[r].get(c).copied().unwrap_or(0.0))
    }

    fn describe(sizes: &[usize]) -> String {
        sizes
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join("-")
    }
}

impl QFunction for Mlp {
    fn input_dim(&self) -> usize {
        self.layers.first().map_or(0, Dense::inputs)
    }

    fn output_dim(&self) -> usize {
        self.layers.last().map_or(0, Dense::outputs)
    }

    fn predict(&self, state: &[f64]) -> Vec<f64> {
        debug_assert_eq!(state.len(), self.input_dim());
        self.predict_batch(&[state.to_vec()]).pop().unwrap_or_default()
    }

    fn predict_batch(&self, states: &[Vec<f64>]) -> Vec<Vec<f64>> {
        if states.is_empty() {
            return Vec::new();
        }
        let input = Self::to_matrix(states, self.input_dim());
        self.forward_trace(input)
            .pop()
            .map(|out| out.outer_iter().map(|row| row.to_vec()).collect())
            .unwrap_or_default()
    }

    fn fit_batch(&mut self, states: &[Vec<f64>], targets: &[Vec<f64>]) -> f64 {
        let batch = states.len().min(targets.len());
        if batch == 0 {
            return 0.0;
        }
        let scale = 1.0 / (batch * self.output_dim()).max(1) as f64;
        let input = Self::to_matrix(&states[..batch], self.input_dim());
        let target = Self::to_matrix(&targets[..batch], self.output_dim());

        let activations = self.forward_trace(input);
        let error = &activations[self.layers.len()] - &target;
        let loss = error.mapv(|e| e * e).sum() * scale;

        // d(mean squared error)/d(output)
        let mut delta = error * (2.0 * scale);
        let mut grads = Vec::with_capacity(self.layers.len());
        for l in (0..self.layers.len()).rev() {
            let input = &activations[l];
            grads.push((input.t().dot(&delta), delta.sum_axis(Axis(0))));
            if l > 0 {
                let mut upstream = delta.dot(&self.layers[l].weights.t());
                Zip::from(&mut upstream)
                    .and(input)
                    .for_each(|d, &a| if a <= 0.0 { *d = 0.0 });
                delta = upstream;
            }
        }
        grads.reverse();

        let lr_t = self.optimizer.next_rate(self.learning_rate);
        for ((layer, moments), (grad_w, grad_b)) in self
            .layers
            .iter_mut()
            .zip(self.optimizer.moments.iter_mut())
            .zip(&grads)
        {
            Adam::update(&mut layer.weights, grad_w, &mut moments.m_w, &mut moments.v_w, lr_t);
            Adam::update(&mut layer.biases, grad_b, &mut moments.m_b, &mut moments.v_b, lr_t);
        }

        loss
    }

    fn copy_from(&mut self, other: &Self) -> Result<(), ModelError> {
        let (mine, theirs) = (self.layer_sizes(), other.layer_sizes());
        if mine != theirs {
            return Err(ModelError::LayoutMismatch {
                expected: Self::describe(&mine),
                found: Self::describe(&theirs),
            });
        }
        self.layers.clone_from(&other.layers);
        Ok(())
    }

    fn save(&self, path: &Path) -> Result<(), ModelError> {
        let file = File::create(path).map_err(|source| ModelError::Io {
            operation: format!("create {}", path.display()),
            source,
        })?;
        let snapshot = MlpFile {
            layer_sizes: self.layer_sizes(),
            layers: self.layers.clone(),
        };
        serde_json::to_writer(BufWriter::new(file), &snapshot)?;
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<(), ModelError> {
        let file = File::open(path).map_err(|source| ModelError::Io {
            operation: format!("open {}", path.display()),
            source,
        })?;
        let snapshot: MlpFile = serde_json::from_reader(BufReader::new(file))?;

        let expected = self.layer_sizes();
        let consistent = snapshot.layers.iter().all(Dense::is_well_formed)
            && snapshot.layers.len() + 1 == snapshot.layer_sizes.len()
            && snapshot
                .layers
                .iter()
                .zip(snapshot.layer_sizes.windows(2))
                .all(|(l, w)| l.inputs() == w[0] && l.outputs() == w[1]);
        if !consistent || snapshot.layer_sizes != expected {
            return Err(ModelError::LayoutMismatch {
                expected: Self::describe(&expected),
                found: Self::describe(&snapshot.layer_sizes),
            });
        }

        self.layers = snapshot.layers;
        self.optimizer = Adam::for_layers(&self.layers);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn mlp(sizes: &[usize], seed: u64) -> Mlp {
        Mlp::new(sizes, 0.01, &mut StdRng::seed_from_u64(seed)).unwrap()
    }

    #[test]
    fn output_shape() {
        let net = mlp(&[5, 64, 64, 32, 4], 0);
        assert_eq!(net.input_dim(), 5);
        assert_eq!(net.output_dim(), 4);
        assert_eq!(net.predict(&[1.0, 2.0, 3.0, 4.0, 0.0]).len(), 4);
    }

    #[test]
    fn same_seed_same_parameters() {
        let a = mlp(&[5, 8, 4], 9);
        let b = mlp(&[5, 8, 4], 9);
        let x = [0.5, 1.0, 0.0, 3.0, 1.0];
        assert_eq!(a.predict(&x), b.predict(&x));
    }

    #[test]
    fn fitting_reduces_error() {
        let mut net = mlp(&[2, 16, 1], 3);
        let states = vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]];
        let targets = vec![vec![1.0], vec![-1.0], vec![0.5]];
        let first = net.fit_batch(&states, &targets);
        let mut last = first;
        for _ in 0..300 {
            last = net.fit_batch(&states, &targets);
        }
        assert!(last < first * 0.1, "loss went from {} to {}", first, last);
    }

    #[test]
    fn single_layer_size_is_rejected() {
        let err = Mlp::new(&[5], 0.01, &mut StdRng::seed_from_u64(0)).unwrap_err();
        assert!(matches!(err, ModelError::LayoutMismatch { .. }));
    }

    #[test]
    fn batch_prediction_matches_single_rows() {
        let net = mlp(&[5, 8, 4], 4);
        let rows = vec![vec![1.0, 0.0, 2.0, 0.0, 1.0], vec![0.0, 3.0, 0.0, 1.0, 2.0]];
        let batch = net.predict_batch(&rows);
        for (row, out) in rows.iter().zip(&batch) {
            for (a, b) in net.predict(row).iter().zip(out) {
                assert!((a - b).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn fit_on_empty_batch_is_noop() {
        let mut net = mlp(&[2, 4, 1], 3);
        let before = net.predict(&[1.0, 1.0]);
        assert_eq!(net.fit_batch(&[], &[]), 0.0);
        assert_eq!(net.predict(&[1.0, 1.0]), before);
    }

    #[test]
    fn copy_from_makes_predictions_identical() {
        let online = mlp(&[5, 8, 4], 1);
        let mut target = mlp(&[5, 8, 4], 2);
        let x = [3.0, 1.0, 4.0, 1.0, 2.0];
        assert_ne!(online.predict(&x), target.predict(&x));
        target.copy_from(&online).unwrap();
        assert_eq!(online.predict(&x), target.predict(&x));
    }

    #[test]
    fn copy_from_rejects_other_layout() {
        let online = mlp(&[5, 8, 4], 1);
        let mut target = mlp(&[5, 4], 2);
        assert!(matches!(
            target.copy_from(&online),
            Err(ModelError::LayoutMismatch { .. })
        ));
    }

    #[test]
    fn save_and_load_restore_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.json");
        let saved = mlp(&[5, 8, 4], 1);
        saved.save(&path).unwrap();

        let mut restored = mlp(&[5, 8, 4], 2);
        restored.load(&path).unwrap();
        let x = [0.0, 7.0, 2.0, 1.0, 3.0];
        assert_eq!(saved.predict(&x), restored.predict(&x));
    }

    #[test]
    fn load_rejects_other_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.json");
        mlp(&[5, 8, 4], 1).save(&path).unwrap();
        let mut other = mlp(&[5, 16, 4], 1);
        assert!(matches!(
            other.load(&path),
            Err(ModelError::LayoutMismatch { .. })
        ));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let mut net = mlp(&[5, 4], 1);
        let err = net.load(Path::new("/nonexistent/q.json")).unwrap_err();
        assert!(matches!(err, ModelError::Io { .. }));
    }
}
