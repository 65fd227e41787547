//! Dense action-value network (CPU-only).
//!
//! A small trainable MLP over the flattened state window: configurable
//! ReLU hidden layers feeding a linear head with one output per action.
//! Weights live in JSON so a trained model can be inspected, shipped and
//! reloaded without any framework.
//!
//! Design goals:
//! - Stable, deterministic, dependency-light.
//! - Explicit shape validation (fail fast, caller can fallback).

use std::path::{Path, PathBuf};

use chrono::Local;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::{ActionValues, State, NUM_ACTIONS};
use crate::error::{QtraderError, Result};
use crate::model::ValueModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Linear,
    Relu,
    Tanh,
    Sigmoid,
}

impl Default for Activation {
    fn default() -> Self {
        Self::Linear
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseLayer {
    /// Weights shape: [out_dim][in_dim]
    pub weights: Vec<Vec<f64>>,
    /// Bias shape: [out_dim]
    pub bias: Vec<f64>,
    #[serde(default)]
    pub activation: Activation,
}

impl DenseLayer {
    /// Uniform weights in ±1/sqrt(in_dim), biases at zero
    fn random<R: Rng + ?Sized>(
        in_dim: usize,
        out_dim: usize,
        activation: Activation,
        rng: &mut R,
    ) -> Self {
        let limit = 1.0 / (in_dim as f64).sqrt();
        let weights = (0..out_dim)
            .map(|_| (0..in_dim).map(|_| rng.gen_range(-limit..limit)).collect())
            .collect();
        Self {
            weights,
            bias: vec![0.0; out_dim],
            activation,
        }
    }

    fn in_dim(&self) -> usize {
        self.weights.first().map(|r| r.len()).unwrap_or(0)
    }

    fn out_dim(&self) -> usize {
        self.weights.len()
    }
}

/// Trainable MLP with one output per action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseModel {
    /// Expected flattened input dimension.
    pub input_dim: usize,

    pub layers: Vec<DenseLayer>,

    /// Step size of the SGD update in [`DenseModel::fit`].
    pub learning_rate: f64,

    /// Optional free-form metadata (versioning, training info, etc).
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Per-layer values kept from a forward pass for backpropagation
struct ForwardTrace {
    /// Input fed to each layer, with the network output last
    activations: Vec<Vec<f64>>,
    /// Weighted sums per layer, before the activation
    pre_activations: Vec<Vec<f64>>,
}

impl DenseModel {
    /// Fresh network: ReLU layers of the given `hidden` widths feeding a
    /// linear head with one output per action
    pub fn new<R: Rng + ?Sized>(
        input_dim: usize,
        hidden: &[usize],
        learning_rate: f64,
        rng: &mut R,
    ) -> Self {
        let mut layers = Vec::with_capacity(hidden.len() + 1);
        let mut in_dim = input_dim;
        for &out_dim in hidden {
            layers.push(DenseLayer::random(in_dim, out_dim, Activation::Relu, rng));
            in_dim = out_dim;
        }
        layers.push(DenseLayer::random(in_dim, NUM_ACTIONS, Activation::Linear, rng));

        Self {
            input_dim,
            layers,
            learning_rate,
            metadata: serde_json::json!({ "hidden_layers": hidden }),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        let model: Self = serde_json::from_str(&content)?;
        model.validate().map_err(QtraderError::Model)?;
        Ok(model)
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Write into `dir` under a timestamped name
    ///
    /// Returns the path written, or `None` when `dir` is not a directory;
    /// that case is logged and skipped rather than treated as fatal.
    pub fn save_into(&self, dir: &Path) -> Result<Option<PathBuf>> {
        if !dir.is_dir() {
            warn!("{} is not a directory, model not saved", dir.display());
            return Ok(None);
        }
        let name = format!("model_{}.json", Local::now().format("%Y-%m-%d_%H-%M"));
        let path = dir.join(name);
        self.to_file(&path)?;
        info!("Saved model to {}", path.display());
        Ok(Some(path))
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.input_dim == 0 {
            return Err("input_dim must be > 0".to_string());
        }
        if self.layers.is_empty() {
            return Err("layers must not be empty".to_string());
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err("learning_rate must be finite and > 0".to_string());
        }

        let mut expected_in = self.input_dim;
        for (idx, layer) in self.layers.iter().enumerate() {
            if layer.out_dim() == 0 {
                return Err(format!("layer[{idx}] out_dim must be > 0"));
            }
            if layer.bias.len() != layer.out_dim() {
                return Err(format!(
                    "layer[{idx}] bias len {} != out_dim {}",
                    layer.bias.len(),
                    layer.out_dim()
                ));
            }
            for (r, row) in layer.weights.iter().enumerate() {
                if row.len() != expected_in {
                    return Err(format!(
                        "layer[{idx}] weights row {r} len {} != expected in_dim {expected_in}",
                        row.len()
                    ));
                }
                if row.iter().any(|v| !v.is_finite()) {
                    return Err(format!("layer[{idx}] weights contain non-finite values"));
                }
            }
            if layer.bias.iter().any(|v| !v.is_finite()) {
                return Err(format!("layer[{idx}] bias contain non-finite values"));
            }
            expected_in = layer.out_dim();
        }
        if expected_in != NUM_ACTIONS {
            return Err(format!(
                "output dim {expected_in} != action count {NUM_ACTIONS}"
            ));
        }
        Ok(())
    }

    pub fn output_dim(&self) -> usize {
        self.layers.last().map(|l| l.out_dim()).unwrap_or(0)
    }

    pub fn forward(&self, input: &[f64]) -> Result<Vec<f64>> {
        let mut trace = self.forward_trace(input)?;
        Ok(trace.activations.pop().unwrap_or_default())
    }

    fn forward_trace(&self, input: &[f64]) -> Result<ForwardTrace> {
        if input.len() != self.input_dim {
            return Err(QtraderError::Model(format!(
                "input dim mismatch: got {}, expected {}",
                input.len(),
                self.input_dim
            )));
        }

        let mut activations = Vec::with_capacity(self.layers.len() + 1);
        let mut pre_activations = Vec::with_capacity(self.layers.len());
        let mut x = input.to_vec();

        for layer in &self.layers {
            let out_dim = layer.out_dim();
            let in_dim = layer.in_dim();

            let mut z = vec![0.0_f64; out_dim];
            for o in 0..out_dim {
                let mut sum = layer.bias[o];
                // weights[o] is the o-th row (len = in_dim)
                let row = &layer.weights[o];
                debug_assert_eq!(row.len(), in_dim);
                for i in 0..in_dim {
                    sum += row[i] * x[i];
                }
                z[o] = sum;
            }
            let y: Vec<f64> = z
                .iter()
                .map(|&v| apply_activation(v, layer.activation))
                .collect();
            activations.push(std::mem::replace(&mut x, y));
            pre_activations.push(z);
        }
        activations.push(x);

        Ok(ForwardTrace {
            activations,
            pre_activations,
        })
    }
}

impl ValueModel for DenseModel {
    fn predict(&self, state: &State) -> Result<ActionValues> {
        let out = self.forward(&flatten(state))?;
        if out.len() != NUM_ACTIONS {
            return Err(QtraderError::Model(format!(
                "expected {} action values, got {}",
                NUM_ACTIONS,
                out.len()
            )));
        }
        Ok([out[0] as f32, out[1] as f32, out[2] as f32])
    }

    /// One SGD step of mean-squared error against `target`
    ///
    /// Returns the loss measured before the update, matching what a
    /// single-sample, single-epoch fit reports.
    fn fit(&mut self, state: &State, target: &ActionValues) -> Result<f32> {
        if self.layers.is_empty() {
            return Err(QtraderError::Model("network has no layers".into()));
        }
        let trace = self.forward_trace(&flatten(state))?;
        let out = &trace.activations[self.layers.len()];
        if out.len() != NUM_ACTIONS {
            return Err(QtraderError::Model(format!(
                "expected {} action values, got {}",
                NUM_ACTIONS,
                out.len()
            )));
        }

        let n_out = out.len() as f64;
        let mut loss = 0.0;
        let mut delta = Vec::with_capacity(out.len());
        for (o, &y) in out.iter().enumerate() {
            let diff = y - target[o] as f64;
            loss += diff * diff;
            delta.push(2.0 * diff / n_out);
        }
        loss /= n_out;

        // Backwards through the layers, updating each as its gradients are
        // in hand. The input gradient must be taken before the weights move.
        for l in (0..self.layers.len()).rev() {
            let x = &trace.activations[l];
            let z = &trace.pre_activations[l];
            let activation = self.layers[l].activation;
            let dz: Vec<f64> = delta
                .iter()
                .zip(z.iter())
                .map(|(d, &zv)| d * activation_gradient(zv, activation))
                .collect();

            let in_dim = self.layers[l].in_dim();
            let mut next_delta = vec![0.0_f64; in_dim];
            for (o, dzo) in dz.iter().enumerate() {
                let row = &self.layers[l].weights[o];
                for i in 0..in_dim {
                    next_delta[i] += row[i] * dzo;
                }
            }

            let lr = self.learning_rate;
            let layer = &mut self.layers[l];
            for (o, dzo) in dz.iter().enumerate() {
                for i in 0..in_dim {
                    layer.weights[o][i] -= lr * dzo * x[i];
                }
                layer.bias[o] -= lr * dzo;
            }
            delta = next_delta;
        }

        Ok(loss as f32)
    }
}

fn flatten(state: &State) -> Vec<f64> {
    state.as_slice().iter().map(|&v| v as f64).collect()
}

fn apply_activation(x: f64, act: Activation) -> f64 {
    match act {
        Activation::Linear => x,
        Activation::Relu => x.max(0.0),
        Activation::Tanh => x.tanh(),
        Activation::Sigmoid => sigmoid(x),
    }
}

fn activation_gradient(z: f64, act: Activation) -> f64 {
    match act {
        Activation::Linear => 1.0,
        Activation::Relu => {
            if z > 0.0 {
                1.0
            } else {
                0.0
            }
        }
        Activation::Tanh => {
            let t = z.tanh();
            1.0 - t * t
        }
        Activation::Sigmoid => {
            let s = sigmoid(z);
            s * (1.0 - s)
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    // Numerically-stable sigmoid.
    if x >= 0.0 {
        let z = (-x).exp();
        1.0 / (1.0 + z)
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn zero_head(input_dim: usize) -> DenseModel {
        DenseModel {
            input_dim,
            layers: vec![DenseLayer {
                weights: vec![vec![0.0; input_dim]; NUM_ACTIONS],
                bias: vec![0.0; NUM_ACTIONS],
                activation: Activation::Linear,
            }],
            learning_rate: 0.3,
            metadata: serde_json::json!({}),
        }
    }

    #[test]
    fn test_validates_shapes() {
        let bad = DenseModel {
            input_dim: 3,
            layers: vec![DenseLayer {
                weights: vec![vec![1.0, 2.0]], // in_dim mismatch
                bias: vec![0.0],
                activation: Activation::Linear,
            }],
            learning_rate: 0.1,
            metadata: serde_json::json!({}),
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_validates_output_matches_action_count() {
        let bad = DenseModel {
            input_dim: 2,
            layers: vec![DenseLayer {
                weights: vec![vec![0.0, 0.0]],
                bias: vec![0.0],
                activation: Activation::Linear,
            }],
            learning_rate: 0.1,
            metadata: serde_json::json!({}),
        };
        assert!(bad.validate().unwrap_err().contains("output dim"));
    }

    #[test]
    fn test_new_builds_relu_stack_with_linear_head() {
        let mut rng = StdRng::seed_from_u64(1);
        let model = DenseModel::new(10, &[6, 4], 0.01, &mut rng);

        model.validate().unwrap();
        assert_eq!(model.layers.len(), 3);
        assert_eq!(model.layers[0].activation, Activation::Relu);
        assert_eq!(model.layers[1].activation, Activation::Relu);
        assert_eq!(model.layers[2].activation, Activation::Linear);
        assert_eq!(model.output_dim(), NUM_ACTIONS);
    }

    #[test]
    fn test_forward_known_values() {
        let model = DenseModel {
            input_dim: 2,
            layers: vec![DenseLayer {
                weights: vec![vec![1.0, 2.0], vec![0.0, 0.0], vec![-1.0, 1.0]],
                bias: vec![0.5, 1.0, 0.0],
                activation: Activation::Linear,
            }],
            learning_rate: 0.1,
            metadata: serde_json::json!({}),
        };
        let out = model.forward(&[2.0, 3.0]).unwrap();
        assert_eq!(out, vec![8.5, 1.0, 1.0]);
    }

    #[test]
    fn test_predict_rejects_wrong_state_shape() {
        let model = zero_head(4);
        let state = State::zeros(1, 2);
        assert!(model.predict(&state).is_err());
    }

    #[test]
    fn test_fit_returns_pre_update_loss() {
        let mut model = zero_head(2);
        let state = State::zeros(1, 2);
        let target = [1.0, 1.0, 1.0];

        // Zero weights on zero input: every output is 0, MSE is exactly 1.
        let first = model.fit(&state, &target).unwrap();
        assert!((first - 1.0).abs() < 1e-6);

        // Only the head bias can move (input is zero): each bias gained
        // lr * 2/3 = 0.2, so the next loss is (1 - 0.2)^2.
        let second = model.fit(&state, &target).unwrap();
        assert!((second - 0.64).abs() < 1e-6);
    }

    #[test]
    fn test_fit_converges_on_fixed_target() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut model = DenseModel::new(2, &[3], 0.05, &mut rng);
        let state = State::from_values(vec![0.5, -0.3], 1, 2);
        let target = [1.0, -1.0, 0.5];

        let first = model.fit(&state, &target).unwrap();
        let mut last = first;
        for _ in 0..500 {
            last = model.fit(&state, &target).unwrap();
        }
        assert!(last < first);
        assert!(last < 1e-3, "loss did not converge: {last}");
    }

    #[test]
    fn test_seeded_construction_is_deterministic() {
        let state = State::from_values(vec![0.1, 0.2, 0.3, 0.4], 2, 2);
        let a = DenseModel::new(4, &[5], 0.01, &mut StdRng::seed_from_u64(11));
        let b = DenseModel::new(4, &[5], 0.01, &mut StdRng::seed_from_u64(11));
        assert_eq!(a.predict(&state).unwrap(), b.predict(&state).unwrap());
    }

    #[test]
    fn test_json_round_trip_preserves_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let state = State::from_values(vec![0.3, -0.7, 0.0], 1, 3);

        let mut rng = StdRng::seed_from_u64(3);
        let model = DenseModel::new(3, &[4], 0.01, &mut rng);
        model.to_file(&path).unwrap();

        let restored = DenseModel::from_file(&path).unwrap();
        assert_eq!(
            model.predict(&state).unwrap(),
            restored.predict(&state).unwrap()
        );
    }

    #[test]
    fn test_save_into_skips_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let model = zero_head(2);

        assert_eq!(model.save_into(&missing).unwrap(), None);

        let written = model.save_into(dir.path()).unwrap().unwrap();
        assert!(written
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("model_"));
        assert!(written.exists());
    }
}
