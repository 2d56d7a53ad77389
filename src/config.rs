use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VaeError};

/// Likelihood model of the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DecoderKind {
    /// Per-pixel Bernoulli, scored by sigmoid cross-entropy.
    #[default]
    #[serde(alias = "Bernoulli")]
    #[value(alias = "Bernoulli")]
    Bernoulli,
    /// Per-pixel Gaussian with learned mean and variance.
    #[serde(alias = "Gaussian")]
    #[value(alias = "Gaussian")]
    Gaussian,
}

/// Training configuration loaded from a TOML or JSON file.
///
/// Missing fields take their default values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaeConfig {
    /// Archive file name, resolved against `data_dir`.
    pub datafile: PathBuf,
    pub data_dir: PathBuf,
    /// Where rendered images and `metrics.jsonl` are written.
    pub results_dir: PathBuf,
    pub decoder: DecoderKind,
    pub hidden_layer_neurons: usize,
    pub z_dim: usize,
    pub batch_size: usize,
    pub num_epoch: usize,
    /// Rendered grids are `side_length x side_length` images.
    pub side_length: usize,
    pub learning_rate: f64,
    /// L2 coefficient for the hidden layers' weights.
    pub reg_coef: f64,
    /// Add the L2 penalties to the training objective. Off by default, in
    /// which case training minimizes exactly the negated lower bound.
    pub l2_in_objective: bool,
    pub train_images_per_digit: usize,
    pub test_images_per_digit: usize,
    /// Render every this many epochs.
    pub render_every: usize,
    /// Fixed RNG seed; drawn from the OS when absent.
    pub seed: Option<u64>,
}

impl Default for VaeConfig {
    fn default() -> Self {
        Self {
            datafile: PathBuf::from("mnist_all.npz"),
            data_dir: PathBuf::from("data"),
            results_dir: PathBuf::from("results"),
            decoder: DecoderKind::Bernoulli,
            hidden_layer_neurons: 500,
            z_dim: 10,
            batch_size: 64,
            num_epoch: 150,
            side_length: 8,
            learning_rate: 0.001,
            reg_coef: 0.01,
            l2_in_objective: false,
            train_images_per_digit: 5000,
            test_images_per_digit: 800,
            render_every: 5,
            seed: None,
        }
    }
}

impl VaeConfig {
    /// Load configuration from the given path. Supports TOML or JSON based on
    /// the file extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| VaeError::io(path, e))?;
        let is_json = path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            serde_json::from_str(&content)
                .map_err(|e| VaeError::Config(format!("{}: {}", path.display(), e)))
        } else {
            toml::from_str(&content)
                .map_err(|e| VaeError::Config(format!("{}: {}", path.display(), e)))
        }
    }

    /// Full path of the data archive.
    pub fn data_path(&self) -> PathBuf {
        self.data_dir.join(&self.datafile)
    }

    pub fn num_train_images(&self) -> usize {
        10 * self.train_images_per_digit
    }

    pub fn num_test_images(&self) -> usize {
        10 * self.test_images_per_digit
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("hidden_layer_neurons", self.hidden_layer_neurons),
            ("z_dim", self.z_dim),
            ("batch_size", self.batch_size),
            ("side_length", self.side_length),
            ("train_images_per_digit", self.train_images_per_digit),
            ("test_images_per_digit", self.test_images_per_digit),
            ("render_every", self.render_every),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(VaeError::Config(format!("{} must be positive", name)));
            }
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(VaeError::Config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.reg_coef >= 0.0 && self.reg_coef.is_finite()) {
            return Err(VaeError::Config(format!(
                "reg_coef must be non-negative, got {}",
                self.reg_coef
            )));
        }
        if self.batch_size > self.num_train_images() || self.batch_size > self.num_test_images() {
            return Err(VaeError::Config(format!(
                "batch_size {} exceeds the {} training or {} test images",
                self.batch_size,
                self.num_train_images(),
                self.num_test_images()
            )));
        }
        if self.side_length * self.side_length > self.batch_size {
            return Err(VaeError::Config(format!(
                "a {0}x{0} display grid needs {1} images but a batch has {2}",
                self.side_length,
                self.side_length * self.side_length,
                self.batch_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = VaeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.data_path(), PathBuf::from("data/mnist_all.npz"));
        assert_eq!(config.num_train_images(), 50_000);
        assert!(!config.l2_in_objective);
    }

    #[test]
    fn oversized_grid_is_rejected() {
        let config = VaeConfig {
            side_length: 9,
            ..VaeConfig::default()
        };
        assert!(matches!(config.validate(), Err(VaeError::Config(_))));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: VaeConfig = toml::from_str("decoder = \"gaussian\"\nz_dim = 2\n").unwrap();
        assert_eq!(config.decoder, DecoderKind::Gaussian);
        assert_eq!(config.z_dim, 2);
        assert_eq!(config.batch_size, 64);
    }
}
