use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;

use digit_vae::backend::ndarray::NdArray;
use digit_vae::config::{DecoderKind, VaeConfig};
use digit_vae::data::load_digits;
use digit_vae::train::Trainer;

/// Train a variational autoencoder on handwritten digit images.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
struct Cli {
    /// TOML or JSON configuration file; flags override its values
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Name of the `.npz` data archive
    #[arg(long)]
    datafile: Option<PathBuf>,

    /// Directory holding the data archive
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Directory for rendered images and metrics
    #[arg(long)]
    results_dir: Option<PathBuf>,

    /// Likelihood model of the decoder
    #[arg(long, value_enum)]
    decoder: Option<DecoderKind>,

    /// Number of hidden layer neurons
    #[arg(long)]
    hidden_layer_neurons: Option<usize>,

    /// Latent variable dimension
    #[arg(long)]
    z_dim: Option<usize>,

    /// Minibatch size
    #[arg(long, short = 'b')]
    batch_size: Option<usize>,

    /// Number of epochs
    #[arg(long, short = 'e')]
    num_epoch: Option<usize>,

    /// Side length of output pictures, in images
    #[arg(long)]
    side_length: Option<usize>,

    /// Learning rate
    #[arg(long, short = 'l')]
    learning_rate: Option<f64>,

    /// Regularization coefficient
    #[arg(long)]
    reg_coef: Option<f64>,

    /// Add the L2 penalties to the training objective
    #[arg(long)]
    l2_in_objective: bool,

    /// Training images kept per digit
    #[arg(long)]
    train_images_per_digit: Option<usize>,

    /// Test images kept per digit
    #[arg(long)]
    test_images_per_digit: Option<usize>,

    /// Render every N epochs
    #[arg(long)]
    render_every: Option<usize>,

    /// Random seed
    #[arg(long, short = 's')]
    seed: Option<u64>,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<VaeConfig> {
        let mut config = match &self.config {
            Some(path) => VaeConfig::from_path(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?,
            None => VaeConfig::default(),
        };
        macro_rules! apply {
            ($($field:ident),*) => {
                $(if let Some(value) = self.$field {
                    config.$field = value;
                })*
            };
        }
        apply!(
            datafile,
            data_dir,
            results_dir,
            decoder,
            hidden_layer_neurons,
            z_dim,
            batch_size,
            num_epoch,
            side_length,
            learning_rate,
            reg_coef,
            train_images_per_digit,
            test_images_per_digit,
            render_every
        );
        if self.l2_in_objective {
            config.l2_in_objective = true;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Cli::parse().into_config()?;
    config.validate().context("invalid configuration")?;

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let data_path = config.data_path();
    let data = load_digits(
        &data_path,
        config.train_images_per_digit,
        config.test_images_per_digit,
        &mut rng,
    )
    .with_context(|| format!("loading digits from {}", data_path.display()))?;

    let mut trainer = Trainer::<NdArray>::new(&config, data.image_size, &mut rng)?;
    trainer.fit(&data, &mut rng).context("training failed")?;
    log::info!("results written to {}", config.results_dir.display());
    Ok(())
}
