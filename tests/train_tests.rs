use std::fs::File;
use std::path::Path;

use digit_vae::backend::ndarray::NdArray;
use digit_vae::config::{DecoderKind, VaeConfig};
use digit_vae::data::load_digits;
use digit_vae::metrics::MetricsLog;
use digit_vae::train::Trainer;
use ndarray::Array2;
use ndarray_npy::NpzWriter;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

/// 2x2画素、各数字`rows`枚のランダムな画像
fn write_tiny_archive(path: &Path, rows: usize, rng: &mut StdRng) {
    let mut npz = NpzWriter::new(File::create(path).unwrap());
    for prefix in ["train", "test"] {
        for digit in 0..10 {
            let array = Array2::<u8>::from_shape_fn((rows, 4), |_| rng.gen());
            npz.add_array(format!("{}{}", prefix, digit), &array).unwrap();
        }
    }
    npz.finish().unwrap();
}

fn tiny_config(dir: &Path, decoder: DecoderKind) -> VaeConfig {
    VaeConfig {
        datafile: "tiny.npz".into(),
        data_dir: dir.to_path_buf(),
        results_dir: dir.join("results"),
        decoder,
        hidden_layer_neurons: 8,
        z_dim: 2,
        batch_size: 4,
        num_epoch: 1,
        side_length: 2,
        train_images_per_digit: 1,
        test_images_per_digit: 1,
        seed: Some(0),
        ..VaeConfig::default()
    }
}

#[test]
fn one_epoch_on_tiny_data_gives_finite_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let mut rng = StdRng::seed_from_u64(0);
    write_tiny_archive(&dir.path().join("tiny.npz"), 2, &mut rng);

    let config = tiny_config(dir.path(), DecoderKind::Bernoulli);
    let data = load_digits(config.data_path(), 1, 1, &mut rng).unwrap();
    assert_eq!(data.image_size, 2);

    let mut trainer = Trainer::<NdArray>::new(&config, data.image_size, &mut rng).unwrap();
    let history = trainer.fit(&data, &mut rng).unwrap();

    assert_eq!(history.len(), 1);
    let metrics = history[0];
    assert_eq!(metrics.epoch, 0);
    assert!(metrics.is_finite(), "{:?}", metrics);
    assert!(metrics.kl_divergence >= 0.0);
    assert!(metrics.marginal_likelihood <= 0.0);
    assert!(
        (metrics.variational_lower_bound
            - (metrics.marginal_likelihood - metrics.kl_divergence))
            .abs()
            < 1e-3
    );

    let results = dir.path().join("results");
    assert!(results.join("original_X.png").exists());
    let log = std::fs::read_to_string(results.join(MetricsLog::FILE_NAME)).unwrap();
    assert_eq!(log.lines().count(), 1);
}

#[test]
fn gaussian_decoder_renders_generated_images() {
    let dir = tempfile::tempdir().unwrap();
    let mut rng = StdRng::seed_from_u64(1);
    write_tiny_archive(&dir.path().join("tiny.npz"), 1, &mut rng);

    let config = VaeConfig {
        num_epoch: 3,
        render_every: 2,
        ..tiny_config(dir.path(), DecoderKind::Gaussian)
    };
    let data = load_digits(config.data_path(), 1, 1, &mut rng).unwrap();
    let mut trainer = Trainer::<NdArray>::new(&config, data.image_size, &mut rng).unwrap();
    let history = trainer.fit(&data, &mut rng).unwrap();

    assert_eq!(history.len(), 3);
    assert!(history.iter().all(|m| m.is_finite()));
    let results = dir.path().join("results");
    assert!(results.join("original_X.png").exists());
    assert!(results.join("generated_X_epoch_2.png").exists());
    assert!(!results.join("generated_X_epoch_1.png").exists());
}

#[test]
fn training_improves_the_bound_on_a_fixed_batch() {
    let dir = tempfile::tempdir().unwrap();
    let config = VaeConfig {
        learning_rate: 0.01,
        ..tiny_config(dir.path(), DecoderKind::Bernoulli)
    };
    let mut rng = StdRng::seed_from_u64(2);
    let mut trainer = Trainer::<NdArray>::new(&config, 2, &mut rng).unwrap();

    let batch = Array2::from_shape_vec(
        (4, 4),
        vec![
            1.0, 0.0, 0.0, 1.0, //
            0.0, 1.0, 1.0, 0.0, //
            1.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 1.0,
        ],
    )
    .unwrap();

    let first = trainer.train_step(batch.view(), &mut rng).unwrap();
    let mut last = first;
    for _ in 0..300 {
        last = trainer.train_step(batch.view(), &mut rng).unwrap();
    }
    assert!(
        last.variational_lower_bound > first.variational_lower_bound,
        "{:?} -> {:?}",
        first,
        last
    );

    let display = trainer.reconstruct(batch.view(), &mut rng).unwrap();
    assert_eq!(display.dim(), (4, 4));
    assert!(display.iter().all(|v| (0.0..=1.0).contains(v)));
}

#[test]
fn four_sample_dataset_trains_one_epoch() {
    use digit_vae::data::{DigitData, DigitImages};

    let dir = tempfile::tempdir().unwrap();
    let config = tiny_config(dir.path(), DecoderKind::Bernoulli);
    let images = DigitImages {
        pixels: Array2::from_shape_vec(
            (4, 4),
            vec![
                0.0, 0.5, 1.0, 0.2, //
                0.9, 0.1, 0.4, 0.6, //
                0.3, 0.3, 0.8, 0.0, //
                1.0, 0.7, 0.2, 0.5,
            ],
        )
        .unwrap(),
        labels: vec![0, 1, 2, 3],
    };
    let data = DigitData {
        train: images.clone(),
        test: images,
        image_size: 2,
    };

    let mut rng = StdRng::seed_from_u64(3);
    let mut trainer = Trainer::<NdArray>::new(&config, 2, &mut rng).unwrap();
    let metrics = trainer.train_epoch(0, data.train.view(), &mut rng).unwrap();
    assert!(metrics.is_finite());

    let history = trainer.fit(&data, &mut rng).unwrap();
    assert!(history[0].is_finite());
}
