use std::fs::File;
use std::path::Path;

use digit_vae::data::{load_digits, BatchSampler};
use digit_vae::VaeError;
use ndarray::{Array2, Axis};
use ndarray_npy::NpzWriter;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// 各数字`rows`枚、`pixels`画素のアーカイブを書き出す。
/// 画素値は数字ごとに一定(数字 * 20)にしておく
fn write_archive(path: &Path, rows: usize, pixels: usize, skip: Option<&str>) {
    let mut npz = NpzWriter::new(File::create(path).unwrap());
    for prefix in ["train", "test"] {
        for digit in 0..10u8 {
            let key = format!("{}{}", prefix, digit);
            if skip == Some(key.as_str()) {
                continue;
            }
            let array = Array2::<u8>::from_elem((rows, pixels), digit * 20);
            npz.add_array(key, &array).unwrap();
        }
    }
    npz.finish().unwrap();
}

#[test]
fn loads_and_normalizes_digits() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("digits.npz");
    write_archive(&path, 6, 16, None);

    let mut rng = StdRng::seed_from_u64(0);
    let data = load_digits(&path, 5, 3, &mut rng).unwrap();

    assert_eq!(data.image_size, 4);
    assert_eq!(data.train.len(), 50);
    assert_eq!(data.test.len(), 30);
    assert_eq!(data.train.dim(), 16);
    assert!(data.train.pixels.iter().all(|&v| (0.0..=1.0).contains(&v)));
    assert!(data.test.pixels.iter().all(|&v| (0.0..=1.0).contains(&v)));

    // ラベルはシャッフル後も行と対応している
    for (row, &label) in data.train.pixels.axis_iter(Axis(0)).zip(&data.train.labels) {
        let expected = (label as f32 * 20.0) / 255.0;
        assert!(row.iter().all(|&v| (v - expected).abs() < 1e-6));
    }
    for digit in 0..10u8 {
        assert_eq!(data.train.labels.iter().filter(|&&l| l == digit).count(), 5);
    }
}

#[test]
fn rows_are_shuffled() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("digits.npz");
    write_archive(&path, 20, 4, None);

    let mut rng = StdRng::seed_from_u64(11);
    let data = load_digits(&path, 20, 1, &mut rng).unwrap();
    let sorted: Vec<u8> = (0..10u8).flat_map(|d| std::iter::repeat(d).take(20)).collect();
    assert_ne!(data.train.labels, sorted);
}

#[test]
fn missing_array_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("digits.npz");
    write_archive(&path, 4, 16, Some("test7"));

    let mut rng = StdRng::seed_from_u64(0);
    let err = load_digits(&path, 2, 2, &mut rng).unwrap_err();
    assert!(matches!(err, VaeError::MissingArray { ref key } if key == "test7"));
}

#[test]
fn non_square_rows_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("digits.npz");
    write_archive(&path, 4, 15, None);

    let mut rng = StdRng::seed_from_u64(0);
    let err = load_digits(&path, 2, 2, &mut rng).unwrap_err();
    assert!(matches!(err, VaeError::NotSquare { len: 15, .. }));
}

#[test]
fn mismatched_pixel_counts_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("digits.npz");
    let mut npz = NpzWriter::new(File::create(&path).unwrap());
    for prefix in ["train", "test"] {
        for digit in 0..10u8 {
            let key = format!("{}{}", prefix, digit);
            // train3だけ3x3画素、他は2x2画素
            let pixels = if key == "train3" { 9 } else { 4 };
            npz.add_array(key, &Array2::<u8>::zeros((3, pixels))).unwrap();
        }
    }
    npz.finish().unwrap();

    let mut rng = StdRng::seed_from_u64(0);
    let err = load_digits(&path, 2, 2, &mut rng).unwrap_err();
    assert!(
        matches!(
            err,
            VaeError::PixelCountMismatch {
                ref key,
                expected: 4,
                found: 9,
            } if key == "train3"
        ),
        "{}",
        err
    );
}

#[test]
fn too_few_rows_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("digits.npz");
    write_archive(&path, 4, 16, None);

    let mut rng = StdRng::seed_from_u64(0);
    let err = load_digits(&path, 5, 2, &mut rng).unwrap_err();
    assert!(matches!(
        err,
        VaeError::NotEnoughImages {
            requested: 5,
            available: 4,
            ..
        }
    ));
}

#[test]
fn unreadable_archive_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut rng = StdRng::seed_from_u64(0);

    let err = load_digits(dir.path().join("absent.npz"), 1, 1, &mut rng).unwrap_err();
    assert!(matches!(err, VaeError::Io { .. }));

    let garbage = dir.path().join("garbage.npz");
    std::fs::write(&garbage, b"not a zip archive").unwrap();
    let err = load_digits(&garbage, 1, 1, &mut rng).unwrap_err();
    assert!(matches!(err, VaeError::Archive { .. }));
}

#[test]
fn sampler_draws_distinct_rows() {
    let images = Array2::from_shape_fn((10, 3), |(i, _)| i as f32);
    let sampler = BatchSampler::new(4);
    let mut rng = StdRng::seed_from_u64(5);

    assert_eq!(sampler.steps_per_epoch(10), 2);
    let batch = sampler.sample(images.view(), &mut rng).unwrap();
    assert_eq!(batch.dim(), (4, 3));

    let mut rows: Vec<usize> = batch.column(0).iter().map(|&v| v as usize).collect();
    rows.sort_unstable();
    rows.dedup();
    assert_eq!(rows.len(), 4);
}

#[test]
fn sampler_rejects_oversized_batches() {
    let images = Array2::<f32>::zeros((3, 2));
    let mut rng = StdRng::seed_from_u64(5);
    let err = BatchSampler::new(4).sample(images.view(), &mut rng).unwrap_err();
    assert!(matches!(err, VaeError::Shape(_)));
}
