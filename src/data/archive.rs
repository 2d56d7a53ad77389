use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use ndarray::{concatenate, s, Array2, ArrayView2, Axis, Ix2, OwnedRepr};
use ndarray_npy::{NpzReader, ReadNpzError};
use rand::seq::SliceRandom;
use rand::Rng;

use super::{DigitData, DigitImages};
use crate::error::{Result, VaeError};

pub const DIGITS: u8 = 10;

/// Loads the per-digit image arrays `train0..train9` and `test0..test9`
/// from a `.npz` archive.
///
/// The first `train_per_digit` (resp. `test_per_digit`) rows of every digit
/// are kept, divided by 255 and shuffled with `rng`.
pub fn load_digits<R: Rng + ?Sized>(
    path: impl AsRef<Path>,
    train_per_digit: usize,
    test_per_digit: usize,
    rng: &mut R,
) -> Result<DigitData> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| VaeError::io(path, e))?;
    let mut npz = NpzReader::new(BufReader::new(file)).map_err(|e| archive_error(path, e))?;
    let names = npz.names().map_err(|e| archive_error(path, e))?;

    let mut pixel_count = None;
    let mut read_split = |prefix: &str, per_digit: usize| -> Result<DigitImages> {
        let mut blocks = Vec::with_capacity(DIGITS as usize);
        let mut labels = Vec::with_capacity(DIGITS as usize * per_digit);
        for digit in 0..DIGITS {
            let key = format!("{}{}", prefix, digit);
            let name = find_entry(&names, &key).ok_or_else(|| VaeError::MissingArray {
                key: key.clone(),
            })?;
            let array = read_pixels(&mut npz, name).map_err(|e| archive_error(path, e))?;
            check_array(&key, array.view(), per_digit, &mut pixel_count)?;
            blocks.push(array.slice(s![..per_digit, ..]).to_owned());
            labels.extend(std::iter::repeat(digit).take(per_digit));
        }
        let views: Vec<ArrayView2<f32>> = blocks.iter().map(|b| b.view()).collect();
        let pixels = concatenate(Axis(0), &views).map_err(|e| VaeError::Shape(e.to_string()))?;
        Ok(DigitImages { pixels, labels })
    };

    let train = read_split("train", train_per_digit)?;
    let test = read_split("test", test_per_digit)?;

    let dim = train.dim();
    let image_size = square_side(dim).ok_or_else(|| VaeError::NotSquare {
        key: "train0".to_string(),
        len: dim,
    })?;

    let data = DigitData {
        train: normalize_and_shuffle(train, rng),
        test: normalize_and_shuffle(test, rng),
        image_size,
    };
    log::info!(
        "loaded {} training and {} test images of {}x{} pixels from {}",
        data.train.len(),
        data.test.len(),
        image_size,
        image_size,
        path.display()
    );
    Ok(data)
}

fn archive_error(path: &Path, err: ReadNpzError) -> VaeError {
    VaeError::Archive {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

// アーカイブ内の名前は`.npy`の拡張子付きの場合がある
fn find_entry<'a>(names: &'a [String], key: &str) -> Option<&'a str> {
    names
        .iter()
        .find(|name| {
            name.as_str() == key || name.strip_suffix(".npy").map_or(false, |stem| stem == key)
        })
        .map(String::as_str)
}

fn read_pixels<R: Read + Seek>(
    npz: &mut NpzReader<R>,
    name: &str,
) -> std::result::Result<Array2<f32>, ReadNpzError> {
    if let Ok(array) = npz.by_name::<OwnedRepr<u8>, Ix2>(name) {
        return Ok(array.mapv(f32::from));
    }
    if let Ok(array) = npz.by_name::<OwnedRepr<f32>, Ix2>(name) {
        return Ok(array);
    }
    let array = npz.by_name::<OwnedRepr<f64>, Ix2>(name)?;
    Ok(array.mapv(|v| v as f32))
}

fn check_array(
    key: &str,
    array: ArrayView2<f32>,
    requested: usize,
    pixel_count: &mut Option<usize>,
) -> Result<()> {
    let len = array.ncols();
    if square_side(len).is_none() {
        return Err(VaeError::NotSquare {
            key: key.to_string(),
            len,
        });
    }
    match *pixel_count {
        Some(expected) if expected != len => {
            return Err(VaeError::PixelCountMismatch {
                key: key.to_string(),
                expected,
                found: len,
            })
        }
        Some(_) => {}
        None => *pixel_count = Some(len),
    }
    if array.nrows() < requested {
        return Err(VaeError::NotEnoughImages {
            key: key.to_string(),
            requested,
            available: array.nrows(),
        });
    }
    Ok(())
}

/// Side length of a square image with `len` pixels.
pub fn square_side(len: usize) -> Option<usize> {
    let side = (len as f64).sqrt().round() as usize;
    (side > 0 && side * side == len).then_some(side)
}

fn normalize_and_shuffle<R: Rng + ?Sized>(images: DigitImages, rng: &mut R) -> DigitImages {
    let mut order: Vec<usize> = (0..images.len()).collect();
    order.shuffle(rng);
    let pixels = images.pixels.select(Axis(0), &order).mapv(|v| v / 255.0);
    let labels = order.iter().map(|&i| images.labels[i]).collect();
    DigitImages { pixels, labels }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_side_accepts_perfect_squares_only() {
        assert_eq!(square_side(64), Some(8));
        assert_eq!(square_side(784), Some(28));
        assert_eq!(square_side(4), Some(2));
        assert_eq!(square_side(63), None);
        assert_eq!(square_side(0), None);
    }

    #[test]
    fn entries_match_with_or_without_suffix() {
        let names = vec!["train0.npy".to_string(), "test0".to_string()];
        assert_eq!(find_entry(&names, "train0"), Some("train0.npy"));
        assert_eq!(find_entry(&names, "test0"), Some("test0"));
        assert_eq!(find_entry(&names, "train1"), None);
    }
}
