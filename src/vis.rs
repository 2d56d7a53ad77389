use std::path::Path;

use image::{ImageBuffer, Luma};
use ndarray::{s, Array2, ArrayView2};

use crate::error::{Result, VaeError};

/// Lays out the first `rows * columns` flat images of `batch` into one grid.
///
/// Every row of `batch` must hold `image_size * image_size` pixels. Tile
/// `index` is placed at grid cell `(index / columns, index % columns)`.
pub fn tile_images(
    batch: ArrayView2<f32>,
    image_size: usize,
    rows: usize,
    columns: usize,
) -> Result<Array2<f32>> {
    let count = rows * columns;
    if batch.nrows() < count {
        return Err(VaeError::Shape(format!(
            "cannot tile {} images into a {}x{} grid",
            batch.nrows(),
            rows,
            columns
        )));
    }
    if batch.ncols() != image_size * image_size {
        return Err(VaeError::Shape(format!(
            "images have {} pixels, expected {}x{}",
            batch.ncols(),
            image_size,
            image_size
        )));
    }

    let mut grid = Array2::zeros((rows * image_size, columns * image_size));
    for (index, image) in batch.outer_iter().take(count).enumerate() {
        let tile = image
            .into_shape((image_size, image_size))
            .map_err(|e| VaeError::Shape(e.to_string()))?;
        let (r, c) = (index / columns, index % columns);
        grid.slice_mut(s![
            r * image_size..(r + 1) * image_size,
            c * image_size..(c + 1) * image_size
        ])
        .assign(&tile);
    }
    Ok(grid)
}

/// Saves a 2D array as a grayscale PNG.
///
/// Values are normalized to [0, 255] by the array's own min and max.
pub fn save_grayscale(grid: ArrayView2<f32>, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let min_val = grid.iter().fold(f32::INFINITY, |a, &b| a.min(b));
    let max_val = grid.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));

    let range = if (max_val - min_val).abs() < 1e-6 {
        1.0
    } else {
        max_val - min_val
    };

    // 画像は行優先で並べる
    let normalized: Vec<u8> = grid
        .iter()
        .map(|&x| ((x - min_val) / range * 255.0).round().clamp(0.0, 255.0) as u8)
        .collect();

    let (h, w) = grid.dim();
    let img: ImageBuffer<Luma<u8>, Vec<u8>> = ImageBuffer::from_vec(w as u32, h as u32, normalized)
        .ok_or_else(|| VaeError::Image {
            path: path.to_path_buf(),
            message: "failed to create image buffer".to_string(),
        })?;
    img.save(path).map_err(|e| VaeError::Image {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    log::debug!("saved {}x{} image to {}", w, h, path.display());
    Ok(())
}
