use ndarray::{Array2, ArrayView2};

pub mod archive;
pub mod loader;

pub use archive::load_digits;
pub use loader::BatchSampler;

/// Flattened grayscale images, one per row, with pixel values in [0, 1].
#[derive(Debug, Clone)]
pub struct DigitImages {
    pub pixels: Array2<f32>,
    /// Digit each row was taken from. Not used by the model.
    pub labels: Vec<u8>,
}

impl DigitImages {
    pub fn len(&self) -> usize {
        self.pixels.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.nrows() == 0
    }

    /// Pixels per image.
    pub fn dim(&self) -> usize {
        self.pixels.ncols()
    }

    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.pixels.view()
    }
}

#[derive(Debug, Clone)]
pub struct DigitData {
    pub train: DigitImages,
    pub test: DigitImages,
    /// Side length of the square images.
    pub image_size: usize,
}
