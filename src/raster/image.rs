//! Module holding the 2-D image raster.

use super::element::RasterElement;
use super::util::{coords_to_index, num_samples};
use crate::error::{OctError, Result};

/// A 2-D raster with one or more interleaved channels.
///
/// Samples are stored row by row, channels interleaved within each pixel,
/// so that the sample `(c, x, y)` lives at `(y * width + x) * channels + c`.
/// Photographs have their logical origin at the lower left corner; contour
/// height-maps have one sample per lateral raster cell.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Image<T> {
    dim: [usize; 3],
    data: Vec<T>,
}

impl<T: RasterElement> Image<T> {
    /// Create a zero-filled image with the given dimensions.
    pub fn new(channels: usize, width: usize, height: usize) -> Self {
        Image {
            dim: [channels, width, height],
            data: vec![T::zero(); channels * width * height],
        }
    }

    /// Create an image over an existing sample buffer.
    ///
    /// # Errors
    ///
    /// - `OctError::RasterSize` if `data` does not hold exactly
    /// `channels * width * height` samples.
    pub fn from_raw(channels: usize, width: usize, height: usize, data: Vec<T>) -> Result<Self> {
        let dim = [channels, width, height];
        if num_samples(&dim) != Some(data.len()) {
            return Err(OctError::RasterSize(dim.to_vec(), data.len()));
        }
        Ok(Image { dim, data })
    }

    /// Create an empty placeholder image.
    pub fn empty() -> Self {
        Image {
            dim: [0, 0, 0],
            data: Vec::new(),
        }
    }

    /// Number of interleaved channels.
    pub fn channels(&self) -> usize {
        self.dim[0]
    }

    /// Image width in pixels.
    pub fn width(&self) -> usize {
        self.dim[1]
    }

    /// Image height in pixels.
    pub fn height(&self) -> usize {
        self.dim[2]
    }

    /// Whether this image holds no samples.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Size of the sample buffer in bytes.
    pub fn byte_len(&self) -> usize {
        self.data.len() * T::byte_size()
    }

    /// Fetch the sample of channel `c` at `(x, y)`.
    pub fn get(&self, c: usize, x: usize, y: usize) -> Result<T> {
        let index = self.index(c, x, y)?;
        Ok(self.data[index])
    }

    /// Mutable access to the sample of channel `c` at `(x, y)`.
    pub fn get_mut(&mut self, c: usize, x: usize, y: usize) -> Result<&mut T> {
        let index = self.index(c, x, y)?;
        Ok(&mut self.data[index])
    }

    /// Overwrite the sample of channel `c` at `(x, y)`.
    pub fn set(&mut self, c: usize, x: usize, y: usize, value: T) -> Result<()> {
        *self.get_mut(c, x, y)? = value;
        Ok(())
    }

    /// Fetch a sample of a single channel image.
    pub fn at(&self, x: usize, y: usize) -> Result<T> {
        if self.channels() != 1 {
            return Err(OctError::OutOfBounds(vec![1, x, y]));
        }
        self.get(0, x, y)
    }

    /// All samples of row `y`, channels interleaved.
    pub fn row(&self, y: usize) -> Result<&[T]> {
        let len = self.row_len();
        if y >= self.height() {
            return Err(OctError::OutOfBounds(vec![0, 0, y]));
        }
        Ok(&self.data[y * len..(y + 1) * len])
    }

    /// Mutable access to all samples of row `y`.
    pub fn row_mut(&mut self, y: usize) -> Result<&mut [T]> {
        let len = self.row_len();
        if y >= self.height() {
            return Err(OctError::OutOfBounds(vec![0, 0, y]));
        }
        Ok(&mut self.data[y * len..(y + 1) * len])
    }

    /// Mirror the image upside down.
    pub fn flip_vertical(&mut self) {
        let len = self.row_len();
        let height = self.height();
        for y in 0..height / 2 {
            let (top, bottom) = self.data.split_at_mut((height - 1 - y) * len);
            top[y * len..(y + 1) * len].swap_with_slice(&mut bottom[..len]);
        }
    }

    /// Apply `f` to every sample in place.
    pub fn map_inplace<F>(&mut self, f: F)
    where
        F: FnMut(&mut T),
    {
        self.data.iter_mut().for_each(f);
    }

    /// Retrieve a reference to the sample buffer.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Retrieve a mutable reference to the sample buffer.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Retrieve the sample buffer, consuming the image.
    pub fn into_raw(self) -> Vec<T> {
        self.data
    }

    fn row_len(&self) -> usize {
        self.channels() * self.width()
    }

    fn index(&self, c: usize, x: usize, y: usize) -> Result<usize> {
        coords_to_index(&[c, x, y], &self.dim)
    }
}
