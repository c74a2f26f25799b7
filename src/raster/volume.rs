//! Module holding the 3-D volume raster.

use super::element::RasterElement;
use super::util::{coords_to_index, num_samples};
use crate::error::{OctError, Result};

/// A stack of single channel 2-D slices, such as the B-scans of a C-scan.
///
/// The voxel `(x, y, z)` lives at `(z * height + y) * width + x`, so every
/// depth slice is one contiguous `width * height` block.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Volume<T> {
    dim: [usize; 3],
    data: Vec<T>,
}

impl<T: RasterElement> Volume<T> {
    /// Create a zero-filled volume with the given dimensions.
    pub fn new(width: usize, height: usize, depth: usize) -> Self {
        Volume {
            dim: [width, height, depth],
            data: vec![T::zero(); width * height * depth],
        }
    }

    /// Create a volume over an existing sample buffer.
    ///
    /// # Errors
    ///
    /// - `OctError::RasterSize` if `data` does not hold exactly
    /// `width * height * depth` samples.
    pub fn from_raw(width: usize, height: usize, depth: usize, data: Vec<T>) -> Result<Self> {
        let dim = [width, height, depth];
        if num_samples(&dim) != Some(data.len()) {
            return Err(OctError::RasterSize(dim.to_vec(), data.len()));
        }
        Ok(Volume { dim, data })
    }

    /// Create an empty placeholder volume.
    pub fn empty() -> Self {
        Volume {
            dim: [0, 0, 0],
            data: Vec::new(),
        }
    }

    /// Slice width (A-scans per B-scan).
    pub fn width(&self) -> usize {
        self.dim[0]
    }

    /// Slice height (samples per A-scan).
    pub fn height(&self) -> usize {
        self.dim[1]
    }

    /// Number of slices.
    pub fn depth(&self) -> usize {
        self.dim[2]
    }

    /// Whether this volume holds no samples.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Size of the sample buffer in bytes.
    pub fn byte_len(&self) -> usize {
        self.data.len() * T::byte_size()
    }

    /// Fetch the voxel at `(x, y, z)`.
    pub fn get(&self, x: usize, y: usize, z: usize) -> Result<T> {
        let index = coords_to_index(&[x, y, z], &self.dim)?;
        Ok(self.data[index])
    }

    /// Mutable access to the voxel at `(x, y, z)`.
    pub fn get_mut(&mut self, x: usize, y: usize, z: usize) -> Result<&mut T> {
        let index = coords_to_index(&[x, y, z], &self.dim)?;
        Ok(&mut self.data[index])
    }

    /// Overwrite the voxel at `(x, y, z)`.
    pub fn set(&mut self, x: usize, y: usize, z: usize, value: T) -> Result<()> {
        *self.get_mut(x, y, z)? = value;
        Ok(())
    }

    /// All samples of slice `z`.
    pub fn slice(&self, z: usize) -> Result<&[T]> {
        let len = self.width() * self.height();
        if z >= self.depth() {
            return Err(OctError::OutOfBounds(vec![0, 0, z]));
        }
        Ok(&self.data[z * len..(z + 1) * len])
    }

    /// Mutable access to all samples of slice `z`.
    pub fn slice_mut(&mut self, z: usize) -> Result<&mut [T]> {
        let len = self.width() * self.height();
        if z >= self.depth() {
            return Err(OctError::OutOfBounds(vec![0, 0, z]));
        }
        Ok(&mut self.data[z * len..(z + 1) * len])
    }

    /// Retrieve a reference to the sample buffer.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Retrieve a mutable reference to the sample buffer.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Retrieve the sample buffer, consuming the volume.
    pub fn into_raw(self) -> Vec<T> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::Volume;

    #[test]
    fn test_u8_volume() {
        let data: Vec<u8> = (0..64).map(|x| x * 2).collect();
        let vol = Volume::from_raw(4, 4, 4, data).unwrap();

        assert_eq!(vol.get(3, 1, 0).unwrap(), 14);
        assert_eq!(vol.get(3, 3, 3).unwrap(), 126);
        assert_eq!(vol.get(2, 1, 1).unwrap(), 44);
        assert!(vol.get(4, 0, 0).is_err());
        assert!(vol.get(0, 0, 4).is_err());
    }

    #[test]
    fn slices_are_contiguous() {
        let mut vol: Volume<u8> = Volume::new(3, 2, 2);
        vol.slice_mut(1).unwrap().copy_from_slice(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(vol.get(0, 0, 1).unwrap(), 1);
        assert_eq!(vol.get(2, 1, 1).unwrap(), 6);
        assert_eq!(vol.slice(0).unwrap(), &[0; 6]);
        assert!(vol.slice(2).is_err());
    }

    #[test]
    fn empty_placeholder() {
        let vol: Volume<u8> = Volume::empty();
        assert!(vol.is_empty());
        assert_eq!(vol.depth(), 0);
        assert!(vol.slice(0).is_err());
    }
}
