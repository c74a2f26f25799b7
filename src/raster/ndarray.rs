//! Conversion of rasters into `ndarray` arrays.
//!
//! This module introduces the trait [`IntoNdArray`], which is implemented for
//! both raster types and maps them into a 3-dimensional [`Array`] in standard
//! (row major) memory order:
//!
//! - an [`Image`] becomes an array of shape `[height, width, channels]`;
//! - a [`Volume`] becomes an array of shape `[depth, height, width]`.
//!
//! No samples are copied; the raster's buffer is moved into the array.
//!
//! [`IntoNdArray`]: ./trait.IntoNdArray.html
//! [`Array`]: ../../../ndarray/type.Array.html
//! [`Image`]: ../image/struct.Image.html
//! [`Volume`]: ../volume/struct.Volume.html
use super::element::RasterElement;
use super::image::Image;
use super::volume::Volume;
use crate::error::{OctError, Result};
use ndarray::Array3;

/// Trait for rasters which can be converted to an ndarray.
pub trait IntoNdArray {
    /// The element type of the resulting array.
    type Elem;

    /// Consume the raster into an ndarray.
    fn into_ndarray(self) -> Result<Array3<Self::Elem>>;
}

impl<T: RasterElement> IntoNdArray for Image<T> {
    type Elem = T;

    fn into_ndarray(self) -> Result<Array3<T>> {
        let shape = (self.height(), self.width(), self.channels());
        Array3::from_shape_vec(shape, self.into_raw())
            .map_err(|_| OctError::RasterSize(vec![shape.0, shape.1, shape.2], 0))
    }
}

impl<T: RasterElement> IntoNdArray for Volume<T> {
    type Elem = T;

    fn into_ndarray(self) -> Result<Array3<T>> {
        let shape = (self.depth(), self.height(), self.width());
        Array3::from_shape_vec(shape, self.into_raw())
            .map_err(|_| OctError::RasterSize(vec![shape.0, shape.1, shape.2], 0))
    }
}
