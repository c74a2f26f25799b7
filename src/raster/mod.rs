//! This module defines the raster types holding OCT sample data: 2-D
//! [`Image`]s for fundus photographs and contour height-maps, and 3-D
//! [`Volume`]s for B-scan stacks.
//!
//! Both own a dense, row-major buffer whose dimensions are fixed at
//! construction. All element accessors are bounds-checked and report
//! `OctError::OutOfBounds` instead of panicking. An instance with zero
//! extents is a valid "not yet populated" placeholder.
//!
//! An integration with `ndarray` is available with the `ndarray_volumes`
//! feature.

pub mod element;
pub mod image;
#[cfg(feature = "ndarray_volumes")]
pub mod ndarray;
mod util;
pub mod volume;

pub use self::element::RasterElement;
pub use self::image::Image;
#[cfg(feature = "ndarray_volumes")]
pub use self::ndarray::IntoNdArray;
pub use self::volume::Volume;
