//! Miscellaneous raster-related functions
use crate::error::{OctError, Result};

/// Map row-major coordinates (fastest axis first) to a linear index,
/// checking every coordinate against its extent.
pub fn coords_to_index(coords: &[usize], dim: &[usize]) -> Result<usize> {
    debug_assert_eq!(coords.len(), dim.len());

    if !coords.iter().zip(dim).all(|(i, d)| i < d) {
        return Err(OctError::OutOfBounds(Vec::from(coords)));
    }

    let index = coords
        .iter()
        .zip(dim)
        .rev()
        .fold(0, |a, (i, d)| a * d + i);

    Ok(index)
}

/// Number of samples held by a raster of the given extents, `None` on
/// overflow.
pub fn num_samples(dim: &[usize]) -> Option<usize> {
    dim.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}
