//! This module defines the raster element API, which enables rasters to be
//! allocated, persisted in the uoctml sidecar and restored from it.
use bytemuck::Pod;
use byteordered::{Endian, Endianness};
use num_traits::Zero;
use std::borrow::Cow;
use std::fmt::Debug;
use std::io::Read;
use std::mem::size_of;

use crate::error::Result;

/// Trait type for characterizing a raster sample, implemented for the
/// primitive numeric types stored in OCT rasters.
///
/// Samples are persisted in little endian byte order.
pub trait RasterElement: 'static + Pod + Zero + PartialEq + Debug {
    /// The uoctml `type` attribute naming this element type.
    const TYPE_NAME: &'static str;

    /// Read a single element from the given byte source.
    fn from_raw<R: Read>(src: R) -> Result<Self>;

    /// Number of bytes taken by one element.
    fn byte_size() -> usize {
        size_of::<Self>()
    }

    /// Transform the given byte vector into a vector of elements.
    fn from_raw_vec(vec: Vec<u8>) -> Result<Vec<Self>> {
        let mut cursor: &[u8] = &vec;
        (0..vec.len() / Self::byte_size())
            .map(|_| Self::from_raw(&mut cursor))
            .collect()
    }

    /// View the given elements as little endian bytes, converting only
    /// when the host is big endian.
    fn as_le_bytes(data: &[Self]) -> Cow<[u8]>;
}

impl RasterElement for u8 {
    const TYPE_NAME: &'static str = "u8";

    fn from_raw<R: Read>(mut src: R) -> Result<Self> {
        let mut b = [0u8];
        src.read_exact(&mut b)?;
        Ok(b[0])
    }

    fn from_raw_vec(vec: Vec<u8>) -> Result<Vec<Self>> {
        Ok(vec)
    }

    fn as_le_bytes(data: &[Self]) -> Cow<[u8]> {
        Cow::Borrowed(data)
    }
}

impl RasterElement for f32 {
    const TYPE_NAME: &'static str = "f32";

    fn from_raw<R: Read>(src: R) -> Result<Self> {
        Endianness::Little.read_f32(src).map_err(From::from)
    }

    fn as_le_bytes(data: &[Self]) -> Cow<[u8]> {
        if Endianness::native() == Endianness::Little {
            Cow::Borrowed(bytemuck::cast_slice(data))
        } else {
            Cow::Owned(data.iter().flat_map(|v| v.to_le_bytes()).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RasterElement;

    #[test]
    fn f32_bytes_are_little_endian() {
        let data = [1.0f32, -2.5];
        let bytes = f32::as_le_bytes(&data);
        assert_eq!(&bytes[..4], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[4..], &(-2.5f32).to_le_bytes());

        let back = f32::from_raw_vec(bytes.into_owned()).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn nan_survives_byte_conversion() {
        let data = [f32::NAN];
        let back = f32::from_raw_vec(f32::as_le_bytes(&data).into_owned()).unwrap();
        assert!(back[0].is_nan());
    }
}
