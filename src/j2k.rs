//! JPEG 2000 decoding seam.
//!
//! Topcon files embed fundus photographs and B-scans as JPEG 2000
//! codestreams. The decoder is pluggable: with the `jpeg2000` feature the
//! OpenJPEG-backed [`OpenJpeg`] is the default, otherwise payloads cannot
//! be decoded and the Topcon reader reports a codec error on the first
//! embedded image.
use std::fmt::Debug;
use std::sync::Arc;

use crate::error::{OctError, Result};
use crate::raster::Image;

/// Decoder of a JPEG 2000 codestream into an interleaved 8-bit image.
pub trait Jpeg2000Decoder: Send + Sync + Debug {
    /// Decode `data` into an image with one channel per component.
    fn decode(&self, data: &[u8]) -> Result<Image<u8>>;
}

/// Decoder used when none is configured.
pub fn default_decoder() -> Arc<dyn Jpeg2000Decoder> {
    #[cfg(feature = "jpeg2000")]
    {
        Arc::new(OpenJpeg)
    }
    #[cfg(not(feature = "jpeg2000"))]
    {
        Arc::new(Unsupported)
    }
}

/// Decoder which rejects every payload.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unsupported;

impl Jpeg2000Decoder for Unsupported {
    fn decode(&self, _data: &[u8]) -> Result<Image<u8>> {
        Err(OctError::Codec(
            "JPEG 2000 support is disabled (enable the `jpeg2000` feature)".to_owned(),
        ))
    }
}

/// OpenJPEG decoder.
#[cfg(feature = "jpeg2000")]
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenJpeg;

#[cfg(feature = "jpeg2000")]
impl Jpeg2000Decoder for OpenJpeg {
    fn decode(&self, data: &[u8]) -> Result<Image<u8>> {
        let image =
            jpeg2k::Image::from_bytes(data).map_err(|e| OctError::Codec(e.to_string()))?;
        let width = image.width() as usize;
        let height = image.height() as usize;
        let components = image.components();
        let channels = components.len();

        let mut out = Image::new(channels, width, height);
        let samples = out.as_mut_slice();
        for (c, comp) in components.iter().enumerate() {
            let plane = comp.data();
            if plane.len() != width * height {
                return Err(OctError::Codec(format!(
                    "component {} holds {} samples, expected {}",
                    c,
                    plane.len(),
                    width * height
                )));
            }
            let shift = comp.precision().saturating_sub(8);
            for (i, &v) in plane.iter().enumerate() {
                samples[i * channels + c] = (v >> shift).max(0).min(255) as u8;
            }
        }
        Ok(out)
    }
}
