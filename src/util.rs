//! Private utility module
use byteordered::ByteOrdered;
use std::convert::TryFrom;
use std::io::{self, BufRead, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{OctError, Result};

/// Little endian primitive reads, as used by every vendor format.
pub trait ReadLe: Read {
    fn le_u8(&mut self) -> io::Result<u8> {
        ByteOrdered::le(self).read_u8()
    }

    fn le_u16(&mut self) -> io::Result<u16> {
        ByteOrdered::le(self).read_u16()
    }

    fn le_u32(&mut self) -> io::Result<u32> {
        ByteOrdered::le(self).read_u32()
    }

    fn le_i32(&mut self) -> io::Result<i32> {
        ByteOrdered::le(self).read_i32()
    }

    fn le_f32(&mut self) -> io::Result<f32> {
        ByteOrdered::le(self).read_f32()
    }

    fn le_f64(&mut self) -> io::Result<f64> {
        ByteOrdered::le(self).read_f64()
    }

    /// Read `n` consecutive little endian `u16` samples.
    fn le_u16_vec(&mut self, n: usize) -> io::Result<Vec<u16>> {
        let len = n
            .checked_mul(2)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "sample count overflow"))?;
        let bytes = self.bytes_vec(len)?;
        Ok(bytes
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect())
    }

    /// Read `n` raw bytes. The buffer grows with the data actually read,
    /// so a bogus length fails on EOF instead of allocating up front.
    fn bytes_vec(&mut self, n: usize) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        let _ = self.take(n as u64).read_to_end(&mut buf)?;
        if buf.len() < n {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        Ok(buf)
    }

    /// Read a fixed-width text field of `n` bytes, cut at the first NUL.
    fn latin1_field(&mut self, n: usize) -> io::Result<String> {
        let buf = self.bytes_vec(n)?;
        Ok(latin1_to_utf8(&buf))
    }

    /// Consume and discard `n` bytes.
    fn skip(&mut self, n: u64) -> io::Result<()> {
        let copied = io::copy(&mut self.take(n), &mut io::sink())?;
        if copied < n {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        Ok(())
    }
}

impl<R: Read + ?Sized> ReadLe for R {}

/// Decode a NUL-terminated ISO 8859-1 byte string.
pub fn latin1_to_utf8(bytes: &[u8]) -> String {
    bytes
        .iter()
        .take_while(|&&b| b != 0)
        .map(|&b| b as char)
        .collect()
}

/// Advance `source` up to the first occurrence of `needle`, leaving the
/// cursor at its first byte. Returns that position.
pub fn seek_to_signature<R>(source: &mut R, needle: &[u8]) -> Result<u64>
where
    R: BufRead + Seek,
{
    if needle.is_empty() {
        return Ok(source.stream_position()?);
    }
    let start = source.stream_position()?;
    // the last `needle.len() - 1` bytes of the previous refill
    let mut tail: Vec<u8> = Vec::with_capacity(needle.len() * 2);
    let mut offset = 0u64;
    loop {
        let consumed = {
            let buf = source.fill_buf()?;
            if buf.is_empty() {
                return Err(OctError::invalid("signature not found"));
            }
            let keep = tail.len();
            tail.extend_from_slice(&buf[..buf.len().min(needle.len())]);
            if let Some(i) = tail.windows(needle.len()).position(|w| w == needle) {
                let pos = start + offset - keep as u64 + i as u64;
                let _ = source.seek(SeekFrom::Start(pos))?;
                return Ok(pos);
            }
            if let Some(i) = buf.windows(needle.len()).position(|w| w == needle) {
                let pos = start + offset + i as u64;
                let _ = source.seek(SeekFrom::Start(pos))?;
                return Ok(pos);
            }
            if buf.len() + 1 >= needle.len() {
                tail.clear();
                tail.extend_from_slice(&buf[buf.len() + 1 - needle.len()..]);
            } else {
                let excess = tail.len().saturating_sub(needle.len() - 1);
                let _ = tail.drain(..excess);
            }
            buf.len()
        };
        source.consume(consumed);
        offset += consumed as u64;
    }
}

/// Number of samples of a record with the given extents.
///
/// # Errors
///
/// - `OctError::InvalidFormat` if the product does not fit in `usize`.
pub fn checked_area(dims: &[usize]) -> Result<usize> {
    dims.iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| OctError::invalid(format!("record dimensions {:?} overflow", dims)))
}

/// Fail with `SizeMismatch` unless `needed` bytes fit in the `available`
/// bytes left in the enclosing container.
pub fn check_fits(what: &'static str, needed: usize, available: u64) -> Result<()> {
    if needed as u64 > available {
        return Err(OctError::SizeMismatch {
            what,
            expected: needed,
            found: usize::try_from(available).unwrap_or(usize::MAX),
        });
    }
    Ok(())
}

/// Whether the textual form of `path` ends with the literal `suffix`.
pub fn has_suffix<P: AsRef<Path>>(path: P, suffix: &str) -> bool {
    path.as_ref().to_string_lossy().ends_with(suffix)
}

/// Parse a decimal number the way device manifests write it, tolerating
/// surrounding whitespace.
pub fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| OctError::invalid(format!("bad number \"{}\" for {}", value, key)))
}
