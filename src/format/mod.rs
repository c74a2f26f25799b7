//! Decoders of the supported file formats.
//!
//! Each submodule exposes an [`OctReader`](../reader/trait.OctReader.html)
//! implementation, registered by
//! [`ReaderOptions::registry`](../reader/struct.ReaderOptions.html#method.registry),
//! along with a free function decoding one file directly.

pub mod eyetec;
pub mod heidelberg;
pub mod nidek;
pub mod topcon;
pub mod uoctml;
