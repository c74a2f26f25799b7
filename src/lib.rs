//! Readers for Optical Coherence Tomography (OCT) eye-scan files.
//!
//! Files produced by several ophthalmic devices (Topcon `.fda`, Heidelberg
//! `.e2e`, Nidek `x.xml` manifests and Eyetec `.exd` archives) are decoded
//! into a single [`Subject`] model, which can then be saved to and loaded from
//! the tool-agnostic uoctml interchange format, or fed to the retinal
//! thickness [sector analysis](sectors/index.html).
//!
//! # Example
//!
//! ```no_run
//! use uoct::{ReaderOptions, WriterOptions};
//! use uoct::sectors::{sector_values, ContourSelection};
//! # use uoct::Result;
//!
//! # fn run() -> Result<()> {
//! let subject = ReaderOptions::new().read_file("patient.e2e")?;
//! for (id, scan) in &subject.scans {
//!     let sectors = sector_values(scan, ContourSelection::Default)?;
//!     println!("{}: {:.3} mm³", id, sectors.total_volume);
//! }
//! WriterOptions::new("patient.uoctml")
//!     .anonymize(true)
//!     .write_subject(&subject)?;
//! # Ok(())
//! # }
//! ```
#![deny(missing_debug_implementations)]
#![warn(missing_docs, unused_extern_crates, trivial_casts, unused_results)]

#[macro_use]
extern crate quick_error;
#[macro_use]
extern crate num_derive;

pub mod batch;
pub mod error;
pub mod format;
pub mod j2k;
pub mod raster;
pub mod reader;
pub mod sectors;
pub mod subject;
pub mod typedef;
pub mod writer;
mod util;
mod xml;

pub use crate::error::{ErrorCategory, OctError, Result};
pub use crate::j2k::Jpeg2000Decoder;
pub use crate::raster::{Image, RasterElement, Volume};
#[cfg(feature = "ndarray_volumes")]
pub use crate::raster::IntoNdArray;
pub use crate::reader::{OctReader, ReaderId, ReaderOptions, ReaderRegistry};
pub use crate::subject::{BoundingBox, Info, Scan, Subject};
pub use crate::typedef::Sector;
pub use crate::writer::WriterOptions;
