//! Module for the normalized OCT data model: a [`Subject`] owns its
//! [`Scan`]s, which in turn own their rasters.

use std::collections::BTreeMap;

use crate::raster::{Image, Volume};

/// Free-form, string-keyed metadata. Keys iterate in lexical order.
pub type Info = BTreeMap<String, String>;

/// Axis-parallel bounding box in fundus pixel coordinates.
///
/// `minx <= maxx` and `miny <= maxy` are expected but not enforced: some
/// devices encode the box in ways that can produce inverted bounds, and
/// those are preserved as read.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    /// left
    pub minx: u32,
    /// right
    pub maxx: u32,
    /// lower
    pub miny: u32,
    /// upper
    pub maxy: u32,
}

impl BoundingBox {
    /// Whether both axes have their minimum at or below their maximum.
    pub fn is_ordered(&self) -> bool {
        self.minx <= self.maxx && self.miny <= self.maxy
    }
}

/// One OCT C-scan acquisition.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Scan {
    /// Photographic eye image, 1 or 3 channels.
    pub fundus: Image<u8>,
    /// Region of the fundus image covered by the tomogram.
    pub range: BoundingBox,
    /// Physical extent in millimeters along the width, depth and height
    /// axes of the scan. The axis order follows the acquiring device's
    /// convention: `size[0]` is the B-scan width, `size[1]` the A-scan
    /// depth and `size[2]` the extent across B-scans.
    pub size: [f32; 3],
    /// Reconstructed B-scan stack.
    pub tomogram: Volume<u8>,
    /// Layer boundary height-maps by name, one sample per lateral cell.
    pub contours: BTreeMap<String, Image<f32>>,
    /// Scan metadata. Recognized keys include `"scan date"`,
    /// `"laterality"` (`"L"`/`"R"`) and `"fixation"`.
    pub info: Info,
}

/// All scans of one patient.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Subject {
    /// Scans by scan id.
    pub scans: BTreeMap<String, Scan>,
    /// Patient metadata. Recognized keys include `"name"`, `"birth date"`,
    /// `"sex"` and `"ID"`.
    pub info: Info,
}

impl Subject {
    /// Create a subject with no scans and no metadata.
    pub fn new() -> Self {
        Subject::default()
    }

    /// Fetch the scan with the given id, inserting an empty one if absent.
    pub fn scan_mut(&mut self, id: &str) -> &mut Scan {
        self.scans.entry(id.to_owned()).or_default()
    }

    /// Whether no scan was read into this subject.
    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }
}
