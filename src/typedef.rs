//! This module contains enumerations of the numeric codes found in OCT
//! files and of the standard retinal thickness sectors. Primitive integer
//! values can be converted to these types through `num_traits::FromPrimitive`.

use std::fmt;

/// One of the nine regions of the standard macular thickness grid: a
/// central disc of 0.5 mm radius and two rings (to 1.5 mm and 3 mm) each
/// split into four quadrants.
///
/// The discriminant is the position of the sector in
/// [`SectorValues::stats`](../sectors/struct.SectorValues.html).
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, FromPrimitive)]
pub enum Sector {
    /// Central disc.
    Center = 0,
    /// Inner ring, superior quadrant.
    InnerTop = 1,
    /// Inner ring, right quadrant.
    InnerRight = 2,
    /// Inner ring, left quadrant.
    InnerLeft = 3,
    /// Inner ring, inferior quadrant.
    InnerBottom = 4,
    /// Outer ring, superior quadrant.
    OuterTop = 5,
    /// Outer ring, right quadrant.
    OuterRight = 6,
    /// Outer ring, left quadrant.
    OuterLeft = 7,
    /// Outer ring, inferior quadrant.
    OuterBottom = 8,
}

impl Sector {
    /// All sectors in grid order.
    pub const ALL: [Sector; 9] = [
        Sector::Center,
        Sector::InnerTop,
        Sector::InnerRight,
        Sector::InnerLeft,
        Sector::InnerBottom,
        Sector::OuterTop,
        Sector::OuterRight,
        Sector::OuterLeft,
        Sector::OuterBottom,
    ];

    /// Position of this sector in a 9-vector of sector values.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Short clinical label of the sector.
    pub fn label(self) -> &'static str {
        use Sector::*;
        match self {
            Center => "center",
            InnerTop => "inner top",
            InnerRight => "inner right",
            InnerLeft => "inner left",
            InnerBottom => "inner bottom",
            OuterTop => "outer top",
            OuterRight => "outer right",
            OuterLeft => "outer left",
            OuterBottom => "outer bottom",
        }
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Scan pattern code of a Topcon `@IMG_JPEG` chunk.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, FromPrimitive)]
pub enum TopconScanType {
    /// single B-scan
    Line = 0,
    /// 3-D raster
    Volume = 2,
    /// radial B-scans
    RadialLine = 3,
    /// seven parallel lines
    SevenLine = 7,
    /// five lines in a cross
    FiveLineCross = 11,
}

impl TopconScanType {
    /// Text stored under the scan's `"type"` info key.
    pub fn label(self) -> &'static str {
        use TopconScanType::*;
        match self {
            Line => "line",
            Volume => "volume",
            RadialLine => "radial line",
            SevenLine => "7 line",
            FiveLineCross => "5 line cross",
        }
    }
}

/// Fixation target of a Topcon acquisition, given by the file subtype.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Fixation {
    /// `FOCTFDA` files
    Macula,
    /// `FOCTFAA` files
    External,
}

impl Fixation {
    /// Recognize the 3-byte subtype following the `FOCT` magic.
    pub fn from_subtype(subtype: &[u8]) -> Option<Self> {
        match subtype {
            b"FDA" => Some(Fixation::Macula),
            b"FAA" => Some(Fixation::External),
            _ => None,
        }
    }

    /// Text stored under the scan's `"fixation"` info key.
    pub fn label(self) -> &'static str {
        match self {
            Fixation::Macula => "macula",
            Fixation::External => "external",
        }
    }
}
