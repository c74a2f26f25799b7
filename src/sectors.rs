//! Retinal thickness quantification over the standard nine-sector grid.
//!
//! The grid is centered on the middle of the contour raster. Every cell is
//! placed at its physical offset `(mx, my)` from the center, in
//! millimeters, using the scan's lateral [`size`](../subject/struct.Scan.html#structfield.size).
//! Cells within 0.5 mm form the central disc, cells within 1.5 mm and 3 mm
//! the inner and outer rings. Rings are split into quadrants along the
//! diagonals. Cells without a measurement (NaN) are ignored altogether.
use crate::error::{OctError, Result};
use crate::raster::Image;
use crate::subject::Scan;
use crate::typedef::Sector;

/// Squared radius of the central disc, in mm².
const CENTER_R2: f64 = 0.25;
/// Squared outer radius of the inner ring, in mm².
const INNER_R2: f64 = 2.25;
/// Squared outer radius of the outer ring, in mm².
const OUTER_R2: f64 = 9.0;

/// Which pair of contours delimits the measured layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContourSelection {
    /// The first contour and the last one, or the one before the last if
    /// the last has no measurement at its center.
    Default,
    /// Contours at the given positions in name order. The first index must
    /// be lower than the second.
    Pair(usize, usize),
}

impl Default for ContourSelection {
    fn default() -> Self {
        ContourSelection::Default
    }
}

/// Accumulated thickness of one sector.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SectorStat {
    /// Sum of the thickness of every counted cell, in mm.
    pub sum: f64,
    /// Number of counted cells.
    pub count: usize,
}

impl SectorStat {
    fn add(&mut self, d: f64) {
        self.sum += d;
        self.count += 1;
    }

    /// Average thickness, or `None` if no cell fell into the sector.
    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

/// Result of a sector analysis.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SectorValues {
    /// Per sector accumulators, indexed by [`Sector::index`].
    pub stats: [SectorStat; 9],
    /// Volume within 3 mm of the center, in mm³.
    pub total_volume: f64,
    /// Average thickness within 3 mm of the center, in mm. NaN if no cell
    /// was measured.
    pub average_thickness: f64,
}

impl SectorValues {
    /// Statistics of a single sector.
    pub fn get(&self, sector: Sector) -> &SectorStat {
        &self.stats[sector.index()]
    }

    /// Average thickness of every sector in grid order. Empty sectors are
    /// reported as NaN.
    pub fn averages(&self) -> [f64; 9] {
        let mut out = [f64::NAN; 9];
        for (o, s) in out.iter_mut().zip(&self.stats) {
            if let Some(m) = s.mean() {
                *o = m;
            }
        }
        out
    }
}

/// Sector of the cell at offset `(mx, my)` mm from the grid center, or
/// `None` beyond the outer ring.
pub fn classify(mx: f64, my: f64) -> Option<Sector> {
    let r2 = mx * mx + my * my;
    let ring = if r2 <= CENTER_R2 {
        return Some(Sector::Center);
    } else if r2 <= INNER_R2 {
        [Sector::InnerTop, Sector::InnerRight, Sector::InnerLeft, Sector::InnerBottom]
    } else if r2 <= OUTER_R2 {
        [Sector::OuterTop, Sector::OuterRight, Sector::OuterLeft, Sector::OuterBottom]
    } else {
        return None;
    };
    let [top, right, left, bottom] = ring;
    Some(match (mx <= my, mx + my >= 0.) {
        (true, true) => bottom,
        (true, false) => left,
        (false, true) => right,
        (false, false) => top,
    })
}

/// Whether the middle sample of a contour is missing.
fn center_is_nan(contour: &Image<f32>) -> bool {
    contour
        .at(contour.width() / 2, contour.height() / 2)
        .map_or(true, f32::is_nan)
}

/// Millimeters per tomogram pixel along the depth axis.
fn depth_scale(scan: &Scan) -> Result<f64> {
    let h = scan.tomogram.height();
    if h == 0 {
        return Err(OctError::InvalidContours(
            "scan has no tomogram to scale depths".to_owned(),
        ));
    }
    Ok(f64::from(scan.size[1]) / h as f64)
}

/// Run the grid over a `width` x `height` raster whose thickness at each
/// cell is given by `thickness`.
fn accumulate<F>(scan: &Scan, width: usize, height: usize, thickness: F) -> Result<SectorValues>
where
    F: Fn(usize, usize) -> Result<f64>,
{
    if width == 0 || height == 0 {
        return Err(OctError::InvalidContours("empty contour".to_owned()));
    }
    let (sx, sz) = (f64::from(scan.size[0]), f64::from(scan.size[2]));
    let (xn, yn) = (width as f64, height as f64);

    let mut values = SectorValues::default();
    let mut total = SectorStat::default();
    for y in 0..height {
        let my = sz * (2. * y as f64 + 1. - yn) / 2. / yn;
        for x in 0..width {
            let d = thickness(x, y)?;
            if d.is_nan() {
                continue;
            }
            let mx = sx * (2. * x as f64 + 1. - xn) / 2. / xn;
            if let Some(sector) = classify(mx, my) {
                total.add(d);
                values.stats[sector.index()].add(d);
            }
        }
    }
    values.total_volume = total.sum * sx * sz / xn / yn;
    values.average_thickness = total.sum / total.count as f64;
    Ok(values)
}

/// Thickness of the layer between two contours of `scan`.
///
/// # Errors
///
/// - `OctError::InvalidContours` if fewer than two usable contours exist,
/// if the indices are out of order or out of range, or if the two contours
/// differ in size.
pub fn sector_values(scan: &Scan, selection: ContourSelection) -> Result<SectorValues> {
    let contours: Vec<&Image<f32>> = scan.contours.values().collect();
    let count = contours.len();
    let (base, other) = match selection {
        ContourSelection::Default => {
            if count == 0 {
                return Err(OctError::InvalidContours("no contour available".to_owned()));
            }
            let mut other = count - 1;
            if center_is_nan(contours[other]) && other > 0 {
                other -= 1;
            }
            if other == 0 {
                return Err(OctError::InvalidContours("no contour available".to_owned()));
            }
            (0, other)
        }
        ContourSelection::Pair(c1, c2) => {
            if c1 >= c2 {
                return Err(OctError::InvalidContours(format!(
                    "contour {} must come before contour {}",
                    c1, c2
                )));
            }
            if c2 >= count {
                return Err(OctError::InvalidContours(format!(
                    "contour {} requested but the scan has {}",
                    c2, count
                )));
            }
            (c1, c2)
        }
    };

    let (o1, o2) = (contours[base], contours[other]);
    if o1.width() != o2.width() || o1.height() != o2.height() {
        return Err(OctError::InvalidContours(format!(
            "contour sizes differ: {}x{} and {}x{}",
            o1.width(),
            o1.height(),
            o2.width(),
            o2.height()
        )));
    }
    let scale = depth_scale(scan)?;
    accumulate(scan, o1.width(), o1.height(), |x, y| {
        let delta = f64::from(o2.at(x, y)?) - f64::from(o1.at(x, y)?);
        Ok((scale * delta).abs())
    })
}

/// Absolute depth of a single contour, as if measured from the top of the
/// tomogram.
pub fn depth_values(scan: &Scan, contour: &Image<f32>) -> Result<SectorValues> {
    let scale = depth_scale(scan)?;
    accumulate(scan, contour.width(), contour.height(), |x, y| {
        Ok((scale * f64::from(contour.at(x, y)?)).abs())
    })
}

/// Depth sector values of every contour of `scan` in name order, leaving
/// out the contours without a measurement at their center.
pub fn contour_values(scan: &Scan) -> Result<Vec<(String, SectorValues)>> {
    scan.contours
        .iter()
        .filter(|(_, c)| !center_is_nan(c))
        .map(|(name, c)| Ok((name.clone(), depth_values(scan, c)?)))
        .collect()
}
