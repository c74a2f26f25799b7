//! Reader of Nidek OCT exports.
//!
//! An export is a set of sibling files sharing a common prefix `<base>`:
//!
//! - `<base>x.xml`: the manifest with device and scan parameters;
//! - `<base>.bmp`: the fundus photograph;
//! - `<base>oct_c_001.bmp`, `<base>oct_c_002.bmp`, ...: the B-scans of a
//!   `MaculaMap` volume, or `<base>oct_c_xh1.bmp` for single line patterns;
//! - `<base>oct_m.dat`: layer boundaries as 16-bit samples.
//!
//! Manifest values used to compute the scan geometry are removed from the
//! scan's info; device identity and pattern keys are kept.
use log::debug;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{OctError, Result};
use crate::raster::{Image, Volume};
use crate::reader::OctReader;
use crate::subject::{Info, Scan, Subject};
use crate::util::{check_fits, checked_area, parse_number, ReadLe};
use crate::xml::{self, Attributes, XmlHandler};

const MANIFEST_SUFFIX: &str = "x.xml";

/// Manifest elements stored under their own name.
const KEPT_ELEMENTS: &[&str] = &[
    "Serial",
    "Version",
    "Model",
    "Product",
    "Manufacture",
    "ScanPattern",
    "ScanPointA",
    "ScanCenterX",
    "ScanCenterY",
    "ScanWidth1",
    "OCTDepthResolution",
    "SLOPixelSpacing",
    "CCDPixelSpacing",
];

/// Manifest elements only meaningful for volume scans.
const MACULA_MAP_ELEMENTS: &[&str] = &["ScanType", "ScanPointB", "ScanWidth2"];

const MACULA_MAP: &str = "MaculaMap";

/// Offset of the slice count in `oct_m.dat`.
const CONTOUR_FILE_HEADER: u64 = 24;
/// Bytes preceding each slice's scanlines in `oct_m.dat`.
const CONTOUR_SLICE_HEADER: u64 = 12;

/// Reader of `x.xml` manifests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NidekReader;

impl OctReader for NidekReader {
    fn name(&self) -> &str {
        "Nidek OCT"
    }

    fn extensions(&self) -> &[&'static str] {
        &[MANIFEST_SUFFIX]
    }

    fn decode(&self, path: &Path) -> Result<Subject> {
        read_nidek(path)
    }
}

#[derive(Debug, Default)]
struct Manifest {
    info: Info,
    text: String,
}

impl XmlHandler for Manifest {
    fn start(&mut self, _name: &str, _attrs: &Attributes) -> Result<()> {
        self.text.clear();
        Ok(())
    }

    fn end(&mut self, name: &str) -> Result<()> {
        let macula_map = self.info.get("ScanPattern").map(String::as_str) == Some(MACULA_MAP);
        let key = if KEPT_ELEMENTS.contains(&name)
            || (macula_map && MACULA_MAP_ELEMENTS.contains(&name))
        {
            name
        } else if name == "Eye" {
            "laterality"
        } else if name == "ReleaseDate" {
            "scan date"
        } else {
            return Ok(());
        };
        let _ = self.info.insert(key.to_owned(), self.text.clone());
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        self.text.push_str(text);
        Ok(())
    }
}

/// Remove and parse a numeric manifest entry.
fn take_number<T: std::str::FromStr>(info: &mut Info, key: &str) -> Result<T> {
    let value = info
        .remove(key)
        .ok_or_else(|| OctError::MissingKey(key.to_owned()))?;
    parse_number(key, &value)
}

/// Read a Nidek export given the path of its manifest.
pub fn read_nidek<P: AsRef<Path>>(path: P) -> Result<Subject> {
    let path = path.as_ref();
    let text = path.to_string_lossy();
    let base = text
        .strip_suffix(MANIFEST_SUFFIX)
        .ok_or_else(|| OctError::invalid("manifest name must end with x.xml"))?
        .to_owned();

    let mut manifest = Manifest::default();
    xml::parse(BufReader::new(File::open(path)?), &mut manifest)?;
    let mut info = manifest.info;

    let mut scan = Scan {
        fundus: read_bmp(format!("{}.bmp", base))?,
        ..Default::default()
    };

    if info.get("ScanPattern").map(String::as_str) == Some(MACULA_MAP) {
        scan.size[2] = take_number::<f32>(&mut info, "ScanWidth2")? * 0.3;
        let num_slices: usize = take_number(&mut info, "ScanPointB")?;
        debug!("volume scan of {} slices", num_slices);
        let mut dims = None;
        let mut samples = Vec::new();
        for i in 0..num_slices {
            let img = read_bmp(format!("{}oct_c_{:03}.bmp", base, i + 1))?;
            let d = (img.width(), img.height());
            if *dims.get_or_insert(d) != d {
                return Err(OctError::invalid("size mismatch in bmp image"));
            }
            samples.extend(img.into_raw());
        }
        let (width, height) = dims.unwrap_or((0, 0));
        scan.tomogram = Volume::from_raw(width, height, num_slices, samples)?;
    } else {
        scan.size[2] = 0.;
        let img = read_bmp(format!("{}oct_c_xh1.bmp", base))?;
        scan.tomogram = Volume::from_raw(img.width(), img.height(), 1, img.into_raw())?;
    }

    scan.size[0] = take_number::<f32>(&mut info, "ScanWidth1")? * 0.3;
    scan.size[1] =
        take_number::<f32>(&mut info, "OCTDepthResolution")? * scan.tomogram.height() as f32 / 1000.;

    let center_x = take_number::<f32>(&mut info, "ScanCenterX")?.trunc();
    let center_y = take_number::<f32>(&mut info, "ScanCenterY")?.trunc();
    let spacing: f32 = take_number(&mut info, "SLOPixelSpacing")?;
    let half_w = 0.5 * scan.size[0] / spacing;
    let half_h = 0.5 * scan.size[2] / spacing;
    scan.range.minx = (1. + center_x - half_w) as u32;
    scan.range.miny = (1. + center_y - half_h) as u32;
    scan.range.maxx = (1. + center_x + half_w) as u32;
    scan.range.maxy = (1. + center_y + half_h) as u32;
    let _ = info.remove("CCDPixelSpacing");
    let _ = info.remove("ScanPointA");

    let contours = File::open(format!("{}oct_m.dat", base))?;
    read_contours(BufReader::new(contours), &mut scan)?;

    scan.info = info;
    let mut subject = Subject::new();
    let _ = subject.scans.insert(String::new(), scan);
    Ok(subject)
}

/// Read the layer boundaries of `oct_m.dat` into `CONTOUR0`, `CONTOUR1`...
fn read_contours<R: Read + Seek>(mut source: R, scan: &mut Scan) -> Result<()> {
    let width = scan.tomogram.width();
    let depth = scan.tomogram.depth();

    let len = source.seek(SeekFrom::End(0))?;
    let _ = source.seek(SeekFrom::Start(CONTOUR_FILE_HEADER))?;
    let num_slices = source.le_u32()? as usize;
    if num_slices != depth {
        return Err(OctError::SizeMismatch {
            what: "contour slice count",
            expected: depth,
            found: num_slices,
        });
    }
    let size = source.le_u32()? as usize;
    if size < 12 || width == 0 {
        return Err(OctError::invalid("unexpected contour payload size"));
    }
    // every slice record spans `size` bytes
    check_fits(
        "contour slices",
        checked_area(&[depth, size])?,
        len.saturating_sub(CONTOUR_FILE_HEADER + 8),
    )?;
    let num_contours = (size - 12) / 2 / width;
    debug!("{} contours of {}x{}", num_contours, width, depth);

    let mut images = vec![Image::<f32>::new(1, width, depth); num_contours];
    for z in 0..depth {
        source.skip(CONTOUR_SLICE_HEADER)?;
        for img in &mut images {
            let line = source.le_u16_vec(width)?;
            for (dst, v) in img.row_mut(z)?.iter_mut().zip(line) {
                *dst = f32::from(v);
            }
        }
    }
    for (k, img) in images.into_iter().enumerate() {
        let _ = scan.contours.insert(format!("CONTOUR{}", k), img);
    }
    Ok(())
}

/// Read an 8-bit grayscale Windows bitmap, bottom-up rows flipped so that
/// the first row of the file becomes the last row of the image.
pub fn read_bmp<P: AsRef<Path>>(path: P) -> Result<Image<u8>> {
    read_bmp_from(BufReader::new(File::open(path)?))
}

fn read_bmp_from<R: Read + Seek>(mut source: R) -> Result<Image<u8>> {
    let mut magic = [0u8; 2];
    source.read_exact(&mut magic)?;
    if &magic != b"BM" {
        return Err(OctError::invalid("not a bitmap"));
    }
    let _ = source.seek(SeekFrom::Start(10))?;
    let start = source.le_u32()?;
    let _ = source.seek(SeekFrom::Start(18))?;
    let width = source.le_i32()?;
    let height = source.le_i32()?;
    let _planes = source.le_u16()?;
    let bpp = source.le_u16()?;
    if bpp != 8 || width < 0 {
        return Err(OctError::invalid(format!(
            "unsupported bitmap: {} bits per pixel, width {}",
            bpp, width
        )));
    }

    let width = width as usize;
    let top_down = height < 0;
    let height = height.unsigned_abs() as usize;
    let stride = (width + 3) & !3;

    let len = source.seek(SeekFrom::End(0))?;
    check_fits(
        "bitmap pixels",
        checked_area(&[stride, height])?,
        len.saturating_sub(u64::from(start)),
    )?;
    let mut img = Image::new(1, width, height);
    let _ = source.seek(SeekFrom::Start(u64::from(start)))?;
    let mut line = vec![0u8; stride];
    for y in 0..height {
        source.read_exact(&mut line)?;
        let row = if top_down { y } else { height - 1 - y };
        img.row_mut(row)?.copy_from_slice(&line[..width]);
    }
    Ok(img)
}
