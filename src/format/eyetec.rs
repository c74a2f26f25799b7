//! Reader of Eyetec `.exd` exports.
//!
//! An export is a zip archive. Everything of interest lives under
//! `PatientsFiles/`: the `DBData.xml` index describes the patient and lists,
//! per acquisition, the archive entries holding its data. Each such entry is
//! a gzip stream of little endian records whose layout depends on the
//! content type declared in the index.
use flate2::read::GzDecoder;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek};
use std::path::Path;
use zip::ZipArchive;

use crate::error::{OctError, Result};
use crate::raster::{Image, Volume};
use crate::reader::OctReader;
use crate::subject::{BoundingBox, Info, Scan, Subject};
use crate::util::{checked_area, parse_number, ReadLe};
use crate::xml::{self, Attributes, XmlHandler};

const PATH_PREFIX: &str = "PatientsFiles/";
const INDEX_NAME: &str = "DBData.xml";

/// Number of layer boundaries in an `AnalysedData` entry.
const NUM_CONTOURS: usize = 10;
/// Contour samples are stored in units of 1/1.7 pixel.
const CONTOUR_SCALE: f32 = 1.7;
/// Physical width and height of every Eyetec volume, in millimeters.
const SCAN_WIDTH: f32 = 12.;
const SCAN_HEIGHT: f32 = 9.;
/// Axial resolution, in millimeters per pixel.
const DEPTH_RESOLUTION: f32 = 0.0017;
/// Bytes following every B-scan.
const SLICE_PADDING: u64 = 128 + 24;

/// Subject level index elements and the info keys they are stored under.
const SUBJECT_KEYS: &[(&str, &str)] = &[
    ("PatientNameGroup1", "name"),
    ("PatientBirthDate", "birth date"),
    ("PatientSex", "sex"),
    ("EthnicGroup", "ethnicity"),
    ("ManufacturerModelName", "ManufacturerModelName"),
    ("DeviceSerialNumber", "DeviceSerialNumber"),
    ("SoftwareVersion", "SoftwareVersion"),
    ("SoftwareName", "SoftwareName"),
];

/// Reader of `.exd` archives.
#[derive(Debug, Default, Clone, Copy)]
pub struct EyetecReader;

impl OctReader for EyetecReader {
    fn name(&self) -> &str {
        "Eyetec"
    }

    fn extensions(&self) -> &[&'static str] {
        &[".exd"]
    }

    fn decode(&self, path: &Path) -> Result<Subject> {
        read_exd(path)
    }
}

/// Kind of data held by an archive entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Content {
    AnalysedData,
    Images,
    Tomograms,
}

impl Content {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "AnalysedData" => Some(Content::AnalysedData),
            "Images" => Some(Content::Images),
            "Tomograms" => Some(Content::Tomograms),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct Index {
    info: Info,
    scans: BTreeMap<String, Scan>,
    /// Entry path below `PatientsFiles/` to content type and scan id.
    entries: BTreeMap<String, (Content, String)>,

    text: String,
    series: u64,
    instance: u64,
    laterality: String,
    content_date: String,
    file_name: String,
    file_type: String,
    pending: Vec<(String, String)>,
}

impl XmlHandler for Index {
    fn start(&mut self, name: &str, _attrs: &Attributes) -> Result<()> {
        self.text.clear();
        if name == "Contents" {
            self.pending.clear();
        }
        Ok(())
    }

    fn end(&mut self, name: &str) -> Result<()> {
        if let Some((_, key)) = SUBJECT_KEYS.iter().find(|(n, _)| *n == name) {
            let _ = self.info.insert((*key).to_owned(), self.text.clone());
            return Ok(());
        }
        match name {
            "SeriesNumber" => self.series = parse_number(name, &self.text)?,
            "InstanceNumber" => self.instance = parse_number(name, &self.text)?,
            "ContentLaterality" => self.laterality = self.text.clone(),
            "ContentDateTime" => self.content_date = self.text.clone(),
            "Name" => self.file_name = self.text.clone(),
            "Type" => self.file_type = self.text.clone(),
            "FileDetails" => self
                .pending
                .push((self.file_name.clone(), self.file_type.clone())),
            "Contents" => {
                let id = format!("{}.{}", self.series, self.instance);
                let scan = self.scans.entry(id.clone()).or_default();
                let _ = scan
                    .info
                    .insert("scan date".to_owned(), self.content_date.clone());
                let _ = scan
                    .info
                    .insert("laterality".to_owned(), self.laterality.clone());
                for (file, kind) in self.pending.drain(..) {
                    match Content::from_name(&kind) {
                        Some(content) => {
                            let _ = self.entries.insert(file, (content, id.clone()));
                        }
                        None => debug!("ignoring {} entry {}", kind, file),
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        self.text.push_str(text);
        Ok(())
    }
}

/// Read an Eyetec archive from disk.
pub fn read_exd<P: AsRef<Path>>(path: P) -> Result<Subject> {
    read_exd_from(BufReader::new(File::open(path)?))
}

/// Read an Eyetec archive from any seekable source.
pub fn read_exd_from<R: Read + Seek>(source: R) -> Result<Subject> {
    let mut archive = ZipArchive::new(source)?;

    let mut index = Index::default();
    {
        let entry = archive
            .by_name(&format!("{}{}", PATH_PREFIX, INDEX_NAME))
            .map_err(|_| OctError::invalid("archive has no DBData.xml index"))?;
        xml::parse(BufReader::new(entry), &mut index)?;
    }
    let Index {
        info,
        mut scans,
        entries,
        ..
    } = index;

    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        let relative = match entry.name().strip_prefix(PATH_PREFIX) {
            Some(relative) if relative != INDEX_NAME && !entry.is_dir() => relative.to_owned(),
            _ => continue,
        };
        let (content, id) = match entries.get(&relative) {
            Some(target) => target,
            None => {
                warn!("archive entry {} is not listed in the index", relative);
                continue;
            }
        };
        debug!("reading {:?} entry {} of scan {}", content, relative, id);
        let scan = scans.entry(id.clone()).or_default();
        let mut payload = GzDecoder::new(entry);
        match content {
            Content::AnalysedData => read_contours(&mut payload, scan)?,
            Content::Images => read_fundus(&mut payload, scan)?,
            Content::Tomograms => read_volume(&mut payload, scan)?,
        }
    }

    let mut subject = Subject::new();
    subject.info = info;
    subject.scans = scans;
    Ok(subject)
}

/// Number of samples of a `width` x `height` record.
fn area(width: u32, height: u32) -> Result<usize> {
    checked_area(&[width as usize, height as usize])
}

/// Discard up to `n` bytes of padding which may be cut short at the end of
/// the stream.
fn skip_padding<R: Read>(source: &mut R, n: u64) -> Result<()> {
    let _ = io::copy(&mut source.take(n), &mut io::sink())?;
    Ok(())
}

fn read_contours<R: Read>(source: &mut R, scan: &mut Scan) -> Result<()> {
    for i in 0..NUM_CONTOURS {
        source.skip(4)?;
        let width = source.le_u32()?;
        let height = source.le_u32()?;
        let n = area(width, height)?;
        source.skip(8)?;
        let samples = source.le_u16_vec(n)?;
        let values = samples
            .into_iter()
            .map(|v| f32::from(v) / CONTOUR_SCALE)
            .collect();
        let img = Image::from_raw(1, width as usize, height as usize, values)?;
        let _ = scan.contours.insert(format!("CONTOUR{}", i), img);
        skip_padding(source, n as u64 + 128 + 4)?;
    }
    Ok(())
}

fn read_fundus<R: Read>(source: &mut R, scan: &mut Scan) -> Result<()> {
    // eye photograph
    source.skip(4)?;
    let width = source.le_u32()?;
    let height = source.le_u32()?;
    source.skip(16 + area(width, height)? as u64)?;

    source.skip(128)?;
    let width = source.le_u32()?;
    let height = source.le_u32()?;
    source.skip(16)?;
    let data = source.bytes_vec(area(width, height)?)?;
    scan.fundus = Image::from_raw(1, width as usize, height as usize, data)?;
    scan.range = BoundingBox {
        minx: 0,
        maxx: width,
        miny: 0,
        maxy: height,
    };

    // maximum intensity projection
    source.skip(128)?;
    let width = source.le_u32()?;
    let height = source.le_u32()?;
    skip_padding(source, 16 + area(width, height)? as u64)
}

fn read_volume<R: Read>(source: &mut R, scan: &mut Scan) -> Result<()> {
    source.skip(4)?;
    let width = source.le_u32()?;
    let height = source.le_u32()?;
    let depth = source.le_u32()?;
    let n = area(width, height)?;
    let _ = checked_area(&[n, depth as usize])?;

    source.skip(24)?;
    // grows with the decompressed slices only
    let mut samples = Vec::new();
    for z in 0..depth {
        samples.extend(source.bytes_vec(n)?);
        if z + 1 < depth {
            source.skip(SLICE_PADDING)?;
        } else {
            skip_padding(source, SLICE_PADDING)?;
        }
    }
    scan.tomogram = Volume::from_raw(width as usize, height as usize, depth as usize, samples)?;
    scan.size = [SCAN_WIDTH, DEPTH_RESOLUTION * height as f32, SCAN_HEIGHT];
    Ok(())
}
