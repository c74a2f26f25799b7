//! Reader of Heidelberg Spectralis `.e2e` files.
//!
//! The container is a chained database. An arbitrary prefix may precede the
//! `CMDb` signature; every offset in the file is relative to it. The main
//! header is followed by the directory header of the newest directory
//! block, and directory blocks link back to older ones through their `prev`
//! field. Directory entries point at data chunks, each made of a fixed
//! 60-byte header and a tag-specific payload.
use log::{debug, trace, warn};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{OctError, Result};
use crate::raster::{Image, Volume};
use crate::reader::OctReader;
use crate::subject::{Scan, Subject};
use crate::util::{check_fits, checked_area, latin1_to_utf8, seek_to_signature, ReadLe};

const SIGNATURE: &[u8] = b"CMDb";
const HEADER_MAGIC: &[u8; 12] = b"CMDb\0\0\0\0\0\0\0\0";
const MAIN_DIR_MAGIC: &[u8; 12] = b"MDbMDir\0\0\0\0\0";
const DIR_MAGIC: &[u8; 12] = b"MDbDir\0\0\0\0\0\0";
const CHUNK_MAGIC: &[u8; 12] = b"MDbData\0\0\0\0\0";
const VERSION: u32 = 100;

const TAG_IMAGE: u32 = 0x4000_0000;
const TAG_CONTOUR: u32 = 0x0000_2723;
const TAG_PATIENT: u32 = 0x0000_0009;
const TAG_EYE: u32 = 0x0000_000B;

/// Series id of entries which belong to no series.
const NO_SERIES: u32 = 0xffff_ffff;

/// Reader of `.e2e` and `.E2E` files.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeidelbergReader;

impl OctReader for HeidelbergReader {
    fn name(&self) -> &str {
        "Heidelberg Spectralis OCT"
    }

    fn extensions(&self) -> &[&'static str] {
        &[".e2e", ".E2E"]
    }

    fn decode(&self, path: &Path) -> Result<Subject> {
        read_e2e(path)
    }
}

/// Read a Heidelberg `.e2e` file.
pub fn read_e2e<P: AsRef<Path>>(path: P) -> Result<Subject> {
    read_e2e_from(BufReader::new(File::open(path)?))
}

/// Read a Heidelberg `.e2e` stream. Scans are keyed by their decimal
/// series number.
pub fn read_e2e_from<R: BufRead + Seek>(source: R) -> Result<Subject> {
    let mut db = Database::open(source)?;

    let mut dirs = vec![];
    let mut cur = db.main_dir.cur;
    loop {
        if dirs.contains(&cur) {
            warn!("e2e directory chain loops back to {}", cur);
            break;
        }
        let dir = db.read_dir(cur, DIR_MAGIC)?;
        dirs.push(cur);
        cur = dir.prev;
        if cur == 0 {
            break;
        }
    }
    debug!("{} directory blocks", dirs.len());

    let mut chunks = vec![];
    let mut num_slices: BTreeMap<u32, u32> = BTreeMap::new();
    for &pos in dirs.iter().rev() {
        let dir = db.read_dir(pos, DIR_MAGIC)?;
        for _ in 0..dir.count {
            let entry = DirEntry::read(&mut db.source)?;
            if entry.series_id != NO_SERIES {
                let n = num_slices.entry(entry.series_id).or_insert(0);
                *n = (*n).max(entry.slice_id.wrapping_add(2) / 2);
            }
            if entry.start > entry.pos {
                chunks.push((entry.start, entry.size));
            }
        }
    }
    debug!("{} chunks in {} series", chunks.len(), num_slices.len());

    let mut subject = Subject::new();
    for (pos, size) in chunks {
        db.seek(pos)?;
        let chunk = ChunkHeader::read(&mut db.source)?;
        let bounds = Bounds {
            num_slices: num_slices.get(&chunk.series_id).copied().unwrap_or(0),
            payload: u64::from(size),
            file: db.len,
        };
        match chunk.tag {
            TAG_IMAGE => {
                let scan = subject.scan_mut(&chunk.series_id.to_string());
                read_image(&mut db.source, &chunk, &bounds, scan)?;
            }
            TAG_CONTOUR => {
                let scan = subject.scan_mut(&chunk.series_id.to_string());
                read_contour(&mut db.source, &chunk, &bounds, scan)?;
            }
            TAG_PATIENT => {
                let src = &mut db.source;
                let given = src.latin1_field(31)?;
                let family = src.latin1_field(66)?;
                let birthday = src.le_u32()?;
                let sex = src.bytes_vec(1)?;

                let name = if family.is_empty() {
                    given
                } else {
                    format!("{}, {}", family, given)
                };
                let info = &mut subject.info;
                let _ = info.insert("name".to_owned(), name);
                let _ = info.insert("birth date".to_owned(), birth_date(birthday));
                let _ = info.insert("sex".to_owned(), latin1_to_utf8(&sex));
                let _ = info.insert("ID".to_owned(), chunk.patient_id.to_string());
            }
            TAG_EYE => {
                db.source.skip(14)?;
                let code = db.source.bytes_vec(1)?;
                let scan = subject.scan_mut(&chunk.series_id.to_string());
                let _ = scan
                    .info
                    .insert("laterality".to_owned(), latin1_to_utf8(&code));
            }
            tag => trace!("skipping chunk with tag {:#010x}", tag),
        }
    }

    Ok(subject)
}

/// Positioned access to the database, relative to its signature.
struct Database<R> {
    source: R,
    base: u64,
    /// length of the whole stream
    len: u64,
    main_dir: DirHeader,
}

/// Limits on what a data chunk may declare.
#[derive(Debug, Clone, Copy)]
struct Bounds {
    /// slices of the chunk's series
    num_slices: u32,
    /// payload size from the directory entry
    payload: u64,
    /// length of the file, which must hold every slice of a series
    file: u64,
}

#[derive(Debug, Clone, Copy)]
struct DirHeader {
    count: u32,
    cur: u32,
    prev: u32,
}

#[derive(Debug, Clone, Copy)]
struct DirEntry {
    pos: u32,
    start: u32,
    size: u32,
    series_id: u32,
    slice_id: u32,
}

#[derive(Debug, Clone, Copy)]
struct ChunkHeader {
    patient_id: u32,
    series_id: u32,
    slice_id: u32,
    ind: u16,
    tag: u32,
}

fn check_magic<R: Read>(source: &mut R, magic: &[u8; 12], what: &str) -> Result<()> {
    let mut buf = [0u8; 12];
    source.read_exact(&mut buf)?;
    if &buf != magic {
        return Err(OctError::invalid(format!("error reading e2e {}", what)));
    }
    Ok(())
}

/// Magic, version and the fixed block of reserved words shared by the
/// header and directory blocks.
fn read_block_start<R: Read>(source: &mut R, magic: &[u8; 12], what: &str) -> Result<()> {
    check_magic(source, magic, what)?;
    let version = source.le_u32()?;
    if version != VERSION {
        return Err(OctError::UnsupportedVersion(format!("{} of e2e {}", version, what)));
    }
    source.skip(10 * 2)?;
    Ok(())
}

impl<R: BufRead + Seek> Database<R> {
    fn open(mut source: R) -> Result<Self> {
        let start = source.stream_position()?;
        let len = source.seek(SeekFrom::End(0))?;
        let _ = source.seek(SeekFrom::Start(start))?;
        let base = seek_to_signature(&mut source, SIGNATURE)?;
        debug!("database signature at {}", base);
        read_block_start(&mut source, HEADER_MAGIC, "header")?;
        read_block_start(&mut source, MAIN_DIR_MAGIC, "directory")?;
        let main_dir = DirHeader::read_tail(&mut source)?;
        Ok(Database {
            source,
            base,
            len,
            main_dir,
        })
    }

    fn seek(&mut self, pos: u32) -> Result<()> {
        let _ = self
            .source
            .seek(SeekFrom::Start(self.base + u64::from(pos)))?;
        Ok(())
    }

    fn read_dir(&mut self, pos: u32, magic: &[u8; 12]) -> Result<DirHeader> {
        self.seek(pos)?;
        read_block_start(&mut self.source, magic, "directory")?;
        DirHeader::read_tail(&mut self.source)
    }
}

impl DirHeader {
    fn read_tail<R: Read>(source: &mut R) -> Result<Self> {
        let count = source.le_u32()?;
        let cur = source.le_u32()?;
        let prev = source.le_u32()?;
        let _id = source.le_u32()?;
        Ok(DirHeader { count, cur, prev })
    }
}

impl DirEntry {
    fn read<R: Read>(source: &mut R) -> Result<Self> {
        let pos = source.le_u32()?;
        let start = source.le_u32()?;
        let size = source.le_u32()?;
        let _zero = source.le_u32()?;
        let _patient_id = source.le_u32()?;
        let _study_id = source.le_u32()?;
        let series_id = source.le_u32()?;
        let slice_id = source.le_u32()?;
        source.skip(2 + 2 + 4 + 4)?;
        Ok(DirEntry {
            pos,
            start,
            size,
            series_id,
            slice_id,
        })
    }
}

impl ChunkHeader {
    fn read<R: Read>(source: &mut R) -> Result<Self> {
        check_magic(source, CHUNK_MAGIC, "chunk header")?;
        source.skip(5 * 4)?;
        let patient_id = source.le_u32()?;
        let _study_id = source.le_u32()?;
        let series_id = source.le_u32()?;
        let slice_id = source.le_u32()?;
        let ind = source.le_u16()?;
        let _f = source.le_u16()?;
        let tag = source.le_u32()?;
        let _id = source.le_u32()?;
        Ok(ChunkHeader {
            patient_id,
            series_id,
            slice_id,
            ind,
            tag,
        })
    }
}

/// Depth index of a B-scan or contour row. Slices are stored newest
/// first, two ids per slice.
fn slice_index(chunk: &ChunkHeader, num_slices: u32) -> Result<usize> {
    let half = chunk.slice_id / 2;
    if half >= num_slices {
        return Err(OctError::invalid("broken slice sequence"));
    }
    Ok((num_slices - 1 - half) as usize)
}

fn read_image<R: Read>(source: &mut R, chunk: &ChunkHeader, bounds: &Bounds, scan: &mut Scan) -> Result<()> {
    let _size = source.le_u32()?;
    let _x = source.le_u32()?;
    let _y = source.le_u32()?;
    let height = source.le_u32()? as usize;
    let width = source.le_u32()? as usize;
    let area = checked_area(&[width, height])?;

    if chunk.ind == 0 {
        check_fits("fundus", area, bounds.payload)?;
        let data = source.bytes_vec(area)?;
        scan.fundus = Image::from_raw(1, width, height, data)?;
        // central region, as placed by the vendor software
        scan.range.minx = (width / 6) as u32;
        scan.range.maxx = (5 * width / 6) as u32;
        scan.range.miny = (height / 4) as u32;
        scan.range.maxy = (3 * height / 4) as u32;
        scan.size = [6., 492. * 0.0039, 4.5];
        return Ok(());
    }

    let n = bounds.num_slices;
    let z = slice_index(chunk, n)?;
    check_fits("b-scan", checked_area(&[area, 2])?, bounds.payload)?;
    if scan.tomogram.is_empty() {
        check_fits("b-scan volume", checked_area(&[area, n as usize, 2])?, bounds.file)?;
        scan.tomogram = Volume::new(width, height, n as usize);
    }
    if scan.tomogram.width() != width || scan.tomogram.height() != height {
        return Err(OctError::SizeMismatch {
            what: "b-scan",
            expected: scan.tomogram.width() * scan.tomogram.height(),
            found: area,
        });
    }
    let samples = source.le_u16_vec(area)?;
    for (dst, &v) in scan.tomogram.slice_mut(z)?.iter_mut().zip(&samples) {
        *dst = intensity(ufloat16(v));
    }
    Ok(())
}

fn read_contour<R: Read>(source: &mut R, chunk: &ChunkHeader, bounds: &Bounds, scan: &mut Scan) -> Result<()> {
    let n = bounds.num_slices;
    let y = slice_index(chunk, n)?;
    let _ = source.le_u32()?;
    let id = source.le_u32()?;
    let _ = source.le_u32()?;
    let width = source.le_u32()? as usize;
    check_fits("contour row", checked_area(&[width, 4])?, bounds.payload)?;

    let name = format!("CONTOUR{}", id);
    if !scan.contours.contains_key(&name) {
        check_fits("contour", checked_area(&[width, n as usize, 4])?, bounds.file)?;
    }
    let contour = scan
        .contours
        .entry(name)
        .or_insert_with(|| Image::new(1, width, n as usize));
    let row = contour.row_mut(y)?;
    if row.len() != width {
        return Err(OctError::SizeMismatch {
            what: "contour row",
            expected: row.len(),
            found: width,
        });
    }
    for dst in row.iter_mut() {
        let v = source.le_f32()?;
        *dst = if v == f32::MAX || v == 0. { f32::NAN } else { v };
    }
    Ok(())
}

/// Decode the unsigned 16-bit float of B-scan samples: 10 bit mantissa,
/// 6 bit exponent with a bias of 63. An exponent of 63 encodes zero.
fn ufloat16(raw: u16) -> f32 {
    let m = f32::from(raw & 0x3ff) / 1024.;
    let e = i32::from(raw >> 10);
    match e {
        0 => m * 2f32.powi(-62),
        63 => 0.,
        e => (1. + m) * 2f32.powi(e - 63),
    }
}

/// Gamma-map a linear reflectivity to an 8-bit intensity.
fn intensity(x: f32) -> u8 {
    (256. * x.powf(1. / 2.4)).min(255.) as u8
}

/// Format a birth date stored as `64 * (julian day + 14558805)`.
fn birth_date(raw: u32) -> String {
    let (year, month, day) = julian_to_gregorian(i64::from(raw / 64) - 14_558_805);
    format!("{}/{:02}/{:02}", year, month, day)
}

fn julian_to_gregorian(j: i64) -> (i64, i64, i64) {
    let f = j + 1401 + (((4 * j + 274_277) / 146_097) * 3) / 4 - 38;
    let e = 4 * f + 3;
    let g = (e % 1461) / 4;
    let h = 5 * g + 2;
    let day = (h % 153) / 5 + 1;
    let month = (h / 153 + 2) % 12 + 1;
    let year = e / 1461 - 4716 + (12 + 2 - month) / 12;
    (year, month, day)
}
