//! Reader of Topcon 3D OCT `.fda` files.
//!
//! A file starts with the 7-byte magic `FOCTFDA` (macula fixation) or
//! `FOCTFAA` (external fixation) and 8 reserved bytes, followed by a flat
//! sequence of chunks:
//!
//! | field      | type              |
//! |------------|-------------------|
//! | tag length | `u8` (0 ends)     |
//! | tag        | latin-1 text      |
//! | size       | `u32`             |
//! | payload    | `size` bytes      |
//!
//! Whatever a chunk handler consumes, reading always resumes right after
//! the declared payload. Images are embedded as JPEG 2000 codestreams, each
//! prefixed by its `u32` byte length.
use log::{debug, trace, warn};
use num_traits::FromPrimitive;
use rgb::FromSlice;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use crate::error::{OctError, Result};
use crate::j2k::Jpeg2000Decoder;
use crate::raster::{Image, Volume};
use crate::reader::OctReader;
use crate::subject::{BoundingBox, Scan, Subject};
use crate::typedef::{Fixation, TopconScanType};
use crate::util::{check_fits, checked_area, ReadLe};

const MAGIC: &[u8; 4] = b"FOCT";

/// Chunks which are understood but carry nothing worth keeping.
const IGNORED_CHUNKS: &[&str] = &[
    "@ALIGN_INFO",
    "@ANTERIOR_CALIB_INFO",
    "@EFFECTIVE_SCAN_RANGE",
    "@FAST_Q2_INFO",
    "@FDA_FILE_INFO",
    "@GLA_LITTMANN_01",
    "@IMG_PROJECTION",
    "@MAIN_MODULE_INFO",
    "@PARAM_OBS_02",
    "@PARAM_TRC_02",
    "@PATIENTEXT_INFO",
    "@REPORT_INFO",
    "@RESULT_CORNEA_CURVE",
    "@RESULT_CORNEA_THICKNESS",
    "@THUMBNAIL",
];

/// Reader of `.fda` files.
#[derive(Debug, Clone)]
pub struct TopconReader {
    decoder: Arc<dyn Jpeg2000Decoder>,
}

impl TopconReader {
    /// Create a reader decoding embedded images with `decoder`.
    pub fn new(decoder: Arc<dyn Jpeg2000Decoder>) -> Self {
        TopconReader { decoder }
    }
}

impl OctReader for TopconReader {
    fn name(&self) -> &str {
        "Topcon OCT"
    }

    fn extensions(&self) -> &[&'static str] {
        &[".fda"]
    }

    fn decode(&self, path: &Path) -> Result<Subject> {
        read_fda(path, self.decoder.as_ref())
    }
}

/// Read a Topcon `.fda` file.
pub fn read_fda<P: AsRef<Path>>(path: P, decoder: &dyn Jpeg2000Decoder) -> Result<Subject> {
    let file = BufReader::new(File::open(path)?);
    read_fda_from(file, decoder)
}

/// Read a Topcon `.fda` stream. The single scan it holds gets the empty
/// string as id.
pub fn read_fda_from<R: Read + Seek>(mut source: R, decoder: &dyn Jpeg2000Decoder) -> Result<Subject> {
    let mut subject = Subject::new();
    let mut parser = Parser {
        decoder,
        scan: Scan::default(),
        contours: Vec::new(),
        have_trc_fundus: false,
        end: 0,
    };

    let mut magic = [0u8; 7];
    source.read_exact(&mut magic)?;
    if &magic[..4] != MAGIC {
        return Err(OctError::invalid("not a valid FDA file"));
    }
    if let Some(fixation) = Fixation::from_subtype(&magic[4..]) {
        parser.set_info("fixation", fixation.label());
    }
    source.skip(8)?;

    loop {
        let mut len = [0u8];
        if source.read(&mut len)? == 0 || len[0] == 0 {
            break;
        }
        let tag = source.latin1_field(len[0] as usize)?;
        let size = source.le_u32()?;
        let resume = source.stream_position()? + u64::from(size);
        debug!("chunk {} ({} bytes)", tag, size);

        parser.end = resume;
        parser.chunk(&tag, &mut source, &mut subject)?;
        let _ = source.seek(SeekFrom::Start(resume))?;
    }

    Ok(parser.finish(subject))
}

struct Parser<'a> {
    decoder: &'a dyn Jpeg2000Decoder,
    scan: Scan,
    /// contours read from this file, inverted once the tomogram height is known
    contours: Vec<String>,
    have_trc_fundus: bool,
    /// end of the current chunk's payload
    end: u64,
}

fn date(year: u16, month: u16, day: u16) -> String {
    format!("{}/{:02}/{:02}", year, month, day)
}

fn read_date_time<R: Read>(source: &mut R) -> Result<String> {
    let mut v = [0u16; 6];
    for x in &mut v {
        *x = source.le_u16()?;
    }
    Ok(format!(
        "{} {:02}:{:02}:{:02}",
        date(v[0], v[1], v[2]),
        v[3],
        v[4],
        v[5]
    ))
}

/// Decode the registration box: either the absolute corners or, when the
/// last corner is zero, a center and half-extent.
fn registration_box(minx: u32, miny: u32, maxx: u32, maxy: u32) -> BoundingBox {
    if maxy != 0 {
        BoundingBox {
            minx,
            miny,
            maxx,
            maxy,
        }
    } else {
        BoundingBox {
            minx: minx.wrapping_sub(maxx),
            miny: miny.wrapping_sub(maxx),
            maxx: minx.wrapping_add(maxx),
            maxy: miny.wrapping_add(maxx),
        }
    }
}

impl<'a> Parser<'a> {
    fn set_info(&mut self, key: &str, value: &str) {
        let _ = self.scan.info.insert(key.to_owned(), value.to_owned());
    }

    /// Payload bytes left in the current chunk.
    fn remaining<S: Seek>(&self, source: &mut S) -> Result<u64> {
        Ok(self.end.saturating_sub(source.stream_position()?))
    }

    fn read_j2k<R: Read>(&self, source: &mut R, channels: usize, width: usize, height: usize) -> Result<Image<u8>> {
        let size = source.le_u32()? as usize;
        let buf = source.bytes_vec(size)?;
        let img = self.decoder.decode(&buf)?;
        if img.channels() != channels || img.width() != width || img.height() != height {
            return Err(OctError::invalid(format!(
                "size mismatch in jpeg2000 image: {}x{}x{} instead of {}x{}x{}",
                img.channels(),
                img.width(),
                img.height(),
                channels,
                width,
                height
            )));
        }
        Ok(img)
    }

    fn chunk<R: Read + Seek>(&mut self, tag: &str, source: &mut R, subject: &mut Subject) -> Result<()> {
        match tag {
            "@CAPTURE_INFO_02" => {
                source.skip(2 + 0x68)?;
                let when = read_date_time(source)?;
                self.set_info("scan date", &when);
            }
            "@CONTOUR_INFO" => self.contour(source)?,
            "@HW_INFO_03" => {
                let model = source.latin1_field(16)?;
                self.set_info("hw model", &model);
                let serial = source.latin1_field(16)?;
                self.set_info("hw serial", &serial);
                source.skip(32)?;
                let version = source.latin1_field(16)?;
                self.set_info("hw versions[0]", &version);
                let build = read_date_time(source)?;
                self.set_info("hw build date", &build);
                source.skip(8)?;
                for i in 1..6 {
                    let version = source.latin1_field(16)?;
                    self.set_info(&format!("hw versions[{}]", i), &version);
                }
            }
            "@IMG_FUNDUS" => {
                let width = source.le_u32()? as usize;
                let height = source.le_u32()? as usize;
                let bpp = source.le_u32()? as usize;
                let depth = source.le_u32()?;
                source.skip(4)?;
                if depth != 1 {
                    return Err(OctError::invalid("unexpected image parameters"));
                }
                let mut img = self.read_j2k(source, bpp / 8, width, height)?;
                if img.channels() == 3 {
                    for px in img.as_mut_slice().as_rgb_mut() {
                        std::mem::swap(&mut px.r, &mut px.b);
                    }
                }
                if !self.have_trc_fundus {
                    self.scan.fundus = img;
                }
            }
            "@IMG_JPEG" => {
                let code = source.le_u8()?;
                if let Some(kind) = TopconScanType::from_u8(code) {
                    self.set_info("type", kind.label());
                }
                source.skip(8)?;
                let width = source.le_u32()? as usize;
                let height = source.le_u32()? as usize;
                let depth = source.le_u32()? as usize;
                source.skip(4)?;

                let _ = checked_area(&[width, height, depth])?;
                check_fits("b-scans", checked_area(&[depth, 4])?, self.remaining(source)?)?;

                // grows with the decoded slices only
                let mut samples = Vec::new();
                for _ in 0..depth {
                    let img = self.read_j2k(source, 1, width, height)?;
                    samples.extend_from_slice(img.as_slice());
                }
                self.scan.tomogram = Volume::from_raw(width, height, depth, samples)?;
            }
            "@IMG_MOT_COMP_03" => {
                source.skip(1)?;
                let width = source.le_u32()? as usize;
                let height = source.le_u32()? as usize;
                let bpp = source.le_u32()? as usize;
                let depth = source.le_u32()? as usize;
                source.skip(17)?;
                let size = source.le_u32()? as usize;
                let expected = checked_area(&[bpp / 8, width, height, depth])?;
                if bpp != 16 || size != expected {
                    return Err(OctError::SizeMismatch {
                        what: "motion compensation",
                        expected,
                        found: size,
                    });
                }
            }
            "@IMG_TRC_02" => {
                let width = source.le_u32()? as usize;
                let height = source.le_u32()? as usize;
                let bpp = source.le_u32()? as usize;
                let depth = source.le_u32()? as usize;
                source.skip(1)?;
                // each image is at least its length prefix
                check_fits("fundus images", checked_area(&[depth, 4])?, self.remaining(source)?)?;
                for _ in 0..depth {
                    self.scan.fundus = self.read_j2k(source, bpp / 8, width, height)?;
                    self.have_trc_fundus = true;
                }
            }
            "@PARAM_SCAN_04" => {
                source.skip(6 * 2)?;
                let mut res = [0f64; 3];
                for r in &mut res {
                    *r = source.le_f64()?;
                }
                self.scan.size = [res[0] as f32, res[2] as f32, res[1] as f32];
            }
            "@PATIENT_INFO_02" => {
                let id = source.latin1_field(32)?;
                let first = source.latin1_field(32)?;
                let last = source.latin1_field(32)?;
                source.skip(8)?;
                let flags = source.le_u8()?;
                let (year, month, day) = (source.le_u16()?, source.le_u16()?, source.le_u16()?);

                let _ = subject.info.insert("ID".to_owned(), id);
                let _ = subject
                    .info
                    .insert("name".to_owned(), format!("{}, {}", last, first));
                if flags & 2 == 0 {
                    let _ = subject
                        .info
                        .insert("birth date".to_owned(), date(year, month, day));
                }
            }
            "@REGIST_INFO" => {
                source.skip(1 + 2 * 4 + 4 * 4 + 32)?;
                let minx = source.le_u32()?;
                let miny = source.le_u32()?;
                let maxx = source.le_u32()?;
                let maxy = source.le_u32()?;
                self.scan.range = registration_box(minx, miny, maxx, maxy);
            }
            t if IGNORED_CHUNKS.contains(&t) => trace!("skipping chunk {}", t),
            t => warn!("unknown chunk {}", t),
        }
        Ok(())
    }

    fn contour<R: Read + Seek>(&mut self, source: &mut R) -> Result<()> {
        let name = source.latin1_field(20)?;
        let _kind = source.le_u16()?;
        let width = source.le_u32()? as usize;
        let height = source.le_u32()? as usize;
        let size = source.le_u32()? as usize;
        let n = checked_area(&[width, height])?;
        check_fits("contour", size, self.remaining(source)?)?;

        let samples: Vec<f32> = if n.checked_mul(2) == Some(size) {
            source.le_u16_vec(n)?.into_iter().map(f32::from).collect()
        } else if n.checked_mul(8) == Some(size) {
            let mut v = Vec::with_capacity(n);
            for _ in 0..n {
                v.push(source.le_f64()? as f32);
            }
            v
        } else {
            return Err(OctError::SizeMismatch {
                what: "contour",
                expected: n.saturating_mul(2),
                found: size,
            });
        };

        let mut contour = Image::from_raw(1, width, height, samples)?;
        contour.flip_vertical();
        debug!("contour {} ({}x{})", name, width, height);
        let _ = self.scan.contours.insert(name.clone(), contour);
        self.contours.push(name);
        Ok(())
    }

    fn finish(mut self, mut subject: Subject) -> Subject {
        let height = self.scan.tomogram.height() as f32;
        for name in &self.contours {
            if let Some(contour) = self.scan.contours.get_mut(name) {
                contour.map_inplace(|v| *v = height - *v);
            }
        }
        self.scan.size[1] *= height / 1000.;
        let _ = subject.scans.insert(String::new(), self.scan);
        subject
    }
}
