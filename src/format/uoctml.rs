//! Reader of the uoctml interchange format written by
//! [`WriterOptions`](../../writer/struct.WriterOptions.html).
//!
//! The schema is closed: unknown elements, a `version` other than `1.0`,
//! a `type` other than the one each raster requires or a `storage` other
//! than `raw` are all rejected. Errors raised while handling an element
//! are reported as `tag "<name>": <reason>`.
use log::debug;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::{OctError, Result};
use crate::raster::{Image, RasterElement, Volume};
use crate::reader::OctReader;
use crate::subject::{BoundingBox, Info, Scan, Subject};
use crate::util::{check_fits, checked_area};
use crate::xml::{self, Attributes, XmlHandler};

/// Reader of `.uoctml` documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct UoctmlReader;

impl OctReader for UoctmlReader {
    fn name(&self) -> &str {
        "UOCTML"
    }

    fn extensions(&self) -> &[&'static str] {
        &[".uoctml"]
    }

    fn decode(&self, path: &Path) -> Result<Subject> {
        read_uoctml(path)
    }
}

/// Read a uoctml document and the rasters it references. Sidecar file
/// names are resolved against the document's directory.
pub fn read_uoctml<P: AsRef<Path>>(path: P) -> Result<Subject> {
    let path = path.as_ref();
    let dir = path.parent().map(Path::to_owned).unwrap_or_default();
    let mut handler = Handler::new(dir);
    let file = BufReader::new(File::open(path)?);
    xml::parse(file, &mut handler)?;
    Ok(handler.subject)
}

/// Location of one raster inside a sidecar.
#[derive(Debug, Default, Clone, PartialEq)]
struct RawRef {
    file: String,
    start: u64,
    size: usize,
}

#[derive(Debug, Default)]
struct Handler {
    subject: Subject,
    dir: PathBuf,
    text: String,
    in_scan: bool,

    key: String,
    value: String,
    scan_id: String,
    contour_name: String,
    scan_info: Info,
    range: BoundingBox,
    size: [f32; 3],

    fundus_dim: [usize; 3],
    tomogram_dim: [usize; 3],
    contour_dim: [usize; 2],
    data: RawRef,

    fundus: Option<RawRef>,
    tomogram: Option<RawRef>,
    contours: BTreeMap<String, ([usize; 2], RawRef)>,
}

fn require_type(attrs: &Attributes, expected: &str) -> Result<()> {
    let found = attrs.require("type")?;
    if found != expected {
        return Err(OctError::UnknownValue("type", found.to_owned()));
    }
    Ok(())
}

fn check_size(what: &'static str, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(OctError::SizeMismatch {
            what,
            expected,
            found,
        });
    }
    Ok(())
}

impl Handler {
    fn new(dir: PathBuf) -> Self {
        Handler {
            dir,
            ..Default::default()
        }
    }

    fn handle_start(&mut self, name: &str, attrs: &Attributes) -> Result<()> {
        match name {
            "uoctml" => {
                let version = attrs.require("version")?;
                if version != "1.0" {
                    return Err(OctError::UnsupportedVersion(version.to_owned()));
                }
            }
            "scan" => {
                self.in_scan = true;
                self.scan_id.clear();
                self.scan_info.clear();
                self.fundus = None;
                self.tomogram = None;
                self.contours.clear();
                self.range = BoundingBox::default();
                self.size = [0.; 3];
            }
            "fundus" => {
                self.fundus_dim = [
                    attrs.require_number("channels")?,
                    attrs.require_number("width")?,
                    attrs.require_number("height")?,
                ];
                require_type(attrs, u8::TYPE_NAME)?;
            }
            "range" => {
                self.range = BoundingBox {
                    minx: attrs.require_number("minx")?,
                    miny: attrs.require_number("miny")?,
                    maxx: attrs.require_number("maxx")?,
                    maxy: attrs.require_number("maxy")?,
                };
            }
            "size" => {
                self.size = [
                    attrs.require_number("x")?,
                    attrs.require_number("y")?,
                    attrs.require_number("z")?,
                ];
            }
            "tomogram" => {
                self.tomogram_dim = [
                    attrs.require_number("width")?,
                    attrs.require_number("height")?,
                    attrs.require_number("depth")?,
                ];
                require_type(attrs, u8::TYPE_NAME)?;
            }
            "contour" => {
                self.contour_name.clear();
                self.contour_dim = [
                    attrs.require_number("width")?,
                    attrs.require_number("height")?,
                ];
                require_type(attrs, f32::TYPE_NAME)?;
            }
            "data" => {
                self.data = RawRef::default();
                self.data.start = attrs.require_number("start")?;
                self.data.size = attrs.require_number("size")?;
                let storage = attrs.require("storage")?;
                if storage != "raw" {
                    return Err(OctError::UnknownValue("storage", storage.to_owned()));
                }
            }
            "info" | "key" | "value" | "id" | "name" => {}
            _ => return Err(OctError::UnknownTag(name.to_owned())),
        }
        Ok(())
    }

    fn handle_end(&mut self, name: &str) -> Result<()> {
        match name {
            "id" => self.scan_id = self.text.clone(),
            "key" => self.key = self.text.clone(),
            "value" => self.value = self.text.clone(),
            "name" => self.contour_name = self.text.clone(),
            "data" => self.data.file = self.text.trim().to_owned(),
            "info" => {
                let info = if self.in_scan {
                    &mut self.scan_info
                } else {
                    &mut self.subject.info
                };
                let _ = info.insert(self.key.clone(), self.value.clone());
            }
            "fundus" => {
                let [c, w, h] = self.fundus_dim;
                check_size("fundus", checked_area(&[c, w, h])?, self.data.size)?;
                self.fundus = Some(self.data.clone());
            }
            "tomogram" => {
                let [w, h, d] = self.tomogram_dim;
                check_size("tomogram", checked_area(&[w, h, d])?, self.data.size)?;
                self.tomogram = Some(self.data.clone());
            }
            "contour" => {
                let [w, h] = self.contour_dim;
                check_size("contour", checked_area(&[4, w, h])?, self.data.size)?;
                let _ = self
                    .contours
                    .insert(self.contour_name.clone(), (self.contour_dim, self.data.clone()));
            }
            "scan" => self.finish_scan()?,
            "uoctml" | "range" | "size" => {}
            _ => return Err(OctError::UnknownTag(name.to_owned())),
        }
        Ok(())
    }

    fn finish_scan(&mut self) -> Result<()> {
        debug!("loading rasters of scan \"{}\"", self.scan_id);
        let mut scan = Scan {
            range: self.range,
            size: self.size,
            info: std::mem::take(&mut self.scan_info),
            ..Default::default()
        };

        if let Some(r) = &self.fundus {
            let [c, w, h] = self.fundus_dim;
            scan.fundus = Image::from_raw(c, w, h, self.read_raw(r)?)?;
        }
        if let Some(r) = &self.tomogram {
            let [w, h, d] = self.tomogram_dim;
            scan.tomogram = Volume::from_raw(w, h, d, self.read_raw(r)?)?;
        }
        for (name, ([w, h], r)) in &self.contours {
            let contour = Image::from_raw(1, *w, *h, self.read_raw(r)?)?;
            let _ = scan.contours.insert(name.clone(), contour);
        }

        self.in_scan = false;
        let _ = self.subject.scans.insert(self.scan_id.clone(), scan);
        Ok(())
    }

    fn read_raw<T: RasterElement>(&self, r: &RawRef) -> Result<Vec<T>> {
        let mut file = File::open(self.dir.join(&r.file))?;
        let len = file.metadata()?.len();
        check_fits("raster data", r.size, len.saturating_sub(r.start))?;
        let _ = file.seek(SeekFrom::Start(r.start))?;
        let mut buf = vec![0u8; r.size];
        file.read_exact(&mut buf)?;
        T::from_raw_vec(buf)
    }
}

impl XmlHandler for Handler {
    fn start(&mut self, name: &str, attrs: &Attributes) -> Result<()> {
        self.text.clear();
        self.handle_start(name, attrs).map_err(|e| e.tagged(name))
    }

    fn end(&mut self, name: &str) -> Result<()> {
        self.handle_end(name).map_err(|e| e.tagged(name))
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        self.text.push_str(text);
        Ok(())
    }
}
