//! Utility functions to write uoctml files.
//!
//! A uoctml document comes as a pair: the XML description at the given
//! path and a binary sidecar at the same path with `.bin` appended. Every
//! raster of the subject is appended to the sidecar, per scan in the order
//! fundus, tomogram, contours, and referenced from the XML by byte range.

use log::debug;
use quick_xml::events::{BytesDecl, Event};
use quick_xml::Writer;
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::raster::RasterElement;
use crate::subject::{Info, Scan, Subject};
use crate::xml;

/// Options and flags which can be used to configure how a subject is
/// written.
#[derive(Debug, Clone, PartialEq)]
pub struct WriterOptions {
    /// Where the XML document will be written.
    path: PathBuf,
    /// Whether the patient name is left out.
    anonymize: bool,
}

impl WriterOptions {
    /// Creates a new set of options targeting `path`. The sidecar is
    /// written next to it.
    pub fn new<P: AsRef<Path>>(path: P) -> WriterOptions {
        WriterOptions {
            path: path.as_ref().to_owned(),
            anonymize: false,
        }
    }

    /// Leave the subject's `"name"` entry out of the document.
    pub fn anonymize(mut self, anonymize: bool) -> WriterOptions {
        self.anonymize = anonymize;
        self
    }

    /// Path of the binary sidecar.
    pub fn sidecar_path(&self) -> PathBuf {
        let mut path = OsString::from(self.path.as_os_str());
        path.push(".bin");
        PathBuf::from(path)
    }

    /// Write `subject` as a uoctml document and its sidecar.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use uoct::{Subject, WriterOptions};
    /// # use uoct::Result;
    ///
    /// # fn run() -> Result<()> {
    /// let subject = Subject::new();
    /// WriterOptions::new("out.uoctml")
    ///     .anonymize(true)
    ///     .write_subject(&subject)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn write_subject(&self, subject: &Subject) -> Result<()> {
        let sidecar_path = self.sidecar_path();
        let sidecar_name = sidecar_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        debug!(
            "writing {} scans to {}",
            subject.scans.len(),
            self.path.display()
        );

        let mut writer = Writer::new_with_indent(BufWriter::new(File::create(&self.path)?), b' ', 2);
        let mut sidecar = Sidecar {
            name: sidecar_name,
            out: BufWriter::new(File::create(&sidecar_path)?),
            pos: 0,
        };

        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), Some("yes"))))?;
        xml::start(&mut writer, "uoctml", &[("version", "1.0")])?;
        write_info(&mut writer, &subject.info, self.anonymize)?;
        for (id, scan) in &subject.scans {
            write_scan(&mut writer, &mut sidecar, id, scan)?;
        }
        xml::end(&mut writer, "uoctml")?;

        let mut out = writer.into_inner();
        out.write_all(b"\n")?;
        out.flush()?;
        sidecar.out.flush()?;
        Ok(())
    }
}

/// Append-only raster store, tracking the current byte offset.
struct Sidecar<W> {
    name: String,
    out: W,
    pos: u64,
}

impl<W: Write> Sidecar<W> {
    /// Append a raster and describe it with a `<data>` element.
    fn append<T, X>(&mut self, writer: &mut Writer<X>, data: &[T]) -> Result<()>
    where
        T: RasterElement,
        X: Write,
    {
        let bytes = T::as_le_bytes(data);
        let start = self.pos.to_string();
        let size = bytes.len().to_string();
        xml::text_element(
            writer,
            "data",
            &[("storage", "raw"), ("start", &start), ("size", &size)],
            &self.name,
        )?;
        self.out.write_all(&bytes)?;
        self.pos += bytes.len() as u64;
        Ok(())
    }
}

fn write_info<W: Write>(writer: &mut Writer<W>, info: &Info, anonymize: bool) -> Result<()> {
    for (key, value) in info {
        if anonymize && key == "name" {
            continue;
        }
        xml::start(writer, "info", &[])?;
        xml::text_element(writer, "key", &[], key)?;
        xml::text_element(writer, "value", &[], value)?;
        xml::end(writer, "info")?;
    }
    Ok(())
}

fn write_scan<W, S>(writer: &mut Writer<W>, sidecar: &mut Sidecar<S>, id: &str, scan: &Scan) -> Result<()>
where
    W: Write,
    S: Write,
{
    xml::start(writer, "scan", &[])?;
    xml::text_element(writer, "id", &[], id)?;
    write_info(writer, &scan.info, false)?;

    let fundus = &scan.fundus;
    xml::start(
        writer,
        "fundus",
        &[
            ("channels", &fundus.channels().to_string()),
            ("width", &fundus.width().to_string()),
            ("height", &fundus.height().to_string()),
            ("type", u8::TYPE_NAME),
        ],
    )?;
    sidecar.append(writer, fundus.as_slice())?;
    xml::end(writer, "fundus")?;

    let range = &scan.range;
    xml::empty(
        writer,
        "range",
        &[
            ("minx", &range.minx.to_string()),
            ("miny", &range.miny.to_string()),
            ("maxx", &range.maxx.to_string()),
            ("maxy", &range.maxy.to_string()),
        ],
    )?;
    xml::empty(
        writer,
        "size",
        &[
            ("x", &scan.size[0].to_string()),
            ("y", &scan.size[1].to_string()),
            ("z", &scan.size[2].to_string()),
        ],
    )?;

    let tomogram = &scan.tomogram;
    xml::start(
        writer,
        "tomogram",
        &[
            ("width", &tomogram.width().to_string()),
            ("height", &tomogram.height().to_string()),
            ("depth", &tomogram.depth().to_string()),
            ("type", u8::TYPE_NAME),
        ],
    )?;
    sidecar.append(writer, tomogram.as_slice())?;
    xml::end(writer, "tomogram")?;

    for (name, contour) in &scan.contours {
        xml::start(
            writer,
            "contour",
            &[
                ("width", &contour.width().to_string()),
                ("height", &contour.height().to_string()),
                ("type", f32::TYPE_NAME),
            ],
        )?;
        xml::text_element(writer, "name", &[], name)?;
        sidecar.append(writer, contour.as_slice())?;
        xml::end(writer, "contour")?;
    }

    xml::end(writer, "scan")
}
