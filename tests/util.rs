//! Builders of small synthetic vendor files.
#![allow(dead_code)]

use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Cursor, Write};
use uoct::{Image, Jpeg2000Decoder, Result};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Stands in for a JPEG 2000 codec: the payload is
/// `[channels, width, height, samples...]`.
#[derive(Debug, Default)]
pub struct RawCodec;

impl Jpeg2000Decoder for RawCodec {
    fn decode(&self, data: &[u8]) -> Result<Image<u8>> {
        let (c, w, h) = (data[0] as usize, data[1] as usize, data[2] as usize);
        Image::from_raw(c, w, h, data[3..].to_vec())
    }
}

/// Encode an image the way [`RawCodec`] reads it, with the `u32` length
/// prefix of Topcon files.
pub fn raw_codestream(c: u8, w: u8, h: u8, samples: &[u8]) -> Vec<u8> {
    let mut stream = vec![c, w, h];
    stream.extend_from_slice(samples);
    let mut out = (stream.len() as u32).to_le_bytes().to_vec();
    out.extend(stream);
    out
}

pub fn u16s(values: &[u16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes().to_vec()).collect()
}

pub fn u32s(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes().to_vec()).collect()
}

pub fn f32s(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes().to_vec()).collect()
}

/// Zero-padded fixed width text field.
pub fn field(text: &str, len: usize) -> Vec<u8> {
    let mut out = text.as_bytes().to_vec();
    out.resize(len, 0);
    out
}

// Topcon

/// An `.fda` file with the given subtype (`b"FDA"` or `b"FAA"`) and chunks.
pub fn fda(subtype: &[u8; 3], chunks: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut out = b"FOCT".to_vec();
    out.extend_from_slice(subtype);
    out.extend_from_slice(&[0; 8]);
    for (tag, payload) in chunks {
        out.push(tag.len() as u8);
        out.extend_from_slice(tag.as_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
    }
    out
}

pub fn fda_scan_size(x: f64, y: f64, z: f64) -> Vec<u8> {
    let mut out = vec![0; 12];
    for v in &[x, y, z] {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

pub fn fda_patient(id: &str, first: &str, last: &str, hide_birth: bool, birth: [u16; 3]) -> Vec<u8> {
    let mut out = field(id, 32);
    out.extend(field(first, 32));
    out.extend(field(last, 32));
    out.extend_from_slice(&[0; 8]);
    out.push(if hide_birth { 2 } else { 0 });
    out.extend(u16s(&birth));
    out
}

/// A volume of `slices.len()` one-channel B-scans.
pub fn fda_tomogram(w: u8, h: u8, slices: &[&[u8]]) -> Vec<u8> {
    let mut out = vec![2u8];
    out.extend_from_slice(&[0; 8]);
    out.extend(u32s(&[u32::from(w), u32::from(h), slices.len() as u32, 0]));
    for s in slices {
        out.extend(raw_codestream(1, w, h, s));
    }
    out
}

pub fn fda_contour_u16(name: &str, w: u32, h: u32, samples: &[u16]) -> Vec<u8> {
    let mut out = field(name, 20);
    out.extend(u16s(&[0]));
    out.extend(u32s(&[w, h, samples.len() as u32 * 2]));
    out.extend(u16s(samples));
    out
}

// Heidelberg

pub const E2E_IMAGE: u32 = 0x4000_0000;
pub const E2E_CONTOUR: u32 = 0x0000_2723;
pub const E2E_PATIENT: u32 = 0x0000_0009;
pub const E2E_EYE: u32 = 0x0000_000B;

#[derive(Debug, Clone)]
pub struct E2eChunk {
    pub patient: u32,
    pub series: u32,
    pub slice: u32,
    pub ind: u16,
    pub tag: u32,
    pub payload: Vec<u8>,
}

impl E2eChunk {
    pub fn new(series: u32, slice: u32, ind: u16, tag: u32, payload: Vec<u8>) -> Self {
        E2eChunk {
            patient: 1,
            series,
            slice,
            ind,
            tag,
            payload,
        }
    }
}

fn e2e_block(magic: &[u8], tail: &[u32]) -> Vec<u8> {
    let mut out = field("", 12);
    out[..magic.len()].copy_from_slice(magic);
    out.extend(u32s(&[100]));
    out.extend_from_slice(&[0; 20]);
    out.extend(u32s(tail));
    out
}

/// An `.e2e` file preceded by `prefix`, with a single directory block
/// listing `chunks`.
pub fn e2e(prefix: &[u8], chunks: &[E2eChunk]) -> Vec<u8> {
    const HEADER: u32 = 36;
    const DIR_HEADER: u32 = 52;
    const ENTRY: u32 = 44;
    let dir_pos = HEADER + DIR_HEADER;
    let mut chunk_pos = dir_pos + DIR_HEADER + ENTRY * chunks.len() as u32;

    let mut db = e2e_block(b"CMDb", &[]);
    db.extend(e2e_block(b"MDbMDir", &[chunks.len() as u32, dir_pos, 0, 0]));
    db.extend(e2e_block(b"MDbDir", &[chunks.len() as u32, dir_pos, 0, 0]));

    let mut body = Vec::new();
    for (i, c) in chunks.iter().enumerate() {
        let pos = dir_pos + DIR_HEADER + ENTRY * i as u32;
        db.extend(u32s(&[pos, chunk_pos, c.payload.len() as u32, 0, c.patient, 1, c.series, c.slice]));
        db.extend_from_slice(&[0; 12]);

        let mut header = field("MDbData", 12);
        header.extend_from_slice(&[0; 20]);
        header.extend(u32s(&[c.patient, 1, c.series, c.slice]));
        header.extend(u16s(&[c.ind, 0]));
        header.extend(u32s(&[c.tag, 0]));
        chunk_pos += (header.len() + c.payload.len()) as u32;
        body.extend(header);
        body.extend_from_slice(&c.payload);
    }

    let mut out = prefix.to_vec();
    out.extend(db);
    out.extend(body);
    out
}

/// Image chunk payload: 8-bit samples for the fundus (`ind` 0), 16-bit
/// floats otherwise.
pub fn e2e_image(w: u32, h: u32, samples: &[u8]) -> Vec<u8> {
    let mut out = u32s(&[0, 0, 0, h, w]);
    out.extend_from_slice(samples);
    out
}

pub fn e2e_contour(id: u32, row: &[f32]) -> Vec<u8> {
    let mut out = u32s(&[0, id, 0, row.len() as u32]);
    out.extend(f32s(row));
    out
}

pub fn e2e_patient(given: &str, family: &str, birthday: u32, sex: u8) -> Vec<u8> {
    let mut out = field(given, 31);
    out.extend(field(family, 66));
    out.extend(u32s(&[birthday]));
    out.push(sex);
    out
}

pub fn e2e_eye(code: u8) -> Vec<u8> {
    let mut out = vec![0; 14];
    out.push(code);
    out
}

// Nidek

/// An 8-bit bottom-up bitmap. `rows[0]` is the first row in the file.
pub fn bmp(width: u32, rows: &[&[u8]]) -> Vec<u8> {
    let stride = ((width + 3) & !3) as usize;
    let mut out = vec![0u8; 1078];
    out[..2].copy_from_slice(b"BM");
    out[10..14].copy_from_slice(&1078u32.to_le_bytes());
    out[18..22].copy_from_slice(&width.to_le_bytes());
    out[22..26].copy_from_slice(&(rows.len() as i32).to_le_bytes());
    out[26..28].copy_from_slice(&1u16.to_le_bytes());
    out[28..30].copy_from_slice(&8u16.to_le_bytes());
    for row in rows {
        let mut line = row.to_vec();
        line.resize(stride, 0);
        out.extend(line);
    }
    out
}

/// An `oct_m.dat` file with `contours[k][z]` the scanline of contour `k`
/// in slice `z`.
pub fn nidek_contours(width: usize, contours: &[Vec<Vec<u16>>]) -> Vec<u8> {
    let depth = contours.first().map_or(0, Vec::len);
    let mut out = vec![0u8; 24];
    out.extend(u32s(&[depth as u32, (12 + 2 * width * contours.len()) as u32]));
    for z in 0..depth {
        out.extend_from_slice(&[0; 12]);
        for c in contours {
            out.extend(u16s(&c[z]));
        }
    }
    out
}

// Eyetec

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

/// A zip archive holding the given entries.
pub fn zip(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// A `Tomograms` entry payload.
pub fn exd_tomogram(w: u32, h: u32, slices: &[&[u8]]) -> Vec<u8> {
    let mut out = u32s(&[0, w, h, slices.len() as u32]);
    out.extend_from_slice(&[0; 24]);
    for s in slices {
        out.extend_from_slice(s);
        out.extend_from_slice(&[0; 152]);
    }
    out
}

/// An `Images` entry payload with the given fundus photograph.
pub fn exd_images(w: u32, h: u32, fundus: &[u8]) -> Vec<u8> {
    let mut out = u32s(&[0, 1, 1]);
    out.extend_from_slice(&[0; 16 + 1 + 128]);
    out.extend(u32s(&[w, h]));
    out.extend_from_slice(&[0; 16]);
    out.extend_from_slice(fundus);
    out.extend_from_slice(&[0; 128]);
    out.extend(u32s(&[1, 1]));
    out.extend_from_slice(&[0; 17]);
    out
}
