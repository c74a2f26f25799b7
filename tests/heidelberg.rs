#[macro_use]
extern crate pretty_assertions;

mod util;

use std::io::Cursor;
use uoct::format::heidelberg::read_e2e_from;
use uoct::{ErrorCategory, Subject};
use util::*;

const NO_SERIES: u32 = 0xffff_ffff;

fn chunks() -> Vec<E2eChunk> {
    vec![
        E2eChunk::new(NO_SERIES, 0, 0, E2E_PATIENT, e2e_patient("John", "Doe", (2_446_000 + 14_558_805) * 64, b'M')),
        E2eChunk::new(5, 0, 0, E2E_IMAGE, e2e_image(2, 2, &[1, 2, 3, 4])),
        E2eChunk::new(5, 0, 1, E2E_IMAGE, e2e_image(2, 1, &u16s(&[62 << 10, 63 << 10]))),
        E2eChunk::new(5, 2, 1, E2E_IMAGE, e2e_image(2, 1, &u16s(&[63 << 10, 62 << 10]))),
        E2eChunk::new(5, 0, 0, E2E_CONTOUR, e2e_contour(3, &[f32::MAX, 5.])),
        E2eChunk::new(5, 2, 0, E2E_CONTOUR, e2e_contour(3, &[7., 0.])),
        E2eChunk::new(5, 0, 0, E2E_EYE, e2e_eye(b'R')),
    ]
}

fn load(data: Vec<u8>) -> Subject {
    read_e2e_from(Cursor::new(data)).unwrap()
}

#[test]
fn demographics() {
    let subject = load(e2e(b"", &chunks()));
    assert_eq!(subject.info["name"], "Doe, John");
    assert_eq!(subject.info["birth date"], "1984/10/26");
    assert_eq!(subject.info["sex"], "M");
    assert_eq!(subject.info["ID"], "1");
    assert_eq!(subject.scans.keys().collect::<Vec<_>>(), ["5"]);
    assert_eq!(subject.scans["5"].info["laterality"], "R");
}

#[test]
fn fundus_and_reversed_slices() {
    let subject = load(e2e(b"", &chunks()));
    let scan = &subject.scans["5"];
    assert_eq!(scan.fundus.as_slice(), &[1, 2, 3, 4]);
    assert_eq!(scan.range.minx, 0);
    assert_eq!(scan.range.maxy, 1);
    assert_eq!(scan.tomogram.depth(), 2);
    // slice id 2 is stored first
    assert_eq!(scan.tomogram.slice(0).unwrap(), &[0, 191]);
    assert_eq!(scan.tomogram.slice(1).unwrap(), &[191, 0]);
}

#[test]
fn contour_sentinels_become_nan() {
    let subject = load(e2e(b"", &chunks()));
    let contour = &subject.scans["5"].contours["CONTOUR3"];
    assert_eq!((contour.width(), contour.height()), (2, 2));
    assert_eq!(contour.row(0).unwrap()[0], 7.);
    assert!(contour.row(0).unwrap()[1].is_nan());
    assert!(contour.row(1).unwrap()[0].is_nan());
    assert_eq!(contour.row(1).unwrap()[1], 5.);
}

#[test]
fn prefix_and_unknown_chunks_are_skipped() {
    let plain = load(e2e(b"", &chunks()));
    let mut noisy_chunks = chunks();
    noisy_chunks.insert(3, E2eChunk::new(5, 0, 0, 0x1234, vec![0xcd; 29]));
    let noisy = load(e2e(b"some leading bytes", &noisy_chunks));

    assert_eq!(plain.info, noisy.info);
    let (a, b) = (&plain.scans["5"], &noisy.scans["5"]);
    assert_eq!(a.tomogram, b.tomogram);
    assert_eq!(a.fundus, b.fundus);
    assert_eq!(a.info, b.info);
}

#[test]
fn version_must_be_100() {
    let mut data = e2e(b"", &chunks());
    data[12] = 101;
    let err = read_e2e_from(Cursor::new(data)).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Structure);
}

#[test]
fn missing_signature() {
    let err = read_e2e_from(Cursor::new(vec![0u8; 64])).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Structure);
}

#[test]
fn oversized_images_are_rejected() {
    let cases = vec![
        E2eChunk::new(5, 0, 1, E2E_IMAGE, e2e_image(65536, 65536, &[0; 4])),
        E2eChunk::new(5, 0, 0, E2E_IMAGE, e2e_image(0xffff_ffff, 0xffff_ffff, &[0; 4])),
        E2eChunk::new(5, 0, 0, E2E_CONTOUR, e2e_contour(3, &vec![1.; 0x10000])),
    ];
    for (i, chunk) in cases.into_iter().enumerate() {
        let mut chunk = chunk;
        if chunk.tag == E2E_CONTOUR {
            // claim far more slices than the file can hold
            chunk.slice = 0;
            let mut entries = vec![chunk];
            entries.push(E2eChunk::new(5, 0x7fff_fffe, 0, 0x1234, vec![]));
            let err = read_e2e_from(Cursor::new(e2e(b"", &entries))).unwrap_err();
            assert_eq!(err.category(), ErrorCategory::Size, "case {}", i);
            continue;
        }
        let err = read_e2e_from(Cursor::new(e2e(b"", &[chunk]))).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Size, "case {}", i);
    }
}

#[test]
fn looping_directory_chain_ends_the_walk() {
    let plain = load(e2e(b"", &chunks()));
    let mut data = e2e(b"", &chunks());
    // the directory block at 88 names itself as its predecessor
    data[88 + 44..88 + 48].copy_from_slice(&88u32.to_le_bytes());
    let looped = load(data);
    assert_eq!(plain.info, looped.info);
    assert_eq!(plain.scans["5"].tomogram, looped.scans["5"].tomogram);
    assert_eq!(plain.scans["5"].fundus, looped.scans["5"].fundus);
}
