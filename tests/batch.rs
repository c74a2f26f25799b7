mod util;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::tempdir;
use uoct::batch::{convert_to_uoctml, BatchOptions, Outcome};
use uoct::format::uoctml::read_uoctml;
use uoct::{ReaderOptions, Sector};
use util::*;

fn macular_fda() -> Vec<u8> {
    fda(
        b"FDA",
        &[
            ("@PATIENT_INFO_02", fda_patient("P7", "Ann", "Lee", false, [1990, 1, 2])),
            ("@PARAM_SCAN_04", fda_scan_size(6., 6., 2.)),
            ("@IMG_JPEG", fda_tomogram(2, 2, &[&[0; 4], &[0; 4]])),
            ("@CONTOUR_INFO", fda_contour_u16("A", 2, 2, &[1; 4])),
            ("@CONTOUR_INFO", fda_contour_u16("B", 2, 2, &[2; 4])),
        ],
    )
}

fn inputs(dir: &std::path::Path) -> Vec<PathBuf> {
    let good = dir.join("good.fda");
    fs::write(&good, macular_fda()).unwrap();
    let bad = dir.join("bad.e2e");
    fs::write(&bad, b"garbage").unwrap();
    vec![good, bad]
}

#[test]
fn converts_and_summarizes() {
    let src = tempdir().unwrap();
    let out = tempdir().unwrap();
    let registry = ReaderOptions::new()
        .jpeg2000_decoder(Arc::new(RawCodec))
        .registry();
    let options = BatchOptions {
        anonymize: true,
        overwrite: false,
    };
    let report = convert_to_uoctml(&registry, &inputs(src.path()), out.path(), &options, || false).unwrap();

    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.converted(), 1);
    assert_eq!(report.loadable(), 1);
    assert!(matches!(report.outcomes[1].1, Outcome::Unreadable(_)));
    assert_eq!(report.cancelled, 0);

    let written = read_uoctml(out.path().join("good.uoctml")).unwrap();
    assert!(!written.info.contains_key("name"));
    assert_eq!(written.info["ID"], "P7");

    assert_eq!(report.scans.len(), 1);
    let summary = &report.scans[0];
    assert_eq!(summary.patient.get("ID").map(String::as_str), Some("P7"));
    assert!(!summary.patient.contains_key("birth date"));
    // contours one pixel apart, 0.002 mm per pixel; only the outer ring
    // is covered by a 2x2 grid over 6 mm
    let sectors = summary.sectors.unwrap();
    assert!((sectors[Sector::OuterLeft.index()] - 2.).abs() < 1e-3, "{:?}", sectors);
    assert!(sectors[Sector::Center.index()].is_nan());
    assert_eq!(summary.contours.len(), 2);
}

#[test]
fn existing_targets_are_kept_unless_overwriting() {
    let src = tempdir().unwrap();
    let out = tempdir().unwrap();
    let registry = ReaderOptions::new()
        .jpeg2000_decoder(Arc::new(RawCodec))
        .registry();
    let target = out.path().join("good.uoctml");
    fs::write(&target, "placeholder").unwrap();
    let files = inputs(src.path());

    let report = convert_to_uoctml(&registry, &files[..1], out.path(), &BatchOptions::default(), || false).unwrap();
    assert!(matches!(report.outcomes[0].1, Outcome::Exists(_)));
    assert_eq!(fs::read_to_string(&target).unwrap(), "placeholder");

    let options = BatchOptions {
        anonymize: false,
        overwrite: true,
    };
    let report = convert_to_uoctml(&registry, &files[..1], out.path(), &options, || false).unwrap();
    assert_eq!(report.converted(), 1);
    assert_eq!(read_uoctml(&target).unwrap().info["name"], "Lee, Ann");
}

#[test]
fn cancellation_is_checked_between_files() {
    let src = tempdir().unwrap();
    let out = tempdir().unwrap();
    let registry = ReaderOptions::new()
        .jpeg2000_decoder(Arc::new(RawCodec))
        .registry();
    let mut calls = 0;
    let report = convert_to_uoctml(&registry, &inputs(src.path()), out.path(), &BatchOptions::default(), || {
        calls += 1;
        calls > 1
    })
    .unwrap();
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.cancelled, 1);
}
