mod util;

use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;
use uoct::format::topcon::TopconReader;
use uoct::{ErrorCategory, OctError, OctReader, ReaderOptions, ReaderRegistry, Result, Subject};
use util::*;

#[derive(Debug)]
struct Failing(&'static str);

impl OctReader for Failing {
    fn name(&self) -> &str {
        self.0
    }

    fn extensions(&self) -> &[&'static str] {
        &[".fda", ".e2e"]
    }

    fn decode(&self, _path: &Path) -> Result<Subject> {
        Err(OctError::UnknownTag(format!("{} failure", self.0)))
    }
}

#[test]
fn first_successful_reader_wins() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("eye.fda");
    fs::write(&path, fda(b"FDA", &[("@PATIENT_INFO_02", fda_patient("9", "A", "B", true, [0; 3]))]))
        .unwrap();

    let mut registry = ReaderRegistry::new();
    let _ = registry.register(Failing("first"));
    let id = registry.register(TopconReader::new(Arc::new(RawCodec)));
    let subject = registry.load(&path).unwrap();
    assert_eq!(subject.info["ID"], "9");

    let _ = registry.unregister(id);
    let err = registry.load(&path).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::NoReader);
}

#[test]
fn every_failure_is_reported() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.e2e");
    fs::write(&path, b"definitely not an e2e file").unwrap();

    let mut registry = ReaderOptions::new().registry();
    let _ = registry.register(Failing("late"));
    let err = registry.load(&path).unwrap_err();
    let text = err.to_string();
    assert!(text.starts_with("Heidelberg Spectralis OCT: "), "{}", text);
    assert!(text.contains("\nlate: "), "{}", text);
    assert!(text.ends_with("Could not read the file."), "{}", text);
    match err {
        OctError::NoReaderMatched(failures) => {
            let names: Vec<_> = failures.iter().map(|f| f.reader.as_str()).collect();
            assert_eq!(names, ["Heidelberg Spectralis OCT", "late"]);
        }
        e => panic!("unexpected error {:?}", e),
    }
}

#[test]
fn configured_decoder_reaches_topcon() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("eye.fda");
    let data = fda(b"FDA", &[("@IMG_JPEG", fda_tomogram(1, 1, &[&[42]]))]);
    fs::write(&path, data).unwrap();
    let subject = ReaderOptions::new()
        .jpeg2000_decoder(Arc::new(RawCodec))
        .read_file(&path)
        .unwrap();
    assert_eq!(subject.scans[""].tomogram.as_slice(), &[42]);
}

#[test]
fn suffixes_are_case_sensitive() {
    let registry = ReaderOptions::new().registry();
    assert!(registry.supports("a.E2E"));
    assert!(registry.supports("a.e2e"));
    assert!(!registry.supports("a.Fda"));
    assert!(registry.supports("dir/a.uoctml"));
    assert!(registry.supports("dir/a.exd"));
    let err = registry.load("nothing.txt").unwrap_err();
    assert_eq!(err.to_string(), "Could not read the file.");
}
