//! An application for converting OCT files to uoctml.
//!
//! Usage: `to_uoctml [--anonymize] [--overwrite] <out dir> <files...>`

use std::env;
use std::path::PathBuf;
use uoct::batch::{convert_to_uoctml, BatchOptions, Outcome};
use uoct::ReaderOptions;

fn main() {
    env_logger::init();
    let mut options = BatchOptions::default();
    let mut paths = Vec::new();
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--anonymize" => options.anonymize = true,
            "--overwrite" => options.overwrite = true,
            _ => paths.push(PathBuf::from(arg)),
        }
    }
    if paths.len() < 2 {
        eprintln!("Usage: to_uoctml [--anonymize] [--overwrite] <out dir> <files...>");
        std::process::exit(2);
    }
    let out_dir = paths.remove(0);

    let registry = ReaderOptions::new().registry();
    let report = convert_to_uoctml(&registry, &paths, &out_dir, &options, || false)
        .expect("Failed to create the output directory");
    for (input, outcome) in &report.outcomes {
        match outcome {
            Outcome::Converted(target) => println!("{} -> {}", input.display(), target.display()),
            Outcome::Exists(target) => println!("{}: {} exists already", input.display(), target.display()),
            Outcome::Unreadable(e) => println!("{}: {}", input.display(), e),
            Outcome::WriteFailed(e) => println!("{}: conversion failed: {}", input.display(), e),
        }
    }
    println!(
        "{} of {} loadable files have been converted",
        report.converted(),
        report.loadable()
    );
}
