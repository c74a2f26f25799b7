//! Conversion of many OCT files to uoctml in one go.
//!
//! Each input is loaded through a [`ReaderRegistry`] and saved as
//! `<out_dir>/<file stem>.uoctml`. Files which cannot be read are reported
//! and skipped. Along the way, macular scans are quantified so that the
//! caller can build a patient list without loading the files again.
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{OctError, Result};
use crate::reader::ReaderRegistry;
use crate::sectors::{contour_values, sector_values, ContourSelection};
use crate::subject::{Info, Scan, Subject};
use crate::writer::WriterOptions;

/// Subject keys copied into scan summaries when not anonymizing.
const PERSONAL_KEYS: &[&str] = &["name", "birth date", "sex"];

/// Millimeters to micrometers.
const MM_TO_UM: f64 = 1000.;

/// Options of a batch conversion.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Leave the patient name out of the written documents and the
    /// personal data out of the summaries.
    pub anonymize: bool,
    /// Replace existing targets instead of skipping their inputs.
    pub overwrite: bool,
}

/// What happened to one input file.
#[derive(Debug)]
pub enum Outcome {
    /// Written to the given document.
    Converted(PathBuf),
    /// Left alone because the target already exists.
    Exists(PathBuf),
    /// No reader could load the file.
    Unreadable(OctError),
    /// The file was loaded but saving it failed.
    WriteFailed(OctError),
}

impl Outcome {
    /// Whether the input was loaded successfully.
    pub fn is_loaded(&self) -> bool {
        matches!(self, Outcome::Converted(_) | Outcome::WriteFailed(_))
    }
}

/// Quantification of one macular scan, thickness values in µm.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSummary {
    /// The input file holding the scan.
    pub source: PathBuf,
    /// Scan id within its subject.
    pub scan_id: String,
    /// The subject's `"ID"`, plus name, birth date and sex unless
    /// anonymizing.
    pub patient: Info,
    /// Acquisition date, if recorded.
    pub scan_date: Option<String>,
    /// `"L"` or `"R"`, if recorded.
    pub laterality: Option<String>,
    /// Average thickness per sector in grid order, if the scan has a usable
    /// pair of contours.
    pub sectors: Option<[f64; 9]>,
    /// Volume within 3 mm of the center in mm³, alongside `sectors`.
    pub total_volume: Option<f64>,
    /// Sector depths of every measured contour.
    pub contours: Vec<(String, [f64; 9])>,
}

/// Result of a batch conversion.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Outcome per processed input, in input order.
    pub outcomes: Vec<(PathBuf, Outcome)>,
    /// Summaries of the macular scans of every loaded input.
    pub scans: Vec<ScanSummary>,
    /// Inputs left untouched because the conversion was cancelled.
    pub cancelled: usize,
}

impl BatchReport {
    /// Number of inputs written to uoctml.
    pub fn converted(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, Outcome::Converted(_)))
            .count()
    }

    /// Number of inputs which could be loaded.
    pub fn loadable(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_loaded()).count()
    }
}

/// Whether sector analysis applies: fixation unset or on the macula.
fn is_macular(scan: &Scan) -> bool {
    match scan.info.get("fixation").map(String::as_str) {
        None | Some("") | Some("macula") => true,
        _ => false,
    }
}

fn to_um(values: [f64; 9]) -> [f64; 9] {
    let mut out = values;
    for v in &mut out {
        *v *= MM_TO_UM;
    }
    out
}

/// Summarize the macular scans of a loaded subject.
pub fn summarize(source: &Path, subject: &Subject, anonymize: bool) -> Vec<ScanSummary> {
    let mut patient = Info::new();
    for (key, value) in &subject.info {
        if key == "ID" || (!anonymize && PERSONAL_KEYS.contains(&key.as_str())) {
            let _ = patient.insert(key.clone(), value.clone());
        }
    }

    subject
        .scans
        .iter()
        .filter(|(_, scan)| is_macular(scan))
        .map(|(id, scan)| {
            let (sectors, total_volume) = match sector_values(scan, ContourSelection::Default) {
                Ok(v) => (Some(to_um(v.averages())), Some(v.total_volume)),
                Err(e) => {
                    debug!("no sector values for scan \"{}\": {}", id, e);
                    (None, None)
                }
            };
            let contours = match contour_values(scan) {
                Ok(all) => all
                    .into_iter()
                    .map(|(name, v)| (name, to_um(v.averages())))
                    .collect(),
                Err(e) => {
                    debug!("no contour values for scan \"{}\": {}", id, e);
                    Vec::new()
                }
            };
            ScanSummary {
                source: source.to_owned(),
                scan_id: id.clone(),
                patient: patient.clone(),
                scan_date: scan.info.get("scan date").cloned(),
                laterality: scan.info.get("laterality").cloned(),
                sectors,
                total_volume,
                contours,
            }
        })
        .collect()
}

/// Target document of an input file.
pub fn target_path(input: &Path, out_dir: &Path) -> PathBuf {
    let mut name = input.file_stem().unwrap_or_default().to_os_string();
    name.push(".uoctml");
    out_dir.join(name)
}

/// Convert every input to uoctml inside `out_dir`, which is created if
/// needed.
///
/// `cancel` is called before each input; once it returns `true` the
/// remaining inputs are left untouched and counted in
/// [`BatchReport::cancelled`].
///
/// # Errors
///
/// Only a failure to create `out_dir` aborts the conversion; per file
/// failures are reported in the returned [`BatchReport`].
pub fn convert_to_uoctml<P, F>(
    registry: &ReaderRegistry,
    inputs: &[P],
    out_dir: &Path,
    options: &BatchOptions,
    mut cancel: F,
) -> Result<BatchReport>
where
    P: AsRef<Path>,
    F: FnMut() -> bool,
{
    fs::create_dir_all(out_dir)?;
    let mut report = BatchReport::default();

    for (i, input) in inputs.iter().enumerate() {
        if cancel() {
            report.cancelled = inputs.len() - i;
            info!("aborting, {} files left", report.cancelled);
            break;
        }
        let input = input.as_ref();
        let target = target_path(input, out_dir);
        if target.exists() && !options.overwrite {
            info!("{}: {} exists already", input.display(), target.display());
            report
                .outcomes
                .push((input.to_owned(), Outcome::Exists(target)));
            continue;
        }

        let subject = match registry.load(input) {
            Ok(subject) => subject,
            Err(e) => {
                warn!("{}: could not be loaded", input.display());
                report.outcomes.push((input.to_owned(), Outcome::Unreadable(e)));
                continue;
            }
        };
        if subject.scans.is_empty() {
            info!("{}: no scans in this file", input.display());
        }
        report
            .scans
            .extend(summarize(input, &subject, options.anonymize));

        let outcome = match WriterOptions::new(&target)
            .anonymize(options.anonymize)
            .write_subject(&subject)
        {
            Ok(()) => {
                info!("{}: converted to {}", input.display(), target.display());
                Outcome::Converted(target)
            }
            Err(e) => {
                warn!("{}: conversion failed: {}", input.display(), e);
                Outcome::WriteFailed(e)
            }
        };
        report.outcomes.push((input.to_owned(), outcome));
    }

    info!(
        "{} of {} loadable files have been converted",
        report.converted(),
        report.loadable()
    );
    Ok(report)
}
