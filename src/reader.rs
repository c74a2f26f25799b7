//! Format dispatch by file name suffix.
//!
//! A [`ReaderRegistry`] holds an ordered list of [`OctReader`]s. Loading a
//! path tries, in registration order, every reader with an extension which
//! is a literal, case-sensitive suffix of the path. The first successful
//! decode wins; failures are collected and reported together if no reader
//! succeeds.
use log::{debug, warn};
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

use crate::error::{OctError, ReaderFailure, Result};
use crate::format::eyetec::EyetecReader;
use crate::format::heidelberg::HeidelbergReader;
use crate::format::nidek::NidekReader;
use crate::format::topcon::TopconReader;
use crate::format::uoctml::UoctmlReader;
use crate::j2k::{default_decoder, Jpeg2000Decoder};
use crate::subject::Subject;
use crate::util::has_suffix;

/// A decoder of one file format into a [`Subject`].
pub trait OctReader: Debug + Send + Sync {
    /// Display name, used in failure reports.
    fn name(&self) -> &str;

    /// Recognized file name suffixes, including the leading dot if any.
    fn extensions(&self) -> &[&'static str];

    /// Decode the file at `path`.
    fn decode(&self, path: &Path) -> Result<Subject>;
}

/// Handle to a registration, needed to remove it again.
///
/// This handle is neither `Clone` nor `Copy`: a registration can be
/// removed at most once.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ReaderId(u64);

/// Ordered collection of readers.
#[derive(Debug, Default)]
pub struct ReaderRegistry {
    entries: Vec<(u64, Box<dyn OctReader>)>,
    next_id: u64,
}

impl ReaderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        ReaderRegistry::default()
    }

    /// Append a reader. It is tried after every reader registered before.
    pub fn register<R: OctReader + 'static>(&mut self, reader: R) -> ReaderId {
        self.register_boxed(Box::new(reader))
    }

    /// Append an already boxed reader.
    pub fn register_boxed(&mut self, reader: Box<dyn OctReader>) -> ReaderId {
        let id = self.next_id;
        self.next_id += 1;
        debug!("registering reader {} as #{}", reader.name(), id);
        self.entries.push((id, reader));
        ReaderId(id)
    }

    /// Remove a registration, giving the reader back.
    pub fn unregister(&mut self, id: ReaderId) -> Option<Box<dyn OctReader>> {
        let pos = self.entries.iter().position(|(i, _)| *i == id.0)?;
        Some(self.entries.remove(pos).1)
    }

    /// Names and extensions of the registered readers, in order.
    pub fn readers(&self) -> impl Iterator<Item = (&str, &[&'static str])> {
        self.entries.iter().map(|(_, r)| (r.name(), r.extensions()))
    }

    /// Number of registered readers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no reader is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Readers which claim `path`, in the order they would be tried.
    pub fn matching<'a>(&'a self, path: &'a Path) -> impl Iterator<Item = &'a dyn OctReader> {
        self.entries
            .iter()
            .map(|(_, r)| r.as_ref())
            .filter(move |r| r.extensions().iter().any(|ext| has_suffix(path, ext)))
    }

    /// Whether at least one reader claims `path`.
    pub fn supports<P: AsRef<Path>>(&self, path: P) -> bool {
        self.matching(path.as_ref()).next().is_some()
    }

    /// Load the subject stored at `path`.
    ///
    /// # Errors
    ///
    /// - `OctError::NoReaderMatched` listing every rejection if no matching
    /// reader succeeds, or if none matches at all.
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Subject> {
        let path = path.as_ref();
        let mut failures = Vec::new();
        for reader in self.matching(path) {
            debug!("trying {} reader on {}", reader.name(), path.display());
            match reader.decode(path) {
                Ok(subject) => return Ok(subject),
                Err(error) => {
                    warn!("{} reader rejected {}: {}", reader.name(), path.display(), error);
                    failures.push(ReaderFailure {
                        reader: reader.name().to_owned(),
                        error,
                    });
                }
            }
        }
        Err(OctError::NoReaderMatched(failures))
    }
}

/// Options and flags which can be used to configure how OCT files are
/// read.
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    jpeg2000: Arc<dyn Jpeg2000Decoder>,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        ReaderOptions {
            jpeg2000: default_decoder(),
        }
    }
}

impl ReaderOptions {
    /// Creates a blank new set of options ready for configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the given decoder for embedded JPEG 2000 images.
    pub fn jpeg2000_decoder(mut self, decoder: Arc<dyn Jpeg2000Decoder>) -> Self {
        self.jpeg2000 = decoder;
        self
    }

    /// Build a registry holding every supported format, in the order
    /// uoctml, Heidelberg, Topcon, Nidek, Eyetec.
    pub fn registry(&self) -> ReaderRegistry {
        let mut registry = ReaderRegistry::new();
        let _ = registry.register(UoctmlReader);
        let _ = registry.register(HeidelbergReader);
        let _ = registry.register(TopconReader::new(Arc::clone(&self.jpeg2000)));
        let _ = registry.register(NidekReader);
        let _ = registry.register(EyetecReader);
        registry
    }

    /// Read a subject from any supported file.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use uoct::ReaderOptions;
    /// # use uoct::Result;
    ///
    /// # fn run() -> Result<()> {
    /// let subject = ReaderOptions::new().read_file("scan.fda")?;
    /// println!("{} scans", subject.scans.len());
    /// # Ok(())
    /// # }
    /// ```
    pub fn read_file<P: AsRef<Path>>(&self, path: P) -> Result<Subject> {
        self.registry().load(path)
    }
}

#[cfg(test)]
mod tests {
    use super::{OctReader, ReaderOptions, ReaderRegistry};
    use crate::error::{ErrorCategory, OctError, Result};
    use crate::subject::Subject;
    use std::path::Path;

    #[derive(Debug)]
    struct Fixed(&'static str, &'static [&'static str], bool);

    impl OctReader for Fixed {
        fn name(&self) -> &str {
            self.0
        }
        fn extensions(&self) -> &[&'static str] {
            self.1
        }
        fn decode(&self, _: &Path) -> Result<Subject> {
            if self.2 {
                let mut s = Subject::new();
                let _ = s.info.insert("by".to_owned(), self.0.to_owned());
                Ok(s)
            } else {
                Err(OctError::invalid("nope"))
            }
        }
    }

    #[test]
    fn unregister_removes_only_its_entry() {
        let mut reg = ReaderRegistry::new();
        let a = reg.register(Fixed("A", &[".x"], true));
        let _b = reg.register(Fixed("B", &[".x"], true));
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.unregister(a).map(|r| r.name().to_owned()), Some("A".into()));
        let names: Vec<_> = reg.readers().map(|(n, _)| n).collect();
        assert_eq!(names, ["B"]);
        assert_eq!(reg.load("f.x").unwrap().info["by"], "B");
    }

    #[test]
    fn unmatched_path_reports_no_reader() {
        let mut reg = ReaderRegistry::new();
        let _ = reg.register(Fixed("A", &[".x"], true));
        let err = reg.load("f.y").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::NoReader);
        assert_eq!(err.to_string(), "Could not read the file.");
    }

    #[test]
    fn default_registry_order() {
        let reg = ReaderOptions::new().registry();
        let names: Vec<_> = reg.readers().map(|(n, _)| n).collect();
        assert_eq!(names, ["UOCTML", "Heidelberg Spectralis OCT", "Topcon OCT", "Nidek OCT", "Eyetec"]);
        assert!(reg.supports("a/b.E2E"));
        assert!(reg.supports("a/bx.xml"));
        assert!(!reg.supports("a/b.FDA"));
    }
}
