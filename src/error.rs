//! Types for error handling go here.

use std::fmt;
use std::io::Error as IOError;

quick_error! {
    /// Error type for all errors from reading, writing or analysing OCT data.
    #[derive(Debug)]
    pub enum OctError {
        /// The file does not have the structure its format requires
        /// (bad magic code, unexpected field value, truncated record...).
        InvalidFormat(msg: String) {
            display("invalid file: {}", msg)
        }
        /// The container declares a version this crate does not read.
        UnsupportedVersion(found: String) {
            display("unsupported version {}", found)
        }
        /// An unrecognized element was found in a closed XML schema.
        UnknownTag(tag: String) {
            display("unknown tag <{}>", tag)
        }
        /// An attribute holds a value outside of its closed set.
        UnknownValue(attr: &'static str, value: String) {
            display("unknown {} \"{}\"", attr, value)
        }
        /// A required XML attribute is missing.
        MissingAttribute(attr: String) {
            display("missing attribute \"{}\"", attr)
        }
        /// A required manifest entry is missing.
        MissingKey(key: String) {
            display("missing key \"{}\"", key)
        }
        /// A declared payload size disagrees with the raster it describes.
        SizeMismatch { what: &'static str, expected: usize, found: usize } {
            display("{} size mismatch: expected {}, found {}", what, expected, found)
        }
        /// A raw buffer does not hold exactly `channels * width * height` samples.
        RasterSize(dims: Vec<usize>, len: usize) {
            display("buffer of {} samples does not fit dimensions {:?}", len, dims)
        }
        /// Attempted to access a raster outside of its boundaries.
        OutOfBounds(coords: Vec<usize>) {
            display("out of bounds access at {:?}", coords)
        }
        /// The requested contours cannot be used for quantification.
        InvalidContours(msg: String) {
            display("invalid contours: {}", msg)
        }
        /// The embedded image codec rejected a payload.
        Codec(msg: String) {
            display("image codec error: {}", msg)
        }
        /// A failure inside a named uoctml tag.
        Tagged(tag: String, err: Box<OctError>) {
            display("tag \"{}\": {}", tag, err)
            source(err)
        }
        /// No registered reader accepted the file.
        NoReaderMatched(failures: Vec<ReaderFailure>) {
            display("{}Could not read the file.", FailureList(failures))
        }
        /// XML syntax error
        Xml(err: quick_xml::Error) {
            from()
            source(err)
            display("XML error: {}", err)
        }
        /// Zip container error
        Archive(err: zip::result::ZipError) {
            from()
            source(err)
            display("archive error: {}", err)
        }
        /// I/O Error
        Io(err: IOError) {
            from()
            source(err)
            display("I/O error: {}", err)
        }
    }
}

/// Coarse classification of an [`OctError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Wrong magic, signature, version, tag or attribute value.
    Structure,
    /// Declared payload size disagrees with the expected byte count.
    Size,
    /// File open, read or seek failure.
    Io,
    /// No reader matched the path, or all matching readers failed.
    NoReader,
    /// The caller passed arguments that cannot be honoured.
    Input,
}

impl OctError {
    /// Classify this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            OctError::SizeMismatch { .. } => ErrorCategory::Size,
            OctError::Io(_) => ErrorCategory::Io,
            OctError::NoReaderMatched(_) => ErrorCategory::NoReader,
            OctError::Tagged(_, err) => err.category(),
            OctError::OutOfBounds(_) | OctError::InvalidContours(_) | OctError::RasterSize(..) => {
                ErrorCategory::Input
            }
            _ => ErrorCategory::Structure,
        }
    }

    pub(crate) fn invalid<S: Into<String>>(msg: S) -> Self {
        OctError::InvalidFormat(msg.into())
    }

    pub(crate) fn tagged(self, tag: &str) -> Self {
        OctError::Tagged(tag.to_owned(), Box::new(self))
    }
}

/// One rejected decoding attempt, kept by the registry while it tries the
/// next matching reader.
#[derive(Debug)]
pub struct ReaderFailure {
    /// Display name of the reader.
    pub reader: String,
    /// Why it rejected the file.
    pub error: OctError,
}

impl fmt::Display for ReaderFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.reader, self.error)
    }
}

struct FailureList<'a>(&'a [ReaderFailure]);

impl<'a> fmt::Display for FailureList<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for failure in self.0 {
            writeln!(f, "{}", failure)?;
        }
        Ok(())
    }
}

/// Alias type for results originated from this crate.
pub type Result<T> = ::std::result::Result<T, OctError>;
