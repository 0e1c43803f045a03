use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::peaks::MassList;
use crate::scan::Scan;

/// Errors raised while locating or reading scans from an input
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Input file not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to parse {context}: {message}")]
    ParseFailure { context: String, message: String },
    #[error("Could not determine the format of {0}")]
    UnsupportedFormat(PathBuf),
    #[error("An I/O error occurred while reading: {0}")]
    IOError(
        #[from]
        #[source]
        io::Error,
    ),
}

impl SourceError {
    pub fn parse_failure<C: Into<String>, M: ToString>(context: C, message: M) -> Self {
        Self::ParseFailure {
            context: context.into(),
            message: message.to_string(),
        }
    }
}

impl From<SourceError> for io::Error {
    fn from(value: SourceError) -> Self {
        match value {
            SourceError::IOError(e) => e,
            SourceError::NotFound(_) => io::Error::new(io::ErrorKind::NotFound, value),
            _ => io::Error::new(io::ErrorKind::InvalidData, value),
        }
    }
}

/// Errors raised while creating or writing an output
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to create output file {path}: {source}")]
    CreateFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to write mass list: {0}")]
    WriteFailed(
        #[from]
        #[source]
        io::Error,
    ),
}

impl From<SinkError> for io::Error {
    fn from(value: SinkError) -> Self {
        match value {
            SinkError::CreateFailed { source, .. } => source,
            SinkError::WriteFailed(e) => e,
        }
    }
}

/// An ordered, lazily produced sequence of scans.
///
/// A source yields `Err` for a failure it cannot recover from. Callers stop
/// reading after the first error.
pub trait ScanSource: Iterator<Item = Result<Scan, SourceError>> + Send {
    /// A short name for the kind of input, used in log messages
    fn format_name(&self) -> &'static str {
        "scans"
    }
}

/// A destination for per-scan mass lists.
///
/// [`MassListWriter::close`] must be called exactly once, after the last write or
/// when a run is abandoned.
pub trait MassListWriter {
    /// Write one mass list, returning the number of peaks written
    fn write(&mut self, masses: &MassList) -> Result<usize, SinkError>;

    /// As [`std::io::Write::flush`]
    fn flush(&mut self) -> Result<(), SinkError>;

    /// Flush and finalize the output
    fn close(&mut self) -> Result<(), SinkError>;

    /// Consume an [`Iterator`] over [`MassList`] references
    fn write_all<'b, T: Iterator<Item = &'b MassList>>(
        &mut self,
        iterator: T,
    ) -> Result<usize, SinkError>
    where
        Self: Sized,
    {
        let mut n = 0;
        for masses in iterator {
            n += self.write(masses)?;
        }
        Ok(n)
    }
}

impl<W: MassListWriter + ?Sized> MassListWriter for Box<W> {
    fn write(&mut self, masses: &MassList) -> Result<usize, SinkError> {
        (**self).write(masses)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        (**self).flush()
    }

    fn close(&mut self) -> Result<(), SinkError> {
        (**self).close()
    }
}

/// A [`ScanSource`] over scans already held in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryScanSource {
    scans: std::vec::IntoIter<Scan>,
}

impl MemoryScanSource {
    pub fn new(scans: Vec<Scan>) -> Self {
        Self {
            scans: scans.into_iter(),
        }
    }
}

impl From<Vec<Scan>> for MemoryScanSource {
    fn from(value: Vec<Scan>) -> Self {
        Self::new(value)
    }
}

impl Iterator for MemoryScanSource {
    type Item = Result<Scan, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.scans.next().map(Ok)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.scans.size_hint()
    }
}

impl ScanSource for MemoryScanSource {
    fn format_name(&self) -> &'static str {
        "memory"
    }
}

/// A [`MassListWriter`] that keeps everything it is given, for inspection
#[derive(Debug, Default, Clone)]
pub struct MemoryMassListWriter {
    pub mass_lists: Vec<MassList>,
    pub closed: bool,
}

impl MassListWriter for MemoryMassListWriter {
    fn write(&mut self, masses: &MassList) -> Result<usize, SinkError> {
        self.mass_lists.push(masses.clone());
        Ok(masses.len())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::peaks::DetectedPeak;

    #[test]
    fn test_memory_round_trip() {
        let source = MemoryScanSource::new(vec![Scan::new(1, 0.0, vec![]), Scan::new(2, 1.0, vec![])]);
        let indices: Vec<u32> = source.map(|s| s.unwrap().index).collect();
        assert_eq!(indices, vec![1, 2]);

        let lists = vec![
            MassList::new(1, 0.0, vec![DetectedPeak::new(100.0, 5.0)]),
            MassList::new(2, 1.0, vec![DetectedPeak::new(101.0, 5.0), DetectedPeak::new(99.0, 1.0)]),
        ];
        let mut writer = MemoryMassListWriter::default();
        assert_eq!(writer.write_all(lists.iter()).unwrap(), 3);
        writer.close().unwrap();
        assert!(writer.closed);
        assert_eq!(writer.mass_lists, lists);
    }

    #[test]
    fn test_error_conversion() {
        let err: io::Error = SourceError::NotFound(PathBuf::from("missing.mzXML")).into();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        let err: io::Error = SourceError::parse_failure("scan 4", "bad peaks").into();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("scan 4"));
    }
}
