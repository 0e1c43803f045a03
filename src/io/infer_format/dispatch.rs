use std::{
    fmt::Debug,
    fs,
    io::{self, BufRead, BufReader},
    path::Path,
};

use flate2::bufread::GzDecoder;
use log::debug;

use crate::io::compression::is_gzipped;
use crate::io::mgf::MGFWriter;
use crate::io::mzxml::MzXMLReader;
use crate::io::traits::{MassListWriter, ScanSource, SinkError, SourceError};
use crate::io::tsv::TsvWriter;
use crate::io::xy::XyReader;
use crate::peaks::MassList;
use crate::scan::Scan;

use super::inference::{
    infer_from_bytes, infer_from_path, infer_output_format, MassSpectrometryFormat, OutputFormat,
};

/// A possibly decompressed byte stream over an input file
pub type ByteStream = Box<dyn BufRead + Send>;

/// An explicit file format dispatching ADT over the readers this crate provides.
/// The preferred means of creating an instance is through [`ScanReader::open_path`].
#[non_exhaustive]
pub enum ScanReader {
    MzXML(MzXMLReader<ByteStream>),
    Xy(XyReader<ByteStream>),
}

impl Debug for ScanReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MzXML(reader) => f.debug_tuple("MzXML").field(&reader.state).finish(),
            Self::Xy(_) => f.debug_tuple("Xy").finish(),
        }
    }
}

impl ScanReader {
    /// Open the file at `path`, inferring its format from the extension and falling
    /// back to its leading bytes. Gzip compression is detected from the extension or
    /// the magic bytes and removed transparently.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let file = fs::File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => SourceError::NotFound(path.to_path_buf()),
            _ => SourceError::IOError(e),
        })?;
        let (format, gzip_extension) = infer_from_path(path);
        let mut raw = BufReader::new(file);
        let gzipped = gzip_extension || is_gzipped(raw.fill_buf()?);
        let mut stream: ByteStream = if gzipped {
            debug!("Decompressing {} as gzip", path.display());
            Box::new(BufReader::new(GzDecoder::new(raw)))
        } else {
            Box::new(raw)
        };
        let format = match format {
            MassSpectrometryFormat::Unknown => infer_from_bytes(stream.fill_buf()?),
            format => format,
        };
        debug!("Reading {} as {format}", path.display());
        Self::from_stream(stream, format)
            .ok_or_else(|| SourceError::UnsupportedFormat(path.to_path_buf()))
    }

    /// Wrap an already opened and decompressed stream in the reader for `format`
    pub fn from_stream(stream: ByteStream, format: MassSpectrometryFormat) -> Option<Self> {
        match format {
            MassSpectrometryFormat::MzXML => Some(Self::MzXML(MzXMLReader::new(stream))),
            MassSpectrometryFormat::Xy => Some(Self::Xy(XyReader::new(stream))),
            _ => None,
        }
    }
}

impl Iterator for ScanReader {
    type Item = Result<Scan, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::MzXML(reader) => reader.next(),
            Self::Xy(reader) => reader.next(),
        }
    }
}

impl ScanSource for ScanReader {
    fn format_name(&self) -> &'static str {
        match self {
            Self::MzXML(reader) => reader.format_name(),
            Self::Xy(reader) => reader.format_name(),
        }
    }
}

/// Open the scans stored at `path` as a [`ScanSource`]
pub fn open_scan_source<P: AsRef<Path>>(path: P) -> Result<ScanReader, SourceError> {
    ScanReader::open_path(path)
}

/// An explicit format dispatching ADT over the mass list writers this crate provides
#[non_exhaustive]
pub enum MassListSink<W: io::Write = fs::File> {
    MGF(MGFWriter<W>),
    TSV(TsvWriter<W>),
}

impl<W: io::Write> MassListSink<W> {
    pub fn new(handle: W, format: OutputFormat) -> Self {
        match format {
            OutputFormat::MGF => Self::MGF(MGFWriter::new(handle)),
            OutputFormat::TSV => Self::TSV(TsvWriter::new(handle)),
        }
    }

    pub fn format(&self) -> OutputFormat {
        match self {
            Self::MGF(_) => OutputFormat::MGF,
            Self::TSV(_) => OutputFormat::TSV,
        }
    }
}

impl MassListSink<fs::File> {
    /// Create the file at `path` and a writer for it. When `format` is not given it is
    /// inferred from the extension of `path`.
    pub fn create<P: AsRef<Path>>(path: P, format: Option<OutputFormat>) -> Result<Self, SinkError> {
        let path = path.as_ref();
        let format = format.unwrap_or_else(|| infer_output_format(path));
        let handle = fs::File::create(path).map_err(|e| SinkError::CreateFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        let sink = match format {
            OutputFormat::MGF => {
                let run_name = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "run".to_string());
                Self::MGF(MGFWriter::new(handle).with_run_name(run_name))
            }
            OutputFormat::TSV => Self::TSV(TsvWriter::new(handle)),
        };
        debug!("Writing {format} mass lists to {}", path.display());
        Ok(sink)
    }
}

impl<W: io::Write> MassListWriter for MassListSink<W> {
    fn write(&mut self, masses: &MassList) -> Result<usize, SinkError> {
        match self {
            Self::MGF(writer) => writer.write(masses),
            Self::TSV(writer) => writer.write(masses),
        }
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        match self {
            Self::MGF(writer) => writer.flush(),
            Self::TSV(writer) => writer.flush(),
        }
    }

    fn close(&mut self) -> Result<(), SinkError> {
        match self {
            Self::MGF(writer) => writer.close(),
            Self::TSV(writer) => writer.close(),
        }
    }
}

/// Create the output file at `path` as a [`MassListWriter`]
pub fn open_sink<P: AsRef<Path>>(
    path: P,
    format: Option<OutputFormat>,
) -> Result<MassListSink, SinkError> {
    MassListSink::create(path, format)
}
