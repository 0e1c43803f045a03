use std::{
    fmt::Display,
    io::{self, prelude::*},
    path,
    str::FromStr,
};

use flate2::bufread::GzDecoder;
use log::warn;

use crate::io::{
    compression::{is_gzipped, is_gzipped_extension},
    mzxml::is_mzxml,
    xy::is_xy,
};

/// The number of leading bytes inspected when sniffing a stream
pub(crate) const SNIFF_LENGTH: usize = 512;

/// Scan input formats this crate can read
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MassSpectrometryFormat {
    MzXML,
    Xy,
    Unknown,
}

impl Display for MassSpectrometryFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Given a path, infer the file format and whether or not the file at that path is
/// GZIP compressed
pub fn infer_from_path<P: AsRef<path::Path>>(path: P) -> (MassSpectrometryFormat, bool) {
    let (is_gzipped, path) = is_gzipped_extension(path.as_ref());
    let form = match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("mzxml") => MassSpectrometryFormat::MzXML,
        Some("xy") => MassSpectrometryFormat::Xy,
        _ => MassSpectrometryFormat::Unknown,
    };
    (form, is_gzipped)
}

/// Infer the format of already decompressed leading bytes
pub fn infer_from_bytes(buf: &[u8]) -> MassSpectrometryFormat {
    if is_mzxml(buf) {
        MassSpectrometryFormat::MzXML
    } else if is_xy(buf) {
        MassSpectrometryFormat::Xy
    } else {
        MassSpectrometryFormat::Unknown
    }
}

/// Given a stream of bytes, infer the file format and whether or not the
/// stream is GZIP compressed. The stream is returned to its starting position.
pub fn infer_from_stream<R: Read + Seek>(
    stream: &mut R,
) -> io::Result<(MassSpectrometryFormat, bool)> {
    let current_pos = stream.stream_position()?;
    let mut buf = Vec::with_capacity(SNIFF_LENGTH);
    stream.by_ref().take(SNIFF_LENGTH as u64).read_to_end(&mut buf)?;
    let is_stream_gzipped = is_gzipped(&buf);
    if is_stream_gzipped {
        let mut decoder = GzDecoder::new(buf.as_slice());
        let mut decompressed_buf = Vec::new();
        // Only a prefix of the member is available, so keep whatever inflated before the error
        let _ = decoder.read_to_end(&mut decompressed_buf);
        buf = decompressed_buf;
    }
    stream.seek(io::SeekFrom::Start(current_pos))?;
    Ok((infer_from_bytes(&buf), is_stream_gzipped))
}

/// Mass list output formats this crate can write
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    #[default]
    MGF,
    TSV,
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::MGF => f.write_str("mgf"),
            OutputFormat::TSV => f.write_str("tsv"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mgf" => Ok(Self::MGF),
            "tsv" | "txt" => Ok(Self::TSV),
            _ => Err(format!("unknown output format {s:?}, expected mgf or tsv")),
        }
    }
}

/// Choose an output format from the extension of `path`, defaulting to MGF
pub fn infer_output_format<P: AsRef<path::Path>>(path: P) -> OutputFormat {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("mgf") => OutputFormat::MGF,
        Some("tsv") | Some("txt") => OutputFormat::TSV,
        Some("cdf") => {
            warn!(
                "netCDF output is not supported, writing MGF to {}",
                path.display()
            );
            OutputFormat::MGF
        }
        _ => {
            warn!(
                "Could not infer an output format for {}, writing MGF",
                path.display()
            );
            OutputFormat::MGF
        }
    }
}
