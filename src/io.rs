pub mod mgf;
pub mod mzxml;
pub mod traits;
pub mod tsv;
pub mod xy;
mod infer_format;

pub(crate) mod compression;

pub use crate::io::infer_format::{
    infer_from_bytes, infer_from_path, infer_from_stream, infer_output_format, open_scan_source,
    open_sink, ByteStream, MassListSink, MassSpectrometryFormat, OutputFormat, ScanReader,
};
pub use crate::io::mgf::MGFWriter;
pub use crate::io::mzxml::{MzXMLReader, PeaksEncoding};
pub use crate::io::traits::{
    MassListWriter, MemoryMassListWriter, MemoryScanSource, ScanSource, SinkError, SourceError,
};
pub use crate::io::tsv::TsvWriter;
pub use crate::io::xy::XyReader;
