mod dispatch;
mod inference;

pub use dispatch::{open_scan_source, open_sink, ByteStream, MassListSink, ScanReader};

pub use inference::{
    infer_from_bytes, infer_from_path, infer_from_stream, infer_output_format,
    MassSpectrometryFormat, OutputFormat,
};
