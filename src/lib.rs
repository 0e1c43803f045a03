//! `mzdetect` turns profile mass spectra into per-scan lists of detected masses.
//!
//! Scans are read from mzXML or xy files through a [`ScanSource`](io::ScanSource), reduced
//! to peaks by one of two detectors chosen through
//! [`DetectionParameters`](detection::DetectionParameters), and written as MGF or tab
//! separated text through a [`MassListWriter`](io::MassListWriter).
//!
//! ```no_run
//! use mzdetect::detection::{run, DetectionParameters};
//! use mzdetect::io::{open_scan_source, open_sink};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let source = open_scan_source("./test/data/small.mzXML")?;
//! let mut sink = open_sink("small.mgf", None)?;
//! let params = DetectionParameters::centroid(1000.0)?;
//! let summary = run(source, &params, &mut sink, None)?;
//! println!("Wrote {} mass lists", summary.scans_written);
//! # Ok(())
//! # }
//! ```
pub mod detection;
pub mod io;
pub mod peaks;
pub mod scan;
pub mod utils;

pub use crate::peaks::{DataPoint, DetectedPeak, MassList};
pub use crate::scan::Scan;

pub use crate::detection::{Algorithm, DetectionError, DetectionParameters, RunSummary};
pub use crate::io::{MGFWriter, MzXMLReader, TsvWriter, XyReader};
