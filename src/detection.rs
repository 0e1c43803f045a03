//! Mass detection: turning one scan's profile signal into a list of discrete peaks.
//!
//! Two strategies are provided, selected through [`Algorithm`]:
//! - [`centroid`], which reports the apex of each contiguous above-noise region
//! - [`wavelet`], which reports features whose continuous wavelet transform ridge
//!   persists across several scales
//!
//! [`runner`] applies one strategy to every scan of a [`ScanSource`](crate::io::ScanSource).
pub mod centroid;
pub mod params;
pub mod runner;
pub mod signal;
pub mod wavelet;

pub use crate::detection::params::{
    Algorithm, CentroidParams, ConfigError, DetectionParameters, WaveletParams,
    DEFAULT_SCALE_LEVEL, DEFAULT_WAVELET_NOISE_LEVEL, DEFAULT_WINDOW_FRACTION,
};
pub use crate::detection::runner::{run, run_sequential, DetectionError, RunSummary};
pub use crate::detection::wavelet::MexicanHat;

use crate::peaks::{DataPoint, DetectedPeak, MassList};
use crate::scan::Scan;

impl Algorithm {
    /// Apply this strategy to a bare point sequence, which must already be sorted by m/z
    pub fn detect_masses(&self, points: &[DataPoint]) -> Vec<DetectedPeak> {
        match self {
            Algorithm::Centroid(params) => params.detect_masses(points),
            Algorithm::Wavelet(params) => params.detect_masses(points),
        }
    }

    /// Validate `scan` and detect its peaks.
    ///
    /// A scan whose points are unsorted, negative or non-finite yields
    /// [`DetectionError::InvalidScan`] rather than a partial result.
    pub fn detect(&self, scan: &Scan) -> Result<MassList, DetectionError> {
        scan.validate()
            .map_err(|e| DetectionError::InvalidScan {
                index: scan.index,
                reason: e,
            })?;
        let peaks = self.detect_masses(&scan.points);
        Ok(MassList::new(scan.index, scan.retention_time, peaks))
    }
}

impl DetectionParameters {
    pub fn detect(&self, scan: &Scan) -> Result<MassList, DetectionError> {
        self.algorithm.detect(scan)
    }
}
