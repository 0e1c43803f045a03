use std::slice;

use super::peak::DetectedPeak;

/// The peaks detected in one scan, in ascending m/z order.
///
/// A `MassList` keeps the index and retention time of the scan it was derived from
/// so that writers can label it, but holds no reference to the scan itself.
#[derive(Default, Clone, Debug, PartialEq)]
pub struct MassList {
    pub scan_index: u32,
    pub retention_time: f64,
    peaks: Vec<DetectedPeak>,
}

impl MassList {
    /// Create a new `MassList`, sorting `peaks` by m/z
    pub fn new(scan_index: u32, retention_time: f64, mut peaks: Vec<DetectedPeak>) -> Self {
        peaks.sort_by(|a, b| a.mz.total_cmp(&b.mz));
        Self {
            scan_index,
            retention_time,
            peaks,
        }
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, DetectedPeak> {
        self.peaks.iter()
    }
}

impl<'a> IntoIterator for &'a MassList {
    type Item = &'a DetectedPeak;
    type IntoIter = slice::Iter<'a, DetectedPeak>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
