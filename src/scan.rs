use thiserror::Error;

use crate::peaks::DataPoint;

/// The ways a scan's signal can violate the ordering and sign invariants
/// detection relies on
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ScanValidationError {
    #[error("m/z values are not sorted ascending at position {0}")]
    Unsorted(usize),
    #[error("negative intensity at position {0}")]
    NegativeIntensity(usize),
    #[error("non-finite m/z or intensity at position {0}")]
    NonFinite(usize),
}

/// One spectrum: a set of (m/z, intensity) measurements at a single retention time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scan {
    /// The scan number reported by the source
    pub index: u32,
    /// Retention time in seconds
    pub retention_time: f64,
    pub points: Vec<DataPoint>,
}

impl Scan {
    pub fn new(index: u32, retention_time: f64, points: Vec<DataPoint>) -> Self {
        Self {
            index,
            retention_time,
            points,
        }
    }

    /// Build a scan from parallel m/z and intensity arrays, truncating to the shorter
    pub fn from_arrays(index: u32, retention_time: f64, mzs: &[f64], intensities: &[f64]) -> Self {
        let points = mzs
            .iter()
            .zip(intensities.iter())
            .map(|(mz, inten)| DataPoint::new(*mz, *inten))
            .collect();
        Self::new(index, retention_time, points)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The (min, max) m/z covered by the scan
    pub fn mz_range(&self) -> Option<(f64, f64)> {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => Some((first.mz, last.mz)),
            _ => None,
        }
    }

    /// Check that the points are finite, sorted by m/z and non-negative
    pub fn validate(&self) -> Result<(), ScanValidationError> {
        let mut last_mz = f64::NEG_INFINITY;
        for (i, point) in self.points.iter().enumerate() {
            if !point.mz.is_finite() || !point.intensity.is_finite() {
                return Err(ScanValidationError::NonFinite(i));
            }
            if point.mz < last_mz {
                return Err(ScanValidationError::Unsorted(i));
            }
            if point.intensity < 0.0 {
                return Err(ScanValidationError::NegativeIntensity(i));
            }
            last_mz = point.mz;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_validate() {
        let scan = Scan::from_arrays(1, 0.5, &[100.0, 100.1, 100.2], &[1.0, 5.0, 2.0]);
        assert!(scan.validate().is_ok());
        assert_eq!(scan.mz_range(), Some((100.0, 100.2)));

        let scan = Scan::from_arrays(2, 0.5, &[100.0, 99.0], &[1.0, 5.0]);
        assert_eq!(scan.validate(), Err(ScanValidationError::Unsorted(1)));

        let scan = Scan::from_arrays(3, 0.5, &[100.0, 101.0], &[1.0, -5.0]);
        assert_eq!(scan.validate(), Err(ScanValidationError::NegativeIntensity(1)));

        let scan = Scan::from_arrays(4, 0.5, &[f64::NAN], &[1.0]);
        assert_eq!(scan.validate(), Err(ScanValidationError::NonFinite(0)));

        assert!(Scan::default().validate().is_ok());
        assert_eq!(Scan::default().mz_range(), None);
    }
}
