use std::cmp;
use std::fmt;

/// Anything with a position along the m/z dimension
pub trait MZLocated {
    fn mz(&self) -> f64;
}

pub trait IntensityMeasurement {
    fn intensity(&self) -> f64;
}

/// A single raw measurement in a scan's profile
#[derive(Default, Clone, Copy, Debug, PartialEq)]
pub struct DataPoint {
    pub mz: f64,
    pub intensity: f64,
}

impl DataPoint {
    pub fn new(mz: f64, intensity: f64) -> Self {
        Self { mz, intensity }
    }
}

impl fmt::Display for DataPoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "DataPoint({}, {})", self.mz, self.intensity)
    }
}

impl From<(f64, f64)> for DataPoint {
    fn from((mz, intensity): (f64, f64)) -> Self {
        Self { mz, intensity }
    }
}

impl MZLocated for DataPoint {
    #[inline]
    fn mz(&self) -> f64 {
        self.mz
    }
}

impl IntensityMeasurement for DataPoint {
    #[inline]
    fn intensity(&self) -> f64 {
        self.intensity
    }
}

/// The representative (m/z, intensity) pair of one detected feature.
///
/// Both detectors report coordinates copied from a real [`DataPoint`] of the
/// scan, never an interpolated position.
#[derive(Default, Clone, Copy, Debug)]
pub struct DetectedPeak {
    pub mz: f64,
    pub intensity: f64,
}

impl DetectedPeak {
    pub fn new(mz: f64, intensity: f64) -> Self {
        Self { mz, intensity }
    }
}

impl fmt::Display for DetectedPeak {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "DetectedPeak({}, {})", self.mz, self.intensity)
    }
}

impl From<&DataPoint> for DetectedPeak {
    fn from(point: &DataPoint) -> Self {
        Self {
            mz: point.mz,
            intensity: point.intensity,
        }
    }
}

impl From<DataPoint> for DetectedPeak {
    fn from(point: DataPoint) -> Self {
        (&point).into()
    }
}

impl cmp::PartialOrd<DetectedPeak> for DetectedPeak {
    fn partial_cmp(&self, other: &DetectedPeak) -> Option<cmp::Ordering> {
        self.mz.partial_cmp(&other.mz)
    }
}

impl cmp::PartialEq<DetectedPeak> for DetectedPeak {
    fn eq(&self, other: &DetectedPeak) -> bool {
        if (self.mz - other.mz).abs() > 1e-3 || (self.intensity - other.intensity).abs() > 1e-3 {
            return false;
        }
        true
    }
}

impl MZLocated for DetectedPeak {
    #[inline]
    fn mz(&self) -> f64 {
        self.mz
    }
}

impl IntensityMeasurement for DetectedPeak {
    #[inline]
    fn intensity(&self) -> f64 {
        self.intensity
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_peak_from_point() {
        let point = DataPoint::new(204.08, 1500.0);
        let peak: DetectedPeak = point.into();
        assert_eq!(peak.mz(), point.mz());
        assert_eq!(peak.intensity(), 1500.0);
        assert_eq!(peak, DetectedPeak::new(204.08, 1500.0));
        assert!(DetectedPeak::new(100.0, 1.0) < peak);
    }
}
