//! Direct local-maximum centroiding.
//!
//! Each maximal run of points above the noise level is one peak region, and the
//! region's most intense point is reported as its centroid.
use crate::peaks::{DataPoint, DetectedPeak};

use super::params::CentroidParams;
use super::signal::{first_most_intense, NoiseGatedRuns};

/// Find one peak per contiguous above-noise run of `points`.
///
/// Ties within a run resolve to the first maximal point. Runs are closed by any
/// point at or below `noise_level` or by either end of the sequence. This is a
/// single pass over `points`.
pub fn detect_masses(points: &[DataPoint], noise_level: f64) -> Vec<DetectedPeak> {
    NoiseGatedRuns::new(points, noise_level)
        .filter_map(|run| {
            let region = &points[run.clone()];
            first_most_intense(region).map(|i| DetectedPeak::from(&region[i]))
        })
        .collect()
}

impl CentroidParams {
    pub fn detect_masses(&self, points: &[DataPoint]) -> Vec<DetectedPeak> {
        detect_masses(points, self.noise_level)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn points(pairs: &[(f64, f64)]) -> Vec<DataPoint> {
        pairs.iter().copied().map(DataPoint::from).collect()
    }

    #[test]
    fn test_single_profile_peak() {
        let pts = points(&[
            (100.0, 5.0),
            (100.1, 50.0),
            (100.2, 200.0),
            (100.3, 60.0),
            (100.4, 4.0),
        ]);
        let peaks = detect_masses(&pts, 10.0);
        assert_eq!(peaks, vec![DetectedPeak::new(100.2, 200.0)]);
    }

    #[test]
    fn test_runs_and_ties() {
        let pts = points(&[
            (200.0, 15.0),
            (200.1, 40.0),
            (200.2, 40.0),
            (200.3, 2.0),
            (200.4, 12.0),
            (200.5, 3.0),
            (200.6, 80.0),
            (200.7, 90.0),
        ]);
        let peaks = detect_masses(&pts, 10.0);
        assert_eq!(
            peaks,
            vec![
                DetectedPeak::new(200.1, 40.0),
                DetectedPeak::new(200.4, 12.0),
                DetectedPeak::new(200.7, 90.0),
            ]
        );
    }

    #[test]
    fn test_edge_cases() {
        assert!(detect_masses(&[], 10.0).is_empty());

        let lone = points(&[(150.0, 11.0)]);
        assert_eq!(detect_masses(&lone, 10.0), vec![DetectedPeak::new(150.0, 11.0)]);

        let quiet = points(&[(150.0, 10.0), (150.1, 9.0), (150.2, 10.0)]);
        assert!(detect_masses(&quiet, 10.0).is_empty());
    }

    #[test]
    fn test_never_reports_noise() {
        let pts: Vec<DataPoint> = (0..500)
            .map(|i| {
                let mz = 300.0 + i as f64 * 0.01;
                let intensity = ((i * 7919) % 97) as f64;
                DataPoint::new(mz, intensity)
            })
            .collect();
        for noise in [0.0, 10.0, 48.0, 95.0, 96.0] {
            let peaks = detect_masses(&pts, noise);
            let runs = NoiseGatedRuns::new(&pts, noise).count();
            assert!(peaks.len() <= runs);
            assert!(peaks.iter().all(|p| p.intensity > noise));
        }
    }
}
