//! Numeric building blocks shared by the detectors: noise gating, local
//! extrema and linear resampling onto a uniform grid.
use std::ops::Range;

use crate::peaks::{DataPoint, IntensityMeasurement};

/// An iterator over the maximal runs of consecutive points whose intensity
/// is strictly above a noise level. Points at or below the noise level act as
/// boundaries and are never part of a run.
#[derive(Debug, Clone)]
pub struct NoiseGatedRuns<'a, P: IntensityMeasurement> {
    points: &'a [P],
    noise_level: f64,
    offset: usize,
}

impl<'a, P: IntensityMeasurement> NoiseGatedRuns<'a, P> {
    pub fn new(points: &'a [P], noise_level: f64) -> Self {
        Self {
            points,
            noise_level,
            offset: 0,
        }
    }
}

impl<P: IntensityMeasurement> Iterator for NoiseGatedRuns<'_, P> {
    type Item = Range<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let n = self.points.len();
        let start = (self.offset..n).find(|i| self.points[*i].intensity() > self.noise_level)?;
        let end = (start..n)
            .find(|i| self.points[*i].intensity() <= self.noise_level)
            .unwrap_or(n);
        self.offset = end;
        Some(start..end)
    }
}

/// Whether `values[i]` is a local maximum.
///
/// The left neighbor must be strictly lower and the right neighbor lower or equal,
/// so a flat plateau reports only its first position. Positions past either end
/// count as lower than anything.
#[inline]
pub fn is_local_maximum(values: &[f64], i: usize) -> bool {
    let v = values[i];
    let left = if i > 0 { values[i - 1] } else { f64::NEG_INFINITY };
    let right = values.get(i + 1).copied().unwrap_or(f64::NEG_INFINITY);
    v > left && v >= right
}

/// The indices of all local maxima of `values` in ascending order
pub fn local_maxima(values: &[f64]) -> Vec<usize> {
    (0..values.len())
        .filter(|i| is_local_maximum(values, *i))
        .collect()
}

/// The index of the first maximal intensity in `points`
pub fn first_most_intense<P: IntensityMeasurement>(points: &[P]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, p) in points.iter().enumerate() {
        match best {
            Some((_, v)) if v >= p.intensity() => {}
            _ => best = Some((i, p.intensity())),
        }
    }
    best.map(|(i, _)| i)
}

/// A signal sampled at `start + k * step` for `k` in `0..values.len()`
#[derive(Debug, Clone, PartialEq)]
pub struct UniformGrid {
    pub start: f64,
    pub step: f64,
    pub values: Vec<f64>,
}

impl UniformGrid {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The coordinate of grid position `k`, which may lie outside the grid
    #[inline]
    pub fn coordinate(&self, k: isize) -> f64 {
        self.start + k as f64 * self.step
    }
}

/// Linearly interpolate `points`, sorted by m/z, onto a uniform grid of `size`
/// positions beginning at `start` and spaced by `step`.
///
/// Grid positions outside the m/z span of `points` are zero-filled.
pub fn resample_linear(points: &[DataPoint], start: f64, step: f64, size: usize) -> UniformGrid {
    let mut values = Vec::with_capacity(size);
    let (lo, hi) = match (points.first(), points.last()) {
        (Some(first), Some(last)) => (first.mz, last.mz),
        _ => {
            values.resize(size, 0.0);
            return UniformGrid { start, step, values };
        }
    };
    // Tolerate rounding when the grid is meant to end exactly on the last point
    let eps = step.abs() * 1e-6;
    let mut j = 0usize;
    for k in 0..size {
        let x = start + k as f64 * step;
        if x < lo - eps || x > hi + eps {
            values.push(0.0);
            continue;
        }
        while j + 1 < points.len() && points[j + 1].mz < x {
            j += 1;
        }
        let left = &points[j];
        let value = match points.get(j + 1) {
            Some(right) if right.mz > left.mz => {
                let t = ((x - left.mz) / (right.mz - left.mz)).clamp(0.0, 1.0);
                left.intensity + t * (right.intensity - left.intensity)
            }
            Some(right) => left.intensity.max(right.intensity),
            None => left.intensity,
        };
        values.push(value);
    }
    UniformGrid { start, step, values }
}

#[cfg(test)]
mod test {
    use super::*;

    fn points(pairs: &[(f64, f64)]) -> Vec<DataPoint> {
        pairs.iter().copied().map(DataPoint::from).collect()
    }

    #[test]
    fn test_noise_gated_runs() {
        let pts = points(&[
            (1.0, 20.0),
            (2.0, 30.0),
            (3.0, 10.0),
            (4.0, 5.0),
            (5.0, 11.0),
            (6.0, 10.0),
            (7.0, 50.0),
        ]);
        let runs: Vec<_> = NoiseGatedRuns::new(&pts, 10.0).collect();
        assert_eq!(runs, vec![0..2, 4..5, 6..7]);

        let runs: Vec<_> = NoiseGatedRuns::new(&pts, 100.0).collect();
        assert!(runs.is_empty());

        let empty: Vec<DataPoint> = Vec::new();
        assert_eq!(NoiseGatedRuns::new(&empty, 0.0).count(), 0);
    }

    #[test]
    fn test_local_maxima() {
        let values = [1.0, 3.0, 2.0, 2.0, 5.0, 5.0, 4.0, 6.0];
        assert_eq!(local_maxima(&values), vec![1, 4, 7]);
        assert_eq!(local_maxima(&[2.0]), vec![0]);
        assert!(local_maxima(&[]).is_empty());
    }

    #[test]
    fn test_first_most_intense() {
        let pts = points(&[(1.0, 3.0), (2.0, 7.0), (3.0, 7.0), (4.0, 1.0)]);
        assert_eq!(first_most_intense(&pts), Some(1));
        assert_eq!(first_most_intense::<DataPoint>(&[]), None);
    }

    #[test]
    fn test_resample_linear() {
        let pts = points(&[(10.0, 0.0), (11.0, 10.0), (13.0, 30.0)]);
        let grid = resample_linear(&pts, 9.0, 0.5, 11);
        let expected = [0.0, 0.0, 0.0, 5.0, 10.0, 15.0, 20.0, 25.0, 30.0, 0.0, 0.0];
        assert_eq!(grid.len(), expected.len());
        for (a, b) in grid.values.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-9, "{a} != {b}");
        }
        assert_eq!(grid.coordinate(4), 11.0);
    }
}
