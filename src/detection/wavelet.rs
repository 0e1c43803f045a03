//! Continuous wavelet transform (CWT) ridge detection.
//!
//! The scan is resampled onto a uniform m/z grid and convolved with unit-energy
//! Mexican hat wavelets at scales `1..=scale_level`. Every local maximum of the scale 1
//! coefficients above that scale's threshold starts a ridge, which is then followed
//! through each larger scale. A ridge survives a scale only if a local maximum lies
//! within a small grid tolerance, clears the scale's threshold, and has not decayed
//! relative to the ridge's scale 1 coefficient. An isolated spike's coefficient falls
//! as `1 / sqrt(scale)` and drops out at scale 2. A feature wider than one grid
//! position gains magnitude with scale and persists.
//!
//! Each surviving ridge is reported as the most intense *original* data point under
//! the grid window around its seed. An interpolated coordinate is never reported.
use std::collections::{btree_map::Entry, BTreeMap, BTreeSet};

use log::{debug, trace};

use crate::peaks::{DataPoint, DetectedPeak};

use super::params::WaveletParams;
use super::signal::{first_most_intense, is_local_maximum, local_maxima, resample_linear, UniformGrid};

/// `2 / (sqrt(3) * pi^(1/4))`, the unit-energy normalization of the Mexican hat
pub const MEXICAN_HAT_NORM: f64 = 0.8673250705840776;

/// The wavelet is truncated at this many standard deviations on either side
pub const WAVELET_SUPPORT: f64 = 5.0;

/// The number of grid positions spanned by one wavelet window
pub const GRID_POINTS_PER_WINDOW: usize = 500;

/// Scans with fewer points than this cannot form a ridge
pub const MIN_POINTS: usize = 3;

/// Half-width, in grid positions, of the window mapped back to the original data
const PEAK_WINDOW_RADIUS: usize = 2;

/// Standard deviation, in grid positions, of the reference feature that sets each
/// scale's threshold. `±5` of these span one wavelet window.
pub const REFERENCE_WIDTH: f64 = GRID_POINTS_PER_WINDOW as f64 / 10.0;

/// A ridge whose coefficient falls below this fraction of its scale 1 coefficient
/// has decayed like an isolated spike
pub const RIDGE_DECAY_LIMIT: f64 = 0.8;

/// A discretized Mexican hat (negative normalized second derivative of a Gaussian)
/// at an integer scale, with its standard deviation equal to `scale` grid positions.
///
/// The weights are divided by `sqrt(scale)` to keep unit energy across scales, so a
/// single-position impulse of height `h` produces a peak coefficient of
/// `h * MEXICAN_HAT_NORM / sqrt(scale)`.
#[derive(Debug, Clone, PartialEq)]
pub struct MexicanHat {
    pub scale: u32,
    weights: Vec<f64>,
}

impl MexicanHat {
    pub fn new(scale: u32) -> Self {
        let s = scale.max(1) as f64;
        let half_width = (WAVELET_SUPPORT * s).ceil() as isize;
        let norm = MEXICAN_HAT_NORM / s.sqrt();
        let weights = (-half_width..=half_width)
            .map(|k| {
                let x = k as f64 / s;
                let x2 = x * x;
                norm * (1.0 - x2) * (-x2 / 2.0).exp()
            })
            .collect();
        Self { scale, weights }
    }

    pub fn half_width(&self) -> usize {
        self.weights.len() / 2
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Convolve `signal` with this wavelet, treating everything beyond either end
    /// as zero. The output has the same length as `signal`.
    pub fn convolve(&self, signal: &[f64]) -> Vec<f64> {
        let n = signal.len();
        let h = self.half_width();
        let mut coefficients = Vec::with_capacity(n);
        for i in 0..n {
            let lo = i.saturating_sub(h);
            let hi = (i + h).min(n.saturating_sub(1));
            let mut acc = 0.0;
            for (j, value) in signal.iter().enumerate().take(hi + 1).skip(lo) {
                // j - i + h is within [0, 2h] by construction of lo and hi
                acc += value * self.weights[j + h - i];
            }
            coefficients.push(acc);
        }
        coefficients
    }
}

/// The coefficient a ridge must exceed at the scale of `kernel`.
///
/// This is the response of `kernel` at the apex of a Gaussian of height `noise_level`
/// and standard deviation [`REFERENCE_WIDTH`]. A feature at least that tall and no
/// wider than the wavelet window clears it at every scale.
pub fn ridge_threshold(kernel: &MexicanHat, noise_level: f64) -> f64 {
    let h = kernel.half_width() as isize;
    let two_variance = 2.0 * REFERENCE_WIDTH * REFERENCE_WIDTH;
    kernel
        .weights()
        .iter()
        .zip(-h..=h)
        .map(|(w, k)| {
            let k = k as f64;
            w * noise_level * (-(k * k) / two_variance).exp()
        })
        .sum()
}

/// How far, in grid positions, a ridge may drift between consecutive scales
#[inline]
pub fn ridge_tolerance(scale: u32) -> usize {
    1 + scale as usize / 2
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Ridge {
    seed: usize,
    position: usize,
    /// The scale 1 coefficient at `seed`
    strength: f64,
}

/// The position of the strongest local maximum of `coefficients` within `tolerance`
/// of `position`
fn follow_ridge(coefficients: &[f64], position: usize, tolerance: usize) -> Option<usize> {
    let lo = position.saturating_sub(tolerance);
    let hi = (position + tolerance).min(coefficients.len().saturating_sub(1));
    let mut best: Option<usize> = None;
    for q in lo..=hi {
        if !is_local_maximum(coefficients, q) {
            continue;
        }
        match best {
            Some(b) if coefficients[b] >= coefficients[q] => {}
            _ => best = Some(q),
        }
    }
    best
}

/// Build the uniform grid for `points`, whose m/z span must be positive.
///
/// The spacing is `window_fraction * span / GRID_POINTS_PER_WINDOW`, so the grid
/// always holds about `GRID_POINTS_PER_WINDOW / window_fraction` positions and a
/// kernel's width in m/z is proportional to `scale * window_fraction`.
pub fn resample_scan(points: &[DataPoint], window_fraction: f64) -> Option<UniformGrid> {
    let (lo, hi) = match (points.first(), points.last()) {
        (Some(first), Some(last)) => (first.mz, last.mz),
        _ => return None,
    };
    let span = hi - lo;
    if !(span > 0.0) {
        return None;
    }
    let step = window_fraction * span / GRID_POINTS_PER_WINDOW as f64;
    let size = (span / step + 1e-6).floor() as usize + 1;
    Some(resample_linear(points, lo, step, size))
}

/// Too few points to transform: report the most intense point if it is signal
fn fallback(points: &[DataPoint], noise_level: f64) -> Vec<DetectedPeak> {
    first_most_intense(points)
        .map(|i| &points[i])
        .filter(|p| p.intensity > noise_level)
        .map(|p| vec![DetectedPeak::from(p)])
        .unwrap_or_default()
}

/// Advance `ridges` to the next scale's `coefficients`.
///
/// Ridges that converge on the same position are merged, keeping the one with the
/// strongest seed.
fn extend_ridges(
    ridges: Vec<Ridge>,
    coefficients: &[f64],
    threshold: f64,
    tolerance: usize,
) -> Vec<Ridge> {
    let mut merged: BTreeMap<usize, Ridge> = BTreeMap::new();
    for mut ridge in ridges {
        let Some(q) = follow_ridge(coefficients, ridge.position, tolerance) else {
            continue;
        };
        let c = coefficients[q];
        if c <= threshold || c < ridge.strength * RIDGE_DECAY_LIMIT {
            continue;
        }
        ridge.position = q;
        match merged.entry(q) {
            Entry::Vacant(slot) => {
                slot.insert(ridge);
            }
            Entry::Occupied(mut slot) => {
                if ridge.strength > slot.get().strength {
                    slot.insert(ridge);
                }
            }
        }
    }
    merged.into_values().collect()
}

/// Trace ridges across `1..=scale_level` and return their scale 1 seed positions.
///
/// The ridges alive at one scale are a subset of those alive at the scale before, so
/// raising `scale_level` never adds a ridge.
fn trace_ridges(grid: &UniformGrid, noise_level: f64, scale_level: u32) -> Option<Vec<usize>> {
    let mut ridges: Option<Vec<Ridge>> = None;

    for scale in 1..=scale_level.max(1) {
        let kernel = MexicanHat::new(scale);
        if kernel.len() > grid.len() {
            debug!(
                "Skipping wavelet scales {scale}..={scale_level}, kernel width {} exceeds grid size {}",
                kernel.len(),
                grid.len()
            );
            break;
        }
        let threshold = ridge_threshold(&kernel, noise_level);
        let coefficients = kernel.convolve(&grid.values);
        ridges = Some(match ridges {
            None => local_maxima(&coefficients)
                .into_iter()
                .filter(|i| coefficients[*i] > threshold)
                .map(|i| Ridge {
                    seed: i,
                    position: i,
                    strength: coefficients[i],
                })
                .collect(),
            Some(current) => {
                extend_ridges(current, &coefficients, threshold, ridge_tolerance(scale))
            }
        });
        if let Some(r) = ridges.as_ref() {
            trace!("{} ridges persist at scale {scale}", r.len());
        }
    }
    ridges.map(|r| r.into_iter().map(|ridge| ridge.seed).collect())
}

/// Map a grid window back onto the original points and pick the most intense one
fn original_apex(points: &[DataPoint], grid: &UniformGrid, seed: usize) -> Option<usize> {
    let radius = PEAK_WINDOW_RADIUS as isize;
    let seed = seed as isize;
    let low = grid.coordinate(seed - radius);
    let high = grid.coordinate(seed + radius);
    let start = points.partition_point(|p| p.mz < low);
    let end = points.partition_point(|p| p.mz <= high);
    if start < end {
        return first_most_intense(&points[start..end]).map(|i| start + i);
    }
    // The grid is finer than the sampling here, use the bracketing points
    let start = start.saturating_sub(1);
    let end = (end + 1).min(points.len());
    first_most_intense(&points[start..end]).map(|i| start + i)
}

/// Detect peaks in `points`, which must be sorted by m/z.
///
/// Scans with fewer than [`MIN_POINTS`] points or a zero-width m/z span report
/// their most intense point if it is above `noise_level`, and nothing otherwise.
/// Scales whose kernel is wider than the resampled grid are skipped.
pub fn detect_masses(
    points: &[DataPoint],
    noise_level: f64,
    scale_level: u32,
    window_fraction: f64,
) -> Vec<DetectedPeak> {
    if points.len() < MIN_POINTS {
        return fallback(points, noise_level);
    }
    let grid = match resample_scan(points, window_fraction) {
        Some(grid) => grid,
        None => return fallback(points, noise_level),
    };
    let seeds = match trace_ridges(&grid, noise_level, scale_level) {
        Some(seeds) => seeds,
        None => return fallback(points, noise_level),
    };

    let apexes: BTreeSet<usize> = seeds
        .into_iter()
        .filter_map(|seed| original_apex(points, &grid, seed))
        .filter(|i| points[*i].intensity > noise_level)
        .collect();
    apexes
        .into_iter()
        .map(|i| DetectedPeak::from(&points[i]))
        .collect()
}

impl WaveletParams {
    pub fn detect_masses(&self, points: &[DataPoint]) -> Vec<DetectedPeak> {
        detect_masses(
            points,
            self.noise_level,
            self.scale_level,
            self.window_fraction,
        )
    }
}
