use thiserror::Error;

/// The noise level wavelet detection falls back to when none is configured.
///
/// A conventional starting value. It has no documented derivation
/// and is not a validated physical constant.
pub const DEFAULT_WAVELET_NOISE_LEVEL: f64 = 1.0e2;
pub const DEFAULT_SCALE_LEVEL: u32 = 2;
pub const DEFAULT_WINDOW_FRACTION: f64 = 0.10;

/// Invalid detection parameters
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("noise level must be a finite, non-negative number, got {0}")]
    InvalidNoiseLevel(f64),
    #[error("scale level must be at least 1, got {0}")]
    InvalidScaleLevel(u32),
    #[error("window size must be a fraction in (0, 1], got {0}")]
    InvalidWindowFraction(f64),
}

fn check_noise_level(noise_level: f64) -> Result<f64, ConfigError> {
    if noise_level.is_finite() && noise_level >= 0.0 {
        Ok(noise_level)
    } else {
        Err(ConfigError::InvalidNoiseLevel(noise_level))
    }
}

/// Parameters for local-maximum centroiding
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CentroidParams {
    /// Intensities at or below this value are noise
    pub noise_level: f64,
}

impl CentroidParams {
    pub fn new(noise_level: f64) -> Result<Self, ConfigError> {
        Ok(Self {
            noise_level: check_noise_level(noise_level)?,
        })
    }
}

/// Parameters for continuous wavelet transform ridge detection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveletParams {
    /// Intensities at or below this value are noise
    pub noise_level: f64,
    /// The number of wavelet scales, `1..=scale_level`, a ridge must persist across
    pub scale_level: u32,
    /// The wavelet window as a fraction of the scan's m/z range
    pub window_fraction: f64,
}

impl Default for WaveletParams {
    fn default() -> Self {
        Self {
            noise_level: DEFAULT_WAVELET_NOISE_LEVEL,
            scale_level: DEFAULT_SCALE_LEVEL,
            window_fraction: DEFAULT_WINDOW_FRACTION,
        }
    }
}

impl WaveletParams {
    pub fn new(noise_level: f64, scale_level: u32, window_fraction: f64) -> Result<Self, ConfigError> {
        let noise_level = check_noise_level(noise_level)?;
        if scale_level == 0 {
            return Err(ConfigError::InvalidScaleLevel(scale_level));
        }
        if !(window_fraction > 0.0 && window_fraction <= 1.0) {
            return Err(ConfigError::InvalidWindowFraction(window_fraction));
        }
        Ok(Self {
            noise_level,
            scale_level,
            window_fraction,
        })
    }

    /// As [`WaveletParams::new`], taking the window size as a percentage
    pub fn from_window_percent(
        noise_level: f64,
        scale_level: u32,
        window_percent: f64,
    ) -> Result<Self, ConfigError> {
        Self::new(noise_level, scale_level, window_percent / 100.0)
    }
}

/// The detection strategy applied to every scan of a run
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Algorithm {
    Centroid(CentroidParams),
    Wavelet(WaveletParams),
}

impl Algorithm {
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Centroid(_) => "centroid",
            Algorithm::Wavelet(_) => "wavelet",
        }
    }
}

impl Default for Algorithm {
    fn default() -> Self {
        Self::Wavelet(WaveletParams::default())
    }
}

/// The complete, read-only configuration of one detection run
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DetectionParameters {
    pub algorithm: Algorithm,
}

impl DetectionParameters {
    pub fn new(algorithm: Algorithm) -> Self {
        Self { algorithm }
    }

    pub fn centroid(noise_level: f64) -> Result<Self, ConfigError> {
        Ok(Self::new(Algorithm::Centroid(CentroidParams::new(noise_level)?)))
    }

    pub fn wavelet(noise_level: f64, scale_level: u32, window_fraction: f64) -> Result<Self, ConfigError> {
        Ok(Self::new(Algorithm::Wavelet(WaveletParams::new(
            noise_level,
            scale_level,
            window_fraction,
        )?)))
    }

    pub fn noise_level(&self) -> f64 {
        match &self.algorithm {
            Algorithm::Centroid(params) => params.noise_level,
            Algorithm::Wavelet(params) => params.noise_level,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_wavelet_defaults() {
        let params = DetectionParameters::default();
        assert_eq!(params.algorithm.name(), "wavelet");
        assert_eq!(params.noise_level(), 100.0);
        if let Algorithm::Wavelet(wp) = params.algorithm {
            assert_eq!(wp.scale_level, 2);
            assert_eq!(wp.window_fraction, 0.1);
        } else {
            panic!("Expected wavelet parameters");
        }
    }

    #[test]
    fn test_window_percent() {
        let wp = WaveletParams::from_window_percent(10.0, 3, 25.0).unwrap();
        assert_eq!(wp.window_fraction, 0.25);
        assert_eq!(
            WaveletParams::from_window_percent(10.0, 3, 0.0),
            Err(ConfigError::InvalidWindowFraction(0.0))
        );
        assert_eq!(
            WaveletParams::from_window_percent(10.0, 3, 150.0),
            Err(ConfigError::InvalidWindowFraction(1.5))
        );
    }

    #[test]
    fn test_rejects_bad_values() {
        assert_eq!(
            WaveletParams::new(10.0, 0, 0.1),
            Err(ConfigError::InvalidScaleLevel(0))
        );
        assert!(matches!(
            CentroidParams::new(f64::NAN),
            Err(ConfigError::InvalidNoiseLevel(_))
        ));
        assert_eq!(
            DetectionParameters::centroid(-1.0),
            Err(ConfigError::InvalidNoiseLevel(-1.0))
        );
        assert_eq!(DetectionParameters::centroid(5.0).unwrap().noise_level(), 5.0);
    }
}
