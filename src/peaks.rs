pub mod mass_list;
pub mod peak;

pub use crate::peaks::mass_list::MassList;
pub use crate::peaks::peak::{DataPoint, DetectedPeak, IntensityMeasurement, MZLocated};
