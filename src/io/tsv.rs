use std::io::{self, prelude::*, BufWriter};

use crate::io::traits::{MassListWriter, SinkError};
use crate::peaks::{IntensityMeasurement, MZLocated, MassList};

pub const TSV_HEADER: &str = "scan\tretention_time\tmz\tintensity";

/// Writes mass lists as one tab separated row per peak under a single header line.
///
/// The header is written with the first mass list, or on close if nothing was written.
pub struct TsvWriter<W: io::Write> {
    pub handle: io::BufWriter<W>,
    header_written: bool,
}

impl<W: io::Write> TsvWriter<W> {
    pub fn new(file: W) -> Self {
        Self {
            handle: io::BufWriter::with_capacity(8192, file),
            header_written: false,
        }
    }

    pub fn into_inner(self) -> BufWriter<W> {
        self.handle
    }

    fn write_header(&mut self) -> io::Result<()> {
        if !self.header_written {
            self.handle.write_all(TSV_HEADER.as_bytes())?;
            self.handle.write_all(b"\n")?;
            self.header_written = true;
        }
        Ok(())
    }

    pub fn write_mass_list(&mut self, masses: &MassList) -> io::Result<usize> {
        self.write_header()?;
        let scan = masses.scan_index.to_string();
        let time = masses.retention_time.to_string();
        for peak in masses {
            writeln!(
                self.handle,
                "{scan}\t{time}\t{}\t{}",
                peak.mz(),
                peak.intensity()
            )?;
        }
        Ok(masses.len())
    }
}

impl<W: io::Write> MassListWriter for TsvWriter<W> {
    fn write(&mut self, masses: &MassList) -> Result<usize, SinkError> {
        Ok(self.write_mass_list(masses)?)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(self.handle.flush()?)
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.write_header()?;
        Ok(self.handle.flush()?)
    }
}
