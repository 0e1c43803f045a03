use std::io::{self, prelude::*, BufWriter};

use crate::io::traits::{MassListWriter, SinkError};
use crate::peaks::{IntensityMeasurement, MZLocated, MassList};

/// An MGF (Mascot Generic Format) writer for mass lists.
///
/// Each mass list becomes one `BEGIN IONS`/`END IONS` block whose header records the
/// scan it came from, followed by one `mz intensity` line per peak.
pub struct MGFWriter<W: io::Write> {
    pub handle: io::BufWriter<W>,
    pub offset: usize,
    run_name: String,
}

impl<W: io::Write> MGFWriter<W> {
    pub fn new(file: W) -> MGFWriter<W> {
        let handle = io::BufWriter::with_capacity(8192, file);
        MGFWriter {
            handle,
            offset: 0,
            run_name: "run".to_string(),
        }
    }

    /// Use `run_name` as the leading component of each block's title
    pub fn with_run_name<S: Into<String>>(mut self, run_name: S) -> Self {
        self.run_name = run_name.into();
        self
    }

    /// Format a title similar to the [Trans-Proteomic Pipeline](https://tools.proteomecenter.org/software.php)'s
    /// `run.scan.scan` convention.
    pub fn make_title(&self, masses: &MassList) -> String {
        let idx = masses.scan_index;
        format!("{}.{idx}.{idx}", self.run_name)
    }

    pub fn into_inner(self) -> BufWriter<W> {
        self.handle
    }

    /// Write a block header `KEY=value`
    pub fn write_kv(&mut self, key: &str, value: &str) -> io::Result<()> {
        self.handle.write_all(key.as_bytes())?;
        self.handle.write_all(b"=")?;
        self.handle.write_all(value.as_bytes())?;
        self.handle.write_all(b"\n")?;
        Ok(())
    }

    /// Write the header of a block, everything after `BEGIN IONS` and before the peak list
    pub fn write_header(&mut self, masses: &MassList) -> io::Result<()> {
        let title = self.make_title(masses);
        self.write_kv("TITLE", &title)?;
        self.write_kv("RTINSECONDS", &masses.retention_time.to_string())?;
        self.write_kv("SCANS", &masses.scan_index.to_string())?;
        Ok(())
    }

    fn write_peaks(&mut self, masses: &MassList) -> io::Result<()> {
        for peak in masses {
            self.handle.write_all(peak.mz().to_string().as_bytes())?;
            self.handle.write_all(b" ")?;
            self.handle
                .write_all(peak.intensity().to_string().as_bytes())?;
            self.handle.write_all(b"\n")?;
        }
        Ok(())
    }

    /// Write a mass list from start to finish, returning the number of peaks written
    pub fn write_mass_list(&mut self, masses: &MassList) -> io::Result<usize> {
        self.handle.write_all(b"BEGIN IONS\n")?;
        self.write_header(masses)?;
        self.write_peaks(masses)?;
        self.handle.write_all(b"END IONS\n\n")?;
        self.offset += 1;
        Ok(masses.len())
    }
}

impl<W: io::Write> MassListWriter for MGFWriter<W> {
    fn write(&mut self, masses: &MassList) -> Result<usize, SinkError> {
        Ok(self.write_mass_list(masses)?)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(self.handle.flush()?)
    }

    fn close(&mut self) -> Result<(), SinkError> {
        Ok(self.handle.flush()?)
    }
}
