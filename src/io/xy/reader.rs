use std::io::{self, BufRead, BufReader, Read};

use log::debug;

use crate::io::traits::{ScanSource, SourceError};
use crate::peaks::DataPoint;
use crate::scan::Scan;

use super::split_columns;

const BUFFER_SIZE: usize = 8192;

/// The scan index assigned to the single spectrum of an xy file
pub const XY_SCAN_INDEX: u32 = 1;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum XyParserState {
    #[default]
    Initial,
    Done,
}

/**
A parser for .xy files. These hold exactly one profile spectrum and no metadata, so
iterating over one yields a single [`Scan`] with index [`XY_SCAN_INDEX`] and a retention
time of zero, or a single error.

Each line is `<mz> <intensity>`, separated by spaces or tabs, with any amount of
surrounding whitespace. Blank lines are ignored.
*/
pub struct XyReader<R: Read> {
    handle: BufReader<R>,
    state: XyParserState,
}

impl<R: Read> XyReader<R> {
    pub fn new(file: R) -> Self {
        Self::with_buffer_capacity(file, BUFFER_SIZE)
    }

    pub fn with_buffer_capacity(file: R, capacity: usize) -> Self {
        Self {
            handle: BufReader::with_capacity(capacity, file),
            state: XyParserState::Initial,
        }
    }

    fn read_points(&mut self) -> Result<Vec<DataPoint>, SourceError> {
        let mut points = Vec::new();
        let mut line = String::new();
        let mut line_number = 0usize;
        loop {
            line.clear();
            let z = self.handle.read_line(&mut line).map_err(SourceError::IOError)?;
            if z == 0 {
                break;
            }
            line_number += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let context = || format!("xy line {line_number}");
            let (mz, intensity) = split_columns(trimmed).ok_or_else(|| {
                SourceError::parse_failure(context(), format!("expected two columns, found {trimmed:?}"))
            })?;
            let mz = mz
                .parse::<f64>()
                .map_err(|e| SourceError::parse_failure(context(), format!("invalid m/z {mz:?}: {e}")))?;
            let intensity = intensity.parse::<f64>().map_err(|e| {
                SourceError::parse_failure(context(), format!("invalid intensity {intensity:?}: {e}"))
            })?;
            points.push(DataPoint::new(mz, intensity));
        }
        debug!("Read {} points from xy text", points.len());
        Ok(points)
    }

    /// Read the single spectrum, if it has not been read already
    pub fn read_next(&mut self) -> Option<Result<Scan, SourceError>> {
        if self.state == XyParserState::Done {
            return None;
        }
        self.state = XyParserState::Done;
        Some(
            self.read_points()
                .map(|points| Scan::new(XY_SCAN_INDEX, 0.0, points)),
        )
    }
}

impl<R: Read> Iterator for XyReader<R> {
    type Item = Result<Scan, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_next()
    }
}

impl<R: Read + Send> ScanSource for XyReader<R> {
    fn format_name(&self) -> &'static str {
        "xy"
    }
}

impl XyReader<std::fs::File> {
    pub fn open_path<P: AsRef<std::path::Path>>(path: P) -> io::Result<Self> {
        Ok(Self::new(std::fs::File::open(path)?))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::io::xy::is_xy;

    #[test]
    fn simple_xy() {
        let data = "60.406 140051.00
61.680 140877.00
 63.589\t 141602.00
65.496 142758.00

\t\t67.403 138627.00
69.309\t \t139428.00\t\t";
        assert!(is_xy(data.as_bytes()));
        let mut reader = XyReader::new(data.as_bytes());
        let scan = reader.next().unwrap().unwrap();
        assert_eq!(scan.index, XY_SCAN_INDEX);
        assert_eq!(scan.len(), 6);
        assert_eq!(scan.points[2], DataPoint::new(63.589, 141602.0));
        assert_eq!(scan.points[5], DataPoint::new(69.309, 139428.0));
        assert!(reader.next().is_none());
    }

    #[test]
    fn malformed_xy() {
        let data = "100.0 5.0\n100.1\n";
        let mut reader = XyReader::new(data.as_bytes());
        match reader.next() {
            Some(Err(SourceError::ParseFailure { context, .. })) => assert_eq!(context, "xy line 2"),
            other => panic!("Expected a parse failure, got {other:?}"),
        }
        assert!(reader.next().is_none());

        let mut reader = XyReader::new("100.0 abc\n".as_bytes());
        assert!(matches!(reader.next(), Some(Err(SourceError::ParseFailure { .. }))));
        assert!(!is_xy(b"<?xml version=\"1.0\"?>"));
    }

    #[test]
    fn read_fixture() -> io::Result<()> {
        let reader = XyReader::open_path("./test/data/small.xy")?;
        let scans: Vec<_> = reader.collect::<Result<_, _>>()?;
        assert_eq!(scans.len(), 1);
        assert_eq!(scans[0].len(), 41);
        assert!(scans[0].validate().is_ok());
        Ok(())
    }
}
