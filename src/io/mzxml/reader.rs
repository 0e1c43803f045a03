use std::collections::VecDeque;
use std::fs;
use std::io::{self, BufRead, BufReader};
use std::mem;
use std::path;
use std::sync::OnceLock;

use log::{debug, error, trace, warn};
use quick_xml::{
    events::{BytesEnd, BytesStart, Event},
    Reader,
};
use regex::Regex;

use crate::io::traits::{ScanSource, SourceError};
use crate::peaks::DataPoint;
use crate::scan::Scan;

use super::peaks::{ByteOrder, Bytes, PeaksCompression, PeaksEncoding, Precision};

/// The states of the mzXML pull parser
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum MzXMLParserState {
    #[default]
    Start,
    Document,
    Scan,
    Peaks,
    Done,
    ParserError,
}

#[derive(Debug, Default, Clone)]
struct ScanBuilder {
    index: u32,
    retention_time: f64,
    ms_level: u8,
    peaks_count: Option<usize>,
    encoding: PeaksEncoding,
    emitted: bool,
}

const DURATION_PATTERN: &str =
    r"^-?P(?:(\d+(?:\.\d*)?)D)?T?(?:(\d+(?:\.\d*)?)H)?(?:(\d+(?:\.\d*)?)M)?(?:(\d+(?:\.\d*)?)S)?$";

/// The compiled `xs:duration` pattern, or `None` if it failed to compile, in which
/// case every duration is rejected as unparseable
fn duration_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| match Regex::new(DURATION_PATTERN) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                error!("Failed to compile the retention time pattern: {e}");
                None
            }
        })
        .as_ref()
}

/// Parse an `xs:duration` retention time such as `PT12.5S` or `PT1M2.5S` into seconds
pub fn parse_duration(value: &str) -> Option<f64> {
    let value = value.trim();
    let captures = duration_pattern()?.captures(value)?;
    if captures.iter().skip(1).all(|c| c.is_none()) {
        return None;
    }
    let mut seconds = 0.0;
    for (group, scale) in [(1, 86400.0), (2, 3600.0), (3, 60.0), (4, 1.0)] {
        if let Some(m) = captures.get(group) {
            seconds += m.as_str().parse::<f64>().ok()? * scale;
        }
    }
    if value.starts_with('-') {
        seconds = -seconds;
    }
    Some(seconds)
}

/// A streaming reader for mzXML documents, yielding one [`Scan`] per `<scan>` element
/// including scans nested inside their precursor scan.
///
/// Scans are yielded in document order as soon as their `<peaks>` element closes. A
/// malformed document yields a single [`SourceError::ParseFailure`] after which the
/// reader is exhausted.
pub struct MzXMLReader<R: BufRead> {
    reader: Reader<R>,
    buffer: Bytes,
    pub state: MzXMLParserState,
    open_scans: Vec<ScanBuilder>,
    ready: VecDeque<Scan>,
    peaks_text: Bytes,
    scans_read: usize,
}

impl<R: BufRead> MzXMLReader<R> {
    pub fn new(handle: R) -> Self {
        let mut reader = Reader::from_reader(handle);
        reader.trim_text(true);
        Self {
            reader,
            buffer: Bytes::new(),
            state: MzXMLParserState::Start,
            open_scans: Vec::new(),
            ready: VecDeque::new(),
            peaks_text: Bytes::new(),
            scans_read: 0,
        }
    }

    /// The number of scans produced so far
    pub fn scans_read(&self) -> usize {
        self.scans_read
    }

    fn current_scan_context(&self) -> String {
        match self.open_scans.last() {
            Some(builder) => format!("mzXML scan {}", builder.index),
            None => "mzXML document".to_string(),
        }
    }

    fn scan_attributes(&self, event: &BytesStart) -> Result<ScanBuilder, SourceError> {
        let mut builder = ScanBuilder::default();
        let mut index = None;
        for attr in event.attributes() {
            let attr = attr.map_err(|e| SourceError::parse_failure("mzXML <scan>", e))?;
            let value = attr
                .unescape_value()
                .map_err(|e| SourceError::parse_failure("mzXML <scan>", e))?;
            match attr.key.as_ref() {
                b"num" => {
                    index = Some(value.trim().parse::<u32>().map_err(|e| {
                        SourceError::parse_failure("mzXML <scan>", format!("invalid num {value:?}: {e}"))
                    })?);
                }
                b"retentionTime" => {
                    builder.retention_time = parse_duration(&value).ok_or_else(|| {
                        SourceError::parse_failure(
                            "mzXML <scan>",
                            format!("invalid retentionTime {value:?}"),
                        )
                    })?;
                }
                b"msLevel" => {
                    builder.ms_level = value.trim().parse().unwrap_or_else(|_| {
                        warn!("Ignoring malformed msLevel {value:?}");
                        0
                    });
                }
                b"peaksCount" => {
                    builder.peaks_count = value.trim().parse().ok();
                }
                _ => {}
            }
        }
        builder.index = index.ok_or_else(|| {
            SourceError::parse_failure("mzXML <scan>", "missing required attribute num")
        })?;
        Ok(builder)
    }

    fn peaks_attributes(&self, event: &BytesStart) -> Result<PeaksEncoding, SourceError> {
        let context = self.current_scan_context();
        let mut encoding = PeaksEncoding::default();
        for attr in event.attributes() {
            let attr = attr.map_err(|e| SourceError::parse_failure(context.as_str(), e))?;
            let value = attr
                .unescape_value()
                .map_err(|e| SourceError::parse_failure(context.as_str(), e))?;
            let unsupported = |name: &str| {
                SourceError::parse_failure(
                    context.as_str(),
                    format!("unsupported <peaks> {name} {value:?}"),
                )
            };
            match attr.key.as_ref() {
                b"precision" => {
                    encoding.precision =
                        Precision::from_attribute(&value).ok_or_else(|| unsupported("precision"))?;
                }
                b"byteOrder" => {
                    encoding.byte_order =
                        ByteOrder::from_attribute(&value).ok_or_else(|| unsupported("byteOrder"))?;
                }
                b"compressionType" => {
                    encoding.compression = PeaksCompression::from_attribute(&value)
                        .ok_or_else(|| unsupported("compressionType"))?;
                }
                b"pairOrder" | b"contentType" => {
                    if value != "m/z-int" {
                        return Err(unsupported("content type"));
                    }
                }
                _ => {}
            }
        }
        Ok(encoding)
    }

    /// Queue the innermost open scan with `points`, once
    fn emit(&mut self, points: Vec<DataPoint>) {
        if let Some(builder) = self.open_scans.last_mut() {
            if builder.emitted {
                warn!("Scan {} has more than one <peaks> element, ignoring the rest", builder.index);
                return;
            }
            if let Some(expected) = builder.peaks_count {
                if expected != points.len() {
                    warn!(
                        "Scan {} declares {expected} peaks but {} were decoded",
                        builder.index,
                        points.len()
                    );
                }
            }
            trace!(
                "Read scan {} (MS{}) with {} points",
                builder.index,
                builder.ms_level,
                points.len()
            );
            builder.emitted = true;
            self.scans_read += 1;
            self.ready
                .push_back(Scan::new(builder.index, builder.retention_time, points));
        }
    }

    fn handle_start(&mut self, event: &BytesStart) -> Result<(), SourceError> {
        let name = event.name();
        if self.state == MzXMLParserState::Start {
            if name.as_ref() != b"mzXML" {
                return Err(SourceError::parse_failure(
                    "mzXML document",
                    format!(
                        "expected root element <mzXML>, found <{}>",
                        String::from_utf8_lossy(name.as_ref())
                    ),
                ));
            }
            self.state = MzXMLParserState::Document;
            return Ok(());
        }
        match name.as_ref() {
            b"scan" => {
                let builder = self.scan_attributes(event)?;
                if let Some(parent) = self.open_scans.last() {
                    trace!("Scan {} is nested in scan {}", builder.index, parent.index);
                }
                self.open_scans.push(builder);
                self.state = MzXMLParserState::Scan;
            }
            b"peaks" => {
                let encoding = self.peaks_attributes(event)?;
                match self.open_scans.last_mut() {
                    Some(builder) => builder.encoding = encoding,
                    None => {
                        return Err(SourceError::parse_failure(
                            "mzXML document",
                            "<peaks> outside of a <scan>",
                        ))
                    }
                }
                self.peaks_text.clear();
                self.state = MzXMLParserState::Peaks;
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_empty(&mut self, event: &BytesStart) -> Result<(), SourceError> {
        match event.name().as_ref() {
            b"scan" | b"peaks" => {
                self.handle_start(event)?;
                self.handle_end(&event.to_end())
            }
            _ => self.handle_start(event),
        }
    }

    fn handle_end(&mut self, event: &BytesEnd) -> Result<(), SourceError> {
        match event.name().as_ref() {
            b"peaks" => {
                let encoding = self
                    .open_scans
                    .last()
                    .map(|b| b.encoding)
                    .unwrap_or_default();
                let text = mem::take(&mut self.peaks_text);
                let points = encoding
                    .decode(&text)
                    .map_err(|e| SourceError::parse_failure(self.current_scan_context(), e))?;
                self.emit(points);
                self.state = MzXMLParserState::Scan;
            }
            b"scan" => {
                if self.open_scans.last().is_some_and(|b| !b.emitted) {
                    debug!("{} has no <peaks> element", self.current_scan_context());
                    self.emit(Vec::new());
                }
                self.open_scans.pop();
                self.state = if self.open_scans.is_empty() {
                    MzXMLParserState::Document
                } else {
                    MzXMLParserState::Scan
                };
            }
            b"mzXML" => {
                self.state = MzXMLParserState::Done;
            }
            _ => {}
        }
        Ok(())
    }

    /// Consume one XML event
    fn step(&mut self) -> Result<(), SourceError> {
        let mut buffer = mem::take(&mut self.buffer);
        buffer.clear();
        let result = match self.reader.read_event_into(&mut buffer) {
            Ok(Event::Start(ref e)) => self.handle_start(e),
            Ok(Event::Empty(ref e)) => self.handle_empty(e),
            Ok(Event::End(ref e)) => self.handle_end(e),
            Ok(Event::Text(ref e)) => {
                if self.state == MzXMLParserState::Peaks {
                    self.peaks_text.extend_from_slice(e);
                }
                Ok(())
            }
            Ok(Event::Eof) => {
                let outcome = match self.state {
                    MzXMLParserState::Start => Err(SourceError::parse_failure(
                        "mzXML document",
                        "no root element found",
                    )),
                    _ if !self.open_scans.is_empty() => Err(SourceError::parse_failure(
                        self.current_scan_context(),
                        "document ended inside an open scan",
                    )),
                    _ => Ok(()),
                };
                self.state = MzXMLParserState::Done;
                outcome
            }
            Ok(_) => Ok(()),
            Err(e) => Err(SourceError::parse_failure(
                format!("mzXML at byte {}", self.reader.buffer_position()),
                e,
            )),
        };
        self.buffer = buffer;
        result
    }

    /// Read the next scan, if there is one
    pub fn read_next(&mut self) -> Option<Result<Scan, SourceError>> {
        loop {
            if let Some(scan) = self.ready.pop_front() {
                return Some(Ok(scan));
            }
            if matches!(
                self.state,
                MzXMLParserState::Done | MzXMLParserState::ParserError
            ) {
                return None;
            }
            if let Err(e) = self.step() {
                self.state = MzXMLParserState::ParserError;
                self.ready.clear();
                return Some(Err(e));
            }
        }
    }
}

impl MzXMLReader<BufReader<fs::File>> {
    pub fn open_path<P: AsRef<path::Path>>(path: P) -> io::Result<Self> {
        Ok(Self::new(BufReader::new(fs::File::open(path)?)))
    }
}

impl<R: BufRead> Iterator for MzXMLReader<R> {
    type Item = Result<Scan, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_next()
    }
}

impl<R: BufRead + Send> ScanSource for MzXMLReader<R> {
    fn format_name(&self) -> &'static str {
        "mzXML"
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn read_all(text: &str) -> Vec<Result<Scan, SourceError>> {
        MzXMLReader::new(text.as_bytes()).collect()
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("PT12.5S"), Some(12.5));
        assert_eq!(parse_duration("PT1M2.5S"), Some(62.5));
        assert_eq!(parse_duration("PT1H"), Some(3600.0));
        assert_eq!(parse_duration(" PT0S "), Some(0.0));
        assert_eq!(parse_duration("12.5"), None);
        assert_eq!(parse_duration("PT"), None);
        assert!(duration_pattern().is_some());
        assert!(Regex::new(DURATION_PATTERN).is_ok());
    }

    #[test_log::test]
    fn test_read_fixture() -> io::Result<()> {
        let reader = MzXMLReader::open_path("./test/data/small.mzXML")?;
        let scans: Vec<Scan> = reader.collect::<Result<_, _>>()?;
        let indices: Vec<u32> = scans.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);

        assert_eq!(scans[0].retention_time, 1.5);
        assert_eq!(scans[0].len(), 21);
        assert_eq!(scans[1].retention_time, 1.75);
        assert_eq!(scans[1].len(), 5);
        assert_eq!(scans[2].retention_time, 62.5);
        assert_eq!(scans[2].len(), 21);
        for scan in scans.iter() {
            assert!(scan.validate().is_ok());
        }
        assert_eq!(scans[1].points[2], DataPoint::new(250.5, 1200.0));
        Ok(())
    }

    #[test]
    fn test_wrong_root() {
        let scans = read_all("<?xml version=\"1.0\"?><mzML><run/></mzML>");
        assert_eq!(scans.len(), 1);
        assert!(matches!(&scans[0], Err(SourceError::ParseFailure { .. })));
    }

    #[test]
    fn test_empty_and_truncated() {
        let scans = read_all("");
        assert!(matches!(&scans[..], [Err(SourceError::ParseFailure { .. })]));

        let scans = read_all(
            r#"<mzXML><msRun><scan num="4" retentionTime="PT1S"><peaks precision="32">QsgAAECgAABCyQAAQaAAAA==</peaks>"#,
        );
        assert_eq!(scans.len(), 2);
        let first = scans[0].as_ref().unwrap();
        assert_eq!(first.index, 4);
        assert_eq!(first.len(), 2);
        assert!(matches!(&scans[1], Err(SourceError::ParseFailure { .. })));
    }

    #[test]
    fn test_scan_without_peaks() {
        let scans = read_all(
            r#"<mzXML><msRun><scan num="8" retentionTime="PT3S" peaksCount="0"/><scan num="9"><peaks precision="32"></peaks></scan></msRun></mzXML>"#,
        );
        let scans: Vec<Scan> = scans.into_iter().map(|s| s.unwrap()).collect();
        assert_eq!(scans.len(), 2);
        assert_eq!(scans[0].index, 8);
        assert_eq!(scans[0].retention_time, 3.0);
        assert!(scans[0].is_empty());
        assert_eq!(scans[1].index, 9);
        assert!(scans[1].is_empty());
    }

    #[test]
    fn test_bad_scan_attributes() {
        let scans = read_all(r#"<mzXML><msRun><scan retentionTime="PT3S"></scan></msRun></mzXML>"#);
        assert!(matches!(&scans[..], [Err(SourceError::ParseFailure { .. })]));

        let scans = read_all(
            r#"<mzXML><msRun><scan num="1"><peaks precision="32" contentType="m/z ruler">AAAA</peaks></scan></msRun></mzXML>"#,
        );
        assert!(matches!(&scans[..], [Err(SourceError::ParseFailure { .. })]));
    }
}
