//! Reading of mzXML documents
use std::io;

use quick_xml::{events::Event, Reader};

mod peaks;
mod reader;

pub use peaks::{ByteOrder, PeaksCompression, PeaksEncoding, Precision};
pub use reader::{parse_duration, MzXMLParserState, MzXMLReader};

/// Whether `buf` looks like the start of an mzXML document
pub fn is_mzxml(buf: &[u8]) -> bool {
    let mut reader = Reader::from_reader(io::Cursor::new(buf));
    let mut buffer = Vec::new();
    loop {
        match reader.read_event_into(&mut buffer) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                return e.name().as_ref() == b"mzXML";
            }
            Ok(Event::Eof) => return false,
            Ok(_) => {}
            Err(_) => return false,
        }
        buffer.clear();
    }
}
