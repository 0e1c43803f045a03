//! Decoding of the base64 `<peaks>` payload of an mzXML scan
use std::io::{self, Write};
use std::mem;

use bytemuck::Pod;
use flate2::write::ZlibDecoder;
use num_traits::ToPrimitive;

use crate::peaks::DataPoint;

pub type Bytes = Vec<u8>;

/// The width of each encoded value
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    #[default]
    Float32,
    Float64,
}

impl Precision {
    pub fn from_attribute(value: &str) -> Option<Self> {
        match value {
            "32" => Some(Self::Float32),
            "64" => Some(Self::Float64),
            _ => None,
        }
    }
}

/// mzXML calls big-endian "network" order, and it is the default
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    #[default]
    Network,
    Little,
}

impl ByteOrder {
    pub fn from_attribute(value: &str) -> Option<Self> {
        match value {
            "network" | "big" => Some(Self::Network),
            "little" => Some(Self::Little),
            _ => None,
        }
    }

    fn matches_host(&self) -> bool {
        match self {
            Self::Network => cfg!(target_endian = "big"),
            Self::Little => cfg!(target_endian = "little"),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PeaksCompression {
    #[default]
    NoCompression,
    Zlib,
}

impl PeaksCompression {
    pub fn from_attribute(value: &str) -> Option<Self> {
        match value {
            "none" => Some(Self::NoCompression),
            "zlib" => Some(Self::Zlib),
            _ => None,
        }
    }
}

/// How the contents of a `<peaks>` element are encoded
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PeaksEncoding {
    pub precision: Precision,
    pub byte_order: ByteOrder,
    pub compression: PeaksCompression,
}

pub fn decompress_zlib(bytestring: &[u8]) -> io::Result<Bytes> {
    let mut decompressor = ZlibDecoder::new(Bytes::new());
    decompressor.write_all(bytestring)?;
    decompressor.finish()
}

fn decode_values<T: Pod + ToPrimitive>(
    mut bytes: Bytes,
    byte_order: ByteOrder,
) -> Result<Vec<f64>, String> {
    let width = mem::size_of::<T>();
    if bytes.len() % width != 0 {
        return Err(format!(
            "{} bytes is not a whole number of {width} byte values",
            bytes.len()
        ));
    }
    if !byte_order.matches_host() {
        for chunk in bytes.chunks_exact_mut(width) {
            chunk.reverse();
        }
    }
    let values: Vec<T> = bytemuck::pod_collect_to_vec(&bytes);
    values
        .iter()
        .map(|v| v.to_f64().ok_or_else(|| "value is not representable as f64".to_string()))
        .collect()
}

impl PeaksEncoding {
    /// Decode base64 `text` into interleaved (m/z, intensity) pairs
    pub fn decode(&self, text: &[u8]) -> Result<Vec<DataPoint>, String> {
        let compact: Bytes = text
            .iter()
            .copied()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        if compact.is_empty() {
            return Ok(Vec::new());
        }
        let mut bytes = base64_simd::STANDARD
            .decode_type::<Bytes>(&compact)
            .map_err(|e| format!("invalid base64: {e}"))?;
        if self.compression == PeaksCompression::Zlib {
            bytes = decompress_zlib(&bytes).map_err(|e| format!("zlib decompression failed: {e}"))?;
        }
        let values = match self.precision {
            Precision::Float32 => decode_values::<f32>(bytes, self.byte_order)?,
            Precision::Float64 => decode_values::<f64>(bytes, self.byte_order)?,
        };
        if values.len() % 2 != 0 {
            return Err(format!(
                "{} values cannot be split into m/z-intensity pairs",
                values.len()
            ));
        }
        Ok(values
            .chunks_exact(2)
            .map(|pair| DataPoint::new(pair[0], pair[1]))
            .collect())
    }
}
