//! CAR archive header.
//!
//! # CARv1
//! ```text
//! varint(len) | DAG-CBOR { version: 1, roots: [CID, ...] }
//! ```
//!
//! # CARv2
//! A CARv2 file starts with a fixed 11-byte pragma that decodes as a v1
//! header with `version: 2`, followed by a 40-byte little-endian header:
//!
//! ```text
//! characteristics (16 B) | data_offset (u64) | data_size (u64) | index_offset (u64)
//! ```
//!
//! The payload at `data_offset` is a complete CARv1 stream of `data_size`
//! bytes.  The optional index that follows it is never read.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use cid::Cid;
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};
use thiserror::Error;

/// The only payload version this reader understands.
pub const CAR_V1: u64 = 1;
/// Wrapper version; unwrapped to the inner v1 payload.
pub const CAR_V2: u64 = 2;

/// The CARv2 pragma, including its varint length prefix.
pub const CAR_V2_PRAGMA: [u8; 11] = [
    0x0a, 0xa1, 0x67, 0x76, 0x65, 0x72, 0x73, 0x69, 0x6f, 0x6e, 0x02,
];
/// Size of the fixed CARv2 header that follows the pragma.
pub const CAR_V2_HEADER_SIZE: u64 = 40;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CarError {
    #[error("Invalid CAR header: {0}")]
    InvalidHeader(String),
    #[error("Unsupported CAR version: {0}")]
    UnsupportedVersion(u64),
    #[error("Invalid section length varint: {0}")]
    Varint(String),
    #[error("Truncated section: expected {expected} bytes")]
    TruncatedSection { expected: u64 },
    #[error("Invalid block CID: {0}")]
    InvalidCid(#[from] cid::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ── Varint framing ───────────────────────────────────────────────────────────

/// Read one varint section length.
///
/// Returns `Ok(None)` when the stream ends cleanly before the first byte.
pub(crate) fn read_section_len<R: Read>(reader: &mut R) -> Result<Option<u64>, CarError> {
    let mut first = [0u8; 1];
    loop {
        match reader.read(&mut first) {
            Ok(0) => return Ok(None),
            Ok(_) => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    let len = unsigned_varint::io::read_u64((&first[..]).chain(reader))
        .map_err(|e| CarError::Varint(e.to_string()))?;
    Ok(Some(len))
}

pub(crate) fn write_section_len<W: Write>(writer: &mut W, len: u64) -> io::Result<()> {
    let mut buf = unsigned_varint::encode::u64_buffer();
    writer.write_all(unsigned_varint::encode::u64(len, &mut buf))
}

/// Read exactly `len` bytes, mapping a short read to `TruncatedSection`.
///
/// The buffer grows with the bytes actually present, so a declared length
/// larger than the remaining input costs nothing up front.
pub(crate) fn read_section<R: Read>(reader: &mut R, len: u64) -> Result<Vec<u8>, CarError> {
    let mut buf = Vec::new();
    let read = reader.by_ref().take(len).read_to_end(&mut buf)?;
    if (read as u64) < len {
        return Err(CarError::TruncatedSection { expected: len });
    }
    Ok(buf)
}

// ── Header ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct RawHeader {
    version: u64,
    #[serde(default)]
    roots: Vec<Cid>,
}

/// Location of the v1 payload inside a CARv2 file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarV2Info {
    pub characteristics: [u8; 16],
    pub data_offset:     u64,
    pub data_size:       u64,
    pub index_offset:    u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarHeader {
    /// Always [`CAR_V1`] once any v2 wrapper has been unwrapped.
    pub version: u64,
    pub roots:   Vec<Cid>,
    /// Present when the archive was wrapped in CARv2.
    pub v2:      Option<CarV2Info>,
}

impl CarHeader {
    pub fn new(roots: Vec<Cid>) -> Self {
        Self { version: CAR_V1, roots, v2: None }
    }

    /// Read the header and leave `reader` positioned at the first block.
    ///
    /// For CARv2 the limit of `reader` is narrowed to the payload so that
    /// the block stream ends where the v1 data ends.
    pub fn read<R: Read>(reader: &mut io::Take<R>) -> Result<Self, CarError> {
        let raw = read_raw_header(reader)?;
        match raw.version {
            CAR_V1 => Ok(Self { version: CAR_V1, roots: raw.roots, v2: None }),
            CAR_V2 => {
                let v2 = read_v2_info(reader)?;
                let consumed = CAR_V2_PRAGMA.len() as u64 + CAR_V2_HEADER_SIZE;
                let skip = v2.data_offset.checked_sub(consumed).ok_or_else(|| {
                    CarError::InvalidHeader(format!(
                        "CARv2 data offset {} overlaps the header", v2.data_offset
                    ))
                })?;
                let skipped = io::copy(&mut reader.by_ref().take(skip), &mut io::sink())?;
                if skipped != skip {
                    return Err(CarError::TruncatedSection { expected: skip });
                }
                reader.set_limit(v2.data_size);

                let inner = read_raw_header(reader)?;
                if inner.version != CAR_V1 {
                    return Err(CarError::UnsupportedVersion(inner.version));
                }
                Ok(Self { version: CAR_V1, roots: inner.roots, v2: Some(v2) })
            }
            other => Err(CarError::UnsupportedVersion(other)),
        }
    }

    /// Write a CARv1 header.
    pub fn write<W: Write>(&self, mut writer: W) -> Result<(), CarError> {
        let raw = RawHeader { version: CAR_V1, roots: self.roots.clone() };
        let bytes = serde_ipld_dagcbor::to_vec(&raw)
            .map_err(|e| CarError::InvalidHeader(e.to_string()))?;
        write_section_len(&mut writer, bytes.len() as u64)?;
        writer.write_all(&bytes)?;
        Ok(())
    }
}

fn read_raw_header<R: Read>(reader: &mut R) -> Result<RawHeader, CarError> {
    let len = read_section_len(reader)?
        .ok_or_else(|| CarError::InvalidHeader("empty archive".into()))?;
    if len == 0 {
        return Err(CarError::InvalidHeader("zero-length header".into()));
    }
    let bytes = read_section(reader, len)?;
    serde_ipld_dagcbor::from_slice(&bytes).map_err(|e| CarError::InvalidHeader(e.to_string()))
}

fn read_v2_info<R: Read>(reader: &mut R) -> Result<CarV2Info, CarError> {
    let mut characteristics = [0u8; 16];
    reader.read_exact(&mut characteristics)?;
    Ok(CarV2Info {
        characteristics,
        data_offset:  reader.read_u64::<LittleEndian>()?,
        data_size:    reader.read_u64::<LittleEndian>()?,
        index_offset: reader.read_u64::<LittleEndian>()?,
    })
}

/// Write a CARv2 pragma and fixed header.  The caller appends the v1
/// payload immediately afterwards, so `data_offset` is always 51.
pub fn write_v2_prefix<W: Write>(mut writer: W, data_size: u64) -> io::Result<()> {
    writer.write_all(&CAR_V2_PRAGMA)?;
    writer.write_all(&[0u8; 16])?;
    writer.write_u64::<LittleEndian>(CAR_V2_PRAGMA.len() as u64 + CAR_V2_HEADER_SIZE)?;
    writer.write_u64::<LittleEndian>(data_size)?;
    writer.write_u64::<LittleEndian>(0)?;
    Ok(())
}
