//! Block value decoding and JSON rendering.
//!
//! # Decoding
//! Every block is decoded as DAG-CBOR into a generic [`Ipld`] tree,
//! whatever codec its CID declares.  Blocks that are not DAG-CBOR simply
//! fail to decode and are reported by the caller.
//!
//! # Rendering
//! Decoded values are written back out as JSON:
//!
//! | IPLD kind | JSON form |
//! |-----------|-----------|
//! | link      | `{"/": "<cid>"}` |
//! | bytes     | `{"/": {"bytes": "<base64, unpadded>"}}` |
//! | integer   | number, or a decimal string outside the 64-bit range |
//! | float     | number, `null` when not finite |
//!
//! Map keys are emitted in sorted order.

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine as _;
use ipld_core::ipld::Ipld;
use serde_json::{json, Map, Number, Value};
use thiserror::Error;

/// Multicodec code for DAG-CBOR.
pub const DAG_CBOR: u64 = 0x71;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("{0}")]
    Decode(String),
    #[error("DAG-CBOR encoding failed: {0}")]
    CborEncode(String),
    #[error("JSON encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

// ── Decoder trait ────────────────────────────────────────────────────────────

/// Turns raw block bytes into a generic value tree.
pub trait BlockDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Ipld, CodecError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DagCborDecoder;

impl BlockDecoder for DagCborDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Ipld, CodecError> {
        serde_ipld_dagcbor::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

/// Encode a value tree as DAG-CBOR.  Used to build fixtures.
pub fn encode_dag_cbor(value: &Ipld) -> Result<Vec<u8>, CodecError> {
    serde_ipld_dagcbor::to_vec(value).map_err(|e| CodecError::CborEncode(e.to_string()))
}

// ── JSON rendering ───────────────────────────────────────────────────────────

pub fn to_json(value: &Ipld) -> Value {
    match value {
        Ipld::Null      => Value::Null,
        Ipld::Bool(b)   => Value::Bool(*b),
        Ipld::Integer(i) => integer_to_json(*i),
        Ipld::Float(f)  => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
        Ipld::String(s) => Value::String(s.clone()),
        Ipld::Bytes(b)  => json!({ "/": { "bytes": STANDARD_NO_PAD.encode(b) } }),
        Ipld::List(items) => Value::Array(items.iter().map(to_json).collect()),
        Ipld::Map(map) => Value::Object(
            map.iter().map(|(k, v)| (k.clone(), to_json(v))).collect::<Map<_, _>>(),
        ),
        Ipld::Link(cid) => json!({ "/": cid.to_string() }),
    }
}

fn integer_to_json(i: i128) -> Value {
    if let Ok(n) = i64::try_from(i) {
        Value::Number(n.into())
    } else if let Ok(n) = u64::try_from(i) {
        Value::Number(n.into())
    } else {
        Value::String(i.to_string())
    }
}

/// Two-space indented JSON without a trailing newline.
pub fn render_pretty(value: &Ipld) -> Result<String, CodecError> {
    Ok(serde_json::to_string_pretty(&to_json(value))?)
}
