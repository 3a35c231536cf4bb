//! Record key derivation.
//!
//! The key that names a record file inside its collection directory is
//! chosen in priority order:
//!
//! 1. a truthy `rkey` field on the record, stringified;
//! 2. `self` for `app.bsky.actor.profile` records;
//! 3. the last [`FALLBACK_KEY_LEN`] characters of the block's CID.

use cid::Cid;
use ipld_core::ipld::Ipld;

use crate::classify::{is_truthy, Record};
use crate::codec::to_json;

pub const RKEY_FIELD: &str = "rkey";
pub const PROFILE_COLLECTION: &str = "app.bsky.actor.profile";
pub const PROFILE_KEY: &str = "self";
pub const FALLBACK_KEY_LEN: usize = 12;

pub fn derive_key(record: &Record<'_>, cid: &Cid) -> String {
    if let Some(rkey) = record.get(RKEY_FIELD).filter(|v| is_truthy(v)) {
        return stringify(rkey);
    }
    if record.collection == PROFILE_COLLECTION {
        return PROFILE_KEY.to_string();
    }
    fallback_key(cid)
}

/// `<collection>/<key>`, the record's path relative to the output root.
pub fn record_path(record: &Record<'_>, cid: &Cid) -> String {
    format!("{}/{}", record.collection, derive_key(record, cid))
}

/// The trailing characters of the CID's canonical string form, or the
/// whole string when it is shorter than that.
pub fn fallback_key(cid: &Cid) -> String {
    let s = cid.to_string();
    let skip = s.chars().count().saturating_sub(FALLBACK_KEY_LEN);
    s.chars().skip(skip).collect()
}

fn stringify(value: &Ipld) -> String {
    match value {
        Ipld::String(s)  => s.clone(),
        Ipld::Integer(i) => i.to_string(),
        Ipld::Float(f)   => f.to_string(),
        Ipld::Bool(b)    => b.to_string(),
        Ipld::Link(cid)  => cid.to_string(),
        other            => to_json(other).to_string(),
    }
}
