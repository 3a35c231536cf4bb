//! Shallow, shape-based block classification.
//!
//! A decoded block is sorted into exactly one [`BlockKind`] by looking at
//! which top-level fields it carries.  The tests run in a fixed order and
//! the first match wins:
//!
//! 1. **Commit**: has any of `version`, `did`, `rev` (presence only).
//! 2. **Record**: `$type` is a string starting with `app.`.
//! 3. **IndexNode**: `$type` is falsy and `l` or `e` is truthy.
//! 4. **Unrecognized**: everything else, including non-map values.
//!
//! A map that looks like both a commit and a record is a commit.  Nothing
//! here follows links or checks that the tree structure is consistent.

use std::collections::BTreeMap;
use ipld_core::ipld::Ipld;

pub const COMMIT_FIELDS: [&str; 3] = ["version", "did", "rev"];
pub const TYPE_FIELD: &str = "$type";
pub const RECORD_TYPE_PREFIX: &str = "app.";
pub const INDEX_LEFT_FIELD: &str = "l";
pub const INDEX_ENTRIES_FIELD: &str = "e";

/// A record view borrowed from its decoded block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Record<'a> {
    /// The `$type` value, used as the output collection.
    pub collection: &'a str,
    pub fields:     &'a BTreeMap<String, Ipld>,
}

impl<'a> Record<'a> {
    pub fn get(&self, field: &str) -> Option<&'a Ipld> {
        self.fields.get(field)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlockKind<'a> {
    Commit(&'a BTreeMap<String, Ipld>),
    Record(Record<'a>),
    IndexNode,
    Unrecognized,
}

pub fn classify(value: &Ipld) -> BlockKind<'_> {
    let Ipld::Map(map) = value else {
        return BlockKind::Unrecognized;
    };

    if COMMIT_FIELDS.iter().any(|f| map.contains_key(*f)) {
        return BlockKind::Commit(map);
    }

    if let Some(Ipld::String(ty)) = map.get(TYPE_FIELD) {
        if ty.starts_with(RECORD_TYPE_PREFIX) {
            return BlockKind::Record(Record { collection: ty, fields: map });
        }
    }

    let untyped = !map.get(TYPE_FIELD).is_some_and(is_truthy);
    let indexed = [INDEX_LEFT_FIELD, INDEX_ENTRIES_FIELD]
        .iter()
        .any(|f| map.get(*f).is_some_and(is_truthy));
    if untyped && indexed {
        return BlockKind::IndexNode;
    }

    BlockKind::Unrecognized
}

/// JavaScript-style truthiness: containers, byte strings and links are
/// truthy even when empty.
pub fn is_truthy(value: &Ipld) -> bool {
    match value {
        Ipld::Null       => false,
        Ipld::Bool(b)    => *b,
        Ipld::Integer(i) => *i != 0,
        Ipld::Float(f)   => *f != 0.0 && !f.is_nan(),
        Ipld::String(s)  => !s.is_empty(),
        Ipld::Bytes(_) | Ipld::List(_) | Ipld::Map(_) | Ipld::Link(_) => true,
    }
}
