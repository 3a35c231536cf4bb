pub mod header;
pub mod block;
pub mod io_stream;
pub mod codec;
pub mod classify;
pub mod rkey;
pub mod archive;
pub mod extract;
pub mod list;

pub use header::{CarHeader, CarError};
pub use block::Block;
pub use io_stream::{CarReader, CarWriter};
pub use codec::{BlockDecoder, DagCborDecoder, CodecError};
pub use classify::{classify, BlockKind, Record};
pub use rkey::{derive_key, record_path};
pub use archive::{Archive, ArchiveError};
pub use extract::{extract, ExtractError, ExtractReport, Extractor};
pub use list::{list, ListError, ListedRecord, Listing};

/// A DAG-CBOR CID with a synthetic digest derived from `seed`.
#[cfg(test)]
pub(crate) fn test_cid(seed: u8) -> cid::Cid {
    let digest = cid::multihash::Multihash::<64>::wrap(0x12, &[seed; 32]).unwrap();
    cid::Cid::new_v1(codec::DAG_CBOR, digest)
}
