//! Read-only listing of the records in an archive.

use std::io::{self, Write};
use std::path::Path;

use cid::Cid;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::archive::{Archive, ArchiveError};
use crate::block::Block;
use crate::classify::{classify, BlockKind};
use crate::codec::{BlockDecoder, DagCborDecoder};
use crate::header::CarError;
use crate::rkey::record_path;

pub const LISTING_HEADER: &str = "Collection/RecordKey\t\tCID";

#[derive(Error, Debug)]
pub enum ListError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error("Corrupt block stream: {0}")]
    Car(#[from] CarError),
    #[error("Failed to write listing: {0}")]
    Write(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedRecord {
    /// `<collection>/<key>`
    pub path: String,
    pub cid:  Cid,
}

/// Lazily turns a block stream into the records it contains.
///
/// Blocks that fail to decode are logged and skipped; framing errors from
/// the underlying stream are passed through.
pub struct Listing<I, D = DagCborDecoder> {
    blocks:  I,
    decoder: D,
}

impl<I> Listing<I, DagCborDecoder>
where
    I: Iterator<Item = Result<Block, CarError>>,
{
    pub fn new(blocks: I) -> Self {
        Self::with_decoder(blocks, DagCborDecoder)
    }
}

impl<I, D> Listing<I, D>
where
    I: Iterator<Item = Result<Block, CarError>>,
    D: BlockDecoder,
{
    pub fn with_decoder(blocks: I, decoder: D) -> Self {
        Self { blocks, decoder }
    }
}

impl<I, D> Iterator for Listing<I, D>
where
    I: Iterator<Item = Result<Block, CarError>>,
    D: BlockDecoder,
{
    type Item = Result<ListedRecord, CarError>;

    fn next(&mut self) -> Option<Self::Item> {
        for block in self.blocks.by_ref() {
            let block = match block {
                Ok(block) => block,
                Err(e)    => return Some(Err(e)),
            };
            let value = match self.decoder.decode(&block.data) {
                Ok(value) => value,
                Err(e) => {
                    warn!(cid = %block.cid, "Could not decode block {}: {e}", block.cid);
                    continue;
                }
            };
            if let BlockKind::Record(record) = classify(&value) {
                let path = record_path(&record, &block.cid);
                return Some(Ok(ListedRecord { path, cid: block.cid }));
            }
        }
        None
    }
}

/// Write the listing table to `out`; returns the number of records listed.
pub fn write_listing<I, W>(records: I, mut out: W) -> Result<usize, ListError>
where
    I: IntoIterator<Item = Result<ListedRecord, CarError>>,
    W: Write,
{
    writeln!(out, "{LISTING_HEADER}")?;
    let mut count = 0;
    for record in records {
        let record = record?;
        writeln!(out, "{}\t{}", record.path, record.cid)?;
        count += 1;
    }
    out.flush()?;
    Ok(count)
}

/// List every record in the archive at `archive_path` to `out`.
#[instrument(skip_all, fields(archive = %archive_path.display()))]
pub fn list<W: Write>(archive_path: &Path, out: W) -> Result<usize, ListError> {
    let archive = Archive::open(archive_path)?;
    info!("=== Records in {} ===", archive.file_name());
    write_listing(Listing::new(archive.blocks()), out)
}
