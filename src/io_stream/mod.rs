//! Streaming block reader and writer.
//!
//! # Reader
//! [`CarReader`] parses the header on construction and then yields blocks
//! one at a time, in archive order, as an [`Iterator`].  Nothing is decoded
//! here; the reader only splits the stream into `(CID, bytes)` sections.
//! After the first framing error the iterator is fused: once a section
//! boundary cannot be trusted, nothing after it can be either.
//!
//! # Writer
//! [`CarWriter`] writes a CARv1 header followed by any number of blocks.
//! It performs no hashing; callers supply the CID for every block.

use std::io::{self, Read, Write};
use cid::Cid;
use crate::block::Block;
use crate::header::{CarError, CarHeader};

// ── Reader ───────────────────────────────────────────────────────────────────

pub struct CarReader<R: Read> {
    reader: io::Take<R>,
    header: CarHeader,
    done:   bool,
}

impl<R: Read> CarReader<R> {
    pub fn new(reader: R) -> Result<Self, CarError> {
        let mut reader = reader.take(u64::MAX);
        let header = CarHeader::read(&mut reader)?;
        Ok(Self { reader, header, done: false })
    }

    pub fn header(&self) -> &CarHeader { &self.header }

    pub fn roots(&self) -> &[Cid] { &self.header.roots }

    /// Read the next block; `Ok(None)` at the end of the archive.
    pub fn next_block(&mut self) -> Result<Option<Block>, CarError> {
        if self.done {
            return Ok(None);
        }
        match Block::read(&mut self.reader) {
            Ok(Some(block)) => Ok(Some(block)),
            Ok(None) => {
                self.done = true;
                Ok(None)
            }
            Err(e) => {
                self.done = true;
                Err(e)
            }
        }
    }
}

impl<R: Read> Iterator for CarReader<R> {
    type Item = Result<Block, CarError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_block().transpose()
    }
}

impl<R: Read> std::iter::FusedIterator for CarReader<R> {}

// ── Writer ───────────────────────────────────────────────────────────────────

pub struct CarWriter<W: Write> {
    writer:         W,
    pub header:     CarHeader,
    blocks_written: usize,
}

impl<W: Write> CarWriter<W> {
    /// Write the header immediately and return a writer ready for blocks.
    pub fn new(mut writer: W, roots: Vec<Cid>) -> Result<Self, CarError> {
        let header = CarHeader::new(roots);
        header.write(&mut writer)?;
        Ok(Self { writer, header, blocks_written: 0 })
    }

    pub fn write_block(&mut self, block: &Block) -> Result<(), CarError> {
        block.write(&mut self.writer)?;
        self.blocks_written += 1;
        Ok(())
    }

    pub fn blocks_written(&self) -> usize { self.blocks_written }

    /// Flush and hand back the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}
