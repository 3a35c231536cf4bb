//! Repository materialization: one JSON file per record.
//!
//! ```text
//! <output>/_commit.json
//! <output>/<collection>/<record key>.json
//! ```
//!
//! # Failure policy
//! - A missing archive, a framing error in the block stream, or failure to
//!   create the output directory itself aborts the run.
//! - A block that does not decode is logged and skipped.
//! - A record or commit that cannot be written (subdirectory creation or
//!   file write) is logged, counted in `write_failures`, and skipped; the
//!   rest of the archive is still extracted.
//! - A record whose path would leave the output directory is refused.
//!
//! Two records that resolve to the same path overwrite each other; the
//! later block in archive order wins.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use cid::Cid;
use ipld_core::ipld::Ipld;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::archive::{default_output_dir, Archive, ArchiveError};
use crate::block::Block;
use crate::classify::{classify, BlockKind};
use crate::codec::{render_pretty, BlockDecoder, CodecError, DagCborDecoder};
use crate::header::CarError;
use crate::rkey::record_path;

pub const COMMIT_FILE: &str = "_commit.json";
pub const RECORD_EXTENSION: &str = ".json";

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error("Corrupt block stream: {0}")]
    Car(#[from] CarError),
    #[error("Failed to create output directory {}: {source}", .path.display())]
    CreateOutputDir { path: PathBuf, source: io::Error },
    #[error("Failed to create directory {}: {source}", .path.display())]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("Failed to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("Failed to render JSON: {0}")]
    Render(#[from] CodecError),
}

// ── Report ───────────────────────────────────────────────────────────────────

/// Outcome of one extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractReport {
    pub output_dir:      PathBuf,
    /// Record files written.
    pub records_written: usize,
    /// The last commit block seen, if any.
    pub commit:          Option<Cid>,
    pub blocks_seen:     usize,
    pub index_nodes:     usize,
    pub unrecognized:    usize,
    pub decode_failures: usize,
    pub write_failures:  usize,
    pub rejected_paths:  usize,
}

impl ExtractReport {
    pub fn summary(&self) -> String {
        format!(
            "{} block(s): {} record(s) written, {} index node(s), {} unrecognized, \
             {} decode failure(s), {} write failure(s), {} rejected path(s)",
            self.blocks_seen,
            self.records_written,
            self.index_nodes,
            self.unrecognized,
            self.decode_failures,
            self.write_failures,
            self.rejected_paths,
        )
    }
}

// ── Extractor ────────────────────────────────────────────────────────────────

pub struct Extractor<D: BlockDecoder = DagCborDecoder> {
    output_dir: PathBuf,
    decoder:    D,
}

impl Extractor<DagCborDecoder> {
    pub fn new<P: Into<PathBuf>>(output_dir: P) -> Self {
        Self::with_decoder(output_dir, DagCborDecoder)
    }
}

impl<D: BlockDecoder> Extractor<D> {
    pub fn with_decoder<P: Into<PathBuf>>(output_dir: P, decoder: D) -> Self {
        Self { output_dir: output_dir.into(), decoder }
    }

    pub fn output_dir(&self) -> &Path { &self.output_dir }

    /// Materialize every commit and record in `blocks`, in order.
    pub fn run<I>(&self, blocks: I) -> Result<ExtractReport, ExtractError>
    where
        I: IntoIterator<Item = Result<Block, CarError>>,
    {
        fs::create_dir_all(&self.output_dir).map_err(|source| ExtractError::CreateOutputDir {
            path: self.output_dir.clone(),
            source,
        })?;

        let mut report = ExtractReport {
            output_dir: self.output_dir.clone(),
            ..ExtractReport::default()
        };

        for block in blocks {
            let block = block?;
            report.blocks_seen += 1;
            self.process(&block, &mut report);
        }

        Ok(report)
    }

    fn process(&self, block: &Block, report: &mut ExtractReport) {
        let value = match self.decoder.decode(&block.data) {
            Ok(value) => value,
            Err(e) => {
                warn!(cid = %block.cid, "Could not decode block {}: {e}", block.cid);
                report.decode_failures += 1;
                return;
            }
        };

        match classify(&value) {
            BlockKind::Commit(_) => {
                report.commit = Some(block.cid);
                let path = self.output_dir.join(COMMIT_FILE);
                match write_json(&path, &value) {
                    Ok(()) => info!("Commit info: {}", path.display()),
                    Err(e) => {
                        warn!(cid = %block.cid, "Could not write commit: {e}");
                        report.write_failures += 1;
                    }
                }
            }
            BlockKind::Record(record) => {
                if record.collection.is_empty() {
                    return;
                }
                let rel = record_path(&record, &block.cid);
                let Some(path) = self.confined_path(&rel) else {
                    warn!(cid = %block.cid, "Refusing record path outside the output directory: {rel}");
                    report.rejected_paths += 1;
                    return;
                };
                match write_json(&path, &value) {
                    Ok(()) => {
                        report.records_written += 1;
                        info!("Record: {rel}");
                    }
                    Err(e) => {
                        warn!(cid = %block.cid, "Could not write record {rel}: {e}");
                        report.write_failures += 1;
                    }
                }
            }
            BlockKind::IndexNode => {
                debug!(cid = %block.cid, "Skipping index node");
                report.index_nodes += 1;
            }
            BlockKind::Unrecognized => {
                debug!(cid = %block.cid, "Skipping unrecognized block");
                report.unrecognized += 1;
            }
        }
    }

    /// Join `<collection>/<key>` onto the output directory, or `None` when
    /// it contains a component that would escape it.
    fn confined_path(&self, rel: &str) -> Option<PathBuf> {
        let escapes = Path::new(rel)
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return None;
        }
        Some(self.output_dir.join(format!("{rel}{RECORD_EXTENSION}")))
    }
}

/// Render `value` as indented JSON and write it to `path`, creating parent
/// directories and replacing any existing file.
fn write_json(path: &Path, value: &Ipld) -> Result<(), ExtractError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|source| ExtractError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let json = render_pretty(value)?;
    fs::write(path, json).map_err(|source| ExtractError::Write { path: path.to_path_buf(), source })
}

// ── Entry point ──────────────────────────────────────────────────────────────

/// Extract `archive_path` into `output_dir`, or into a directory named
/// after the archive when none is given.
#[instrument(skip_all, fields(archive = %archive_path.display()))]
pub fn extract(archive_path: &Path, output_dir: Option<&Path>) -> Result<ExtractReport, ExtractError> {
    let archive = Archive::open(archive_path)?;
    let output_dir = output_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output_dir(archive_path));

    info!("Extracting CAR file: {}", archive_path.display());
    info!("Output directory: {}", output_dir.display());
    for root in archive.roots() {
        debug!(%root, "Archive root");
    }

    Extractor::new(output_dir).run(archive.blocks())
}
