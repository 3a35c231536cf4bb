//! High-level [`Archive`] API: open a CAR file from disk.
//!
//! ```no_run
//! use uncar::archive::Archive;
//!
//! let archive = Archive::open("repo.car")?;
//! for block in archive.blocks() {
//!     let block = block?;
//!     println!("{} ({} bytes)", block.cid, block.data.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::io::{self, Cursor};
use std::path::{Path, PathBuf};

use cid::Cid;
use thiserror::Error;

use crate::header::CarError;
use crate::io_stream::CarReader;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("CAR file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Failed to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Car(#[from] CarError),
}

pub struct Archive {
    path:   PathBuf,
    reader: CarReader<Cursor<Vec<u8>>>,
}

impl Archive {
    /// Read the whole file up front and parse its header.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ArchiveError> {
        let path = path.as_ref().to_owned();
        if !path.exists() {
            return Err(ArchiveError::NotFound(path));
        }
        let bytes = std::fs::read(&path)
            .map_err(|source| ArchiveError::Read { path: path.clone(), source })?;
        let reader = CarReader::new(Cursor::new(bytes))?;
        Ok(Self { path, reader })
    }

    pub fn path(&self) -> &Path { &self.path }

    pub fn roots(&self) -> &[Cid] { self.reader.roots() }

    /// The archive's file name, for display.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Consume the archive and iterate its blocks in archive order.
    pub fn blocks(self) -> CarReader<Cursor<Vec<u8>>> {
        self.reader
    }
}

/// Default extraction directory: the archive's file name with its
/// extension removed, relative to the current directory.
pub fn default_output_dir(archive_path: &Path) -> PathBuf {
    archive_path
        .file_stem()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("repo"))
}
