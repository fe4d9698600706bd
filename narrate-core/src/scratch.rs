//! Scratch space for per-segment audio files.

use crate::error::Result;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A private directory for chunk WAVs, removed when dropped.
#[derive(Debug)]
pub(crate) struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    /// Create under the system temp dir, or under `root` when given.
    pub(crate) fn new(root: Option<&Path>) -> Result<Self> {
        let builder = {
            let mut b = tempfile::Builder::new();
            b.prefix("narrate-");
            b
        };
        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        log::debug!("Scratch directory: {}", dir.path().display());
        Ok(Self { dir })
    }

    pub(crate) fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Location of the WAV for one segment.
    pub(crate) fn chunk_path(&self, index: usize) -> PathBuf {
        self.dir.path().join(format!("chunk_{:05}.wav", index))
    }
}
