//! Scratch file guard
//!
//! Every upload works on a randomly named file in the scratch directory plus
//! the cover file the extractor may write next to it. [`ScratchFiles`] owns
//! both paths and removes whichever exist when dropped.

use core_metadata::cover_path_for;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug)]
pub struct ScratchFiles {
    audio: PathBuf,
    cover: PathBuf,
}

impl ScratchFiles {
    /// Reserve a fresh pair of paths under `dir`. Nothing is created on disk.
    pub fn new(dir: &Path) -> Self {
        let audio = dir.join(format!("{}.upload", Uuid::new_v4()));
        let cover = cover_path_for(&audio);
        Self { audio, cover }
    }

    pub fn audio(&self) -> &Path {
        &self.audio
    }

    pub fn cover(&self) -> &Path {
        &self.cover
    }

    fn remove(path: &Path) {
        match std::fs::remove_file(path) {
            Ok(()) => debug!(file = ?path.file_name(), "Scratch file removed"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(file = ?path.file_name(), error = %e, "Failed to remove scratch file"),
        }
    }
}

impl Drop for ScratchFiles {
    fn drop(&mut self) {
        Self::remove(&self.audio);
        Self::remove(&self.cover);
    }
}
