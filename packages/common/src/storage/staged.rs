use std::path::{Path, PathBuf};

use super::hash::ContentHash;
use super::location::BlobLocation;

/// Temporary file owned by the blob store. Removed on drop unless released.
pub(crate) struct ScratchFile {
    path: PathBuf,
    armed: bool,
}

impl ScratchFile {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Stop tracking the file; the caller has moved or removed it.
    pub(crate) fn release(mut self) {
        self.armed = false;
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if self.armed {
            // Blocking unlink on whatever thread drops the handle, possibly a
            // runtime worker. It is one metadata call, and the spool is gone
            // by the time drop returns.
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// An upload fully received into the staging area but not yet placed at its
/// final location. Dropping it discards the bytes, so a request that fails or
/// is cancelled after staging leaves nothing behind.
pub struct StagedBlob {
    pub(crate) file: ScratchFile,
    pub(crate) size: u64,
    pub(crate) hash: ContentHash,
}

impl StagedBlob {
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn content_hash(&self) -> ContentHash {
        self.hash
    }
}

impl std::fmt::Debug for StagedBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagedBlob")
            .field("path", &self.file.path())
            .field("size", &self.size)
            .field("hash", &self.hash)
            .finish()
    }
}

/// Bytes moved aside by [`BlobStore::detach`](super::BlobStore::detach) while a
/// delete is pending. Either `restore` or `discard` it.
#[derive(Debug)]
pub struct DetachedBlob {
    pub(crate) parked_at: PathBuf,
    pub(crate) location: BlobLocation,
}

impl DetachedBlob {
    pub fn location(&self) -> &BlobLocation {
        &self.location
    }
}
