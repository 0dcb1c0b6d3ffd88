use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tracing::warn;

use super::error::StorageError;
use super::hash::ContentHasher;
use super::location::BlobLocation;
use super::staged::{DetachedBlob, ScratchFile, StagedBlob};
use super::traits::{BlobStore, BoxReader};

const STAGING_DIR: &str = ".staging";
const PARKING_DIR: &str = ".trash";

/// Filesystem-backed blob store.
///
/// Blobs live at `{root}/{namespace}/{segments...}/{filename}`. Uploads are
/// spooled into `{root}/.staging` and pending deletes parked in
/// `{root}/.trash`; both sit on the same filesystem as the blobs so promotion
/// is a link, never a copy. Namespaces cannot start with `.`, so the private
/// directories never collide with an owner.
pub struct FilesystemBlobStore {
    root: PathBuf,
}

impl FilesystemBlobStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub async fn new(root: PathBuf) -> Result<Self, StorageError> {
        fs::create_dir_all(root.join(STAGING_DIR)).await?;
        fs::create_dir_all(root.join(PARKING_DIR)).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, location: &BlobLocation) -> PathBuf {
        location.to_path(&self.root)
    }

    fn scratch_path(&self, dir: &str) -> PathBuf {
        self.root.join(dir).join(uuid::Uuid::new_v4().to_string())
    }

    async fn ensure_parent(&self, target: &Path, location: &BlobLocation) -> Result<(), StorageError> {
        let Some(parent) = target.parent() else {
            return Ok(());
        };
        match fs::create_dir_all(parent).await {
            Ok(()) => Ok(()),
            // A file already sits where one of the directories should be.
            Err(e) if matches!(e.kind(), ErrorKind::AlreadyExists | ErrorKind::NotADirectory) => {
                Err(StorageError::AlreadyExists(location.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Hard-link `from` to `to`, failing instead of replacing an existing entry.
    async fn link_no_clobber(
        &self,
        from: &Path,
        to: &Path,
        source: &BlobLocation,
        target: &BlobLocation,
    ) -> Result<(), StorageError> {
        match fs::hard_link(from, to).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(StorageError::AlreadyExists(target.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(source.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn is_file(path: &Path) -> Result<bool, StorageError> {
        match fs::metadata(path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn stage(
        &self,
        reader: &mut (dyn AsyncRead + Unpin + Send),
        limit: u64,
    ) -> Result<StagedBlob, StorageError> {
        let scratch = ScratchFile::new(self.scratch_path(STAGING_DIR));
        let mut file = fs::File::create(scratch.path()).await?;
        let mut hasher = ContentHasher::default();
        let mut total: u64 = 0;
        let mut buf = vec![0u8; 64 * 1024];

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }

            total += n as u64;
            if total > limit {
                return Err(StorageError::SizeLimitExceeded {
                    actual: total,
                    limit,
                });
            }

            hasher.update(&buf[..n]);
            file.write_all(&buf[..n]).await?;
        }

        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        Ok(StagedBlob {
            file: scratch,
            size: total,
            hash: hasher.finish(),
        })
    }

    async fn put(&self, staged: StagedBlob, location: &BlobLocation) -> Result<(), StorageError> {
        let StagedBlob { file, .. } = staged;
        let target = self.path_of(location);

        self.ensure_parent(&target, location).await?;
        match fs::hard_link(file.path(), &target).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::AlreadyExists(location.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        if let Err(e) = fs::remove_file(file.path()).await {
            warn!(error = %e, path = %file.path().display(), "Failed to clear staging file");
        }
        file.release();
        Ok(())
    }

    async fn get_stream(&self, location: &BlobLocation) -> Result<BoxReader, StorageError> {
        let path = self.path_of(location);
        if !Self::is_file(&path).await? {
            return Err(StorageError::NotFound(location.to_string()));
        }
        match fs::File::open(&path).await {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(location.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, location: &BlobLocation) -> Result<bool, StorageError> {
        Self::is_file(&self.path_of(location)).await
    }

    async fn delete(&self, location: &BlobLocation) -> Result<bool, StorageError> {
        match fs::remove_file(self.path_of(location)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn relocate(&self, from: &BlobLocation, to: &BlobLocation) -> Result<(), StorageError> {
        if from == to {
            return Ok(());
        }
        let src = self.path_of(from);
        let dst = self.path_of(to);

        self.ensure_parent(&dst, to).await?;
        self.link_no_clobber(&src, &dst, from, to).await?;

        if let Err(e) = fs::remove_file(&src).await {
            // Keep exactly one copy: undo the link.
            let _ = fs::remove_file(&dst).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn detach(&self, location: &BlobLocation) -> Result<Option<DetachedBlob>, StorageError> {
        let src = self.path_of(location);
        if !Self::is_file(&src).await? {
            return Ok(None);
        }

        let parked_at = self.scratch_path(PARKING_DIR);
        match fs::rename(&src, &parked_at).await {
            Ok(()) => Ok(Some(DetachedBlob {
                parked_at,
                location: location.clone(),
            })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn restore(&self, detached: DetachedBlob) -> Result<(), StorageError> {
        let target = self.path_of(&detached.location);
        self.ensure_parent(&target, &detached.location).await?;
        match fs::hard_link(&detached.parked_at, &target).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::AlreadyExists(detached.location.to_string()));
            }
            Err(e) => return Err(e.into()),
        }
        let _ = fs::remove_file(&detached.parked_at).await;
        Ok(())
    }

    async fn discard(&self, detached: DetachedBlob) -> Result<(), StorageError> {
        match fs::remove_file(&detached.parked_at).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
