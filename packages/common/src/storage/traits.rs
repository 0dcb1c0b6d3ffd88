use std::io::Cursor;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::error::StorageError;
use super::location::BlobLocation;
use super::staged::{DetachedBlob, StagedBlob};

/// Type alias for a boxed async reader.
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// Location-addressed blob storage.
///
/// Writes go through two steps: [`stage`](BlobStore::stage) spools the
/// incoming stream into a private area and measures it, then
/// [`put`](BlobStore::put) promotes it to its final location. Nothing is ever
/// overwritten; callers guarantee uniqueness before promoting.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Receive a stream into the staging area, failing once more than `limit`
    /// bytes have been read.
    async fn stage(
        &self,
        reader: &mut (dyn AsyncRead + Unpin + Send),
        limit: u64,
    ) -> Result<StagedBlob, StorageError>;

    /// Promote a staged blob to `location`, creating parent directories.
    ///
    /// Fails with `AlreadyExists` if anything occupies the location.
    async fn put(&self, staged: StagedBlob, location: &BlobLocation) -> Result<(), StorageError>;

    /// Stage and promote an in-memory buffer.
    async fn put_bytes(&self, data: &[u8], location: &BlobLocation) -> Result<u64, StorageError> {
        let mut reader = Cursor::new(data);
        let staged = self.stage(&mut reader, data.len() as u64).await?;
        let size = staged.size();
        self.put(staged, location).await?;
        Ok(size)
    }

    /// Open the blob at `location` for streaming.
    async fn get_stream(&self, location: &BlobLocation) -> Result<BoxReader, StorageError>;

    /// Read the whole blob at `location`.
    async fn get(&self, location: &BlobLocation) -> Result<Vec<u8>, StorageError> {
        let mut reader = self.get_stream(location).await?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    async fn exists(&self, location: &BlobLocation) -> Result<bool, StorageError>;

    /// Remove the blob at `location`.
    ///
    /// Returns `true` if it was deleted, `false` if it was already absent.
    async fn delete(&self, location: &BlobLocation) -> Result<bool, StorageError>;

    /// Move a blob to a new location without overwriting.
    async fn relocate(&self, from: &BlobLocation, to: &BlobLocation) -> Result<(), StorageError>;

    /// Move a blob out of its location so a pending delete can still be undone.
    ///
    /// Returns `None` when nothing is stored at `location`.
    async fn detach(&self, location: &BlobLocation) -> Result<Option<DetachedBlob>, StorageError>;

    /// Put a detached blob back where it came from.
    async fn restore(&self, detached: DetachedBlob) -> Result<(), StorageError>;

    /// Permanently remove a detached blob.
    async fn discard(&self, detached: DetachedBlob) -> Result<(), StorageError>;
}
