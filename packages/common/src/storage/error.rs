use thiserror::Error;

/// Errors that can occur during blob storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Nothing is stored at the requested location.
    #[error("blob not found: {0}")]
    NotFound(String),
    /// The target location is already occupied (by a file or a directory).
    #[error("location already occupied: {0}")]
    AlreadyExists(String),
    /// The location cannot be mapped onto the storage root.
    #[error("invalid blob location: {0}")]
    InvalidLocation(String),
    /// The incoming stream exceeded the limit passed to `stage`.
    #[error("blob exceeds size limit ({actual} > {limit} bytes)")]
    SizeLimitExceeded { actual: u64, limit: u64 },
    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),
}
