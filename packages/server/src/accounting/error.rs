use sea_orm::DbErr;
use stash_common::storage::StorageError;
use thiserror::Error;

/// Failures of the file lifecycle operations.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("{0}")]
    InvalidPath(&'static str),

    #[error("{0}")]
    InvalidName(&'static str),

    #[error("File with path '{path}' and name '{name}' already exists.")]
    DuplicateFile { path: String, name: String },

    /// `incoming` is a lower bound when staging stopped before the end of
    /// the stream.
    #[error(
        "Storage quota exceeded: {used} of {max} bytes in use, upload needs at least {incoming} more"
    )]
    QuotaExceeded { used: u64, incoming: u64, max: u64 },

    #[error("File exceeds maximum upload size of {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("{0} not found")]
    NotFound(&'static str),

    /// The derived blob location holds bytes no registry row accounts for.
    #[error("blob location '{0}' is already occupied")]
    LocationOccupied(String),

    /// The detached commit task panicked or was cancelled.
    #[error("file operation aborted: {0}")]
    Aborted(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Db(#[from] DbErr),
}
