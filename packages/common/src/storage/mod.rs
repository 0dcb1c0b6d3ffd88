mod error;
mod hash;
mod location;
mod staged;
mod traits;

pub mod filesystem;

pub use error::StorageError;
pub use hash::ContentHash;
pub use location::BlobLocation;
pub use staged::{DetachedBlob, StagedBlob};
pub use traits::{BlobStore, BoxReader};
