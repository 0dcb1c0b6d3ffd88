//! Storage accounting: the file lifecycle and the quota ledger behind it.

mod error;
pub mod ledger;
mod service;

pub use error::FileError;
pub use service::{FileService, FileUpdate, NewFile};
