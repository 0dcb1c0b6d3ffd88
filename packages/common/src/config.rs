use std::path::PathBuf;

use serde::Deserialize;

/// Blob storage and quota configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Root directory holding every owner's namespace. Default: "./media".
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Per-owner quota ceiling in bytes. Default: 1 GiB.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
    /// Largest single upload accepted by the HTTP layer. Default: 128 MiB.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: u64,
}

fn default_root() -> PathBuf {
    PathBuf::from("./media")
}
fn default_max_bytes() -> u64 {
    1024 * 1024 * 1024
}
fn default_max_upload_size() -> u64 {
    128 * 1024 * 1024
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            max_bytes: default_max_bytes(),
            max_upload_size: default_max_upload_size(),
        }
    }
}
