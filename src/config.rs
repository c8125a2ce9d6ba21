//! Configuration types for convo-export

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default number of concurrent render tasks
pub const DEFAULT_CONCURRENCY: usize = 8;

/// How to handle a destination file that already exists
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionAction {
    /// Write under a versioned name: `name (1).md`, `name (2).md`, ...
    #[default]
    Rename,
    /// Leave the existing file untouched; the write is reported as cancelled
    Skip,
    /// Replace the existing file
    Overwrite,
}

/// Main configuration for an export session
///
/// All fields have sensible defaults; a zero-configuration session works out
/// of the box. Serialized form is flat for easy embedding in host app config.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Maximum render tasks in flight during conversion (default: 8)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Destination collision handling during persistence
    #[serde(default)]
    pub collision: CollisionAction,

    /// Clear the processed-identity set and produced files when a new payload
    /// is loaded (default: true)
    #[serde(default = "default_true")]
    pub reset_processed_on_load: bool,

    /// Prefix for the bundled archive's filename (default: "conversations")
    #[serde(default = "default_archive_prefix")]
    pub archive_prefix: String,

    /// Directory where triggered downloads land (default: "./downloads")
    #[serde(default = "default_downloads_dir")]
    pub downloads_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            collision: CollisionAction::default(),
            reset_processed_on_load: true,
            archive_prefix: default_archive_prefix(),
            downloads_dir: default_downloads_dir(),
        }
    }
}

impl Config {
    /// Validate configuration values, returning a descriptive error for the
    /// first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::Config {
                message: "concurrency must be at least 1".to_string(),
                key: Some("concurrency".to_string()),
            });
        }
        if self.archive_prefix.is_empty() {
            return Err(Error::Config {
                message: "archive_prefix must not be empty".to_string(),
                key: Some("archive_prefix".to_string()),
            });
        }
        Ok(())
    }
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_true() -> bool {
    true
}

fn default_archive_prefix() -> String {
    "conversations".to_string()
}

fn default_downloads_dir() -> PathBuf {
    PathBuf::from("./downloads")
}
