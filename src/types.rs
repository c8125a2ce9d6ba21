//! Core types for convo-export

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::PathBuf;

/// Stable identity of a source record, used for deduplication across runs
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    /// Create a new RecordId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Set of record identities already rendered in this session
///
/// Owned by the session, mutated only by the conversion pipeline. Cleared when
/// a new unrelated payload is loaded, never mid-run.
pub type ProcessedIdentitySet = HashSet<RecordId>;

/// JSON fields checked, in order, for an explicit record identity
const IDENTITY_FIELDS: &[&str] = &["id", "uuid", "conversation_id"];

/// One unit from the ingested collection representing a single conversation
///
/// The record body is opaque to the pipeline: it is passed to the renderer as-is.
/// Only the identity is inspected, for deduplication.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceRecord {
    id: RecordId,
    value: serde_json::Value,
}

impl SourceRecord {
    /// Wrap a decoded JSON object, deriving its stable identity.
    ///
    /// Identity comes from the first of `id`, `uuid`, or `conversation_id`
    /// present as a non-empty string. Records without one get a SHA-256
    /// digest of their serialized form, which is stable across runs for
    /// identical records.
    pub fn from_value(value: serde_json::Value) -> Self {
        let id = IDENTITY_FIELDS
            .iter()
            .find_map(|field| {
                value
                    .get(field)
                    .and_then(|v| v.as_str())
                    .filter(|s| !s.is_empty())
                    .map(RecordId::from)
            })
            .unwrap_or_else(|| RecordId(content_digest(&value)));
        Self { id, value }
    }

    /// The record's stable identity
    pub fn identity(&self) -> &RecordId {
        &self.id
    }

    /// The record's decoded JSON body
    pub fn value(&self) -> &serde_json::Value {
        &self.value
    }
}

/// Hex SHA-256 of a record's serialized JSON, for records without an id field
fn content_digest(value: &serde_json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.to_string().as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// One rendered output document corresponding to one source record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutputDocument {
    /// Human-readable conversation title
    pub title: String,
    /// Output filename, unique within one pipeline run
    pub filename: String,
    /// Creation date of the source conversation (calendar date string)
    pub created_date: String,
    /// Full rendered document text
    pub content: String,
}

/// Aggregate result of one conversion pipeline run
///
/// Invariant: `processed + skipped + errors` equals the number of records the
/// run considered.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConversionResult {
    /// Documents produced by this run
    pub files: Vec<OutputDocument>,
    /// Records rendered successfully
    pub processed: usize,
    /// Records whose identity was already processed before the run
    pub skipped: usize,
    /// Records whose render failed
    pub errors: usize,
}

/// Aggregate counts from one persistence run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistSummary {
    /// Files written successfully
    pub success: usize,
    /// Files skipped because the user declined the write
    pub skipped: usize,
    /// Files that failed with an I/O or capability error
    pub errors: usize,
}

/// Outcome of writing one file through the storage capability
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The file was written to the destination
    Written,
    /// The user declined to resolve the conflict; the file was not written
    Cancelled,
    /// The write failed with an error
    Failed(String),
}

/// A user-granted destination directory plus its display name
///
/// The handle may become stale between acquisition and use (directory removed,
/// permission revoked). Persistence revalidates reachability before writing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryTarget {
    /// Filesystem path of the granted directory
    pub path: PathBuf,
    /// Display name shown to the user
    pub name: String,
}

impl DirectoryTarget {
    /// Create a target from a path, deriving the display name from its last component
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { path, name }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identity_prefers_explicit_id_field() {
        let record = SourceRecord::from_value(json!({"id": "conv-1", "uuid": "other"}));
        assert_eq!(record.identity().as_str(), "conv-1");
    }

    #[test]
    fn identity_falls_back_through_field_order() {
        let record = SourceRecord::from_value(json!({"uuid": "u-9"}));
        assert_eq!(record.identity().as_str(), "u-9");

        let record = SourceRecord::from_value(json!({"conversation_id": "c-3"}));
        assert_eq!(record.identity().as_str(), "c-3");
    }

    #[test]
    fn identity_ignores_empty_and_non_string_ids() {
        let record = SourceRecord::from_value(json!({"id": "", "uuid": "u-1"}));
        assert_eq!(record.identity().as_str(), "u-1");

        let record = SourceRecord::from_value(json!({"id": 42, "uuid": "u-2"}));
        assert_eq!(record.identity().as_str(), "u-2");
    }

    #[test]
    fn digest_identity_is_stable_for_identical_records() {
        let a = SourceRecord::from_value(json!({"title": "Hi", "messages": []}));
        let b = SourceRecord::from_value(json!({"title": "Hi", "messages": []}));
        assert_eq!(a.identity(), b.identity());
        // 32 bytes of SHA-256, hex encoded
        assert_eq!(a.identity().as_str().len(), 64);
    }

    #[test]
    fn digest_identity_differs_for_different_records() {
        let a = SourceRecord::from_value(json!({"title": "Hi"}));
        let b = SourceRecord::from_value(json!({"title": "Bye"}));
        assert_ne!(a.identity(), b.identity());
    }

    #[test]
    fn directory_target_derives_display_name() {
        let target = DirectoryTarget::new("/exports/chat-backups");
        assert_eq!(target.name, "chat-backups");
    }

    #[test]
    fn conversion_result_default_is_zeroed() {
        let result = ConversionResult::default();
        assert_eq!(result.processed + result.skipped + result.errors, 0);
        assert!(result.files.is_empty());
    }
}
