//! Payload extraction: locating the record collection inside the input blob
//!
//! The input is either a bare JSON export or a ZIP archive containing one.
//! Archive-ness is decided up front by [`detect_payload_kind`] and passed in
//! explicitly, so [`extract`] itself stays deterministic and testable.
//! Decoding the extracted text into records is a separate step
//! ([`decode_records`]), owned by the caller.

use crate::error::{Error, Result};
use crate::progress::{ProgressSink, Stage, StageReporter};
use crate::types::SourceRecord;
use std::io::{Cursor, Read};
use tracing::{debug, info, warn};
use zip::result::ZipError;

/// Canonical filename of the record collection inside an archive
const CANONICAL_NAME: &str = "conversations.json";

/// Archive paths checked in order before falling back to a full entry scan
const CANONICAL_PATHS: &[&str] = &["conversations.json", "data/conversations.json"];

/// Progress milestone entering the archive scan
const SCAN_PERCENT: u8 = 5;

/// Progress milestone after extraction, before decoding
const EXTRACTED_PERCENT: u8 = 18;

/// What kind of payload the input blob is
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayloadKind {
    /// A ZIP archive that must be searched for the record collection
    Archive,
    /// A directly-encoded record collection
    Text,
}

/// Decide whether the input blob is a supported archive.
///
/// ZIP archives are recognized by their local-file-header magic. Everything
/// else is treated as directly-encoded text.
pub fn detect_payload_kind(input: &[u8]) -> PayloadKind {
    if input.starts_with(b"PK\x03\x04") || input.starts_with(b"PK\x05\x06") {
        PayloadKind::Archive
    } else {
        PayloadKind::Text
    }
}

/// Extract the record-collection text from the input blob.
///
/// For archives, searches [`CANONICAL_PATHS`] first, then falls back to a
/// case-insensitive scan for any entry ending in the canonical filename.
/// Returns [`Error::NotFound`] when no candidate exists anywhere in the
/// archive. Non-archive inputs are returned whole as UTF-8 text.
pub fn extract(input: &[u8], kind: PayloadKind, sink: ProgressSink) -> Result<String> {
    let reporter = StageReporter::new(sink, Stage::Extract);

    let text = match kind {
        PayloadKind::Archive => {
            reporter.emit(SCAN_PERCENT, "Scanning archive for conversation data");
            extract_from_archive(input)?
        }
        PayloadKind::Text => {
            reporter.emit(SCAN_PERCENT, "Reading conversation data");
            String::from_utf8(input.to_vec())
                .map_err(|_| Error::MalformedPayload("payload is not valid UTF-8".to_string()))?
        }
    };

    reporter.emit(EXTRACTED_PERCENT, "Conversation data extracted");
    info!(bytes = text.len(), "payload extraction complete");
    Ok(text)
}

/// Search a ZIP archive for the record collection and read it out
fn extract_from_archive(input: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(input)).map_err(|e| {
        Error::MalformedPayload(format!("failed to open archive: {}", e))
    })?;

    // Exact canonical paths first
    for path in CANONICAL_PATHS {
        match archive.by_name(path) {
            Ok(entry) => {
                debug!(entry = path, "found record collection at canonical path");
                return read_entry_text(entry, path);
            }
            Err(ZipError::FileNotFound) => continue,
            Err(e) => {
                return Err(Error::MalformedPayload(format!(
                    "failed to read archive entry '{}': {}",
                    path, e
                )));
            }
        }
    }

    // Fall back to a case-insensitive suffix scan across all entries
    let candidate = archive
        .file_names()
        .find(|name| name.to_lowercase().ends_with(CANONICAL_NAME))
        .map(|name| name.to_string());

    match candidate {
        Some(name) => {
            debug!(entry = %name, "found record collection via suffix scan");
            let entry = archive.by_name(&name).map_err(|e| {
                Error::MalformedPayload(format!(
                    "failed to read archive entry '{}': {}",
                    name, e
                ))
            })?;
            read_entry_text(entry, &name)
        }
        None => {
            warn!("archive contains no conversation data entry");
            Err(Error::NotFound(format!(
                "no archive entry named or ending in '{}'",
                CANONICAL_NAME
            )))
        }
    }
}

/// Read one archive entry fully into a UTF-8 string
fn read_entry_text(mut entry: zip::read::ZipFile, name: &str) -> Result<String> {
    let mut text = String::new();
    entry.read_to_string(&mut text).map_err(|e| {
        Error::MalformedPayload(format!("archive entry '{}' is not readable text: {}", name, e))
    })?;
    Ok(text)
}

/// Decode extracted text into an ordered sequence of source records.
///
/// Accepts a top-level JSON array, or an object wrapping a `conversations`
/// array. Every element must be an object; the first element that is not one
/// fails the whole decode with [`Error::MalformedPayload`].
pub fn decode_records(text: &str) -> Result<Vec<SourceRecord>> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| Error::MalformedPayload(format!("invalid JSON: {}", e)))?;

    let items = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut map) => match map.remove("conversations") {
            Some(serde_json::Value::Array(items)) => items,
            Some(_) => {
                return Err(Error::MalformedPayload(
                    "'conversations' field is not an array".to_string(),
                ));
            }
            None => {
                return Err(Error::MalformedPayload(
                    "expected an array of records or a 'conversations' array".to_string(),
                ));
            }
        },
        other => {
            return Err(Error::MalformedPayload(format!(
                "expected an array of records, got {}",
                json_type_name(&other)
            )));
        }
    };

    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        if !item.is_object() {
            return Err(Error::MalformedPayload(format!(
                "record at index {} is not an object",
                index
            )));
        }
        records.push(SourceRecord::from_value(item));
    }

    debug!(count = records.len(), "decoded record collection");
    Ok(records)
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
