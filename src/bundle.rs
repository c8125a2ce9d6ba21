//! Archive bundling: package produced documents into one downloadable ZIP

use crate::error::{Error, Result};
use crate::types::OutputDocument;
use chrono::NaiveDate;
use std::io::{Cursor, Write};
use tracing::debug;
use zip::write::FileOptions;

/// Package documents into an in-memory ZIP archive, one entry per document
/// named by its filename.
pub fn bundle_documents(files: &[OutputDocument]) -> Result<Vec<u8>> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default();

    for document in files {
        writer
            .start_file(document.filename.as_str(), options)
            .map_err(|e| Error::Bundle(format!("failed to add '{}': {}", document.filename, e)))?;
        writer
            .write_all(document.content.as_bytes())
            .map_err(|e| Error::Bundle(format!("failed to write '{}': {}", document.filename, e)))?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| Error::Bundle(format!("failed to finalize archive: {}", e)))?;
    let bytes = cursor.into_inner();
    debug!(entries = files.len(), bytes = bytes.len(), "archive bundled");
    Ok(bytes)
}

/// Archive filename carrying the export date for traceability
pub fn archive_filename(prefix: &str, date: NaiveDate) -> String {
    format!("{}-{}.zip", prefix, date.format("%Y-%m-%d"))
}
