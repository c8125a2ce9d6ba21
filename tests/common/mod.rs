//! Shared fixtures for integration tests: instrumented renderer and storage
//! doubles, plus payload builders.
#![allow(dead_code)]

use async_trait::async_trait;
use convo_export::{
    DirectoryTarget, Error, OutputDocument, RecordRenderer, RenderError, Result, SaveOutcome,
    SourceRecord, StorageBackend,
};
use convo_export::CollisionAction;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Renderer stub that records its concurrent-call high-water mark and can be
/// told to fail specific identities.
pub struct CountingRenderer {
    in_flight: AtomicUsize,
    high_water: AtomicUsize,
    calls: AtomicUsize,
    fail_ids: HashSet<String>,
    delay: Duration,
}

impl CountingRenderer {
    pub fn new(delay: Duration) -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            high_water: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            fail_ids: HashSet::new(),
            delay,
        }
    }

    pub fn failing_on(mut self, ids: &[&str]) -> Self {
        self.fail_ids = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn high_water_mark(&self) -> usize {
        self.high_water.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordRenderer for CountingRenderer {
    async fn render(
        &self,
        record: &SourceRecord,
    ) -> std::result::Result<OutputDocument, RenderError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.high_water.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);

        let id = record.identity().as_str().to_string();
        if self.fail_ids.contains(&id) {
            return Err(RenderError::Malformed(format!("stub failure for {id}")));
        }
        Ok(OutputDocument {
            title: format!("Chat {id}"),
            filename: format!("{id}.md"),
            created_date: "2025-01-01".to_string(),
            content: format!("# Chat {id}\n"),
        })
    }
}

/// In-memory storage double recording every write and download
pub struct MemoryStorage {
    archive_supported: bool,
    cancel_names: HashSet<String>,
    fail_names: HashSet<String>,
    valid: AtomicBool,
    pub writes: Mutex<Vec<(String, String)>>,
    pub downloads: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            archive_supported: true,
            cancel_names: HashSet::new(),
            fail_names: HashSet::new(),
            valid: AtomicBool::new(true),
            writes: Mutex::new(Vec::new()),
            downloads: Mutex::new(Vec::new()),
        }
    }

    pub fn without_archive_support(mut self) -> Self {
        self.archive_supported = false;
        self
    }

    /// Writes to these filenames are declined by the user
    pub fn cancelling_on(mut self, names: &[&str]) -> Self {
        self.cancel_names = names.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Writes to these filenames fail with an I/O error
    pub fn failing_on(mut self, names: &[&str]) -> Self {
        self.fail_names = names.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Simulate the granted directory going away
    pub fn revoke(&self) {
        self.valid.store(false, Ordering::SeqCst);
    }

    pub fn target(&self) -> DirectoryTarget {
        DirectoryTarget::new("/virtual/exports")
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    fn is_supported(&self) -> bool {
        true
    }

    async fn acquire_directory(&self) -> Result<DirectoryTarget> {
        Ok(self.target())
    }

    async fn validate_target(&self, target: &DirectoryTarget) -> Result<()> {
        if self.valid.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::TargetUnavailable {
                name: target.name.clone(),
                reason: "grant revoked".to_string(),
            })
        }
    }

    async fn write_document(
        &self,
        _target: &DirectoryTarget,
        filename: &str,
        content: &str,
        _collision: CollisionAction,
    ) -> SaveOutcome {
        if self.cancel_names.contains(filename) {
            return SaveOutcome::Cancelled;
        }
        if self.fail_names.contains(filename) {
            return SaveOutcome::Failed("injected write failure".to_string());
        }
        self.writes
            .lock()
            .unwrap()
            .push((filename.to_string(), content.to_string()));
        SaveOutcome::Written
    }

    fn archive_supported(&self) -> bool {
        self.archive_supported
    }

    async fn deliver_download(&self, filename: &str, bytes: &[u8]) -> SaveOutcome {
        self.downloads
            .lock()
            .unwrap()
            .push((filename.to_string(), bytes.to_vec()));
        SaveOutcome::Written
    }
}

/// Source records with explicit ids and a minimal message body
pub fn records(ids: &[&str]) -> Vec<SourceRecord> {
    ids.iter()
        .map(|id| {
            SourceRecord::from_value(serde_json::json!({
                "id": id,
                "title": format!("Chat {id}"),
                "messages": [{"role": "user", "content": "hello"}],
            }))
        })
        .collect()
}

/// A JSON export payload for the given conversation ids
pub fn json_payload(ids: &[&str]) -> Vec<u8> {
    let items: Vec<serde_json::Value> = ids
        .iter()
        .map(|id| {
            serde_json::json!({
                "id": id,
                "title": format!("Chat {id}"),
                "messages": [{"role": "user", "content": "hello"}],
            })
        })
        .collect();
    serde_json::to_vec(&items).unwrap()
}

/// A ZIP payload wrapping the given entries
pub fn zip_payload(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer
            .start_file(*name, zip::write::FileOptions::default())
            .unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}
