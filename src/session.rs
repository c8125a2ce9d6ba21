//! Export session: top-level orchestration and shared state
//!
//! One [`ExportSession`] per loaded source. It owns the processed-identity
//! set and the produced-document list, and guards against overlapping
//! top-level operations: extraction, conversion, persistence, and bundling
//! each run exclusively, rejected with [`Error::Busy`] while another is in
//! flight.

use crate::bundle::{archive_filename, bundle_documents};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::extract::{decode_records, detect_payload_kind, extract};
use crate::persist::persist;
use crate::pipeline::{ConvertOptions, convert};
use crate::progress::{ProgressSink, Stage, StageReporter};
use crate::render::RecordRenderer;
use crate::storage::StorageBackend;
use crate::types::{
    ConversionResult, DirectoryTarget, OutputDocument, PersistSummary, ProcessedIdentitySet,
    SaveOutcome, SourceRecord,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// How the archive export was delivered
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArchiveDelivery {
    /// A single bundled archive was delivered
    Bundled {
        /// Filename of the delivered archive
        filename: String,
        /// Size of the archive in bytes
        size_bytes: usize,
    },
    /// Archive packaging unavailable: documents were delivered individually
    Individual {
        /// Number of documents delivered successfully
        delivered: usize,
        /// Number of documents whose delivery failed
        failed: usize,
    },
    /// There was nothing to deliver
    Nothing,
}

/// Session-lifetime mutable state: mutated only under the busy guard
struct SessionState {
    processed_ids: ProcessedIdentitySet,
    files: Vec<OutputDocument>,
}

/// Main session instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct ExportSession {
    config: Arc<Config>,
    renderer: Arc<dyn RecordRenderer>,
    store: Arc<dyn StorageBackend>,
    sink: ProgressSink,
    state: Arc<tokio::sync::Mutex<SessionState>>,
    busy: Arc<AtomicBool>,
}

/// RAII release of the session busy flag
struct OpGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for OpGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

impl ExportSession {
    /// Create a new session with the given collaborators.
    ///
    /// Validates the configuration up front; an invalid config never produces
    /// a half-working session.
    pub fn new(
        config: Config,
        renderer: Arc<dyn RecordRenderer>,
        store: Arc<dyn StorageBackend>,
        sink: ProgressSink,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            renderer,
            store,
            sink,
            state: Arc::new(tokio::sync::Mutex::new(SessionState {
                processed_ids: ProcessedIdentitySet::new(),
                files: Vec::new(),
            })),
            busy: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Acquire the exclusive-operation guard or fail with `Busy`
    fn begin_operation(&self) -> Result<OpGuard> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::Busy);
        }
        Ok(OpGuard {
            busy: Arc::clone(&self.busy),
        })
    }

    /// Ingest a raw input blob: extract the record collection and decode it.
    ///
    /// When `reset_processed_on_load` is set (the default), loading a new
    /// payload clears the processed-identity set and the produced-file list.
    pub async fn load_payload(&self, input: &[u8]) -> Result<Vec<SourceRecord>> {
        let _guard = self.begin_operation()?;

        let kind = detect_payload_kind(input);
        let text = extract(input, kind, Arc::clone(&self.sink))?;
        let records = decode_records(&text)?;

        if self.config.reset_processed_on_load {
            let mut state = self.state.lock().await;
            state.processed_ids.clear();
            state.files.clear();
        }

        info!(records = records.len(), ?kind, "payload loaded");
        Ok(records)
    }

    /// Convert records into documents under the session's dedup scope.
    ///
    /// Produced documents accumulate on the session for later persistence or
    /// bundling; the returned result also carries them.
    pub async fn convert_records(
        &self,
        records: Vec<SourceRecord>,
    ) -> Result<ConversionResult> {
        let _guard = self.begin_operation()?;

        let options = ConvertOptions {
            concurrency: self.config.concurrency,
        };
        let mut state = self.state.lock().await;
        let result = convert(
            records,
            &mut state.processed_ids,
            Arc::clone(&self.renderer),
            &options,
            Arc::clone(&self.sink),
        )
        .await?;

        state.files.extend(result.files.iter().cloned());
        Ok(result)
    }

    /// Write the session's produced documents into a granted destination.
    ///
    /// The target is revalidated on every call; it is never assumed to stay
    /// reachable across operations.
    pub async fn save_to_directory(&self, target: &DirectoryTarget) -> Result<PersistSummary> {
        let _guard = self.begin_operation()?;

        let files = self.state.lock().await.files.clone();
        persist(
            &files,
            target,
            self.store.as_ref(),
            self.config.collision,
            Arc::clone(&self.sink),
        )
        .await
    }

    /// Deliver the session's produced documents as a downloadable archive,
    /// falling back to one download per document when archive packaging is
    /// unavailable.
    pub async fn export_archive(&self) -> Result<ArchiveDelivery> {
        let _guard = self.begin_operation()?;

        let files = self.state.lock().await.files.clone();
        let reporter = StageReporter::new(Arc::clone(&self.sink), Stage::Bundle);

        if files.is_empty() {
            reporter.finish("Nothing to export");
            return Ok(ArchiveDelivery::Nothing);
        }

        if self.store.archive_supported() {
            reporter.emit(10, format!("Packaging {} documents", files.len()));
            let bytes = bundle_documents(&files)?;
            let filename = archive_filename(
                &self.config.archive_prefix,
                chrono::Utc::now().date_naive(),
            );

            match self.store.deliver_download(&filename, &bytes).await {
                SaveOutcome::Written => {
                    reporter.finish(format!("Exported {}", filename));
                    info!(%filename, bytes = bytes.len(), "archive export delivered");
                    Ok(ArchiveDelivery::Bundled {
                        filename,
                        size_bytes: bytes.len(),
                    })
                }
                SaveOutcome::Cancelled => {
                    Err(Error::Storage("archive download declined".to_string()))
                }
                SaveOutcome::Failed(reason) => Err(Error::Storage(reason)),
            }
        } else {
            info!("archive packaging unavailable, delivering documents individually");
            let total = files.len();
            let mut delivered = 0usize;
            let mut failed = 0usize;

            for (index, document) in files.iter().enumerate() {
                match self
                    .store
                    .deliver_download(&document.filename, document.content.as_bytes())
                    .await
                {
                    SaveOutcome::Written => delivered += 1,
                    SaveOutcome::Cancelled => {
                        warn!(filename = %document.filename, "individual download declined");
                        failed += 1;
                    }
                    SaveOutcome::Failed(reason) => {
                        warn!(filename = %document.filename, %reason, "individual download failed");
                        failed += 1;
                    }
                }
                reporter.emit(
                    ((index + 1) * 100 / total) as u8,
                    format!("Downloading {} ({}/{})", document.filename, index + 1, total),
                );
            }

            reporter.finish(format!("Delivered {} of {} documents", delivered, total));
            Ok(ArchiveDelivery::Individual { delivered, failed })
        }
    }

    /// Clear the processed-identity set and the produced-file list.
    ///
    /// The explicit "new source" action; never happens implicitly mid-run.
    pub async fn reset(&self) -> Result<()> {
        let _guard = self.begin_operation()?;
        let mut state = self.state.lock().await;
        state.processed_ids.clear();
        state.files.clear();
        Ok(())
    }

    /// Snapshot of the documents produced so far in this session
    pub async fn produced_files(&self) -> Vec<OutputDocument> {
        self.state.lock().await.files.clone()
    }

    /// Number of identities processed so far in this session
    pub async fn processed_count(&self) -> usize {
        self.state.lock().await.processed_ids.len()
    }

    /// Whether a top-level operation is currently in flight
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }
}
