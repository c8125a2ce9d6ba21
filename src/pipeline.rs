//! Conversion pipeline: bounded-concurrency rendering with deduplication
//!
//! Records already present in the caller's [`ProcessedIdentitySet`] are
//! skipped; the rest are rendered under a bounded pool. Per-record failures
//! are counted, never raised — partial failure is the expected posture, and
//! the batch always runs to completion.

use crate::config::DEFAULT_CONCURRENCY;
use crate::error::{Error, Result};
use crate::progress::{ProgressSink, Stage, StageReporter};
use crate::render::RecordRenderer;
use crate::types::{ConversionResult, ProcessedIdentitySet, SourceRecord};
use futures::StreamExt;
use futures::stream;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Options for one conversion run
#[derive(Clone, Copy, Debug)]
pub struct ConvertOptions {
    /// Maximum render invocations in flight simultaneously (must be >= 1)
    pub concurrency: usize,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Convert a record collection into output documents.
///
/// Identities already in `processed_ids` count as `skipped` and are not
/// rendered again. Successful renders add their identity to the set; failed
/// renders do not, so a later run can re-attempt them. Completion order
/// across the output set is irrelevant — the final file list is
/// order-independent by filename.
///
/// The only conditions that abort the call are malformed arguments
/// (`concurrency == 0`); every per-record failure is absorbed into the
/// `errors` counter.
pub async fn convert(
    records: Vec<SourceRecord>,
    processed_ids: &mut ProcessedIdentitySet,
    renderer: Arc<dyn RecordRenderer>,
    options: &ConvertOptions,
    sink: ProgressSink,
) -> Result<ConversionResult> {
    if options.concurrency == 0 {
        return Err(Error::Config {
            message: "concurrency must be at least 1".to_string(),
            key: Some("concurrency".to_string()),
        });
    }

    let reporter = StageReporter::new(sink, Stage::Convert);
    let total_records = records.len();

    // Partition against the identity set: already-processed records are
    // skipped without touching the renderer.
    let mut skipped = 0usize;
    let mut candidates = Vec::with_capacity(records.len());
    for record in records {
        if processed_ids.contains(record.identity()) {
            debug!(record = %record.identity(), "skipping already-processed record");
            skipped += 1;
        } else {
            candidates.push(record);
        }
    }

    let total = candidates.len();
    let mut result = ConversionResult {
        skipped,
        ..Default::default()
    };

    if total == 0 {
        reporter.finish(format!(
            "Nothing to convert ({} already processed)",
            skipped
        ));
        return Ok(result);
    }

    // Duplicate filenames within a run are an error, never a silent overwrite.
    let mut seen_filenames: HashSet<String> = HashSet::new();
    let mut completed = 0usize;

    let mut outcomes = stream::iter(candidates)
        .map(|record| {
            let renderer = Arc::clone(&renderer);
            async move {
                let rendered = renderer.render(&record).await;
                (record, rendered)
            }
        })
        .buffer_unordered(options.concurrency);

    while let Some((record, rendered)) = outcomes.next().await {
        completed += 1;
        match rendered {
            Ok(document) => {
                if seen_filenames.contains(&document.filename) {
                    warn!(
                        record = %record.identity(),
                        filename = %document.filename,
                        "duplicate output filename within run"
                    );
                    result.errors += 1;
                } else {
                    seen_filenames.insert(document.filename.clone());
                    processed_ids.insert(record.identity().clone());
                    result.files.push(document);
                    result.processed += 1;
                }
            }
            Err(e) => {
                warn!(record = %record.identity(), error = %e, "record render failed");
                result.errors += 1;
            }
        }
        reporter.emit(
            (completed * 100 / total) as u8,
            format!("Converting conversations ({completed}/{total})"),
        );
    }
    drop(outcomes);

    debug_assert_eq!(result.processed + result.skipped + result.errors, total_records);

    reporter.finish(format!(
        "Converted {} conversations ({} skipped, {} failed)",
        result.processed, result.skipped, result.errors
    ));
    info!(
        processed = result.processed,
        skipped = result.skipped,
        errors = result.errors,
        "conversion complete"
    );
    Ok(result)
}
