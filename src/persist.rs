//! Directory persistence: strictly sequential writes with per-file accounting
//!
//! Rendering is parallel-safe; writing to a shared destination is not. Files
//! are resolved one at a time, in index order, so progress stays monotonic
//! and destination writes never race. Per-file failures and declines are
//! counted and the batch continues.

use crate::config::CollisionAction;
use crate::error::Result;
use crate::progress::{ProgressSink, Stage, StageReporter};
use crate::storage::StorageBackend;
use crate::types::{DirectoryTarget, OutputDocument, PersistSummary, SaveOutcome};
use tracing::{info, warn};

/// Write the produced documents into a user-granted destination.
///
/// Revalidates the target first: a stale handle fails this call (and only
/// this call) with [`Error::TargetUnavailable`](crate::Error::TargetUnavailable).
/// After that, every per-file outcome — written, declined, failed — is folded
/// into the returned [`PersistSummary`]; no outcome aborts the batch.
pub async fn persist(
    files: &[OutputDocument],
    target: &DirectoryTarget,
    store: &dyn StorageBackend,
    collision: CollisionAction,
    sink: ProgressSink,
) -> Result<PersistSummary> {
    store.validate_target(target).await?;

    let reporter = StageReporter::new(sink, Stage::Persist);
    let total = files.len();
    let mut summary = PersistSummary::default();

    if total == 0 {
        reporter.finish("Nothing to save");
        return Ok(summary);
    }

    for (index, document) in files.iter().enumerate() {
        let outcome = store
            .write_document(target, &document.filename, &document.content, collision)
            .await;

        match outcome {
            SaveOutcome::Written => summary.success += 1,
            SaveOutcome::Cancelled => {
                info!(filename = %document.filename, "write declined, continuing batch");
                summary.skipped += 1;
            }
            SaveOutcome::Failed(reason) => {
                warn!(filename = %document.filename, %reason, "write failed, continuing batch");
                summary.errors += 1;
            }
        }

        reporter.emit(
            ((index + 1) * 100 / total) as u8,
            format!("Saving {} ({}/{})", document.filename, index + 1, total),
        );
    }

    reporter.finish(format!(
        "Saved {} of {} documents to {}",
        summary.success, total, target.name
    ));
    info!(
        success = summary.success,
        skipped = summary.skipped,
        errors = summary.errors,
        destination = %target.name,
        "persistence complete"
    );
    Ok(summary)
}
