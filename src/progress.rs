//! Progress event channel shared by every pipeline stage
//!
//! Extraction, conversion, persistence, and bundling all report through the
//! same protocol: a single caller-supplied sink receiving ordered
//! [`ProgressEvent`]s. Percentages are monotonic non-decreasing within a
//! stage; `active = false` signals stage completion or idle.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

/// Pipeline stage a progress event belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Locating and extracting the record collection from the input
    Extract,
    /// Rendering records into documents
    Convert,
    /// Writing documents to the destination directory
    Persist,
    /// Packaging documents into a downloadable archive
    Bundle,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Extract => "extract",
            Stage::Convert => "convert",
            Stage::Persist => "persist",
            Stage::Bundle => "bundle",
        };
        write!(f, "{name}")
    }
}

/// One progress update emitted by a pipeline stage
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Stage the event belongs to
    pub stage: Stage,
    /// Whether the stage is still running; `false` marks completion or idle
    pub active: bool,
    /// Completion percentage, 0..=100, non-decreasing within a stage
    pub percent: u8,
    /// Human-readable message naming what is happening
    pub message: String,
}

/// Caller-supplied consumer for progress events
///
/// Invoked from every stage; it must not fail. Cloned freely — the underlying
/// closure is shared.
pub type ProgressSink = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// A sink that discards every event
pub fn null_sink() -> ProgressSink {
    Arc::new(|_| {})
}

/// Per-stage progress emitter enforcing the channel's ordering guarantees
///
/// Percentages passed to [`emit`](StageReporter::emit) are clamped so the
/// reported sequence never decreases, even if a caller computes a smaller
/// value after a larger one.
pub struct StageReporter {
    sink: ProgressSink,
    stage: Stage,
    last_percent: AtomicU8,
}

impl StageReporter {
    /// Start reporting for one stage
    pub fn new(sink: ProgressSink, stage: Stage) -> Self {
        Self {
            sink,
            stage,
            last_percent: AtomicU8::new(0),
        }
    }

    /// Emit an active progress event at the given percentage
    pub fn emit(&self, percent: u8, message: impl Into<String>) {
        let percent = percent.min(100);
        let clamped = self.last_percent.fetch_max(percent, Ordering::Relaxed).max(percent);
        (self.sink)(ProgressEvent {
            stage: self.stage,
            active: true,
            percent: clamped,
            message: message.into(),
        });
    }

    /// Emit the stage-completion event (`active = false`, 100%)
    pub fn finish(&self, message: impl Into<String>) {
        self.last_percent.store(100, Ordering::Relaxed);
        (self.sink)(ProgressEvent {
            stage: self.stage,
            active: false,
            percent: 100,
            message: message.into(),
        });
    }
}
