//! # convo-export
//!
//! Library for converting bulk conversational exports into portable Markdown
//! documents, entirely on the user's own device.
//!
//! ## Design Philosophy
//!
//! convo-export is designed to be:
//! - **Local-first** - No network, no server-side processing
//! - **Partial-failure tolerant** - One bad record never aborts a batch
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Progress-transparent** - Every stage reports through one event sink
//!
//! ## Quick Start
//!
//! ```no_run
//! use convo_export::{Config, ExportSession, FsStorage, MarkdownRenderer, null_sink};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = ExportSession::new(
//!         Config::default(),
//!         Arc::new(MarkdownRenderer),
//!         Arc::new(FsStorage::new("./exports", "./downloads")),
//!         null_sink(),
//!     )?;
//!
//!     let input = std::fs::read("export.zip")?;
//!     let records = session.load_payload(&input).await?;
//!     let result = session.convert_records(records).await?;
//!     println!(
//!         "converted {} conversations ({} skipped, {} failed)",
//!         result.processed, result.skipped, result.errors
//!     );
//!
//!     session.export_archive().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Archive bundling
pub mod bundle;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Payload extraction and record decoding
pub mod extract;
/// Directory persistence
pub mod persist;
/// Conversion pipeline
pub mod pipeline;
/// Progress event channel
pub mod progress;
/// Record rendering
pub mod render;
/// Export session orchestration
pub mod session;
/// Storage capability collaborator
pub mod storage;
/// Core types
pub mod types;

// Re-export commonly used types
pub use bundle::{archive_filename, bundle_documents};
pub use config::{CollisionAction, Config, DEFAULT_CONCURRENCY};
pub use error::{Error, RenderError, Result};
pub use extract::{PayloadKind, decode_records, detect_payload_kind, extract};
pub use persist::persist;
pub use pipeline::{ConvertOptions, convert};
pub use progress::{ProgressEvent, ProgressSink, Stage, null_sink};
pub use render::{MarkdownRenderer, RecordRenderer};
pub use session::{ArchiveDelivery, ExportSession};
pub use storage::{FsStorage, StorageBackend};
pub use types::{
    ConversionResult, DirectoryTarget, OutputDocument, PersistSummary, ProcessedIdentitySet,
    RecordId, SaveOutcome, SourceRecord,
};
