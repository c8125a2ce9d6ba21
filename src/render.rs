//! Record rendering: one source record in, one output document out
//!
//! The pipeline treats the renderer as an opaque pure function behind the
//! [`RecordRenderer`] trait. [`MarkdownRenderer`] is the built-in
//! implementation producing portable Markdown transcripts; hosts with their
//! own document format plug in their own renderer.

use crate::error::RenderError;
use crate::types::{OutputDocument, SourceRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Maximum length of the sanitized title portion of a filename
const MAX_TITLE_CHARS: usize = 80;

/// Length of the identity suffix appended to filenames for uniqueness
const ID_SUFFIX_CHARS: usize = 8;

/// Renders one source record into one output document
///
/// Implementations must be pure per record: no shared mutable state, safe to
/// invoke concurrently. Filenames must be unique across distinct identities
/// within a run; the built-in renderer guarantees this with an identity
/// suffix.
#[async_trait]
pub trait RecordRenderer: Send + Sync {
    /// Render a record, or fail locally without affecting the rest of the batch
    async fn render(&self, record: &SourceRecord)
    -> std::result::Result<OutputDocument, RenderError>;
}

/// Built-in renderer producing a Markdown transcript per conversation
#[derive(Clone, Copy, Debug, Default)]
pub struct MarkdownRenderer;

#[async_trait]
impl RecordRenderer for MarkdownRenderer {
    async fn render(
        &self,
        record: &SourceRecord,
    ) -> std::result::Result<OutputDocument, RenderError> {
        let value = record.value();
        let title = extract_title(value);
        let created_date = extract_created_date(value);
        let messages = extract_messages(value)?;

        let mut content = format!("# {}\n\nCreated: {}\n", title, created_date);
        for (role, text) in &messages {
            content.push_str("\n---\n\n");
            content.push_str(&format!("**{}:**\n\n{}\n", role, text));
        }

        Ok(OutputDocument {
            filename: document_filename(&title, record.identity().as_str()),
            title,
            created_date,
            content,
        })
    }
}

/// Conversation title, falling back for records without one
fn extract_title(value: &serde_json::Value) -> String {
    value
        .get("title")
        .and_then(|t| t.as_str())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or("Untitled conversation")
        .to_string()
}

/// Calendar date of the conversation's creation
///
/// Accepts an epoch-seconds `create_time` or an ISO-ish `created_at` /
/// `create_time` string; anything else yields "unknown".
fn extract_created_date(value: &serde_json::Value) -> String {
    for field in ["create_time", "created_at"] {
        let Some(raw) = value.get(field) else { continue };
        if let Some(epoch) = raw.as_f64()
            && let Some(dt) = DateTime::<Utc>::from_timestamp(epoch as i64, 0)
        {
            return dt.format("%Y-%m-%d").to_string();
        }
        if let Some(s) = raw.as_str()
            && s.len() >= 10
        {
            return s[..10].to_string();
        }
    }
    "unknown".to_string()
}

/// Collect (role, text) pairs from either a `messages` array or a ChatGPT-style
/// `mapping` object, in conversation order.
fn extract_messages(
    value: &serde_json::Value,
) -> std::result::Result<Vec<(String, String)>, RenderError> {
    if let Some(messages) = value.get("messages").and_then(|m| m.as_array()) {
        return Ok(messages.iter().filter_map(message_parts).collect());
    }

    if let Some(mapping) = value.get("mapping").and_then(|m| m.as_object()) {
        // Mapping nodes carry their own ordering via create_time
        let mut timed: Vec<(f64, (String, String))> = mapping
            .values()
            .filter_map(|node| {
                let message = node.get("message")?;
                let time = message.get("create_time").and_then(|t| t.as_f64())?;
                Some((time, message_parts(message)?))
            })
            .collect();
        timed.sort_by(|a, b| a.0.total_cmp(&b.0));
        return Ok(timed.into_iter().map(|(_, pair)| pair).collect());
    }

    Err(RenderError::Malformed(
        "record has neither a 'messages' array nor a 'mapping' object".to_string(),
    ))
}

/// Extract the (role, text) of one message node; None for empty messages
fn message_parts(message: &serde_json::Value) -> Option<(String, String)> {
    let role = message
        .get("role")
        .and_then(|r| r.as_str())
        .or_else(|| {
            message
                .get("author")
                .and_then(|a| a.get("role"))
                .and_then(|r| r.as_str())
        })
        .unwrap_or("unknown");

    let text = message
        .get("content")
        .and_then(|c| {
            c.as_str().map(str::to_string).or_else(|| {
                c.get("parts").and_then(|p| p.as_array()).map(|parts| {
                    parts
                        .iter()
                        .filter_map(|part| part.as_str())
                        .collect::<Vec<_>>()
                        .join("\n")
                })
            })
        })
        .or_else(|| {
            message
                .get("text")
                .and_then(|t| t.as_str())
                .map(str::to_string)
        })?;

    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some((capitalize(role), text.to_string()))
}

fn capitalize(role: &str) -> String {
    let mut chars = role.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Deterministic filename: sanitized title plus a short identity suffix.
///
/// The suffix keeps filenames unique across distinct identities even when
/// titles collide.
fn document_filename(title: &str, identity: &str) -> String {
    let sanitized: String = title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .take(MAX_TITLE_CHARS)
        .collect();
    let sanitized = sanitized.trim().to_string();
    let stem = if sanitized.is_empty() {
        "conversation".to_string()
    } else {
        sanitized
    };
    let suffix: String = identity.chars().take(ID_SUFFIX_CHARS).collect();
    format!("{} [{}].md", stem, suffix)
}
