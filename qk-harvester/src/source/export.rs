//! Channel export files
//!
//! Reads `<export_dir>/<channel_id>.jsonl`, one JSON object per line:
//!
//! ```json
//! {"author_name":"alex","author_display_name":"Alex","content":"Don't quit - me","occurred_at":"2024-05-01T12:00:00Z","permalink":"https://chat.example/c/42/m/1"}
//! ```
//!
//! `author_display_name` and `permalink` are optional. Messages whose author
//! name equals the configured bot name are flagged as the harvester's own.
//! The file is re-read on every fetch, so whatever appends to it (an exporter
//! or bridge process) feeds the next pass.

use super::{MessageSource, MessageStream, SourceError};
use crate::models::SourceMessage;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ExportedMessage {
    author_name: String,
    #[serde(default)]
    author_display_name: Option<String>,
    content: String,
    occurred_at: DateTime<Utc>,
    #[serde(default)]
    permalink: Option<String>,
}

/// File-backed message source for one channel
#[derive(Debug, Clone)]
pub struct ExportSource {
    channel_id: u64,
    path: PathBuf,
    bot_name: Option<String>,
}

impl ExportSource {
    pub fn new(export_dir: &Path, channel_id: u64, bot_name: Option<String>) -> Self {
        Self {
            channel_id,
            path: export_dir.join(format!("{}.jsonl", channel_id)),
            bot_name,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MessageSource for ExportSource {
    fn describe(&self) -> String {
        format!("channel {} ({})", self.channel_id, self.path.display())
    }

    async fn resolve(&self) -> Result<(), SourceError> {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) if meta.is_file() => Ok(()),
            Ok(_) => Err(SourceError::ChannelNotFound(format!(
                "{} is not a file",
                self.path.display()
            ))),
            Err(e) => Err(SourceError::ChannelNotFound(format!("{}: {}", self.path.display(), e))),
        }
    }

    fn fetch_history(&self, after: Option<DateTime<Utc>>) -> MessageStream<'_> {
        let path = self.path.clone();
        let bot_name = self.bot_name.clone();

        stream::once(async move { tokio::fs::read_to_string(&path).await })
            .flat_map(move |read| {
                let items = match read {
                    Ok(text) => parse_export(&text, after, bot_name.as_deref()),
                    Err(e) => vec![Err(SourceError::Unavailable(e.to_string()))],
                };
                stream::iter(items)
            })
            .boxed()
    }
}

/// Decode an export, keep messages newer than `after`, oldest first
///
/// Lines that fail to decode come after the decoded messages.
fn parse_export(
    text: &str,
    after: Option<DateTime<Utc>>,
    bot_name: Option<&str>,
) -> Vec<Result<SourceMessage, SourceError>> {
    let mut messages = Vec::new();
    let mut malformed = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ExportedMessage>(line) {
            Ok(exported) => {
                if after.is_some_and(|after| exported.occurred_at <= after) {
                    continue;
                }
                let author_is_self = bot_name.is_some_and(|bot| bot == exported.author_name);
                messages.push(SourceMessage {
                    author_display_name: exported
                        .author_display_name
                        .unwrap_or_else(|| exported.author_name.clone()),
                    author_name: exported.author_name,
                    author_is_self,
                    content: exported.content,
                    occurred_at: exported.occurred_at,
                    permalink: exported.permalink.unwrap_or_default(),
                });
            }
            Err(e) => {
                malformed.push(SourceError::Malformed(format!("line {}: {}", line_no + 1, e)))
            }
        }
    }

    messages.sort_by_key(|m| m.occurred_at);
    debug!(messages = messages.len(), malformed = malformed.len(), "Parsed channel export");

    messages
        .into_iter()
        .map(Ok)
        .chain(malformed.into_iter().map(Err))
        .collect()
}
