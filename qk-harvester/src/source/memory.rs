//! In-memory message source
//!
//! Clones share one channel, so a caller can keep a handle and post messages
//! (or simulate outages) while a reconciliation loop owns another clone.

use super::{MessageSource, MessageStream, SourceError};
use crate::models::SourceMessage;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Entry {
    Message(SourceMessage),
    Malformed { at: DateTime<Utc>, reason: String },
}

impl Entry {
    fn at(&self) -> DateTime<Utc> {
        match self {
            Entry::Message(m) => m.occurred_at,
            Entry::Malformed { at, .. } => *at,
        }
    }
}

#[derive(Debug)]
struct Channel {
    name: String,
    entries: Vec<Entry>,
    resolvable: bool,
    available: bool,
    /// Deliver this many items, then fail the fetch
    fail_after: Option<usize>,
    /// Pause before yielding each item
    delivery_delay: Option<Duration>,
    fetches: usize,
}

/// Shared in-memory channel
#[derive(Debug, Clone)]
pub struct MemorySource {
    channel: Arc<Mutex<Channel>>,
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl MemorySource {
    pub fn new(name: &str) -> Self {
        Self {
            channel: Arc::new(Mutex::new(Channel {
                name: name.to_string(),
                entries: Vec::new(),
                resolvable: true,
                available: true,
                fail_after: None,
                delivery_delay: None,
                fetches: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Channel> {
        self.channel.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Post a message to the channel
    pub fn push(&self, message: SourceMessage) {
        self.lock().entries.push(Entry::Message(message));
    }

    /// Post an item the source cannot decode
    pub fn push_malformed(&self, at: DateTime<Utc>, reason: &str) {
        self.lock().entries.push(Entry::Malformed {
            at,
            reason: reason.to_string(),
        });
    }

    /// Whether `resolve()` finds the channel
    pub fn set_resolvable(&self, resolvable: bool) {
        self.lock().resolvable = resolvable;
    }

    /// Whether fetches succeed at all
    pub fn set_available(&self, available: bool) {
        self.lock().available = available;
    }

    /// Fail every fetch after delivering `count` items (`None` to clear)
    pub fn fail_after(&self, count: Option<usize>) {
        self.lock().fail_after = count;
    }

    /// Slow every fetch down by `delay` per item (`None` to clear)
    pub fn set_delivery_delay(&self, delay: Option<Duration>) {
        self.lock().delivery_delay = delay;
    }

    /// Number of `fetch_history` calls so far
    pub fn fetch_count(&self) -> usize {
        self.lock().fetches
    }
}

impl MessageSource for MemorySource {
    fn describe(&self) -> String {
        format!("in-memory channel '{}'", self.lock().name)
    }

    async fn resolve(&self) -> Result<(), SourceError> {
        let channel = self.lock();
        if channel.resolvable {
            Ok(())
        } else {
            Err(SourceError::ChannelNotFound(channel.name.clone()))
        }
    }

    fn fetch_history(&self, after: Option<DateTime<Utc>>) -> MessageStream<'_> {
        let mut channel = self.lock();
        channel.fetches += 1;

        if !channel.available {
            let err = SourceError::Unavailable(format!("{} is offline", channel.name));
            return stream::iter(vec![Err(err)]).boxed();
        }

        let mut entries: Vec<Entry> = channel
            .entries
            .iter()
            .filter(|e| after.map_or(true, |after| e.at() > after))
            .cloned()
            .collect();
        entries.sort_by_key(Entry::at);

        let mut items: Vec<Result<SourceMessage, SourceError>> = entries
            .into_iter()
            .map(|entry| match entry {
                Entry::Message(m) => Ok(m),
                Entry::Malformed { reason, .. } => Err(SourceError::Malformed(reason)),
            })
            .collect();

        if let Some(count) = channel.fail_after {
            items.truncate(count);
            items.push(Err(SourceError::Unavailable(format!(
                "{} dropped the connection",
                channel.name
            ))));
        }

        match channel.delivery_delay {
            Some(delay) => stream::iter(items)
                .then(move |item| async move {
                    tokio::time::sleep(delay).await;
                    item
                })
                .boxed(),
            None => stream::iter(items).boxed(),
        }
    }
}
