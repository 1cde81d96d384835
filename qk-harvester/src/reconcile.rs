//! Reconciliation loop
//!
//! Pulls every message newer than the watermark, folds the quotes into the
//! archive, persists the archive, then advances the watermark. Sleeps for the
//! refresh interval and repeats until cancelled.
//!
//! A pass works on a private copy of the archive. The copy replaces the shared
//! store only after it has been written to disk, and the watermark moves only
//! after that. A pass that fails anywhere before the archive write leaves the
//! shared store, the archive file and the watermark exactly as they were.

use crate::alias::AliasResolver;
use crate::error::{HarvestError, Result};
use crate::extractor;
use crate::models::{
    IgnoreReason, LoopState, MessageOutcome, PassReport, QuoteRecord, SourceMessage,
};
use crate::source::{MessageSource, SourceError};
use crate::store::{QuoteStore, RecordOutcome};
use crate::watermark::Watermark;
use crate::HarvestState;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use qk_common::config::DEFAULT_REFRESH_INTERVAL_SECS;
use qk_common::events::HarvestEvent;
use qk_common::time;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Fold one message into a working store
///
/// Never fails: problems with the message become [`MessageOutcome::Skipped`].
pub fn fold_message(
    store: &mut QuoteStore,
    aliases: &AliasResolver,
    message: &SourceMessage,
) -> MessageOutcome {
    if message.author_is_self {
        return MessageOutcome::Ignored(IgnoreReason::OwnMessage);
    }

    let Some(extraction) = extractor::extract(&message.content) else {
        return MessageOutcome::Ignored(IgnoreReason::NotAQuote);
    };

    let author = extraction.attributed_author(&message.author_display_name);
    let canonical = aliases.resolve(author);
    let record = QuoteRecord::new(
        message.content.as_str(),
        message.occurred_at,
        message.permalink.as_str(),
    );

    match store.record_quote(&canonical, record) {
        Ok(RecordOutcome::Appended { author }) => MessageOutcome::Recorded { author },
        Ok(RecordOutcome::Duplicate { author }) => MessageOutcome::Duplicate { author },
        Err(HarvestError::EmptyName) => MessageOutcome::Skipped {
            reason: HarvestError::MalformedMessage("attribution has no author name".to_string())
                .to_string(),
        },
        Err(e) => MessageOutcome::Skipped { reason: e.to_string() },
    }
}

/// Scheduled harvester for one message source
pub struct ReconciliationLoop<S> {
    source: S,
    state: HarvestState,
    archive_path: PathBuf,
    watermark: Watermark,
    /// Last durably written watermark
    watermark_at: Option<DateTime<Utc>>,
    interval: Duration,
    loop_state: watch::Sender<LoopState>,
}

impl<S: MessageSource> ReconciliationLoop<S> {
    /// Create the loop, reading the persisted watermark
    ///
    /// A watermark file that exists but cannot be parsed is fatal.
    pub fn new(
        source: S,
        state: HarvestState,
        archive_path: PathBuf,
        watermark: Watermark,
    ) -> Result<Self> {
        let watermark_at = watermark.load()?;
        match watermark_at {
            Some(ts) => info!("Watermark: {}", time::format_timestamp(&ts)),
            None => info!("No watermark, first pass reads the full history"),
        }

        let (loop_state, _) = watch::channel(LoopState::Uninitialized);
        Ok(Self {
            source,
            state,
            archive_path,
            watermark,
            watermark_at,
            interval: time::secs_to_duration(DEFAULT_REFRESH_INTERVAL_SECS),
            loop_state,
        })
    }

    /// Time to sleep between passes
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Receiver that tracks the loop state
    pub fn state(&self) -> watch::Receiver<LoopState> {
        self.loop_state.subscribe()
    }

    /// Last durably written watermark
    pub fn watermark(&self) -> Option<DateTime<Utc>> {
        self.watermark_at
    }

    fn set_state(&self, state: LoopState) {
        debug!(state = ?state, "Reconciliation loop state");
        self.loop_state.send_replace(state);
    }

    /// Check that the configured channel exists
    pub async fn resolve_source(&self) -> Result<()> {
        info!("Resolving {}", self.source.describe());
        self.source.resolve().await.map_err(|e| {
            error!("Cannot resolve {}: {}", self.source.describe(), e);
            HarvestError::from(e)
        })
    }

    /// Run until `cancel` fires
    ///
    /// Returns an error only if the source cannot be resolved at startup.
    /// Failed passes are logged and retried on the next schedule. A pass that
    /// is in flight when `cancel` fires runs to completion.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        if let Err(e) = self.resolve_source().await {
            self.set_state(LoopState::Stopped);
            return Err(e);
        }

        info!(
            "Starting reconciliation loop (interval: {}s)",
            self.interval.as_secs()
        );

        self.set_state(LoopState::CatchingUp);
        let _ = self.run_pass().await;

        while !cancel.is_cancelled() {
            self.set_state(LoopState::Idle);
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }

            self.set_state(LoopState::RunningPass);
            let _ = self.run_pass().await;
        }

        self.set_state(LoopState::Stopped);
        info!("Reconciliation loop stopped");
        Ok(())
    }

    /// Run one reconciliation pass
    ///
    /// The report and any error are logged and published on the event bus
    /// before returning.
    pub async fn run_pass(&mut self) -> Result<PassReport> {
        let started_at = time::now();
        let mut report = PassReport::new(self.watermark_at, started_at);

        info!(
            pass_id = %report.pass_id,
            after = ?report.after.map(|ts| time::format_timestamp(&ts)),
            "Reconciliation pass started"
        );
        self.state.events.emit_lossy(HarvestEvent::PassStarted {
            pass_id: report.pass_id,
            after: report.after,
            timestamp: started_at,
        });

        match self.execute(&mut report).await {
            Ok(watermark) => {
                report.finish(watermark, time::now());
                log_report(&report);
                self.state.events.emit_lossy(HarvestEvent::PassCompleted {
                    pass_id: report.pass_id,
                    examined: report.examined,
                    recorded: report.recorded,
                    duplicates: report.duplicates,
                    skipped: report.skipped.len(),
                    watermark,
                    timestamp: time::now(),
                });
                Ok(report)
            }
            Err(e) => {
                warn!(
                    pass_id = %report.pass_id,
                    examined = report.examined,
                    "Reconciliation pass aborted: {}",
                    e
                );
                self.state.events.emit_lossy(HarvestEvent::PassFailed {
                    pass_id: report.pass_id,
                    error: e.to_string(),
                    timestamp: time::now(),
                });
                Err(e)
            }
        }
    }

    async fn execute(&mut self, report: &mut PassReport) -> Result<DateTime<Utc>> {
        let mut working = self.state.store.read().await.clone();
        let mut newest: Option<DateTime<Utc>> = None;

        {
            let mut messages = self.source.fetch_history(report.after);
            while let Some(item) = messages.next().await {
                match item {
                    Ok(message) => {
                        newest = newest.max(Some(message.occurred_at));
                        let outcome = {
                            let aliases = self.state.aliases.read().await;
                            fold_message(&mut working, &aliases, &message)
                        };
                        if let MessageOutcome::Recorded { author } = &outcome {
                            debug!(author = %author, link = %message.permalink, "Quote recorded");
                        }
                        report.tally(&outcome, &message.permalink, &message.content);
                    }
                    Err(SourceError::Malformed(reason)) => {
                        let outcome = MessageOutcome::Skipped {
                            reason: HarvestError::MalformedMessage(reason).to_string(),
                        };
                        report.tally(&outcome, "", "");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        working.save(&self.archive_path)?;
        *self.state.store.write().await = working;

        let watermark = next_watermark(report.started_at, self.watermark_at, newest);
        self.watermark.store(watermark)?;
        self.watermark_at = Some(watermark);

        Ok(watermark)
    }
}

/// Watermark after a successful pass
///
/// Never moves backwards, and always covers every message the pass examined,
/// including messages stamped ahead of the local clock.
fn next_watermark(
    started_at: DateTime<Utc>,
    previous: Option<DateTime<Utc>>,
    newest_examined: Option<DateTime<Utc>>,
) -> DateTime<Utc> {
    [previous, newest_examined]
        .into_iter()
        .flatten()
        .fold(started_at, Ord::max)
}

fn log_report(report: &PassReport) {
    for skipped in &report.skipped {
        warn!(
            pass_id = %report.pass_id,
            link = %skipped.permalink,
            content = %skipped.content,
            "Skipped message: {}",
            skipped.reason
        );
    }

    info!(
        pass_id = %report.pass_id,
        examined = report.examined,
        recorded = report.recorded,
        duplicates = report.duplicates,
        ignored = report.ignored,
        skipped = report.skipped.len(),
        "Reconciliation pass complete"
    );
}
