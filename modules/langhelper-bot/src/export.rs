//! Periodic database export to a single chat.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use langhelper_common::ChatId;

use crate::delivery::Deliver;
use crate::error::FeedError;
use crate::feed::FeedConnector;

pub const MAX_DELIVERY_TRIES: u32 = 5;

/// Where export bytes come from.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn read_snapshot(&self) -> std::io::Result<Vec<u8>>;
}

/// The live SQLite file, read whole.
pub struct DatabaseFile {
    path: PathBuf,
}

impl DatabaseFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SnapshotSource for DatabaseFile {
    async fn read_snapshot(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }
}

/// One export: the snapshot taken at its start plus how many sends were tried.
#[derive(Debug, Clone)]
pub struct ExportAttempt {
    pub name: String,
    pub snapshot: Vec<u8>,
    pub tries: u32,
}

impl ExportAttempt {
    pub fn new(snapshot: Vec<u8>, at: DateTime<Utc>) -> Self {
        Self {
            name: backup_name(at),
            snapshot,
            tries: 0,
        }
    }
}

pub fn backup_name(at: DateTime<Utc>) -> String {
    format!("sqlite_backup_{}.db", at.format("%Y-%m-%d"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportOutcome {
    Delivered { tries: u32 },
    ExhaustedRetries,
    SnapshotReadFailed,
}

pub struct Exporter {
    feed: Arc<FeedConnector>,
    snapshot: Arc<dyn SnapshotSource>,
    delivery: Arc<dyn Deliver>,
    recipient: ChatId,
    interval: Duration,
}

impl Exporter {
    pub fn new(
        feed: Arc<FeedConnector>,
        snapshot: Arc<dyn SnapshotSource>,
        delivery: Arc<dyn Deliver>,
        recipient: ChatId,
        interval: Duration,
    ) -> Self {
        Self {
            feed,
            snapshot,
            delivery,
            recipient,
            interval,
        }
    }

    /// Export once per interval after the feed is running, and once more
    /// when `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), FeedError> {
        if let Err(e) = self.feed.block_till_started(&cancel).await {
            if !matches!(e, FeedError::Cancelled) {
                error!(error = %e, "Feed never started, export task not running");
            }
            return Err(e);
        }

        info!(
            recipient = self.recipient.0,
            interval_secs = self.interval.as_secs(),
            "Export task running"
        );

        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Shutting down, sending final export");
                    self.export_once().await;
                    return Ok(());
                }
                _ = ticker.tick() => {
                    self.export_once().await;
                }
            }
        }
    }

    /// Snapshot the database and try up to [`MAX_DELIVERY_TRIES`] times to
    /// deliver it. Failures are logged and reported, never raised.
    pub async fn export_once(&self) -> ExportOutcome {
        let snapshot = match self.snapshot.read_snapshot().await {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(error = %e, "Failed to read database snapshot");
                return ExportOutcome::SnapshotReadFailed;
            }
        };

        let mut attempt = ExportAttempt::new(snapshot, Utc::now());
        while attempt.tries < MAX_DELIVERY_TRIES {
            attempt.tries += 1;
            match self
                .delivery
                .send_document(self.recipient, &attempt.name, &attempt.snapshot)
                .await
            {
                Ok(()) => {
                    info!(
                        name = attempt.name.as_str(),
                        bytes = attempt.snapshot.len(),
                        attempt = attempt.tries,
                        "Export delivered"
                    );
                    return ExportOutcome::Delivered {
                        tries: attempt.tries,
                    };
                }
                Err(e) => {
                    warn!(
                        name = attempt.name.as_str(),
                        attempt = attempt.tries,
                        error = %e,
                        "Failed to deliver export"
                    );
                }
            }
        }

        error!(
            name = attempt.name.as_str(),
            tries = attempt.tries,
            "Giving up on export"
        );
        ExportOutcome::ExhaustedRetries
    }
}
