//! Shared application state for the stocks API.
//!
//! [`AppState`] holds the [`SnapshotStore`] the tick loop mutates and the
//! broadcast channel that fans tick summaries out to `WebSocket`
//! clients. Handlers only ever read from the store.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use memestock_core::store::{CommitOutcome, SnapshotStore, TickReport};
use tokio::sync::broadcast;

/// Capacity of the broadcast channel for tick summaries.
///
/// A subscriber that falls further behind than this skips to the newest
/// message.
const BROADCAST_CAPACITY: usize = 256;

/// JSON-serializable tick summary pushed over the `WebSocket`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TickBroadcast {
    /// The tick number.
    pub tick: u64,
    /// Number of memes advanced.
    pub memes: usize,
    /// Memes trending up after the tick.
    pub up: usize,
    /// Memes trending down after the tick.
    pub down: usize,
    /// Trends locked this tick.
    pub locked: usize,
    /// Trends expired this tick.
    pub expired: usize,
    /// Commit result for this tick.
    pub commit: CommitOutcome,
    /// When the broadcast was built.
    pub at: DateTime<Utc>,
}

impl From<&TickReport> for TickBroadcast {
    fn from(report: &TickReport) -> Self {
        let summary = &report.summary;
        Self {
            tick: summary.tick,
            memes: summary.memes,
            up: summary.up,
            down: summary.down,
            locked: summary.locked,
            expired: summary.expired,
            commit: report.commit,
            at: Utc::now(),
        }
    }
}

/// Shared state for the Axum application.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast sender for tick summary messages.
    pub tx: broadcast::Sender<TickBroadcast>,
    /// The market the tick loop advances.
    pub store: Arc<SnapshotStore>,
    /// Directory served as static files, if any.
    pub static_dir: Option<PathBuf>,
}

impl AppState {
    /// Create application state over a store, without static files.
    pub fn new(store: Arc<SnapshotStore>) -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            tx,
            store,
            static_dir: None,
        }
    }

    /// Serve files from `dir` for paths no API route matches.
    #[must_use]
    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(dir.into());
        self
    }

    /// Subscribe to the tick broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<TickBroadcast> {
        self.tx.subscribe()
    }

    /// Publish a tick summary to all connected clients.
    ///
    /// Returns the number of receivers, `0` when nobody is connected.
    pub fn broadcast(&self, summary: &TickBroadcast) -> usize {
        // send only errs when there are no receivers.
        self.tx.send(summary.clone()).unwrap_or(0)
    }
}
