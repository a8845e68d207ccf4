//! Tick callback that pushes tick summaries to `WebSocket` clients.

use std::sync::Arc;

use memestock_core::runner::TickCallback;
use memestock_core::store::TickReport;
use memestock_observer::state::{AppState, TickBroadcast};
use tracing::debug;

/// Callback that bridges the tick loop to the stocks API.
pub struct ObserverCallback {
    state: Arc<AppState>,
}

impl ObserverCallback {
    /// Create a new observer callback backed by the given app state.
    pub const fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

impl TickCallback for ObserverCallback {
    fn on_tick(&mut self, report: &TickReport) {
        let broadcast = TickBroadcast::from(report);
        let receivers = self.state.broadcast(&broadcast);
        debug!(tick = broadcast.tick, receivers, "Tick broadcast sent");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use memestock_core::meme::{MarketFile, Meme};
    use memestock_core::store::{CommitOutcome, NullPersister, SnapshotStore};
    use memestock_core::TickSummary;

    use super::*;

    #[tokio::test]
    async fn on_tick_broadcasts_report() {
        let store = Arc::new(SnapshotStore::new(
            MarketFile::new(vec![Meme::new("DOGE", 1.0)]),
            Box::new(NullPersister),
        ));
        let state = Arc::new(AppState::new(store));
        let mut rx = state.subscribe();
        let mut callback = ObserverCallback::new(Arc::clone(&state));

        callback.on_tick(&TickReport {
            summary: TickSummary {
                tick: 3,
                memes: 1,
                ..TickSummary::default()
            },
            commit: CommitOutcome::Failed,
        });

        let received = rx.recv().await.unwrap();
        assert_eq!(received.tick, 3);
        assert_eq!(received.commit, CommitOutcome::Failed);
    }
}
