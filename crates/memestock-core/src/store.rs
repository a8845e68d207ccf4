//! Snapshot store: the authoritative in-memory market and its mirror on disk.
//!
//! The store owns the meme collection behind a single
//! [`tokio::sync::RwLock`]. A tick takes the write lock, advances every
//! meme, and commits while still holding it, so a reader always sees
//! either the complete pre-tick or the complete post-tick collection.
//!
//! Persistence goes through the [`Persister`] trait. Writes run on the
//! blocking thread pool while the async side keeps the lock, so tick
//! order is preserved without stalling a runtime worker. A failed commit is
//! logged and reported in the [`TickReport`] but never rolls back or
//! otherwise touches the in-memory state; the next commit simply writes
//! the newer collection.

use std::fmt;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::engine::{TickSummary, TrendEngine};
use crate::meme::{MarketFile, Meme, Trend};
use crate::random::RandomSource;

/// Errors from loading or persisting the market file.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The market file could not be read.
    #[error("failed to read market file {}: {source}", .path.display())]
    Read {
        /// Path that was read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The market file could not be written.
    #[error("failed to write market file {}: {source}", .path.display())]
    Write {
        /// Path that was written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The market file is not a valid market document.
    #[error("failed to parse market file {}: {source}", .path.display())]
    Parse {
        /// Path that was parsed.
        path: PathBuf,
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// The market could not be serialized.
    #[error("failed to serialize market: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A meme has neither `name` nor `id`.
    #[error("meme #{index} has neither name nor id")]
    MissingIdentifier {
        /// Position of the meme in the file.
        index: usize,
    },

    /// A meme was loaded with a zero, negative, or non-finite price.
    #[error("meme #{index} ({name}) has invalid price {price}")]
    InvalidPrice {
        /// Position of the meme in the file.
        index: usize,
        /// Name of the meme.
        name: String,
        /// The rejected price.
        price: f64,
    },
}

/// Read and validate a market file.
///
/// Trend fields missing from a meme are filled with the `Random`
/// defaults. Any failure here is fatal to startup: no partial or
/// synthesized market is returned.
///
/// # Errors
///
/// Returns [`StoreError::Read`] if the file cannot be read,
/// [`StoreError::Parse`] if it is not a market document (including a
/// meme without `price`), [`StoreError::MissingIdentifier`] if a meme has
/// no `name` or `id`, or [`StoreError::InvalidPrice`] if a price is not a
/// positive finite number.
pub fn load_market(path: &Path) -> Result<MarketFile, StoreError> {
    let raw = std::fs::read_to_string(path).map_err(|source| StoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let file: MarketFile = serde_json::from_str(&raw).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    for (index, meme) in file.memes.iter().enumerate() {
        if meme.name.is_none() && meme.id.is_none() {
            return Err(StoreError::MissingIdentifier { index });
        }
        if !meme.price.is_finite() || meme.price <= 0.0 {
            return Err(StoreError::InvalidPrice {
                index,
                name: meme.key().to_owned(),
                price: meme.price,
            });
        }
    }

    Ok(file)
}

/// A strategy for mirroring the market to durable storage.
///
/// `persist` may block; the store calls it on the blocking thread pool.
pub trait Persister: Send + Sync {
    /// Write the full market, replacing whatever was stored before.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the market cannot be serialized or
    /// written.
    fn persist(&self, market: &MarketFile) -> Result<(), StoreError>;
}

/// Writes the market as pretty-printed JSON.
///
/// The document is written to a sibling `.tmp` file and renamed over
/// the target, so the file on disk is always a complete document. A
/// failed write removes the temp file. Writes through one persister are
/// serialized.
#[derive(Debug)]
pub struct JsonFilePersister {
    path: PathBuf,
    write_gate: Mutex<()>,
}

impl JsonFilePersister {
    /// Persist to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_gate: Mutex::new(()),
        }
    }

    /// The target path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl Persister for JsonFilePersister {
    fn persist(&self, market: &MarketFile) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(market)?;
        let tmp = self.temp_path();

        let write = |target: &Path| -> std::io::Result<()> {
            let mut file = std::fs::File::create(target)?;
            file.write_all(&bytes)?;
            file.sync_all()
        };

        let _gate = self.write_gate.lock().unwrap_or_else(PoisonError::into_inner);
        let result = write(&tmp).and_then(|()| std::fs::rename(&tmp, &self.path));
        if result.is_err() {
            match std::fs::remove_file(&tmp) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %tmp.display(), error = %e, "Could not remove temp file"),
            }
        }
        result.map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

/// Discards every commit. For in-memory runs and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPersister;

impl Persister for NullPersister {
    fn persist(&self, _market: &MarketFile) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Result of the commit step of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitOutcome {
    /// No commit was requested for this tick.
    Skipped,
    /// The market was written.
    Persisted,
    /// The write failed; memory state is unchanged and ticking continues.
    Failed,
}

/// What one call to [`SnapshotStore::advance`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Per-tick aggregate from the engine.
    pub summary: TickSummary,
    /// Whether and how the tick was persisted.
    pub commit: CommitOutcome,
}

/// Point-in-time counters describing the market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStatus {
    /// Ticks applied since startup.
    pub tick: u64,
    /// Wall-clock time of the last tick, if any.
    pub last_tick_at: Option<DateTime<Utc>>,
    /// Number of memes.
    pub memes: usize,
    /// Memes in the `Random` regime.
    pub random: usize,
    /// Memes locked `Up`.
    pub up: usize,
    /// Memes locked `Down`.
    pub down: usize,
}

#[derive(Debug)]
struct MarketState {
    market: MarketFile,
    tick: u64,
    last_tick_at: Option<DateTime<Utc>>,
}

/// The in-memory market shared by the tick loop and the HTTP layer.
pub struct SnapshotStore {
    state: RwLock<MarketState>,
    persister: Arc<dyn Persister>,
}

impl fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotStore").finish_non_exhaustive()
    }
}

impl SnapshotStore {
    /// Create a store over an already-loaded market.
    pub fn new(market: MarketFile, persister: Box<dyn Persister>) -> Self {
        Self {
            state: RwLock::new(MarketState {
                market,
                tick: 0,
                last_tick_at: None,
            }),
            persister: Arc::from(persister),
        }
    }

    /// Load the market at `path` and persist back to the same file.
    ///
    /// # Errors
    ///
    /// Returns any [`load_market`] error.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let market = load_market(path)?;
        info!(path = %path.display(), memes = market.memes.len(), "Market loaded");
        Ok(Self::new(market, Box::new(JsonFilePersister::new(path))))
    }

    /// The full ordered collection as of this call.
    pub async fn current_snapshot(&self) -> Vec<Meme> {
        self.state.read().await.market.memes.clone()
    }

    /// The tick counter and the memes it describes, read under one guard.
    pub async fn tick_snapshot(&self) -> (u64, Vec<Meme>) {
        let state = self.state.read().await;
        (state.tick, state.market.memes.clone())
    }

    /// Look up a single meme by `name` or `id`.
    pub async fn meme(&self, key: &str) -> Option<Meme> {
        self.state
            .read()
            .await
            .market
            .memes
            .iter()
            .find(|m| m.is_keyed(key))
            .cloned()
    }

    /// Tick counter and regime counts.
    pub async fn status(&self) -> StoreStatus {
        let state = self.state.read().await;
        let mut status = StoreStatus {
            tick: state.tick,
            last_tick_at: state.last_tick_at,
            memes: state.market.memes.len(),
            random: 0,
            up: 0,
            down: 0,
        };
        for meme in &state.market.memes {
            let slot = match meme.trend {
                Trend::Random => &mut status.random,
                Trend::Up => &mut status.up,
                Trend::Down => &mut status.down,
            };
            *slot = slot.saturating_add(1);
        }
        status
    }

    /// Apply one tick and optionally commit it, atomically for readers.
    pub async fn advance<R: RandomSource>(
        &self,
        engine: &mut TrendEngine<R>,
        commit: bool,
    ) -> TickReport {
        let mut state = self.state.write().await;

        let tick = state.tick.saturating_add(1);
        let summary = engine.tick(tick, &mut state.market.memes);
        state.tick = tick;
        state.last_tick_at = Some(Utc::now());

        let commit = if commit {
            self.persist(&state.market).await
        } else {
            CommitOutcome::Skipped
        };

        debug!(
            tick,
            up = summary.up,
            down = summary.down,
            locked = summary.locked,
            expired = summary.expired,
            ?commit,
            "Tick applied"
        );

        TickReport { summary, commit }
    }

    /// Persist the current market outside of a tick.
    pub async fn commit(&self) -> CommitOutcome {
        let state = self.state.read().await;
        self.persist(&state.market).await
    }

    async fn persist(&self, market: &MarketFile) -> CommitOutcome {
        let persister = Arc::clone(&self.persister);
        let market = market.clone();
        match tokio::task::spawn_blocking(move || persister.persist(&market)).await {
            Ok(Ok(())) => CommitOutcome::Persisted,
            Ok(Err(e)) => {
                warn!(error = %e, "Market commit failed, keeping in-memory state");
                CommitOutcome::Failed
            }
            Err(e) => {
                warn!(error = %e, "Market commit task did not finish");
                CommitOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    use super::*;
    use crate::random::ScriptedSource;

    fn write_file(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("db.json");
        std::fs::write(&path, body).unwrap();
        path
    }

    struct FailingPersister {
        attempts: Arc<AtomicUsize>,
    }

    impl Persister for FailingPersister {
        fn persist(&self, _market: &MarketFile) -> Result<(), StoreError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Write {
                path: PathBuf::from("/unwritable/db.json"),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            })
        }
    }

    #[test]
    fn load_applies_trend_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, r#"{"memes":[{"name":"DOGE","price":12.5}]}"#);

        let market = load_market(&path).unwrap();

        let meme = &market.memes[0];
        assert_eq!(meme.trend, Trend::Random);
        assert_eq!(meme.streak, 0);
        assert_eq!(meme.trend_count, 0);
    }

    #[test]
    fn load_missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_market(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, StoreError::Read { .. }));
    }

    #[test]
    fn load_garbage_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "{ not json");
        assert!(matches!(load_market(&path), Err(StoreError::Parse { .. })));
    }

    #[test]
    fn load_meme_without_price_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, r#"{"memes":[{"name":"DOGE"}]}"#);
        assert!(matches!(load_market(&path), Err(StoreError::Parse { .. })));
    }

    #[test]
    fn load_non_positive_price_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            r#"{"memes":[{"name":"OK","price":1.0},{"name":"ZERO","price":0}]}"#,
        );
        match load_market(&path) {
            Err(StoreError::InvalidPrice { index, name, .. }) => {
                assert_eq!(index, 1);
                assert_eq!(name, "ZERO");
            }
            other => panic!("expected InvalidPrice, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn advance_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            r#"{"memes":[{"name":"DOGE","price":10.0,"image":"doge.png"}]}"#,
        );
        let store = SnapshotStore::open(&path).unwrap();
        let mut engine = TrendEngine::new(ScriptedSource::new([1.5]));

        let report = store.advance(&mut engine, true).await;

        assert_eq!(report.commit, CommitOutcome::Persisted);
        assert_eq!(report.summary.tick, 1);

        let reloaded = load_market(&path).unwrap();
        assert_eq!(reloaded.memes, store.current_snapshot().await);
        assert_eq!(reloaded.memes[0].streak, 1);
        assert_eq!(reloaded.memes[0].extra["image"], "doge.png");
        assert!(!dir.path().join("db.json.tmp").exists());
    }

    #[tokio::test]
    async fn skipped_commit_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let body = r#"{"memes":[{"name":"DOGE","price":10.0}]}"#;
        let path = write_file(&dir, body);
        let store = SnapshotStore::open(&path).unwrap();
        let mut engine = TrendEngine::new(ScriptedSource::new([1.5]));

        let report = store.advance(&mut engine, false).await;

        assert_eq!(report.commit, CommitOutcome::Skipped);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), body);
    }

    #[tokio::test]
    async fn failed_commit_keeps_memory_state_and_ticking() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let store = SnapshotStore::new(
            MarketFile::new(vec![Meme::new("DOGE", 10.0)]),
            Box::new(FailingPersister {
                attempts: Arc::clone(&attempts),
            }),
        );
        let mut engine = TrendEngine::new(ScriptedSource::new([1.5, 1.5]));

        let first = store.advance(&mut engine, true).await;
        let second = store.advance(&mut engine, true).await;

        assert_eq!(first.commit, CommitOutcome::Failed);
        assert_eq!(second.commit, CommitOutcome::Failed);
        assert_eq!(second.summary.tick, 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);

        let snapshot = store.current_snapshot().await;
        assert_eq!(snapshot[0].streak, 2);
        assert!(snapshot[0].price > 10.0);
    }

    #[tokio::test]
    async fn status_counts_regimes() {
        let store = SnapshotStore::new(
            MarketFile::new(vec![
                Meme::new("A", 1.0),
                Meme::new("B", 1.0).with_trend(Trend::Up, 0, 3),
                Meme::new("C", 1.0).with_trend(Trend::Down, 0, 3),
                Meme::new("D", 1.0).with_trend(Trend::Down, 0, 3),
            ]),
            Box::new(NullPersister),
        );

        let status = store.status().await;

        assert_eq!(status.tick, 0);
        assert!(status.last_tick_at.is_none());
        assert_eq!((status.memes, status.random, status.up, status.down), (4, 1, 1, 2));
    }

    #[tokio::test]
    async fn meme_lookup_by_name() {
        let store = SnapshotStore::new(
            MarketFile::new(vec![Meme::new("DOGE", 1.0), Meme::new("PEPE", 2.0)]),
            Box::new(NullPersister),
        );

        assert_eq!(store.meme("PEPE").await.map(|m| m.price), Some(2.0));
        assert!(store.meme("SHIB").await.is_none());
    }

    #[tokio::test]
    async fn explicit_commit_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let store = SnapshotStore::new(
            MarketFile::new(vec![Meme::new("DOGE", 3.0)]),
            Box::new(JsonFilePersister::new(&path)),
        );

        assert_eq!(store.commit().await, CommitOutcome::Persisted);
        assert_eq!(load_market(&path).unwrap().memes[0].key(), "DOGE");
    }

    #[test]
    fn load_accepts_id_name_or_both() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            r#"{"memes":[{"id":"doge","name":"DOGE","price":12.5},{"id":"pepe","price":1.0},{"name":"WOJAK","price":2.0}]}"#,
        );

        let market = load_market(&path).unwrap();

        let keys: Vec<&str> = market.memes.iter().map(Meme::key).collect();
        assert_eq!(keys, ["DOGE", "pepe", "WOJAK"]);
    }

    #[test]
    fn load_meme_without_identifier_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, r#"{"memes":[{"name":"OK","price":1.0},{"price":2.0}]}"#);
        assert!(matches!(
            load_market(&path),
            Err(StoreError::MissingIdentifier { index: 1 })
        ));
    }

    #[tokio::test]
    async fn commit_keeps_identifier_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            r#"{"memes":[{"id":"doge","price":12.5},{"id":"pepe","name":"PEPE","price":1.0}]}"#,
        );
        let store = SnapshotStore::open(&path).unwrap();

        assert_eq!(store.commit().await, CommitOutcome::Persisted);

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["memes"][0]["id"], "doge");
        assert!(written["memes"][0].get("name").is_none());
        assert_eq!(written["memes"][1]["id"], "pepe");
        assert_eq!(written["memes"][1]["name"], "PEPE");
    }

    #[tokio::test]
    async fn meme_lookup_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, r#"{"memes":[{"id":"doge","name":"DOGE","price":12.5}]}"#);
        let store = SnapshotStore::open(&path).unwrap();

        assert!(store.meme("doge").await.is_some());
        assert!(store.meme("DOGE").await.is_some());
    }

    #[tokio::test]
    async fn tick_snapshot_pairs_counter_with_memes() {
        let store = SnapshotStore::new(
            MarketFile::new(vec![Meme::new("DOGE", 10.0)]),
            Box::new(NullPersister),
        );
        let mut engine = TrendEngine::new(ScriptedSource::new([1.5]));

        let (tick, before) = store.tick_snapshot().await;
        assert_eq!(tick, 0);
        assert_eq!(before[0].streak, 0);

        store.advance(&mut engine, false).await;

        let (tick, after) = store.tick_snapshot().await;
        assert_eq!(tick, 1);
        assert_eq!(after, store.current_snapshot().await);
        assert_eq!(after[0].streak, 1);
    }

    #[test]
    fn failed_write_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A directory at the target path makes the rename fail.
        let path = dir.path().join("db.json");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), "x").unwrap();
        let persister = JsonFilePersister::new(&path);

        let result = persister.persist(&MarketFile::new(vec![Meme::new("DOGE", 1.0)]));

        assert!(matches!(result, Err(StoreError::Write { .. })));
        assert!(!dir.path().join("db.json.tmp").exists());
    }

    /// Blocks inside `persist` until the test releases it.
    struct GatedPersister {
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl Persister for GatedPersister {
        fn persist(&self, _market: &MarketFile) -> Result<(), StoreError> {
            self.release
                .lock()
                .unwrap()
                .recv_timeout(Duration::from_secs(5))
                .map_err(|e| StoreError::Write {
                    path: PathBuf::from("gated"),
                    source: std::io::Error::other(e),
                })
        }
    }

    #[tokio::test]
    async fn persist_runs_off_the_runtime_thread() {
        // Single-threaded runtime: the releasing task can only run if the
        // write does not occupy the runtime thread.
        let (tx, rx) = mpsc::channel();
        let store = SnapshotStore::new(
            MarketFile::new(vec![Meme::new("DOGE", 10.0)]),
            Box::new(GatedPersister {
                release: Mutex::new(rx),
            }),
        );
        let releaser = tokio::spawn(async move {
            tx.send(()).unwrap();
        });
        let mut engine = TrendEngine::new(ScriptedSource::new([0.5]));

        let report = store.advance(&mut engine, true).await;

        assert_eq!(report.commit, CommitOutcome::Persisted);
        releaser.await.unwrap();
    }
}
