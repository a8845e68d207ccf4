//! Trend engine, snapshot store, and tick loop for the Memestock market.
//!
//! Memestock simulates a small market of meme stocks. Once per tick every
//! meme draws a percentage price change from a regime-dependent range,
//! the whole collection is committed to a JSON file, and the HTTP layer
//! serves the latest snapshot.
//!
//! # Modules
//!
//! - [`meme`] -- [`Meme`], [`Trend`], the persisted [`MarketFile`], and
//!   cent rounding.
//! - [`random`] -- the [`RandomSource`] seam with seeded and scripted
//!   implementations.
//! - [`engine`] -- the per-meme trend state machine ([`TrendEngine`]).
//! - [`store`] -- [`SnapshotStore`], loading, and pluggable persistence.
//! - [`runner`] -- the periodic tick loop.
//! - [`config`] -- YAML + environment configuration.
//!
//! [`Meme`]: meme::Meme
//! [`Trend`]: meme::Trend
//! [`MarketFile`]: meme::MarketFile
//! [`RandomSource`]: random::RandomSource
//! [`TrendEngine`]: engine::TrendEngine
//! [`SnapshotStore`]: store::SnapshotStore

pub mod config;
pub mod engine;
pub mod meme;
pub mod random;
pub mod runner;
pub mod store;

pub use engine::{TickSummary, TrendEngine, TrendParams};
pub use meme::{MarketFile, Meme, Trend};
pub use store::{SnapshotStore, StoreError};
