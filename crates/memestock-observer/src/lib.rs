//! Stocks API server for the Memestock market simulation.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **REST endpoints** for the current market snapshot
//!   (`/api/stocks`, `/api/stocks/{name}`, `/api/status`)
//! - **`WebSocket` endpoint** (`/ws/ticks`) sending a market snapshot on
//!   connect, then a summary of each tick via [`tokio::sync::broadcast`]
//! - **Static files** from a configured directory for everything else
//!
//! All reads go through the [`SnapshotStore`], so a response always
//! reflects a whole tick.
//!
//! [`SnapshotStore`]: memestock_core::store::SnapshotStore

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

pub use router::build_router;
pub use server::{ServerConfig, ServerError, spawn_observer};
pub use state::{AppState, TickBroadcast};
