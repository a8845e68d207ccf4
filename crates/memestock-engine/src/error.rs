//! Error types for the market engine binary.
//!
//! [`EngineError`] wraps every startup failure so `main` can propagate
//! with `?` and exit non-zero.

/// Top-level error for the market engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: memestock_core::config::ConfigError,
    },

    /// The market file could not be loaded.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: memestock_core::store::StoreError,
    },

    /// The stocks API failed to start.
    #[error("observer error: {source}")]
    Observer {
        /// The underlying server error.
        #[from]
        source: memestock_observer::ServerError,
    },
}
