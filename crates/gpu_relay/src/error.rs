//! # Relay Error Types
//!
//! Everything that can go wrong while bringing the engine up or reading its
//! configuration. Submitting work never fails: see [`crate::Dispatch`].

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by engine construction and configuration.
#[derive(Error, Debug)]
pub enum RelayError {
    /// The OS refused to create the worker thread.
    #[error("failed to spawn GPU worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The rendering context could not be made current on the worker.
    #[error("rendering context unavailable: {0}")]
    ContextUnavailable(String),

    /// The worker exited before reporting its startup result.
    #[error("GPU worker thread died during startup")]
    WorkerDied,

    /// Configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigIo {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration text is not valid.
    #[error("invalid configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// A raw command list could not be decoded.
    #[error(transparent)]
    CommandList(#[from] gpu_relay_shared::CommandListError),
}

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;
