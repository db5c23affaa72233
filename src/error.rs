//! Error types for the shellcache library.

use thiserror::Error;

use crate::worker::LifecycleState;

/// Errors that can occur during cache worker operations.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request error from the default network backend.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Network fetch failed outside the default backend (custom `Network`
    /// implementations, simulated offline conditions).
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// I/O error during storage operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Cache entry (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A shell asset path did not resolve against the base URL.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// A shell asset answered with a non-success status during install.
    #[error("precache of {path} failed with status {status}")]
    Precache {
        /// Relative shell path that failed to pre-cache.
        path: String,
        /// HTTP status the asset answered with.
        status: u16,
    },

    /// A lifecycle transition or fetch was attempted in the wrong state.
    #[error("{operation} requires an {expected} worker, but it is {actual}")]
    InvalidState {
        /// The rejected operation.
        operation: &'static str,
        /// State the operation requires.
        expected: LifecycleState,
        /// State the worker was actually in.
        actual: LifecycleState,
    },
}

/// A specialized `Result` type for cache worker operations.
pub type Result<T> = std::result::Result<T, Error>;
