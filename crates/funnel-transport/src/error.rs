//! Transport error types.

use std::io;

use thiserror::Error;

/// Errors raised while binding or running a listener.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The listen address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The address that was requested.
        addr: String,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// The serve loop stopped with an error.
    #[error("server error: {0}")]
    Serve(String),

    /// The serve task could not be joined.
    #[error("listener task failed: {0}")]
    Join(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
