//! Runtime error types.

use thiserror::Error;

pub use crate::config::{ConfigError, ConfigResult};
use funnel_transport::TransportError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Loading or validating the configuration failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The listener could not be started or stopped cleanly.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// `start` was called while the listener is running.
    #[error("Runtime is already serving on {0}")]
    AlreadyServing(std::net::SocketAddr),

    /// `shutdown` was called without a running listener.
    #[error("Runtime is not serving")]
    NotServing,

    /// No listener was supplied and the built-in HTTP server is disabled.
    #[error("No listener configured (enable the `http-server` feature or call `listener`)")]
    NoListener,
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
