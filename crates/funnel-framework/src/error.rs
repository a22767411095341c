//! Error types for the Funnel framework.

use thiserror::Error;

/// Returned by a [`FailureRenderer`](crate::reporter::FailureRenderer) that
/// cannot turn a failure into a response.
///
/// The reporter treats this as a `ReporterFault` and falls back to a fixed
/// response.
#[derive(Debug, Clone, Error)]
#[error("failed to render failure response: {0}")]
pub struct RenderError(pub String);

impl RenderError {
    /// Creates a render error.
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}
