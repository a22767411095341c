//! The normalized failure value.
//!
//! Every way a dispatch cycle can go wrong (a handler returning an error, a
//! handler panicking, a deferred operation rejecting or timing out, an
//! unmatched route, a double write) ends up as one [`Failure`] before it
//! reaches the error reporter.

use std::any::Any;
use std::fmt;
use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

/// Classification of a failure by where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Raised synchronously inside a direct handler.
    HandlerFault,
    /// Failure outcome of a deferred handler's suspended operation.
    DeferredFault,
    /// No handler is registered for the route.
    RouteNotFound,
    /// A deferred operation exceeded its suspension bound.
    SuspensionTimeout,
    /// A response was written to a cycle twice.
    DoubleWriteFault,
    /// A handler returned successfully without writing a response.
    MissingResponse,
    /// Rendering a failure response itself failed.
    ReporterFault,
}

impl FailureKind {
    /// Stable name used in log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HandlerFault => "handler_fault",
            Self::DeferredFault => "deferred_fault",
            Self::RouteNotFound => "route_not_found",
            Self::SuspensionTimeout => "suspension_timeout",
            Self::DoubleWriteFault => "double_write_fault",
            Self::MissingResponse => "missing_response",
            Self::ReporterFault => "reporter_fault",
        }
    }

    /// Status used when the failure carries no explicit status.
    pub fn default_status(&self) -> StatusCode {
        match self {
            Self::RouteNotFound => StatusCode::NOT_FOUND,
            Self::SuspensionTimeout => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Internal kinds indicate a programming defect; their message is never
    /// shown to the caller.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::DoubleWriteFault | Self::MissingResponse | Self::ReporterFault
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure with a human-readable message and optional classification.
///
/// Handlers create failures with [`Failure::new`] and may attach an explicit
/// status with [`Failure::with_status`]. The pipeline tags the failure with a
/// [`FailureKind`] when it captures it; a kind set by the handler is kept.
///
/// # Example
///
/// ```rust
/// use funnel_core::{Failure, FailureKind, StatusCode};
///
/// let failure = Failure::new("no such user").with_status(StatusCode::NOT_FOUND);
/// assert_eq!(failure.kind(), None);
///
/// let captured = failure.or_kind(FailureKind::HandlerFault);
/// assert_eq!(captured.kind(), Some(FailureKind::HandlerFault));
/// assert_eq!(captured.status(), Some(StatusCode::NOT_FOUND));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct Failure {
    message: String,
    kind: Option<FailureKind>,
    status: Option<StatusCode>,
}

impl Failure {
    /// Creates an unclassified failure.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: None,
            status: None,
        }
    }

    /// Creates a failure from any error, using its `Display` output.
    pub fn from_error<E: std::error::Error + ?Sized>(err: &E) -> Self {
        Self::new(err.to_string())
    }

    /// Builds a failure from a caught panic payload.
    pub fn from_panic(payload: &(dyn Any + Send), kind: FailureKind) -> Self {
        Self::new(panic_message(payload)).with_kind(kind)
    }

    /// The failure synthesized for an unmatched route.
    pub fn not_found() -> Self {
        Self::new("not found").with_kind(FailureKind::RouteNotFound)
    }

    /// The failure synthesized when a deferred operation exceeds its bound.
    pub fn timeout(bound: Duration) -> Self {
        Self::new(format!(
            "deferred operation did not complete within {} ms",
            bound.as_millis()
        ))
        .with_kind(FailureKind::SuspensionTimeout)
    }

    /// The failure recorded when a handler writes to a completed cycle.
    pub fn double_write() -> Self {
        Self::new("response already written for this request")
            .with_kind(FailureKind::DoubleWriteFault)
    }

    /// The failure synthesized when a handler finishes without responding.
    pub fn missing_response() -> Self {
        Self::new("handler completed without writing a response")
            .with_kind(FailureKind::MissingResponse)
    }

    /// A failure classified as `400 Bad Request`.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(message).with_status(StatusCode::BAD_REQUEST)
    }

    /// Sets the kind, replacing any existing one.
    pub fn with_kind(mut self, kind: FailureKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Sets the kind only if none is set yet.
    pub fn or_kind(mut self, kind: FailureKind) -> Self {
        self.kind.get_or_insert(kind);
        self
    }

    /// Attaches an explicit response status.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// The human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The kind, if the failure has been classified.
    pub fn kind(&self) -> Option<FailureKind> {
        self.kind
    }

    /// The explicit status, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// The status the failure resolves to: explicit status, else the kind's
    /// default, else `500`.
    pub fn resolved_status(&self) -> StatusCode {
        self.status.unwrap_or_else(|| {
            self.kind
                .map_or(StatusCode::INTERNAL_SERVER_ERROR, |k| k.default_status())
        })
    }

    /// Whether the message must be hidden from the caller.
    pub fn is_internal(&self) -> bool {
        self.kind.is_some_and(|k| k.is_internal())
    }
}

impl From<String> for Failure {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for Failure {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<std::io::Error> for Failure {
    fn from(err: std::io::Error) -> Self {
        Self::from_error(&err)
    }
}

impl From<serde_json::Error> for Failure {
    fn from(err: serde_json::Error) -> Self {
        Self::from_error(&err)
    }
}

/// Extracts a readable message from a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unclassified_defaults_to_500() {
        let failure = Failure::new("boom");
        assert_eq!(failure.kind(), None);
        assert_eq!(failure.resolved_status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(failure.to_string(), "boom");
    }

    #[test]
    fn test_kind_default_status() {
        assert_eq!(Failure::not_found().resolved_status(), StatusCode::NOT_FOUND);
        assert_eq!(
            Failure::timeout(Duration::from_millis(50)).resolved_status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            Failure::double_write().resolved_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_explicit_status_wins_over_kind() {
        let failure = Failure::new("gone")
            .with_status(StatusCode::GONE)
            .or_kind(FailureKind::DeferredFault);
        assert_eq!(failure.resolved_status(), StatusCode::GONE);
    }

    #[test]
    fn test_or_kind_keeps_existing() {
        let failure = Failure::not_found().or_kind(FailureKind::HandlerFault);
        assert_eq!(failure.kind(), Some(FailureKind::RouteNotFound));
    }

    #[test]
    fn test_internal_kinds() {
        assert!(Failure::double_write().is_internal());
        assert!(Failure::missing_response().is_internal());
        assert!(!Failure::not_found().is_internal());
        assert!(!Failure::new("boom").is_internal());
    }

    #[test]
    fn test_timeout_message() {
        let failure = Failure::timeout(Duration::from_millis(50));
        assert_eq!(
            failure.message(),
            "deferred operation did not complete within 50 ms"
        );
    }

    #[test]
    fn test_panic_message() {
        let payload = std::panic::catch_unwind(|| panic!("kaboom")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "kaboom");

        let payload = std::panic::catch_unwind(|| panic!("code {}", 7)).unwrap_err();
        let failure = Failure::from_panic(payload.as_ref(), FailureKind::HandlerFault);
        assert_eq!(failure.message(), "code 7");
        assert_eq!(failure.kind(), Some(FailureKind::HandlerFault));
    }
}
