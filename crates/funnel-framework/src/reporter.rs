//! The terminal error-reporting stage.
//!
//! [`ErrorReporter`] is the single place that turns a [`Failure`] into an
//! outward response. Every failure path in the pipeline ends here:
//!
//! ```text
//! direct handler Err / panic ──┐
//! deferred rejection / panic ──┤
//! suspension timeout ──────────┼──▶ ErrorReporter::report ──▶ cycle slot (write-once)
//! unmatched route ─────────────┤
//! Responder::forward ──────────┘
//! ```
//!
//! Rendering is delegated to a [`FailureRenderer`]. If the renderer fails or
//! panics, the reporter logs a `reporter_fault` and writes
//! [`Response::internal_fallback`] instead of cascading.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use funnel_core::{
    DispatchCycle, Failure, FailureKind, Outcome, Response, StatusCode, panic_message,
};
use parking_lot::Mutex;
use tracing::{error, warn};

use crate::error::RenderError;

/// Message used for internal failures, whose own message is never shown.
pub const INTERNAL_MESSAGE: &str = "internal server error";

/// Turns a failure into the response body sent to the caller.
pub trait FailureRenderer: Send + Sync + 'static {
    /// Renders `failure` with the already-resolved `status`.
    fn render(&self, failure: &Failure, status: StatusCode) -> Result<Response, RenderError>;
}

/// Default renderer: `{"error": <message>}`.
///
/// Internal kinds (`DoubleWriteFault`, `MissingResponse`, `ReporterFault`)
/// are rendered with a generic message.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl FailureRenderer for JsonRenderer {
    fn render(&self, failure: &Failure, status: StatusCode) -> Result<Response, RenderError> {
        let message = if failure.is_internal() {
            INTERNAL_MESSAGE
        } else {
            failure.message()
        };
        Ok(Response::error(status, message))
    }
}

/// What happened to a reported failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// The failure response was written to the cycle.
    Delivered,
    /// The cycle already had a response; nothing was sent.
    Suppressed,
}

/// Snapshot of reporter counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReporterStats {
    /// Failures whose response was written.
    pub delivered: usize,
    /// Reports discarded because the cycle was already complete.
    pub suppressed: usize,
    /// Times the renderer failed and the fallback was used.
    pub reporter_faults: usize,
    /// Kind of the most recently delivered failure.
    pub last_kind: Option<FailureKind>,
}

/// The single funnel for failure responses.
pub struct ErrorReporter {
    renderer: Arc<dyn FailureRenderer>,
    delivered: AtomicUsize,
    suppressed: AtomicUsize,
    reporter_faults: AtomicUsize,
    last_kind: Mutex<Option<FailureKind>>,
}

impl ErrorReporter {
    /// Creates a reporter with a custom renderer.
    pub fn new(renderer: Arc<dyn FailureRenderer>) -> Self {
        Self {
            renderer,
            delivered: AtomicUsize::new(0),
            suppressed: AtomicUsize::new(0),
            reporter_faults: AtomicUsize::new(0),
            last_kind: Mutex::new(None),
        }
    }

    /// Creates a reporter using [`JsonRenderer`].
    pub fn json() -> Self {
        Self::new(Arc::new(JsonRenderer))
    }

    /// Current counters.
    pub fn stats(&self) -> ReporterStats {
        ReporterStats {
            delivered: self.delivered.load(Ordering::SeqCst),
            suppressed: self.suppressed.load(Ordering::SeqCst),
            reporter_faults: self.reporter_faults.load(Ordering::SeqCst),
            last_kind: *self.last_kind.lock(),
        }
    }

    /// Writes the failure response for `cycle`.
    ///
    /// At most one report per cycle is delivered; later calls (and calls on a
    /// cycle a handler already answered) are suppressed and logged.
    pub fn report(&self, failure: Failure, cycle: &DispatchCycle) -> ReportOutcome {
        if cycle.is_complete() {
            return self.suppress(&failure, cycle);
        }

        let status = failure.resolved_status();
        let response = self.render(&failure, status, cycle);

        if cycle.write(response, Outcome::FailedReported).is_err() {
            return self.suppress(&failure, cycle);
        }

        self.delivered.fetch_add(1, Ordering::SeqCst);
        *self.last_kind.lock() = failure.kind();

        let kind = failure.kind().map_or("unclassified", |k| k.as_str());
        let request = cycle.request();
        if status.is_server_error() {
            error!(
                cycle_id = cycle.id(),
                method = %request.method(),
                path = request.path(),
                status = status.as_u16(),
                kind,
                "Request failed: {}",
                failure.message()
            );
        } else {
            warn!(
                cycle_id = cycle.id(),
                method = %request.method(),
                path = request.path(),
                status = status.as_u16(),
                kind,
                "Request failed: {}",
                failure.message()
            );
        }

        ReportOutcome::Delivered
    }

    fn render(&self, failure: &Failure, status: StatusCode, cycle: &DispatchCycle) -> Response {
        let rendered = catch_unwind(AssertUnwindSafe(|| self.renderer.render(failure, status)));
        let fault = match rendered {
            Ok(Ok(response)) => return response,
            Ok(Err(err)) => err.to_string(),
            Err(payload) => panic_message(payload.as_ref()),
        };

        self.reporter_faults.fetch_add(1, Ordering::SeqCst);
        error!(
            cycle_id = cycle.id(),
            kind = %FailureKind::ReporterFault,
            original_kind = failure.kind().map_or("unclassified", |k| k.as_str()),
            error = %fault,
            "Failure renderer faulted, sending fallback response"
        );
        Response::internal_fallback()
    }

    fn suppress(&self, failure: &Failure, cycle: &DispatchCycle) -> ReportOutcome {
        self.suppressed.fetch_add(1, Ordering::SeqCst);
        warn!(
            cycle_id = cycle.id(),
            state = ?cycle.state(),
            kind = failure.kind().map_or("unclassified", |k| k.as_str()),
            "Suppressed failure report for completed cycle: {}",
            failure.message()
        );
        ReportOutcome::Suppressed
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::json()
    }
}

impl std::fmt::Debug for ErrorReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorReporter")
            .field("stats", &self.stats())
            .finish()
    }
}
