//! Cycle-scoped response handle given to handlers.
//!
//! A [`Responder`] is how a handler answers a request:
//! - [`respond`](Responder::respond) / [`json`](Responder::json) /
//!   [`text`](Responder::text) write the success response
//! - [`forward`](Responder::forward) hands a failure to the error reporter
//!   explicitly, for handlers that want to keep going after catching an error
//!
//! The underlying response slot is write-once. Writing a second time is a
//! `DoubleWriteFault`: the write is discarded, logged, and returned as an
//! error so `?` stops the handler.

use std::sync::Arc;

use funnel_core::{
    CycleId, DispatchCycle, Failure, FailureKind, Outcome, Response, StatusCode,
};
use serde_json::Value;
use tracing::error;

use crate::handler::HandlerResult;
use crate::reporter::ErrorReporter;

/// Handle for writing the response of one dispatch cycle.
///
/// `Responder` is `Clone` and can be moved into spawned tasks; every clone
/// writes to the same slot.
#[derive(Clone)]
pub struct Responder {
    cycle: Arc<DispatchCycle>,
    reporter: Arc<ErrorReporter>,
    origin: FailureKind,
}

impl Responder {
    /// Creates a responder for `cycle`.
    ///
    /// `origin` is the kind given to forwarded failures that carry none.
    pub fn new(cycle: Arc<DispatchCycle>, reporter: Arc<ErrorReporter>, origin: FailureKind) -> Self {
        Self {
            cycle,
            reporter,
            origin,
        }
    }

    /// The cycle this responder writes to.
    pub fn cycle_id(&self) -> CycleId {
        self.cycle.id()
    }

    /// Whether the cycle already has its response.
    pub fn is_complete(&self) -> bool {
        self.cycle.is_complete()
    }

    /// Writes the success response.
    pub fn respond(&self, response: Response) -> HandlerResult {
        let status = response.status();
        self.cycle
            .write(response, Outcome::Responded)
            .map_err(|err| {
                error!(
                    cycle_id = self.cycle.id(),
                    status = status.as_u16(),
                    kind = %FailureKind::DoubleWriteFault,
                    error = %err,
                    "Discarded second response write"
                );
                Failure::double_write()
            })
    }

    /// Writes a `200 OK` JSON response.
    pub fn json(&self, value: Value) -> HandlerResult {
        self.respond(Response::ok(value))
    }

    /// Writes a JSON response with the given status.
    pub fn json_with_status(&self, status: StatusCode, value: Value) -> HandlerResult {
        self.respond(Response::json(status, value))
    }

    /// Writes a plain-text response.
    pub fn text(&self, status: StatusCode, text: impl Into<String>) -> HandlerResult {
        self.respond(Response::text(status, text))
    }

    /// Sends a failure to the error reporter.
    pub fn forward(&self, failure: Failure) {
        self.reporter
            .report(failure.or_kind(self.origin), &self.cycle);
    }
}

impl std::fmt::Debug for Responder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Responder")
            .field("cycle_id", &self.cycle.id())
            .field("origin", &self.origin)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use funnel_core::{CycleState, Request};
    use serde_json::json;

    fn responder(origin: FailureKind) -> (Responder, Arc<DispatchCycle>) {
        let (cycle, _completion) = DispatchCycle::new(Request::get("/"));
        let reporter = Arc::new(ErrorReporter::json());
        (
            Responder::new(Arc::clone(&cycle), reporter, origin),
            cycle,
        )
    }

    #[test]
    fn test_respond_once() {
        let (res, cycle) = responder(FailureKind::HandlerFault);

        res.json(json!({ "ok": true })).unwrap();
        assert!(res.is_complete());
        assert_eq!(cycle.state(), CycleState::Responded);
    }

    #[test]
    fn test_second_write_is_double_write_fault() {
        let (res, cycle) = responder(FailureKind::HandlerFault);

        res.json(json!({ "n": 1 })).unwrap();
        let err = res.json(json!({ "n": 2 })).unwrap_err();

        assert_eq!(err.kind(), Some(FailureKind::DoubleWriteFault));
        assert_eq!(cycle.write_count(), 1);
        assert_eq!(cycle.rejected_writes(), 1);
    }

    #[test]
    fn test_forward_tags_origin() {
        let (cycle, _completion) = DispatchCycle::new(Request::get("/"));
        let reporter = Arc::new(ErrorReporter::json());
        let res = Responder::new(
            Arc::clone(&cycle),
            Arc::clone(&reporter),
            FailureKind::DeferredFault,
        );

        res.forward(Failure::new("Async Fn error!"));

        assert_eq!(cycle.state(), CycleState::FailedReported);
        assert_eq!(reporter.stats().delivered, 1);
        assert_eq!(
            reporter.stats().last_kind,
            Some(FailureKind::DeferredFault)
        );
    }

    #[test]
    fn test_clones_share_slot() {
        let (res, cycle) = responder(FailureKind::DeferredFault);
        let other = res.clone();

        other.text(StatusCode::ACCEPTED, "queued").unwrap();
        assert!(res.text(StatusCode::OK, "late").is_err());
        assert_eq!(cycle.write_count(), 1);
    }
}
