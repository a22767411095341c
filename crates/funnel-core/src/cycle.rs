//! Per-request dispatch cycle.
//!
//! A [`DispatchCycle`] is created when a request arrives and ends when exactly
//! one [`Response`] has been written to it. The response slot is write-once
//! and guarded by a per-cycle mutex, so a late success racing a timeout (or a
//! handler responding twice) can never produce a second outward write: the
//! first writer wins and every later write is rejected.
//!
//! ```text
//! PENDING ──┬──▶ HANDLING_SYNC  ──┬──▶ RESPONDED
//!           │                     │
//!           └──▶ HANDLING_ASYNC ──┴──▶ FAILED_REPORTED
//! ```
//!
//! `PENDING` may also go straight to `FAILED_REPORTED` (unmatched route).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::trace;

use crate::error::{CoreError, CoreResult};
use crate::request::Request;
use crate::response::Response;

/// Unique identifier of a dispatch cycle within the process.
pub type CycleId = u64;

static NEXT_CYCLE_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle state of a dispatch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CycleState {
    /// Created, no handler selected yet.
    Pending,
    /// A direct handler is running.
    HandlingSync,
    /// A deferred handler is suspended.
    HandlingAsync,
    /// A handler wrote the response.
    Responded,
    /// The error reporter wrote the response.
    FailedReported,
}

impl CycleState {
    /// Whether no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Responded | Self::FailedReported)
    }
}

/// Which terminal state a write moves the cycle into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Written by a handler.
    Responded,
    /// Written by the error reporter.
    FailedReported,
}

impl From<Outcome> for CycleState {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Responded => Self::Responded,
            Outcome::FailedReported => Self::FailedReported,
        }
    }
}

struct Slot {
    state: CycleState,
    sender: Option<oneshot::Sender<Response>>,
    writes: usize,
    rejected: usize,
}

/// The lifetime of one request, from receipt to its single terminal write.
pub struct DispatchCycle {
    id: CycleId,
    request: Arc<Request>,
    started: Instant,
    slot: Mutex<Slot>,
}

/// Receiving half of a cycle: resolves with the cycle's one response.
pub struct CycleCompletion {
    receiver: oneshot::Receiver<Response>,
}

impl CycleCompletion {
    /// Waits for the terminal write.
    ///
    /// Returns `None` if every handle to the cycle was dropped without a
    /// write, which only happens when a task is torn down mid-flight.
    pub async fn wait(self) -> Option<Response> {
        self.receiver.await.ok()
    }
}

impl DispatchCycle {
    /// Opens a new cycle for `request`.
    pub fn new(request: Request) -> (Arc<Self>, CycleCompletion) {
        let (sender, receiver) = oneshot::channel();
        let cycle = Arc::new(Self {
            id: NEXT_CYCLE_ID.fetch_add(1, Ordering::Relaxed),
            request: Arc::new(request),
            started: Instant::now(),
            slot: Mutex::new(Slot {
                state: CycleState::Pending,
                sender: Some(sender),
                writes: 0,
                rejected: 0,
            }),
        });
        (cycle, CycleCompletion { receiver })
    }

    /// The cycle identifier.
    pub fn id(&self) -> CycleId {
        self.id
    }

    /// The request this cycle serves.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// A shared handle to the request, for handlers that outlive a borrow.
    pub fn request_arc(&self) -> Arc<Request> {
        Arc::clone(&self.request)
    }

    /// Time since the cycle was opened.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Current state.
    pub fn state(&self) -> CycleState {
        self.slot.lock().state
    }

    /// Whether the cycle has reached a terminal state.
    pub fn is_complete(&self) -> bool {
        self.state().is_terminal()
    }

    /// Number of accepted writes. Never exceeds one.
    pub fn write_count(&self) -> usize {
        self.slot.lock().writes
    }

    /// Number of writes discarded because the cycle was already complete.
    pub fn rejected_writes(&self) -> usize {
        self.slot.lock().rejected
    }

    /// Moves a pending cycle into a handling state.
    pub fn begin(&self, handling: CycleState) -> CoreResult<()> {
        let mut slot = self.slot.lock();
        let allowed = slot.state == CycleState::Pending
            && matches!(handling, CycleState::HandlingSync | CycleState::HandlingAsync);
        if !allowed {
            return Err(CoreError::InvalidTransition {
                cycle_id: self.id,
                from: slot.state,
                to: handling,
            });
        }
        slot.state = handling;
        trace!(cycle_id = self.id, state = ?handling, "Cycle state changed");
        Ok(())
    }

    /// Writes the cycle's response. Only the first write is accepted.
    pub fn write(&self, response: Response, outcome: Outcome) -> CoreResult<()> {
        let mut slot = self.slot.lock();
        if slot.state.is_terminal() {
            slot.rejected += 1;
            return Err(CoreError::AlreadyCompleted {
                cycle_id: self.id,
                state: slot.state,
            });
        }

        slot.state = outcome.into();
        slot.writes += 1;
        if let Some(sender) = slot.sender.take() {
            // The receiver is gone if the caller stopped waiting; the write
            // still counts as the cycle's terminal write.
            let _ = sender.send(response);
        }
        trace!(cycle_id = self.id, state = ?slot.state, "Cycle completed");
        Ok(())
    }
}

impl std::fmt::Debug for DispatchCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchCycle")
            .field("id", &self.id)
            .field("method", self.request.method())
            .field("path", &self.request.path())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[tokio::test]
    async fn test_first_write_wins() {
        let (cycle, completion) = DispatchCycle::new(Request::get("/"));

        cycle
            .write(Response::text(StatusCode::OK, "first"), Outcome::Responded)
            .unwrap();
        let second = cycle.write(
            Response::text(StatusCode::INTERNAL_SERVER_ERROR, "second"),
            Outcome::FailedReported,
        );

        assert!(matches!(second, Err(CoreError::AlreadyCompleted { .. })));
        assert_eq!(cycle.state(), CycleState::Responded);
        assert_eq!(cycle.write_count(), 1);
        assert_eq!(cycle.rejected_writes(), 1);

        let response = completion.wait().await.unwrap();
        assert_eq!(response, Response::text(StatusCode::OK, "first"));
    }

    #[test]
    fn test_begin_transitions() {
        let (cycle, _completion) = DispatchCycle::new(Request::get("/"));
        assert_eq!(cycle.state(), CycleState::Pending);

        cycle.begin(CycleState::HandlingAsync).unwrap();
        assert_eq!(cycle.state(), CycleState::HandlingAsync);

        let again = cycle.begin(CycleState::HandlingSync);
        assert!(matches!(again, Err(CoreError::InvalidTransition { .. })));
    }

    #[test]
    fn test_cannot_begin_terminal_state() {
        let (cycle, _completion) = DispatchCycle::new(Request::get("/"));
        assert!(cycle.begin(CycleState::Responded).is_err());
        assert_eq!(cycle.state(), CycleState::Pending);
    }

    #[test]
    fn test_pending_can_fail_directly() {
        let (cycle, _completion) = DispatchCycle::new(Request::get("/missing"));
        cycle
            .write(Response::empty(StatusCode::NOT_FOUND), Outcome::FailedReported)
            .unwrap();
        assert_eq!(cycle.state(), CycleState::FailedReported);
        assert!(cycle.is_complete());
    }

    #[test]
    fn test_write_after_receiver_dropped_still_completes() {
        let (cycle, completion) = DispatchCycle::new(Request::get("/"));
        drop(completion);
        assert!(
            cycle
                .write(Response::empty(StatusCode::OK), Outcome::Responded)
                .is_ok()
        );
        assert_eq!(cycle.write_count(), 1);
    }

    #[tokio::test]
    async fn test_abandoned_cycle_resolves_none() {
        let (cycle, completion) = DispatchCycle::new(Request::get("/"));
        drop(cycle);
        assert!(completion.wait().await.is_none());
    }

    #[test]
    fn test_ids_are_unique() {
        let (a, _) = DispatchCycle::new(Request::get("/"));
        let (b, _) = DispatchCycle::new(Request::get("/"));
        assert_ne!(a.id(), b.id());
    }
}
