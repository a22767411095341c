//! Suspension adapter for deferred handlers.
//!
//! A failure that happens after a suspension point is not observed by the
//! code that started the operation the way a synchronous error is: whoever
//! spawned the future has already moved on. The [`SuspensionAdapter`] closes
//! that gap. It drives a deferred handler's future to completion and routes
//! every outcome into the error reporter:
//!
//! | Outcome of the future        | Result                                   |
//! |------------------------------|------------------------------------------|
//! | `Ok(())`, response written   | nothing to do                            |
//! | `Ok(())`, nothing written    | `MissingResponse` reported               |
//! | `Err(failure)`               | failure reported as `DeferredFault`      |
//! | panic                        | panic message reported as `DeferredFault`|
//! | still pending after `timeout`| `SuspensionTimeout` reported             |
//!
//! Because the handler's remaining logic lives after the `.await`/`?` inside
//! its own future, a failed operation short-circuits it: the post-await code
//! never runs.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use funnel_core::{DispatchCycle, Failure, FailureKind};
use futures::FutureExt;
use tracing::{debug, warn};

use crate::handler::HandlerResult;
use crate::reporter::ErrorReporter;

/// Drives deferred operations and reports their failures.
#[derive(Clone)]
pub struct SuspensionAdapter {
    reporter: Arc<ErrorReporter>,
    timeout: Duration,
}

impl SuspensionAdapter {
    /// Creates an adapter that reports into `reporter` and gives up after
    /// `timeout`.
    pub fn new(reporter: Arc<ErrorReporter>, timeout: Duration) -> Self {
        Self { reporter, timeout }
    }

    /// The maximum suspension duration.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Suspends until `operation` completes (or times out) and makes sure
    /// the cycle reaches a terminal state.
    pub async fn await_and_report<F>(&self, operation: F, cycle: Arc<DispatchCycle>)
    where
        F: Future<Output = HandlerResult> + Send,
    {
        let guarded = AssertUnwindSafe(operation).catch_unwind();

        match tokio::time::timeout(self.timeout, guarded).await {
            Ok(result) => settle(&self.reporter, &cycle, result, FailureKind::DeferredFault),
            Err(_) => {
                warn!(
                    cycle_id = cycle.id(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Deferred operation exceeded its suspension bound"
                );
                self.reporter.report(Failure::timeout(self.timeout), &cycle);
            }
        }
    }
}

impl std::fmt::Debug for SuspensionAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuspensionAdapter")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Routes a finished handler's outcome into the reporter.
///
/// Shared by the direct path (where `result` comes from `catch_unwind`) and
/// the deferred path (where it comes from `FutureExt::catch_unwind`).
pub(crate) fn settle(
    reporter: &ErrorReporter,
    cycle: &DispatchCycle,
    result: Result<HandlerResult, Box<dyn Any + Send>>,
    origin: FailureKind,
) {
    match result {
        Ok(Ok(())) if cycle.is_complete() => {
            debug!(cycle_id = cycle.id(), state = ?cycle.state(), "Handler finished");
        }
        Ok(Ok(())) => {
            reporter.report(Failure::missing_response(), cycle);
        }
        Ok(Err(failure)) => {
            reporter.report(failure.or_kind(origin), cycle);
        }
        Err(payload) => {
            reporter.report(Failure::from_panic(payload.as_ref(), origin), cycle);
        }
    }
}
