//! Error Demo
//!
//! Four routes showing how failures travel through the pipeline:
//!
//! | Route           | Handler                                          |
//! |-----------------|--------------------------------------------------|
//! | `/sync-test`    | direct, fails synchronously                      |
//! | `/async-test-1` | deferred, awaits a failing call with plain `?`   |
//! | `/async-test-2` | deferred, catches the failure and forwards it    |
//! | `/async-test-3` | deferred, same as 1 but with the body in its own |
//! |                 | `async fn`                                       |
//!
//! All of them answer `500 {"error": ...}` through the same error reporter.
//! None of the `well` responses are ever sent.

use std::sync::Arc;
use std::time::Duration;

use funnel::framework::DispatcherBuilder;
use funnel::prelude::*;
use serde_json::json;
use tracing::debug;

/// Default delay of the simulated call.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);

/// Simulates a network or database call that fails after `delay`.
pub async fn async_fn(delay: Duration) -> Result<(), Failure> {
    tokio::time::sleep(delay).await;
    Err(Failure::new("Async Fn error!"))
}

async fn still_not_reached(delay: Duration, res: Responder) -> HandlerResult {
    async_fn(delay).await?;
    res.json(json!({ "well": "We're *still* not going to reach this line." }))
}

/// Registers the demo routes on `builder`.
pub fn routes(builder: DispatcherBuilder, delay: Duration) -> DispatcherBuilder {
    builder
        .get(
            "/sync-test",
            direct(|_, _| Err(Failure::new("boom"))),
        )
        .get(
            "/async-test-1",
            deferred(move |_, res| async move {
                async_fn(delay).await?;
                res.json(json!({ "well": "We're not going to reach this line." }))
            }),
        )
        .get(
            "/async-test-2",
            deferred(move |_, res| async move {
                match async_fn(delay).await {
                    Ok(()) => res.json(json!({ "well": "We're not going to reach this line, either." })),
                    Err(failure) => {
                        debug!(cycle_id = res.cycle_id(), "Forwarding caught failure");
                        res.forward(failure);
                        Ok(())
                    }
                }
            }),
        )
        .get(
            "/async-test-3",
            deferred(move |_: Arc<Request>, res| still_not_reached(delay, res)),
        )
}
