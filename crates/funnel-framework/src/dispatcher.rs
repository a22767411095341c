//! Request dispatcher for the Funnel framework.
//!
//! The [`Dispatcher`] owns the route table and the single error channel. For
//! each inbound [`Request`] it opens a [`DispatchCycle`], invokes the
//! matching handler and waits for the cycle's one terminal write.
//!
//! ```text
//! Request ──▶ lookup ──┬─ miss ─────────────▶ ErrorReporter (RouteNotFound)
//!                      ├─ direct ──▶ call ──▶ Ok / Err / panic ──▶ settle
//!                      └─ deferred ─▶ spawn(SuspensionAdapter::await_and_report)
//!                                                        │
//! Response ◀── CycleCompletion::wait ◀── write-once slot ◀┘
//! ```
//!
//! Registrations are collected by a [`DispatcherBuilder`] and frozen by
//! [`build`](DispatcherBuilder::build); a built dispatcher is cheap to clone
//! and shares its table read-only.
//!
//! ```rust,ignore
//! use funnel_framework::{Dispatcher, deferred, direct, Failure};
//!
//! let dispatcher = Dispatcher::builder()
//!     .get("/sync-test", direct(|_, _| Err(Failure::new("boom"))))
//!     .get("/async-test", deferred(|_, res| async move {
//!         async_fn().await?;
//!         res.json(json!({ "well": "ok" }))
//!     }))
//!     .build();
//!
//! let response = dispatcher.dispatch(Request::get("/sync-test")).await;
//! assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
//! ```

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use funnel_core::{CycleState, DispatchCycle, Failure, FailureKind, Method, Request, Response};
use tracing::{Instrument, Level, debug, error, info, span, warn};

use crate::adapter::{SuspensionAdapter, settle};
use crate::handler::Handler;
use crate::reporter::{ErrorReporter, FailureRenderer};
use crate::responder::Responder;

/// Suspension bound applied to deferred handlers without their own.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

struct Inner {
    routes: HashMap<Method, HashMap<String, Handler>>,
    reporter: Arc<ErrorReporter>,
    default_timeout: Duration,
    request_log: bool,
}

/// The central request dispatcher.
///
/// `Dispatcher` is `Send + Sync` and cloning it only bumps a reference
/// count, so one instance can be handed to every connection task.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    /// Starts building a dispatcher.
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Number of registered routes.
    pub fn route_count(&self) -> usize {
        self.inner.routes.values().map(HashMap::len).sum()
    }

    /// Whether a handler is registered for `method` and `path`.
    pub fn has_route(&self, method: &Method, path: &str) -> bool {
        self.lookup(method, path).is_some()
    }

    /// The shared error reporter.
    pub fn reporter(&self) -> &Arc<ErrorReporter> {
        &self.inner.reporter
    }

    /// Suspension bound for deferred handlers registered without one.
    pub fn default_timeout(&self) -> Duration {
        self.inner.default_timeout
    }

    fn lookup(&self, method: &Method, path: &str) -> Option<&Handler> {
        self.inner.routes.get(method)?.get(path)
    }

    /// Runs one dispatch cycle and returns its single response.
    ///
    /// Never fails: every fault, whether returned, panicked, timed out or
    /// unrouted, is turned into a response by the error reporter.
    pub async fn dispatch(&self, request: Request) -> Response {
        let (cycle, completion) = DispatchCycle::new(request);
        let span = span!(
            Level::DEBUG,
            "dispatch",
            cycle_id = cycle.id(),
            method = %cycle.request().method(),
            path = cycle.request().path()
        );

        async {
            self.start(&cycle);

            let response = match completion.wait().await {
                Some(response) => response,
                None => {
                    error!(
                        cycle_id = cycle.id(),
                        state = ?cycle.state(),
                        "Dispatch cycle ended without a response"
                    );
                    Response::internal_fallback()
                }
            };

            self.log_request(&cycle, &response);
            response
        }
        .instrument(span)
        .await
    }

    /// Answers `request` with `failure` without looking up a handler.
    ///
    /// Used by transports for requests rejected before dispatch, such as an
    /// oversized body. The failure still goes through the error reporter.
    pub async fn reject(&self, request: Request, failure: Failure) -> Response {
        let (cycle, completion) = DispatchCycle::new(request);
        self.inner.reporter.report(failure, &cycle);

        let response = completion
            .wait()
            .await
            .unwrap_or_else(Response::internal_fallback);
        self.log_request(&cycle, &response);
        response
    }

    fn start(&self, cycle: &Arc<DispatchCycle>) {
        let request = cycle.request();
        let Some(handler) = self.lookup(request.method(), request.path()) else {
            debug!(cycle_id = cycle.id(), "No route matched");
            self.inner.reporter.report(Failure::not_found(), cycle);
            return;
        };

        match handler {
            Handler::Direct(handler) => {
                if let Err(err) = cycle.begin(CycleState::HandlingSync) {
                    warn!(cycle_id = cycle.id(), error = %err, "Cycle already started");
                    return;
                }

                let responder = Responder::new(
                    Arc::clone(cycle),
                    Arc::clone(&self.inner.reporter),
                    FailureKind::HandlerFault,
                );
                let result = catch_unwind(AssertUnwindSafe(|| handler.call(request, &responder)));
                settle(&self.inner.reporter, cycle, result, FailureKind::HandlerFault);
            }
            Handler::Deferred { handler, timeout } => {
                if let Err(err) = cycle.begin(CycleState::HandlingAsync) {
                    warn!(cycle_id = cycle.id(), error = %err, "Cycle already started");
                    return;
                }

                let responder = Responder::new(
                    Arc::clone(cycle),
                    Arc::clone(&self.inner.reporter),
                    FailureKind::DeferredFault,
                );

                // The synchronous prefix of the handler (before its future is
                // returned) can panic too.
                let started = catch_unwind(AssertUnwindSafe(|| {
                    handler.call(cycle.request_arc(), responder)
                }));
                let operation = match started {
                    Ok(operation) => operation,
                    Err(payload) => {
                        settle(
                            &self.inner.reporter,
                            cycle,
                            Err(payload),
                            FailureKind::DeferredFault,
                        );
                        return;
                    }
                };

                let adapter = SuspensionAdapter::new(
                    Arc::clone(&self.inner.reporter),
                    timeout.unwrap_or(self.inner.default_timeout),
                );
                let cycle = Arc::clone(cycle);
                tokio::spawn(
                    async move { adapter.await_and_report(operation, cycle).await }
                        .in_current_span(),
                );
            }
        }
    }

    fn log_request(&self, cycle: &DispatchCycle, response: &Response) {
        if !self.inner.request_log {
            return;
        }

        let request = cycle.request();
        let elapsed_ms = cycle.elapsed().as_secs_f64() * 1000.0;
        info!(
            cycle_id = cycle.id(),
            method = %request.method(),
            path = request.path(),
            status = response.status().as_u16(),
            elapsed_ms,
            "{} {} {} {:.3} ms",
            request.method(),
            request.path(),
            response.status().as_u16(),
            elapsed_ms
        );
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("route_count", &self.route_count())
            .field("default_timeout", &self.inner.default_timeout)
            .field("request_log", &self.inner.request_log)
            .finish()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Collects registrations before serving.
pub struct DispatcherBuilder {
    routes: HashMap<Method, HashMap<String, Handler>>,
    reporter: Option<Arc<ErrorReporter>>,
    default_timeout: Duration,
    request_log: bool,
}

impl DispatcherBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            reporter: None,
            default_timeout: DEFAULT_TIMEOUT,
            request_log: true,
        }
    }

    /// Binds `handler` to `method` and `path`.
    ///
    /// Registering the same route twice keeps the later handler.
    pub fn register(mut self, method: Method, path: impl Into<String>, handler: Handler) -> Self {
        let path = path.into();
        debug!(%method, path = %path, variant = handler.variant(), "Registering route");

        let previous = self
            .routes
            .entry(method.clone())
            .or_default()
            .insert(path.clone(), handler);
        if previous.is_some() {
            warn!(%method, path = %path, "Route registered twice, replacing the earlier handler");
        }
        self
    }

    /// Registers a `GET` route.
    pub fn get(self, path: impl Into<String>, handler: Handler) -> Self {
        self.register(Method::GET, path, handler)
    }

    /// Registers a `POST` route.
    pub fn post(self, path: impl Into<String>, handler: Handler) -> Self {
        self.register(Method::POST, path, handler)
    }

    /// Registers a `PUT` route.
    pub fn put(self, path: impl Into<String>, handler: Handler) -> Self {
        self.register(Method::PUT, path, handler)
    }

    /// Registers a `DELETE` route.
    pub fn delete(self, path: impl Into<String>, handler: Handler) -> Self {
        self.register(Method::DELETE, path, handler)
    }

    /// Uses a custom renderer for failure responses.
    pub fn renderer(mut self, renderer: Arc<dyn FailureRenderer>) -> Self {
        self.reporter = Some(Arc::new(ErrorReporter::new(renderer)));
        self
    }

    /// Uses an existing reporter, e.g. to share its counters.
    pub fn reporter(mut self, reporter: Arc<ErrorReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Sets the bound for deferred handlers registered without one.
    pub fn default_timeout(mut self, bound: Duration) -> Self {
        self.default_timeout = bound;
        self
    }

    /// Enables or disables the per-request log line.
    pub fn request_log(mut self, enabled: bool) -> Self {
        self.request_log = enabled;
        self
    }

    /// Number of routes registered so far.
    pub fn route_count(&self) -> usize {
        self.routes.values().map(HashMap::len).sum()
    }

    /// Freezes the route table.
    pub fn build(self) -> Dispatcher {
        let reporter = self
            .reporter
            .unwrap_or_else(|| Arc::new(ErrorReporter::json()));

        Dispatcher {
            inner: Arc::new(Inner {
                routes: self.routes,
                reporter,
                default_timeout: self.default_timeout,
                request_log: self.request_log,
            }),
        }
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DispatcherBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatcherBuilder")
            .field("route_count", &self.route_count())
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{BoxFuture, HandlerResult, deferred, direct};
    use funnel_core::StatusCode;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_direct_success() {
        let dispatcher = Dispatcher::builder()
            .get("/hello", direct(|_, res| res.json(json!({ "hello": "world" }))))
            .build();

        let response = dispatcher.dispatch(Request::get("/hello")).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.json_body(), Some(&json!({ "hello": "world" })));
        assert_eq!(dispatcher.reporter().stats().delivered, 0);
    }

    #[tokio::test]
    async fn test_direct_panic_is_handler_fault() {
        let dispatcher = Dispatcher::builder()
            .get("/panic", direct(|_, _| panic!("kaboom")))
            .build();

        let response = dispatcher.dispatch(Request::get("/panic")).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.json_body(), Some(&json!({ "error": "kaboom" })));
        assert_eq!(
            dispatcher.reporter().stats().last_kind,
            Some(FailureKind::HandlerFault)
        );
    }

    #[tokio::test]
    async fn test_method_mismatch_is_not_found() {
        let dispatcher = Dispatcher::builder()
            .post("/items", direct(|_, res| res.json(json!([]))))
            .build();

        let response = dispatcher.dispatch(Request::get("/items")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_deferred_synchronous_panic_is_captured() {
        let dispatcher = Dispatcher::builder()
            .get(
                "/eager",
                Handler::from_deferred(
                    |_: Arc<Request>, _: Responder| -> BoxFuture<'static, HandlerResult> {
                        panic!("before the first await")
                    },
                ),
            )
            .build();

        let response = dispatcher.dispatch(Request::get("/eager")).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            dispatcher.reporter().stats().last_kind,
            Some(FailureKind::DeferredFault)
        );
    }

    #[tokio::test]
    async fn test_direct_forward_then_return_err_reports_once() {
        let dispatcher = Dispatcher::builder()
            .get(
                "/both",
                direct(|_, res| {
                    res.forward(Failure::new("first"));
                    Err(Failure::new("second"))
                }),
            )
            .build();

        let response = dispatcher.dispatch(Request::get("/both")).await;

        assert_eq!(response.json_body(), Some(&json!({ "error": "first" })));
        let stats = dispatcher.reporter().stats();
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.suppressed, 1);
    }

    #[tokio::test]
    async fn test_replacing_route_keeps_latest() {
        let dispatcher = Dispatcher::builder()
            .get("/v", direct(|_, res| res.json(json!(1))))
            .get("/v", direct(|_, res| res.json(json!(2))))
            .build();

        assert_eq!(dispatcher.route_count(), 1);
        let response = dispatcher.dispatch(Request::get("/v")).await;
        assert_eq!(response.json_body(), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_reject_goes_through_reporter() {
        let dispatcher = Dispatcher::builder().build();

        let response = dispatcher
            .reject(
                Request::post("/upload"),
                Failure::new("payload too large").with_status(StatusCode::PAYLOAD_TOO_LARGE),
            )
            .await;

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(dispatcher.reporter().stats().delivered, 1);
    }

    #[tokio::test]
    async fn test_clones_share_routes_and_reporter() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let dispatcher = Dispatcher::builder()
            .get(
                "/count",
                deferred(move |_, res| {
                    let counter = Arc::clone(&counter);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        res.json(json!({ "ok": true }))
                    }
                }),
            )
            .build();
        let clone = dispatcher.clone();

        dispatcher.dispatch(Request::get("/count")).await;
        clone.dispatch(Request::get("/count")).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(Arc::ptr_eq(dispatcher.reporter(), clone.reporter()));
    }

    #[test]
    fn test_builder_defaults() {
        let builder = DispatcherBuilder::default();
        assert_eq!(builder.route_count(), 0);

        let dispatcher = builder.default_timeout(Duration::from_millis(50)).build();
        assert_eq!(dispatcher.default_timeout(), Duration::from_millis(50));
        assert!(!dispatcher.has_route(&Method::GET, "/"));
    }
}
