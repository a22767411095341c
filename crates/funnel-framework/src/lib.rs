//! # Funnel Framework
//!
//! Handler registration, fault capture and error reporting for the Funnel
//! dispatch pipeline.
//!
//! This layer provides:
//! - Direct and deferred handler variants with a shared [`Responder`]
//! - The [`SuspensionAdapter`] that every deferred handler runs under
//! - The [`ErrorReporter`], the only writer of failure responses
//! - The [`Dispatcher`] and its builder, usable as a `tower::Service`
//!
//! Plain data types (`Request`, `Response`, `Failure`, the dispatch cycle)
//! live in `funnel-core` and are re-exported here.

pub mod adapter;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod reporter;
pub mod responder;
pub mod service;

pub use adapter::SuspensionAdapter;
pub use dispatcher::{DEFAULT_TIMEOUT, Dispatcher, DispatcherBuilder};
pub use error::RenderError;
pub use handler::{
    BoxFuture, DeferredHandler, DirectHandler, Handler, HandlerResult, deferred, direct,
};
pub use reporter::{
    ErrorReporter, FailureRenderer, INTERNAL_MESSAGE, JsonRenderer, ReportOutcome, ReporterStats,
};
pub use responder::Responder;
pub use service::DispatchService;

pub use funnel_core::{
    Body, CycleId, CycleState, DispatchCycle, Failure, FailureKind, Method, Request, Response,
    StatusCode,
};
