//! # Funnel
//!
//! An HTTP dispatch pipeline with one rule: every failure, whether raised
//! synchronously by a handler or produced later by a suspended operation,
//! reaches a single error reporter exactly once and yields exactly one
//! response.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐     ┌────────────┐     ┌──────────────────┐
//! │ Transport │────▶│ Dispatcher │────▶│ direct handler   │──┐
//! │  (axum)   │     │            │────▶│ deferred handler │  │ Err / panic / timeout
//! └───────────┘     └────────────┘     │ (+ Suspension    │  │
//!       ▲                              │    Adapter)      │  │
//!       │                              └──────────────────┘  ▼
//!       └────────────── one Response ◀──────────── Error Reporter
//! ```
//!
//! - **Runtime**: configuration, logging and the serve/shutdown lifecycle
//! - **Dispatcher**: route table plus the single error channel
//! - **Handlers**: direct (`Fn`) or deferred (`async`), answering through a
//!   write-once `Responder`
//! - **Error Reporter**: the only writer of failure responses
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use funnel::prelude::*;
//!
//! async fn async_fn() -> Result<(), Failure> {
//!     Err(Failure::new("Async Fn error!"))
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = FunnelRuntime::builder()
//!         .get("/sync-test", direct(|_, _| Err(Failure::new("boom"))))
//!         .get("/async-test", deferred(|_, res| async move {
//!             async_fn().await?;
//!             res.json(json!({ "well": "ok" }))
//!         }))
//!         .build()?;
//!
//!     runtime.serve().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` (default): TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log format
//! - `http-server` (default): axum HTTP listener

pub use funnel_core as core;
pub use funnel_framework as framework;
pub use funnel_runtime as runtime;
pub use funnel_transport as transport;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use funnel::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use funnel_runtime::{FunnelConfig, FunnelRuntime, RuntimeError};

    // Handlers
    pub use funnel_framework::{
        Dispatcher, Handler, HandlerResult, Responder, deferred, direct,
    };

    // Request, response and failure types
    pub use funnel_core::{Body, Failure, FailureKind, Method, Request, Response, StatusCode};

    // Custom rendering
    pub use funnel_framework::{FailureRenderer, JsonRenderer, RenderError};
}
