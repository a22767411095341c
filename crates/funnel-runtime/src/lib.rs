//! Funnel Runtime - configuration, logging and lifecycle for Funnel services.
//!
//! This crate provides:
//! - Layered configuration (`FunnelConfig`, `ConfigLoader`)
//! - Logging setup (`LoggingBuilder`)
//! - The service lifecycle (`FunnelRuntime`, `RuntimeBuilder`)
//!
//! ```ignore
//! use funnel_runtime::FunnelRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = FunnelRuntime::builder()
//!         .config_file("funnel.toml")
//!         .get("/health", direct(|_, res| res.json(json!({ "ok": true }))))
//!         .build()?;
//!
//!     runtime.serve().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{ConfigError, ConfigLoader, ConfigResult, FunnelConfig, Profile};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{FunnelRuntime, RuntimeBuilder, wait_for_shutdown};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for handler code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
