//! # Funnel Transport
//!
//! Network listeners that feed a [`Dispatcher`](funnel_framework::Dispatcher).
//!
//! ## Features
//!
//! - `http-server` (default): axum-backed HTTP/1.1 listener
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  funnel-runtime     │  (config, lifecycle)
//! ├─────────────────────┤
//! │  funnel-transport   │  <- This crate (listeners)
//! ├─────────────────────┤
//! │  funnel-framework   │  (dispatcher, reporter)
//! ├─────────────────────┤
//! │  Network (TCP/HTTP) │
//! └─────────────────────┘
//! ```
//!
//! The transport never decides a status code on its own. Requests it has to
//! refuse (an oversized body) are still answered through
//! [`Dispatcher::reject`](funnel_framework::Dispatcher::reject).
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use funnel_transport::{HttpServer, Listener};
//!
//! let handle = HttpServer::new().listen("127.0.0.1:3000", dispatcher).await?;
//! println!("listening on {}", handle.local_addr());
//! handle.shutdown().await?;
//! ```

pub mod error;
pub mod listener;

#[cfg(feature = "http-server")]
pub mod http;

pub use error::{TransportError, TransportResult};
pub use listener::{Listener, ListenerHandle};

#[cfg(feature = "http-server")]
pub use http::{DEFAULT_MAX_BODY_BYTES, HttpServer};
