//! # Funnel Core
//!
//! Plain data types shared by every layer of the Funnel dispatch pipeline.
//!
//! This crate contains:
//! - [`Request`] - the transport-agnostic inbound request
//! - [`Response`] and [`Body`] - the single outward answer of a dispatch cycle
//! - [`Failure`] and [`FailureKind`] - the normalized error value consumed by
//!   the error reporter
//! - [`DispatchCycle`] - per-request lifecycle state with a write-once
//!   response slot
//!
//! Nothing in here knows about handlers or routing; those live in
//! `funnel-framework`.

pub mod cycle;
pub mod error;
pub mod failure;
pub mod request;
pub mod response;

pub use cycle::{CycleCompletion, CycleId, CycleState, DispatchCycle, Outcome};
pub use error::{CoreError, CoreResult};
pub use failure::{Failure, FailureKind, panic_message};
pub use request::Request;
pub use response::{Body, Response};

// Re-exported so downstream crates agree on one `http` version.
pub use http::{HeaderMap, HeaderValue, Method, StatusCode};
