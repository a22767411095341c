//! Error types for the core layer.
//!
//! These describe misuse of a [`DispatchCycle`](crate::DispatchCycle), not
//! request-level failures. Request-level failures are [`Failure`](crate::Failure)s.

use thiserror::Error;

use crate::cycle::{CycleId, CycleState};

/// Errors raised by dispatch cycle bookkeeping.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    /// A response was written to a cycle that already reached a terminal state.
    #[error("cycle {cycle_id} already completed ({state:?}); write discarded")]
    AlreadyCompleted {
        /// The cycle that rejected the write.
        cycle_id: CycleId,
        /// The terminal state the cycle is in.
        state: CycleState,
    },

    /// A state transition that the cycle state machine does not allow.
    #[error("cycle {cycle_id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        /// The cycle being transitioned.
        cycle_id: CycleId,
        /// Current state.
        from: CycleState,
        /// Requested state.
        to: CycleState,
    },
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
