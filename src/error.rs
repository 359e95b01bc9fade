//! The error taxonomy for the dispatch pipeline.
//!
//! Only [`DispatchError::Infeasible`] is retryable; the orchestration loop in
//! [`crate::simulation`] converts it into a revise-and-retry cycle. Everything else propagates
//! straight to the caller.
use crate::solver::TerminationStatus;
use thiserror::Error;

/// An error from the dispatch pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    /// The scenario violates one or more of its invariants. Every violation is listed, not just
    /// the first one found.
    #[error("invalid scenario:\n  {}", .0.join("\n  "))]
    Validation(Vec<String>),

    /// The model is well-formed but has no feasible point. Retryable via scenario revision.
    #[error("no feasible dispatch exists (solver status: {status})")]
    Infeasible {
        /// The termination status reported by the solver
        status: TerminationStatus,
    },

    /// The solver failed to produce a definitive answer (unbounded, timed out, numerical
    /// trouble). Not repairable by revising the schedule.
    #[error("solver failed with status: {status}")]
    Solver {
        /// The termination status reported by the solver
        status: TerminationStatus,
    },

    /// The schedule re-derived from the solution disagrees with the solver's objective. Always
    /// an internal bug; never retried.
    #[error("schedule extraction mismatch: {0}")]
    ExtractionMismatch(String),
}

/// A specialised `Result` type for dispatch operations.
pub type DispatchResult<T> = std::result::Result<T, DispatchError>;
