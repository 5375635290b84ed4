//! Crate-wide error type.
//!
//! Every fallible constructor and filter step returns `Result<T, Error>`.
//! There is no silent-NaN path: a numerically degenerate step (singular
//! innovation covariance, a non-PSD covariance handed to a Cholesky) is
//! reported to the immediate caller rather than propagated as garbage.

use thiserror::Error as ThisError;

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Taxonomy of failures a caller of this crate can observe.
///
/// `Termination` (line search / IEKF hitting `max_iters`) is deliberately
/// *not* a variant here: it is a non-fatal outcome reported via a
/// `converged: bool` flag on the relevant result type, not an `Err`.
/// Likewise end-of-stream in the renderer's segment chainers is not an
/// error; it is normal termination of `render_trip`.
#[derive(ThisError, Debug, Clone, PartialEq)]
pub enum Error {
    /// A matrix/vector shape did not match the invariant the caller promised
    /// (e.g. `B` with the wrong number of columns, a zero-length segment
    /// list, a `CompositeMeasurement` built from sub-measurements that
    /// disagree on `n_states`).
    #[error("invalid shape: {0}")]
    InvalidShape(String),

    /// `Ts <= 0`, non-finite, or otherwise not a valid integration step.
    #[error("non-positive or non-finite time step: {0}")]
    NonPositiveTimeStep(f64),

    /// `TrackTurn` built with a nonpositive radius or negative transition
    /// length.
    #[error("invalid track turn geometry: {0}")]
    NegativeRadius(String),

    /// Dimensions of two operands that should agree (e.g. model `n_states`
    /// vs. belief length) disagree.
    #[error("mismatched dimensions: expected {expected}, got {got}")]
    MismatchedDimensions { expected: usize, got: usize },

    /// Cholesky factorization failed: the matrix handed in is not positive
    /// semi-definite (within numerical tolerance).
    #[error("covariance is not positive semi-definite")]
    NotPositiveSemiDefinite,

    /// A triangular solve required to invert an innovation covariance (or
    /// its square-root factor) hit a (near-)zero pivot.
    #[error("singular innovation covariance")]
    SingularInnovation,

    /// Division by zero encountered outside of the innovation path (e.g. a
    /// `SmoothlyAccelerate` segment activated with zero jerk).
    #[error("division by zero: {0}")]
    DivisionByZero(String),
}
