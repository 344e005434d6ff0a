//! Evaluation failures.

use thiserror::Error;

/// Why an evaluation could not produce a certified result.
///
/// Every variant carries enough context to report the failure without
/// re-running the evaluation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvalError {
    /// A path segment passes through or too close to a singular point of
    /// the operator.
    #[error(
        "path segment {segment} passes through or too close to singular point \
         {re} + {im}i (distance {distance:.3e}, needs > {threshold:.3e})"
    )]
    PathTooCloseToSingularity {
        /// Index of the offending segment (0 joins vertices 0 and 1).
        segment: usize,
        /// Real part of the singular point (approximate).
        re: f64,
        /// Imaginary part of the singular point (approximate).
        im: f64,
        /// Distance from the segment to the singular point.
        distance: f64,
        /// Minimum admissible distance.
        threshold: f64,
    },

    /// An expansion point is a singularity the engine cannot handle
    /// (irregular, or with exponents outside the Gaussian rationals).
    #[error("unsupported singular point {re} + {im}i: {reason}")]
    SingularPointUnsupported {
        /// Real part of the point (approximate).
        re: f64,
        /// Imaginary part of the point (approximate).
        im: f64,
        /// What made the point unsupported.
        reason: String,
    },

    /// The requested accuracy could not be reached below the working
    /// precision ceiling.
    #[error(
        "target accuracy not reachable at step {step} within the precision \
         ceiling of {ceiling_bits} bits"
    )]
    PrecisionExceeded {
        /// Continuation step at which escalation gave up.
        step: usize,
        /// The precision ceiling, in bits.
        ceiling_bits: usize,
    },

    /// A division by an interval containing zero persisted at the
    /// precision ceiling.
    #[error("division by an enclosure of zero at step {step}")]
    DivisionByZero {
        /// Continuation step at which the division failed.
        step: usize,
    },

    /// The evaluation exceeded its step or time budget.
    #[error("evaluation cancelled after {steps} steps")]
    Cancelled {
        /// Steps completed before cancellation.
        steps: usize,
    },

    /// The operator, path or initial conditions are malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
