//! # Prolatio
//!
//! Certified analytic continuation for linear ODEs with polynomial
//! coefficients.
//!
//! Given an operator `p_r(z) y^(r) + … + p_0(z) y = 0` with Gaussian
//! rational polynomial coefficients, initial conditions at a base point,
//! and a polygonal path through the complex plane, Prolatio computes
//! enclosures of the continued solution that are mathematically
//! guaranteed to contain the true value, at any requested accuracy.
//!
//! ## Quick start
//!
//! ```rust
//! use prolatio::prelude::*;
//!
//! // y' = y, so the solution through y(0) = 1 is exp(z).
//! let op = DiffOp::new(vec![
//!     QPoly::constant(QiNum::from_integer(-1)),
//!     QPoly::one(),
//! ])
//! .unwrap();
//! let opts = EvalOptions {
//!     target_error: 1e-30,
//!     ..EvalOptions::default()
//! };
//! let out = evaluate(
//!     &op,
//!     &[ComplexBall::from_i64(1, 64)],
//!     &[QiNum::from_integer(0), QiNum::from_integer(1)],
//!     &opts,
//! )
//! .unwrap();
//! assert!(out[0].rad_upper() <= 1e-30);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub use prolatio_ball as ball;
pub use prolatio_ode as ode;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use prolatio_ball::{ComplexBall, RealBall};
    pub use prolatio_ode::{
        evaluate, evaluate_batch, evaluate_with_observer, DiffOp, EvalError,
        EvalOptions, LocalBasis, PathPoint, PointKind, QPoly, QiNum,
        StepInfo,
    };
}
