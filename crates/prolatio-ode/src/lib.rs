//! # prolatio-ode
//!
//! Certified analytic continuation for linear ODEs with polynomial
//! coefficients over the Gaussian rationals.
//!
//! The crate answers one question rigorously: given an operator
//! `p_r(z) y^(r) + … + p_1(z) y' + p_0(z) y = 0`, initial conditions at a
//! base point, and a polygonal path avoiding the singular locus, what is
//! the value of the solution at the end of the path? The answer is an
//! enclosure: a complex ball guaranteed to contain the true value, with a
//! radius no larger than the requested target.
//!
//! The pipeline:
//! - [`operator::DiffOp`] holds the operator and classifies expansion
//!   points (ordinary, regular singular, irregular singular);
//! - [`local::LocalBasis`] builds the canonical local solution basis at a
//!   point, including Frobenius elements with logarithms;
//! - [`bounds`] certifies truncation tails of the local expansions;
//! - [`step`] walks the path, carrying coefficient vectors between
//!   expansion centres;
//! - [`eval::evaluate`] wraps the walk in precision escalation and the
//!   error taxonomy of [`error::EvalError`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod bounds;
pub mod coeffs;
pub mod error;
pub mod eval;
pub mod local;
pub mod matrix;
pub mod operator;
pub mod path;
pub mod poly;
pub mod precision;
mod proptests;
pub mod step;

pub use coeffs::{PathPoint, QiNum};
pub use error::EvalError;
pub use eval::{evaluate, evaluate_batch, evaluate_with_observer, EvalOptions};
pub use local::LocalBasis;
pub use operator::{DiffOp, PointKind};
pub use poly::QPoly;
pub use step::{Budget, Observer, StepInfo};
