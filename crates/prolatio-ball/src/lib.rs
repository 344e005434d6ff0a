//! # prolatio-ball
//!
//! Midpoint-radius interval arithmetic for Prolatio.
//!
//! This crate provides:
//! - `RealBall`: arbitrary-precision midpoint with a certified f64 radius
//! - `ComplexBall`: rectangular complex enclosures built from two real balls
//! - Certified elementary functions (`pi`, `ln`, `exp`, `atan2`, `sin_cos`)
//!
//! Every operation is enclosure-sound: the result ball contains the exact
//! mathematical result of the operation applied to any points of the
//! operand balls. Midpoints carry an explicit working precision in bits;
//! rounding incurred by clamping midpoints is absorbed into the radius.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod complex;
pub mod elementary;
mod proptests;
pub mod real;
pub mod round;

pub use complex::{i_pi, ComplexBall};
pub use elementary::{atan2, pi};
pub use real::RealBall;
