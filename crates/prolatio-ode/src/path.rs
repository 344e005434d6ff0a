//! Path validation against the singular locus.
//!
//! Continuation paths are polygons with exact Gaussian rational vertices.
//! A segment that passes through or too close to a singular point of the
//! operator is rejected up front, before any series work starts. Singular
//! points are localised numerically; vertices that are exactly singular
//! are detected exactly and exempt their own segments from the distance
//! check.

use num_complex::Complex64;

use crate::coeffs::PathPoint;
use crate::error::EvalError;
use crate::operator::DiffOp;

/// Numeric slop absorbing root-localisation error.
const LOCALISATION_SLOP: f64 = 1e-10;

/// Sub-step positions on a segment are multiples of `1/SEGMENT_GRAIN`
/// of its length; the stepper cannot place expansion centres any closer
/// together.
pub(crate) const SEGMENT_GRAIN: u64 = 1 << 16;

/// Tolerance for matching a numeric singularity against an exact vertex.
const VERTEX_MATCH_TOL: f64 = 1e-8;

/// Precision floor for the minimum admissible distance between a path
/// segment and a singular point; [`validate_path`] additionally floors
/// the threshold at a few grid units of each segment.
#[must_use]
pub fn guard_threshold(prec: usize) -> f64 {
    let from_prec = (2.0_f64).powi(-((prec as i32) / 2).min(200));
    from_prec.max(1e-9)
}

/// Distance from point `p` to the segment `[a, b]`.
#[must_use]
pub fn segment_distance(a: Complex64, b: Complex64, p: Complex64) -> f64 {
    let ab = b - a;
    let len_sq = ab.norm_sqr();
    if len_sq == 0.0 {
        return (p - a).norm();
    }
    let t = ((p - a).re * ab.re + (p - a).im * ab.im) / len_sq;
    let t = t.clamp(0.0, 1.0);
    let proj = a + ab * t;
    (p - proj).norm()
}

/// The distance from `z` to the nearest singular point, excluding
/// singularities matching `exclude` (used when `z` itself is singular).
/// Returns `f64::INFINITY` when no other singularity exists.
#[must_use]
pub fn nearest_singularity(
    z: Complex64,
    singular: &[Complex64],
    exclude: Option<Complex64>,
) -> f64 {
    let mut best = f64::INFINITY;
    for s in singular {
        if let Some(e) = exclude {
            if (s - e).norm() < VERTEX_MATCH_TOL {
                continue;
            }
        }
        best = best.min((z - s).norm());
    }
    best
}

/// Checks every path segment against every singular point.
///
/// A segment endpoint that is exactly a singular vertex of the operator
/// exempts the matching singularity from the check for that segment
/// (the expansion machinery handles the point itself); all other
/// singularities must still keep their distance.
///
/// # Errors
///
/// `PathTooCloseToSingularity` for the first offending pair,
/// `InvalidInput` for an empty path.
pub fn validate_path(
    op: &DiffOp,
    path: &[PathPoint],
    singular: &[Complex64],
    prec: usize,
) -> Result<(), EvalError> {
    if path.is_empty() {
        return Err(EvalError::InvalidInput("path must not be empty".into()));
    }
    for (seg, pair) in path.windows(2).enumerate() {
        let a = pair[0].to_c64();
        let b = pair[1].to_c64();
        // A singularity must clear several grid units of the segment,
        // or no certifiable sub-step can get past it.
        let step_floor = 4.0 * (b - a).norm() / SEGMENT_GRAIN as f64;
        let threshold = guard_threshold(prec).max(step_floor);
        let a_singular = op.is_singular_vertex(&pair[0]);
        let b_singular = op.is_singular_vertex(&pair[1]);
        for s in singular {
            let exempt = (a_singular && (s - a).norm() < VERTEX_MATCH_TOL)
                || (b_singular && (s - b).norm() < VERTEX_MATCH_TOL);
            if exempt {
                continue;
            }
            let distance = segment_distance(a, b, *s) - LOCALISATION_SLOP;
            if distance <= threshold {
                return Err(EvalError::PathTooCloseToSingularity {
                    segment: seg,
                    re: s.re,
                    im: s.im,
                    distance: distance.max(0.0),
                    threshold,
                });
            }
        }
    }
    Ok(())
}
