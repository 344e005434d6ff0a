//! Real balls: arbitrary-precision midpoint with a certified f64 radius.
//!
//! A `RealBall` represents the set of reals `[mid - rad, mid + rad]`.
//! Midpoints are `dashu::float::FBig` binary floats held at an explicit
//! working precision. Midpoint arithmetic goes through dashu's `Context`,
//! which reports whether the operation had to round; any rounding is
//! accounted for by inflating the radius, so the result ball always
//! encloses the exact result of the operation applied to any points of
//! the operand balls, and exact operations keep a zero radius.

use dashu::base::Approximation;
use dashu::float::round::mode::Zero;
use dashu::float::round::Rounding;
use dashu::float::{Context, FBig};
use dashu::integer::IBig;
use dashu::rational::RBig;

use crate::round::{bump, dn_sub, pow2, up_add, up_div, up_mul};

/// Converts a machine integer into an exact big float.
pub(crate) fn fb_int(n: i64) -> FBig {
    FBig::from(IBig::from(n))
}

/// Upper bound on `|x|` as an f64.
pub(crate) fn fb_mag(x: &FBig) -> f64 {
    let a = x.clone().to_f64().value().abs();
    if a.is_infinite() {
        return f64::INFINITY;
    }
    if a == 0.0 {
        return 0.0;
    }
    // Two upward steps cover the to-nearest conversion error.
    bump(bump(a))
}

/// Lower bound on `|x|` as an f64.
pub(crate) fn fb_mig(x: &FBig) -> f64 {
    let a = x.clone().to_f64().value().abs();
    if a.is_infinite() {
        return f64::MAX;
    }
    if a == 0.0 || a.to_bits() <= 2 {
        return 0.0;
    }
    // Two downward steps cover the to-nearest conversion error.
    f64::from_bits(a.to_bits() - 2)
}

/// The rounding context for midpoint arithmetic at `prec` bits.
fn ctx(prec: usize) -> Context<Zero> {
    Context::new(prec)
}

/// Turns a context result into the rounded midpoint and an upper bound
/// on the rounding error: zero when the operation was exact, two ulps at
/// `prec` bits otherwise.
fn settle(r: Approximation<FBig, Rounding>, prec: usize) -> (FBig, f64) {
    match r {
        Approximation::Exact(v) => (v, 0.0),
        Approximation::Inexact(v, _) => {
            let ulp = up_mul(fb_mag(&v), pow2(2 - prec as i64));
            (v, ulp)
        }
    }
}

/// Clamps `x` to `prec` significant bits, returning the rounded value and
/// an upper bound on the rounding error.
pub(crate) fn clamp(x: FBig, prec: usize) -> (FBig, f64) {
    settle(x.with_precision(prec), prec)
}

/// A real number known to lie within `mid ± rad`.
#[derive(Clone, Debug)]
pub struct RealBall {
    /// Midpoint, clamped to `prec` significant bits.
    pub(crate) mid: FBig,
    /// Radius; always finite and non-negative, or infinite when all
    /// information has been lost.
    pub(crate) rad: f64,
    /// Working precision in bits.
    pub(crate) prec: usize,
}

impl RealBall {
    /// The exact zero ball.
    #[must_use]
    pub fn zero(prec: usize) -> Self {
        Self {
            mid: <FBig>::ZERO,
            rad: 0.0,
            prec,
        }
    }

    /// The exact one ball.
    #[must_use]
    pub fn one(prec: usize) -> Self {
        Self::from_i64(1, prec)
    }

    /// An integer as a ball (exact unless it exceeds the precision).
    #[must_use]
    pub fn from_i64(n: i64, prec: usize) -> Self {
        let (mid, rad) = clamp(fb_int(n), prec);
        Self { mid, rad, prec }
    }

    /// A rational number as a ball. Dyadic rationals stay exact.
    #[must_use]
    pub fn from_rbig(q: &RBig, prec: usize) -> Self {
        if q == &RBig::ZERO {
            return Self::zero(prec);
        }
        let num: FBig = FBig::from(q.numerator().clone());
        let den: FBig = FBig::from(IBig::from(q.denominator().clone()));
        let (mid, rad) = settle(ctx(prec).div(num.repr(), den.repr()), prec);
        Self { mid, rad, prec }
    }

    /// Wraps an exact big float without extra error.
    #[must_use]
    pub fn from_fbig_exact(x: FBig, prec: usize) -> Self {
        let (mid, rad) = clamp(x, prec);
        Self { mid, rad, prec }
    }

    /// A ball from an f64 midpoint (exact: every f64 is a binary rational).
    #[must_use]
    pub fn from_f64(x: f64, prec: usize) -> Self {
        let fx = FBig::try_from(x).unwrap_or(<FBig>::ZERO);
        Self::from_fbig_exact(fx, prec)
    }

    /// The working precision in bits.
    #[must_use]
    pub fn precision(&self) -> usize {
        self.prec
    }

    /// The midpoint.
    #[must_use]
    pub fn midpoint(&self) -> &FBig {
        &self.mid
    }

    /// The radius.
    #[must_use]
    pub fn radius(&self) -> f64 {
        self.rad
    }

    /// The midpoint rounded to f64, for diagnostics and coarse bounds.
    #[must_use]
    pub fn mid_f64(&self) -> f64 {
        self.mid.clone().to_f64().value()
    }

    /// Upper bound on the absolute value of any point of the ball.
    #[must_use]
    pub fn mag_upper(&self) -> f64 {
        up_add(fb_mag(&self.mid), self.rad)
    }

    /// Lower bound on the absolute value of any point of the ball
    /// (zero when the ball may contain zero).
    #[must_use]
    pub fn mig_lower(&self) -> f64 {
        dn_sub(fb_mig(&self.mid), self.rad)
    }

    /// True when every point of the ball is strictly positive.
    #[must_use]
    pub fn is_strictly_positive(&self) -> bool {
        self.mid > <FBig>::ZERO && self.mig_lower() > 0.0
    }

    /// True when every point of the ball is strictly negative.
    #[must_use]
    pub fn is_strictly_negative(&self) -> bool {
        self.mid < <FBig>::ZERO && self.mig_lower() > 0.0
    }

    /// True when the ball is exactly zero.
    #[must_use]
    pub fn is_exact_zero(&self) -> bool {
        self.rad == 0.0 && self.mid == <FBig>::ZERO
    }

    /// True when the ball may contain zero.
    #[must_use]
    pub fn contains_zero(&self) -> bool {
        self.mig_lower() == 0.0
    }

    /// Widens the ball by an extra error term.
    pub fn add_error(&mut self, e: f64) {
        self.rad = up_add(self.rad, e);
    }

    /// Sum of two balls.
    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        let prec = self.prec.max(other.prec);
        let (mid, ulp) =
            settle(ctx(prec).add(self.mid.repr(), other.mid.repr()), prec);
        let rad = up_add(up_add(self.rad, other.rad), ulp);
        Self { mid, rad, prec }
    }

    /// Difference of two balls.
    #[must_use]
    pub fn sub(&self, other: &Self) -> Self {
        let prec = self.prec.max(other.prec);
        let (mid, ulp) =
            settle(ctx(prec).sub(self.mid.repr(), other.mid.repr()), prec);
        let rad = up_add(up_add(self.rad, other.rad), ulp);
        Self { mid, rad, prec }
    }

    /// Negation (exact).
    #[must_use]
    pub fn neg(&self) -> Self {
        Self {
            mid: -self.mid.clone(),
            rad: self.rad,
            prec: self.prec,
        }
    }

    /// Product of two balls.
    #[must_use]
    pub fn mul(&self, other: &Self) -> Self {
        let prec = self.prec.max(other.prec);
        let (mid, ulp) =
            settle(ctx(prec).mul(self.mid.repr(), other.mid.repr()), prec);
        let a = fb_mag(&self.mid);
        let b = fb_mag(&other.mid);
        let cross = up_add(
            up_add(up_mul(a, other.rad), up_mul(b, self.rad)),
            up_mul(self.rad, other.rad),
        );
        Self {
            mid,
            rad: up_add(cross, ulp),
            prec,
        }
    }

    /// Quotient of two balls.
    ///
    /// Returns `None` when the divisor ball may contain zero.
    #[must_use]
    pub fn div(&self, other: &Self) -> Option<Self> {
        let m = other.mig_lower();
        if m <= 0.0 {
            return None;
        }
        let prec = self.prec.max(other.prec);
        let (mid, ulp) =
            settle(ctx(prec).div(self.mid.repr(), other.mid.repr()), prec);
        // |x/y - a/b| <= (ra + |a/b| rb) / (|b| - rb) for x in a±ra, y in b±rb.
        let q_mag = up_add(fb_mag(&mid), ulp);
        let rad = up_div(up_add(self.rad, up_mul(q_mag, other.rad)), m);
        Some(Self {
            mid,
            rad: up_add(rad, ulp),
            prec,
        })
    }

    /// Square root of a strictly positive ball.
    #[must_use]
    pub fn sqrt(&self) -> Option<Self> {
        if !self.is_strictly_positive() {
            return None;
        }
        let (mid, ulp) = settle(ctx(self.prec).sqrt(self.mid.repr()), self.prec);
        // d sqrt = 1/(2 sqrt), evaluated at the smallest point of the ball.
        let root_low = crate::round::dn_mul(self.mig_lower().sqrt(), 1.0 - 1e-15);
        let rad = up_div(self.rad, 2.0 * root_low);
        Some(Self {
            mid,
            rad: up_add(rad, ulp),
            prec: self.prec,
        })
    }

    /// Multiplies by an exact machine integer.
    #[must_use]
    pub fn mul_i64(&self, n: i64) -> Self {
        self.mul(&Self::from_i64(n, self.prec))
    }

    /// Divides by an exact machine integer. `n` must be non-zero.
    #[must_use]
    pub fn div_i64(&self, n: i64) -> Self {
        debug_assert!(n != 0);
        self.div(&Self::from_i64(n, self.prec))
            .unwrap_or_else(|| Self::from_i64(0, self.prec))
    }

    /// Multiplies by `2^k` (exact on the midpoint).
    #[must_use]
    pub fn ldexp(&self, k: i64) -> Self {
        let two = fb_int(2);
        let mut mid = self.mid.clone();
        if k >= 0 {
            for _ in 0..k {
                mid = mid * two.clone();
            }
        } else {
            for _ in 0..(-k) {
                mid = mid / two.clone();
            }
        }
        Self {
            mid,
            rad: up_mul(self.rad, pow2(k)),
            prec: self.prec,
        }
    }

    /// Re-clamps the ball to a new working precision.
    #[must_use]
    pub fn with_precision(&self, prec: usize) -> Self {
        let (mid, ulp) = clamp(self.mid.clone(), prec);
        Self {
            mid,
            rad: up_add(self.rad, ulp),
            prec,
        }
    }

    /// True when `other` lies entirely within this ball's interval
    /// interpreted with both radii (i.e. the enclosures intersect).
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        let d = self.sub(other);
        fb_mig(&d.mid) <= d.rad
    }

    /// True when the exact rational `q` is contained in the ball.
    #[must_use]
    pub fn contains_rbig(&self, q: &RBig) -> bool {
        let prec = self.prec + 64;
        let qf = Self::from_rbig(q, prec);
        let d = self.sub(&qf);
        fb_mag(&d.mid) <= up_add(d.rad, 0.0)
    }
}

impl std::fmt::Display for RealBall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} +/- {:.3e}]", self.mid_f64(), self.rad)
    }
}
