//! Complex balls: rectangular enclosures built from two real balls.
//!
//! A `ComplexBall` encloses every complex number whose real part lies in
//! the real-component ball and imaginary part in the imaginary-component
//! ball. Magnitude bounds combine the component bounds by directed-rounded
//! hypotenuses, so they remain valid for every enclosed point.

use dashu::rational::RBig;

use crate::elementary::{atan2, pi};
use crate::real::RealBall;
use crate::round::{dn_mul, dn_sqrt, up_hypot};

/// A complex number known to lie within a rectangle `re ± r1, im ± r2`.
#[derive(Clone, Debug)]
pub struct ComplexBall {
    re: RealBall,
    im: RealBall,
}

impl ComplexBall {
    /// The exact zero ball.
    #[must_use]
    pub fn zero(prec: usize) -> Self {
        Self {
            re: RealBall::zero(prec),
            im: RealBall::zero(prec),
        }
    }

    /// The exact one ball.
    #[must_use]
    pub fn one(prec: usize) -> Self {
        Self {
            re: RealBall::one(prec),
            im: RealBall::zero(prec),
        }
    }

    /// The imaginary unit.
    #[must_use]
    pub fn i(prec: usize) -> Self {
        Self {
            re: RealBall::zero(prec),
            im: RealBall::one(prec),
        }
    }

    /// Builds a ball from its real and imaginary components.
    #[must_use]
    pub fn from_parts(re: RealBall, im: RealBall) -> Self {
        Self { re, im }
    }

    /// A real integer as a complex ball.
    #[must_use]
    pub fn from_i64(n: i64, prec: usize) -> Self {
        Self {
            re: RealBall::from_i64(n, prec),
            im: RealBall::zero(prec),
        }
    }

    /// An exact Gaussian rational `a + bi` as a complex ball.
    #[must_use]
    pub fn from_rbig_pair(a: &RBig, b: &RBig, prec: usize) -> Self {
        Self {
            re: RealBall::from_rbig(a, prec),
            im: RealBall::from_rbig(b, prec),
        }
    }

    /// A real ball as a complex ball.
    #[must_use]
    pub fn from_real(re: RealBall) -> Self {
        let prec = re.precision();
        Self {
            re,
            im: RealBall::zero(prec),
        }
    }

    /// The real component.
    #[must_use]
    pub fn re(&self) -> &RealBall {
        &self.re
    }

    /// The imaginary component.
    #[must_use]
    pub fn im(&self) -> &RealBall {
        &self.im
    }

    /// The working precision in bits.
    #[must_use]
    pub fn precision(&self) -> usize {
        self.re.precision().max(self.im.precision())
    }

    /// Upper bound on `|z|` over the ball.
    #[must_use]
    pub fn mag_upper(&self) -> f64 {
        up_hypot(self.re.mag_upper(), self.im.mag_upper())
    }

    /// Lower bound on `|z|` over the ball (zero when the ball may
    /// contain the origin).
    #[must_use]
    pub fn mig_lower(&self) -> f64 {
        let a = self.re.mig_lower();
        let b = self.im.mig_lower();
        let h2 = dn_mul(a, a) + dn_mul(b, b);
        dn_sqrt(h2)
    }

    /// Upper bound on the enclosure radius (diagonal of the rectangle).
    #[must_use]
    pub fn rad_upper(&self) -> f64 {
        up_hypot(self.re.radius(), self.im.radius())
    }

    /// True when the ball is exactly zero.
    #[must_use]
    pub fn is_exact_zero(&self) -> bool {
        self.re.is_exact_zero() && self.im.is_exact_zero()
    }

    /// True when the ball may contain the origin.
    #[must_use]
    pub fn contains_zero(&self) -> bool {
        self.re.contains_zero() && self.im.contains_zero()
    }

    /// Widens both components by an extra error term.
    pub fn add_error(&mut self, e: f64) {
        self.re.add_error(e);
        self.im.add_error(e);
    }

    /// Sum.
    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        Self {
            re: self.re.add(&other.re),
            im: self.im.add(&other.im),
        }
    }

    /// Difference.
    #[must_use]
    pub fn sub(&self, other: &Self) -> Self {
        Self {
            re: self.re.sub(&other.re),
            im: self.im.sub(&other.im),
        }
    }

    /// Negation (exact).
    #[must_use]
    pub fn neg(&self) -> Self {
        Self {
            re: self.re.neg(),
            im: self.im.neg(),
        }
    }

    /// Complex conjugate (exact).
    #[must_use]
    pub fn conj(&self) -> Self {
        Self {
            re: self.re.clone(),
            im: self.im.neg(),
        }
    }

    /// Product.
    #[must_use]
    pub fn mul(&self, other: &Self) -> Self {
        let re = self.re.mul(&other.re).sub(&self.im.mul(&other.im));
        let im = self.re.mul(&other.im).add(&self.im.mul(&other.re));
        Self { re, im }
    }

    /// Product with a real ball.
    #[must_use]
    pub fn mul_real(&self, s: &RealBall) -> Self {
        Self {
            re: self.re.mul(s),
            im: self.im.mul(s),
        }
    }

    /// Product with an exact machine integer.
    #[must_use]
    pub fn mul_i64(&self, n: i64) -> Self {
        Self {
            re: self.re.mul_i64(n),
            im: self.im.mul_i64(n),
        }
    }

    /// Quotient by an exact non-zero machine integer.
    #[must_use]
    pub fn div_i64(&self, n: i64) -> Self {
        Self {
            re: self.re.div_i64(n),
            im: self.im.div_i64(n),
        }
    }

    /// Multiplies by `2^k` (exact on midpoints).
    #[must_use]
    pub fn ldexp(&self, k: i64) -> Self {
        Self {
            re: self.re.ldexp(k),
            im: self.im.ldexp(k),
        }
    }

    /// The squared absolute value as a real ball.
    #[must_use]
    pub fn abs_sq(&self) -> RealBall {
        self.re.mul(&self.re).add(&self.im.mul(&self.im))
    }

    /// Multiplicative inverse.
    ///
    /// Returns `None` when the ball may contain the origin.
    #[must_use]
    pub fn inv(&self) -> Option<Self> {
        let n = self.abs_sq();
        if !n.is_strictly_positive() {
            return None;
        }
        let c = self.conj();
        Some(Self {
            re: c.re.div(&n)?,
            im: c.im.div(&n)?,
        })
    }

    /// Quotient of two balls.
    ///
    /// Returns `None` when the divisor ball may contain the origin.
    #[must_use]
    pub fn div(&self, other: &Self) -> Option<Self> {
        Some(self.mul(&other.inv()?))
    }

    /// Integer power by binary exponentiation. Negative exponents invert
    /// first and return `None` when the base may contain the origin.
    #[must_use]
    pub fn powi(&self, n: i64) -> Option<Self> {
        let prec = self.precision();
        if n == 0 {
            return Some(Self::one(prec));
        }
        let base = if n < 0 { self.inv()? } else { self.clone() };
        let mut e = n.unsigned_abs();
        let mut acc = Self::one(prec);
        let mut sq = base;
        loop {
            if e & 1 == 1 {
                acc = acc.mul(&sq);
            }
            e >>= 1;
            if e == 0 {
                break;
            }
            sq = sq.mul(&sq);
        }
        Some(acc)
    }

    /// Principal-branch natural logarithm: `ln|z| + i arg(z)` with the
    /// argument in `(-π, π]`.
    ///
    /// Returns `None` when the ball may contain the origin or straddles
    /// the branch cut.
    #[must_use]
    pub fn ln(&self) -> Option<Self> {
        let re = self.abs_sq().ln()?.ldexp(-1);
        let im = atan2(&self.im, &self.re)?;
        Some(Self { re, im })
    }

    /// Complex exponential.
    #[must_use]
    pub fn exp(&self) -> Option<Self> {
        let r = self.re.exp()?;
        let (s, c) = self.im.sin_cos()?;
        Some(Self {
            re: r.mul(&c),
            im: r.mul(&s),
        })
    }

    /// Principal-branch rational power `z^(p/q)`.
    ///
    /// Integer exponents take the exact binary-exponentiation path, which
    /// also works across branch cuts; fractional exponents go through the
    /// principal logarithm.
    #[must_use]
    pub fn pow_rbig(&self, a: &RBig) -> Option<Self> {
        if a == &RBig::ZERO {
            return Some(Self::one(self.precision()));
        }
        if a.denominator() == &dashu::integer::UBig::ONE {
            let n = i64::try_from(a.numerator().clone()).ok()?;
            return self.powi(n);
        }
        let prec = self.precision();
        let af = RealBall::from_rbig(a, prec + 16);
        self.ln()?.mul_real(&af).exp()
    }

    /// Re-clamps both components to a new working precision.
    #[must_use]
    pub fn with_precision(&self, prec: usize) -> Self {
        Self {
            re: self.re.with_precision(prec),
            im: self.im.with_precision(prec),
        }
    }

    /// True when the exact Gaussian rational `a + bi` is contained in
    /// the ball.
    #[must_use]
    pub fn contains_rbig_pair(&self, a: &RBig, b: &RBig) -> bool {
        self.re.contains_rbig(a) && self.im.contains_rbig(b)
    }
}

impl std::fmt::Display for ComplexBall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} + {}i)", self.re, self.im)
    }
}

/// An enclosure of `iπ` at the given precision, used by argument and
/// branch computations.
#[must_use]
pub fn i_pi(prec: usize) -> ComplexBall {
    ComplexBall::from_parts(RealBall::zero(prec), pi(prec))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashu::integer::{IBig, UBig};

    fn rb(n: i64, d: u64) -> RBig {
        RBig::from_parts(IBig::from(n), UBig::from(d))
    }

    #[test]
    fn i_squared_is_minus_one() {
        let i = ComplexBall::i(64);
        let m = i.mul(&i);
        assert!(m.contains_rbig_pair(&rb(-1, 1), &rb(0, 1)));
        assert_eq!(m.rad_upper(), 0.0);
    }

    #[test]
    fn division_round_trip() {
        let z = ComplexBall::from_rbig_pair(&rb(3, 1), &rb(4, 1), 128);
        let w = ComplexBall::from_rbig_pair(&rb(1, 2), &rb(-1, 3), 128);
        let q = z.div(&w).unwrap();
        let back = q.mul(&w);
        assert!(back.contains_rbig_pair(&rb(3, 1), &rb(4, 1)));
    }

    #[test]
    fn division_by_origin_ball_fails() {
        let z = ComplexBall::one(64);
        let mut w = ComplexBall::zero(64);
        w.add_error(1e-4);
        assert!(z.div(&w).is_none());
    }

    #[test]
    fn powi_matches_repeated_multiplication() {
        let z = ComplexBall::from_rbig_pair(&rb(1, 1), &rb(1, 1), 128);
        let p = z.powi(4).unwrap();
        // (1+i)^4 = -4.
        assert!(p.contains_rbig_pair(&rb(-4, 1), &rb(0, 1)));
        let n = z.powi(-2).unwrap();
        // (1+i)^-2 = -i/2.
        assert!(n.contains_rbig_pair(&rb(0, 1), &rb(-1, 2)));
    }

    #[test]
    fn ln_of_minus_one_is_i_pi() {
        let z = ComplexBall::from_i64(-1, 128);
        let l = z.ln().unwrap();
        assert!(l.re().mag_upper() < 1e-30);
        assert!((l.im().mid_f64() - std::f64::consts::PI).abs() < 1e-14);
    }

    #[test]
    fn exp_ln_round_trip() {
        let z = ComplexBall::from_rbig_pair(&rb(2, 1), &rb(1, 1), 160);
        let w = z.ln().unwrap().exp().unwrap();
        assert!(w.contains_rbig_pair(&rb(2, 1), &rb(1, 1)));
    }

    #[test]
    fn square_root_of_four_is_two() {
        let z = ComplexBall::from_i64(4, 160);
        let s = z.pow_rbig(&rb(1, 2)).unwrap();
        assert!(s.contains_rbig_pair(&rb(2, 1), &rb(0, 1)));
    }

    #[test]
    fn rational_power_of_i() {
        // i^(1/2) = (1+i)/sqrt(2); check |.| = 1 and angle π/4.
        let z = ComplexBall::i(160);
        let s = z.pow_rbig(&rb(1, 2)).unwrap();
        let a2 = s.abs_sq();
        assert!(a2.contains_rbig(&rb(1, 1)));
        assert!((s.re().mid_f64() - s.im().mid_f64()).abs() < 1e-20);
    }
}
