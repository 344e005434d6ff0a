//! Exact Gaussian rational scalars and path vertices.
//!
//! Operator coefficients, path vertices and local exponents are all kept
//! exact: a `QiNum` is `re + im·i` with both components arbitrary-precision
//! rationals. Exactness here is what lets point classification and
//! singularity detection be decided, not estimated.

use dashu::integer::{IBig, UBig};
use dashu::rational::RBig;
use num_complex::Complex64;

use prolatio_ball::{ComplexBall, RealBall};

/// A Gaussian rational number `re + im·i`.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct QiNum {
    /// Real component.
    pub re: RBig,
    /// Imaginary component.
    pub im: RBig,
}

impl QiNum {
    /// Creates a Gaussian rational from its components.
    #[must_use]
    pub fn new(re: RBig, im: RBig) -> Self {
        Self { re, im }
    }

    /// The zero element.
    #[must_use]
    pub fn zero() -> Self {
        Self::default()
    }

    /// The one element.
    #[must_use]
    pub fn one() -> Self {
        Self::from_integer(1)
    }

    /// The imaginary unit.
    #[must_use]
    pub fn i() -> Self {
        Self::new(RBig::ZERO, RBig::ONE)
    }

    /// A machine integer as a Gaussian rational.
    #[must_use]
    pub fn from_integer(n: i64) -> Self {
        Self::new(RBig::from(n), RBig::ZERO)
    }

    /// A real fraction `num/den` as a Gaussian rational. `den` must be
    /// non-zero.
    #[must_use]
    pub fn from_ratio(num: i64, den: u64) -> Self {
        Self::new(
            RBig::from_parts(IBig::from(num), UBig::from(den)),
            RBig::ZERO,
        )
    }

    /// A real rational as a Gaussian rational.
    #[must_use]
    pub fn from_rbig(q: RBig) -> Self {
        Self::new(q, RBig::ZERO)
    }

    /// True when this is exactly zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.re == RBig::ZERO && self.im == RBig::ZERO
    }

    /// True when this is exactly one.
    #[must_use]
    pub fn is_one(&self) -> bool {
        self.re == RBig::ONE && self.im == RBig::ZERO
    }

    /// True when the imaginary component vanishes.
    #[must_use]
    pub fn is_real(&self) -> bool {
        self.im == RBig::ZERO
    }

    /// Complex conjugate.
    #[must_use]
    pub fn conj(&self) -> Self {
        Self::new(self.re.clone(), -self.im.clone())
    }

    /// The squared absolute value `re² + im²` (an exact rational).
    #[must_use]
    pub fn norm_sq(&self) -> RBig {
        self.re.clone() * self.re.clone() + self.im.clone() * self.im.clone()
    }

    /// Multiplicative inverse, `None` for zero.
    #[must_use]
    pub fn inv(&self) -> Option<Self> {
        if self.is_zero() {
            return None;
        }
        let n = self.norm_sq();
        Some(Self::new(
            self.re.clone() / n.clone(),
            -self.im.clone() / n,
        ))
    }

    /// Exact division, `None` when `other` is zero.
    #[must_use]
    pub fn field_div(&self, other: &Self) -> Option<Self> {
        Some(self.clone() * other.inv()?)
    }

    /// When `self - other` is a rational integer, returns it.
    ///
    /// This is the test that groups indicial exponents into cosets
    /// modulo ℤ.
    #[must_use]
    pub fn integer_difference(&self, other: &Self) -> Option<IBig> {
        if self.im != other.im {
            return None;
        }
        let d = self.re.clone() - other.re.clone();
        if d.denominator() == &UBig::ONE {
            Some(d.numerator().clone())
        } else {
            None
        }
    }

    /// A double-precision approximation, for localisation heuristics only.
    #[must_use]
    pub fn to_c64(&self) -> Complex64 {
        Complex64::new(rbig_to_f64(&self.re), rbig_to_f64(&self.im))
    }

    /// A certified enclosure at the given precision.
    #[must_use]
    pub fn to_ball(&self, prec: usize) -> ComplexBall {
        ComplexBall::from_rbig_pair(&self.re, &self.im, prec)
    }
}

/// Rounds an exact rational to the nearest f64 (no bound kept).
#[must_use]
pub fn rbig_to_f64(q: &RBig) -> f64 {
    RealBall::from_rbig(q, 64).mid_f64()
}

impl std::ops::Add for QiNum {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.re + rhs.re, self.im + rhs.im)
    }
}

impl std::ops::Sub for QiNum {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.re - rhs.re, self.im - rhs.im)
    }
}

impl std::ops::Mul for QiNum {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        let re = self.re.clone() * rhs.re.clone() - self.im.clone() * rhs.im.clone();
        let im = self.re * rhs.im + self.im * rhs.re;
        Self::new(re, im)
    }
}

impl std::ops::Neg for QiNum {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self::new(-self.re, -self.im)
    }
}

impl From<i64> for QiNum {
    fn from(value: i64) -> Self {
        Self::from_integer(value)
    }
}

impl std::fmt::Display for QiNum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.im == RBig::ZERO {
            write!(f, "{}", self.re)
        } else {
            write!(f, "{} + {}i", self.re, self.im)
        }
    }
}

/// An exact vertex of a continuation path.
///
/// Vertices are Gaussian rationals so that singularity detection on them
/// is an exact decision rather than a numeric guess.
pub type PathPoint = QiNum;

/// Convex interpolation `a + t (b - a)` for an exact parameter `t`.
#[must_use]
pub fn interpolate(a: &PathPoint, b: &PathPoint, t: &RBig) -> PathPoint {
    let tq = QiNum::from_rbig(t.clone());
    a.clone() + tq * (b.clone() - a.clone())
}
