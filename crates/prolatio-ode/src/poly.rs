//! Dense univariate polynomials over the Gaussian rationals.
//!
//! Coefficients are stored in ascending degree order. Degrees stay small
//! (operator orders and coefficient degrees), so schoolbook multiplication
//! is used throughout.

use prolatio_ball::ComplexBall;

use crate::coeffs::QiNum;

/// A dense univariate polynomial with exact Gaussian rational
/// coefficients.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct QPoly {
    /// Coefficients in ascending degree order.
    coeffs: Vec<QiNum>,
}

impl QPoly {
    /// Creates a new polynomial from coefficients, dropping trailing
    /// zeros.
    #[must_use]
    pub fn new(mut coeffs: Vec<QiNum>) -> Self {
        while coeffs.len() > 1 && coeffs.last().is_some_and(QiNum::is_zero) {
            coeffs.pop();
        }
        if coeffs.is_empty() {
            coeffs.push(QiNum::zero());
        }
        Self { coeffs }
    }

    /// The zero polynomial.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            coeffs: vec![QiNum::zero()],
        }
    }

    /// The constant polynomial 1.
    #[must_use]
    pub fn one() -> Self {
        Self {
            coeffs: vec![QiNum::one()],
        }
    }

    /// A constant polynomial.
    #[must_use]
    pub fn constant(c: QiNum) -> Self {
        Self::new(vec![c])
    }

    /// The polynomial `x`.
    #[must_use]
    pub fn x() -> Self {
        Self::new(vec![QiNum::zero(), QiNum::one()])
    }

    /// The monomial `c·x^n`.
    #[must_use]
    pub fn monomial(c: QiNum, n: usize) -> Self {
        let mut coeffs = vec![QiNum::zero(); n + 1];
        coeffs[n] = c;
        Self::new(coeffs)
    }

    /// The degree (zero for the zero polynomial).
    #[must_use]
    pub fn degree(&self) -> usize {
        self.coeffs.len() - 1
    }

    /// True for the zero polynomial.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.coeffs.len() == 1 && self.coeffs[0].is_zero()
    }

    /// The leading coefficient.
    #[must_use]
    pub fn leading_coeff(&self) -> &QiNum {
        self.coeffs.last().expect("coeffs is never empty")
    }

    /// The coefficient of `x^i`.
    #[must_use]
    pub fn coeff(&self, i: usize) -> QiNum {
        self.coeffs.get(i).cloned().unwrap_or_else(QiNum::zero)
    }

    /// All coefficients in ascending degree order.
    #[must_use]
    pub fn coeffs(&self) -> &[QiNum] {
        &self.coeffs
    }

    /// Horner evaluation at an exact point.
    #[must_use]
    pub fn eval(&self, x: &QiNum) -> QiNum {
        let mut result = QiNum::zero();
        for c in self.coeffs.iter().rev() {
            result = result * x.clone() + c.clone();
        }
        result
    }

    /// Horner evaluation at a complex ball.
    #[must_use]
    pub fn eval_ball(&self, x: &ComplexBall) -> ComplexBall {
        let prec = x.precision();
        let mut result = ComplexBall::zero(prec);
        for c in self.coeffs.iter().rev() {
            result = result.mul(x).add(&c.to_ball(prec));
        }
        result
    }

    /// Sum.
    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        let len = self.coeffs.len().max(other.coeffs.len());
        let mut result = Vec::with_capacity(len);
        for i in 0..len {
            result.push(self.coeff(i) + other.coeff(i));
        }
        Self::new(result)
    }

    /// Negation.
    #[must_use]
    pub fn neg(&self) -> Self {
        Self::new(self.coeffs.iter().map(|c| -c.clone()).collect())
    }

    /// Difference.
    #[must_use]
    pub fn sub(&self, other: &Self) -> Self {
        self.add(&other.neg())
    }

    /// Schoolbook product.
    #[must_use]
    pub fn mul(&self, other: &Self) -> Self {
        if self.is_zero() || other.is_zero() {
            return Self::zero();
        }
        let mut result =
            vec![QiNum::zero(); self.coeffs.len() + other.coeffs.len() - 1];
        for (i, a) in self.coeffs.iter().enumerate() {
            for (j, b) in other.coeffs.iter().enumerate() {
                result[i + j] =
                    result[i + j].clone() + a.clone() * b.clone();
            }
        }
        Self::new(result)
    }

    /// Product with a scalar.
    #[must_use]
    pub fn scale(&self, s: &QiNum) -> Self {
        Self::new(self.coeffs.iter().map(|c| c.clone() * s.clone()).collect())
    }

    /// Formal derivative.
    #[must_use]
    pub fn derivative(&self) -> Self {
        if self.coeffs.len() == 1 {
            return Self::zero();
        }
        let coeffs = self
            .coeffs
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, c)| c.clone() * QiNum::from_integer(i as i64))
            .collect();
        Self::new(coeffs)
    }

    /// Taylor shift: the polynomial `q(t) = p(c + t)`.
    ///
    /// The coefficients of the result are `p⁽ⁱ⁾(c)/i!`, which is how the
    /// recurrence extracts scaled derivatives of the indicial polynomial.
    #[must_use]
    pub fn shift(&self, c: &QiNum) -> Self {
        // Horner in (t + c): fold from the top coefficient down.
        let lin = Self::new(vec![c.clone(), QiNum::one()]);
        let mut result = Self::zero();
        for coeff in self.coeffs.iter().rev() {
            result = result.mul(&lin).add(&Self::constant(coeff.clone()));
        }
        result
    }

    /// Exact division by a monic linear factor `x - r`.
    ///
    /// `r` must be an exact root; the remainder is asserted to vanish.
    #[must_use]
    pub fn deflate(&self, r: &QiNum) -> Self {
        let n = self.coeffs.len();
        if n == 1 {
            return Self::zero();
        }
        let mut quotient = vec![QiNum::zero(); n - 1];
        let mut carry = QiNum::zero();
        for i in (0..n).rev() {
            let v = self.coeffs[i].clone() + carry.clone() * r.clone();
            if i == 0 {
                debug_assert!(v.is_zero(), "deflation by a non-root");
            } else {
                quotient[i - 1] = v.clone();
                carry = v;
            }
        }
        Self::new(quotient)
    }
}

impl std::fmt::Display for QPoly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (i, c) in self.coeffs.iter().enumerate() {
            if c.is_zero() && self.coeffs.len() > 1 {
                continue;
            }
            if !first {
                write!(f, " + ")?;
            }
            first = false;
            match i {
                0 => write!(f, "{c}")?,
                1 => write!(f, "({c})*x")?,
                _ => write!(f, "({c})*x^{i}")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qp(cs: &[i64]) -> QPoly {
        QPoly::new(cs.iter().map(|&n| QiNum::from_integer(n)).collect())
    }

    #[test]
    fn normalization_drops_trailing_zeros() {
        let p = QPoly::new(vec![
            QiNum::one(),
            QiNum::zero(),
            QiNum::zero(),
        ]);
        assert_eq!(p.degree(), 0);
        assert!(!p.is_zero());
    }

    #[test]
    fn arithmetic_matches_hand_computation() {
        let p = qp(&[1, 2]); // 1 + 2x
        let q = qp(&[3, 0, 1]); // 3 + x²
        assert_eq!(p.add(&q), qp(&[4, 2, 1]));
        assert_eq!(p.mul(&q), qp(&[3, 6, 1, 2]));
        assert_eq!(q.sub(&p), qp(&[2, -2, 1]));
    }

    #[test]
    fn eval_by_horner() {
        let p = qp(&[1, -3, 2]); // 1 - 3x + 2x²
        assert_eq!(p.eval(&QiNum::from_integer(2)), QiNum::from_integer(3));
        assert_eq!(p.eval(&QiNum::from_integer(1)), QiNum::zero());
    }

    #[test]
    fn derivative_of_cubic() {
        let p = qp(&[5, 0, 0, 2]); // 5 + 2x³
        assert_eq!(p.derivative(), qp(&[0, 0, 6]));
    }

    #[test]
    fn shift_gives_taylor_coefficients() {
        // p(x) = x², p(3 + t) = 9 + 6t + t².
        let p = qp(&[0, 0, 1]);
        let s = p.shift(&QiNum::from_integer(3));
        assert_eq!(s, qp(&[9, 6, 1]));
    }

    #[test]
    fn shift_then_unshift_is_identity() {
        let p = qp(&[2, -1, 0, 4]);
        let c = QiNum::from_integer(7);
        assert_eq!(p.shift(&c).shift(&(-c)), p);
    }

    #[test]
    fn deflate_removes_a_root() {
        // (x - 2)(x + 5) = x² + 3x - 10.
        let p = qp(&[-10, 3, 1]);
        assert_eq!(p.deflate(&QiNum::from_integer(2)), qp(&[5, 1]));
    }

    #[test]
    fn eval_ball_encloses_exact_value() {
        let p = qp(&[1, 1, 1]);
        let x = QiNum::from_ratio(1, 3);
        let exact = p.eval(&x);
        let ball = p.eval_ball(&x.to_ball(96));
        assert!(ball.contains_rbig_pair(&exact.re, &exact.im));
    }
}
