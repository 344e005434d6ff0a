//! Directed rounding helpers for f64 radius arithmetic.
//!
//! Radii are kept in f64. Every radius operation must produce an upper
//! bound of the exact result, so each native f64 operation (which rounds
//! to nearest, error at most half an ulp) is followed by a step to the
//! next representable float upward.

/// Returns the smallest f64 strictly greater than `x`.
///
/// Operates on the bit representation so it does not depend on a
/// particular toolchain version. `x` must be finite and non-negative,
/// which is an invariant of all radius values.
#[must_use]
pub fn bump(x: f64) -> f64 {
    debug_assert!(x >= 0.0 && x.is_finite() || x.is_infinite());
    if x.is_infinite() {
        return x;
    }
    f64::from_bits(x.to_bits() + 1)
}

/// Upper bound of `a + b` for non-negative finite operands.
///
/// A zero operand leaves the other one unchanged, so exact radii stay
/// exact through sums.
#[must_use]
pub fn up_add(a: f64, b: f64) -> f64 {
    if a == 0.0 {
        return b;
    }
    if b == 0.0 {
        return a;
    }
    bump(a + b)
}

/// Upper bound of `a * b` for non-negative operands.
#[must_use]
pub fn up_mul(a: f64, b: f64) -> f64 {
    if a == 0.0 || b == 0.0 {
        return 0.0;
    }
    bump(a * b)
}

/// Upper bound of `a / b` for non-negative `a` and positive `b`.
#[must_use]
pub fn up_div(a: f64, b: f64) -> f64 {
    if a == 0.0 {
        return 0.0;
    }
    bump(a / b)
}

/// Lower bound of `a - b`; clamped at zero.
#[must_use]
pub fn dn_sub(a: f64, b: f64) -> f64 {
    if b == 0.0 {
        return a.max(0.0);
    }
    let d = a - b;
    if d <= 0.0 {
        return 0.0;
    }
    // One step down covers the half-ulp rounding of the subtraction.
    f64::from_bits(d.to_bits() - 1)
}

/// Lower bound of `a * b` for non-negative operands.
#[must_use]
pub fn dn_mul(a: f64, b: f64) -> f64 {
    let p = a * b;
    if p <= 0.0 {
        return 0.0;
    }
    f64::from_bits(p.to_bits() - 1)
}

/// Lower bound of `a / b` for non-negative `a` and positive `b`.
#[must_use]
pub fn dn_div(a: f64, b: f64) -> f64 {
    let q = a / b;
    if q <= 0.0 {
        return 0.0;
    }
    f64::from_bits(q.to_bits() - 1)
}

/// Upper bound of `x^n` for non-negative `x`.
#[must_use]
pub fn up_pow(x: f64, n: usize) -> f64 {
    let mut acc = 1.0_f64;
    for _ in 0..n {
        acc = up_mul(acc, x);
    }
    acc
}

/// Lower bound of `sqrt(x)`; two downward steps cover the rounding of
/// the square root and of the argument.
#[must_use]
pub fn dn_sqrt(x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    let s = x.sqrt();
    if s.to_bits() <= 2 {
        return 0.0;
    }
    f64::from_bits(s.to_bits() - 2)
}

/// Upper bound of `sqrt(x)` for non-negative `x`.
#[must_use]
pub fn up_sqrt(x: f64) -> f64 {
    if x == 0.0 {
        return 0.0;
    }
    bump(x.sqrt())
}

/// Upper bound of `hypot(a, b)`.
#[must_use]
pub fn up_hypot(a: f64, b: f64) -> f64 {
    up_sqrt(up_add(up_mul(a, a), up_mul(b, b)))
}

/// `2^e` as an f64 upper bound, clamped away from underflow.
///
/// For very negative `e` the true value is below the subnormal range;
/// returning the smallest positive subnormal keeps the bound valid.
#[must_use]
pub fn pow2(e: i64) -> f64 {
    if e < -1070 {
        return f64::MIN_POSITIVE * f64::EPSILON; // smallest subnormal
    }
    if e > 1020 {
        return f64::INFINITY;
    }
    (2.0_f64).powi(e as i32)
}
