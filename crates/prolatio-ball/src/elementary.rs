//! Certified elementary functions on real balls.
//!
//! dashu's own transcendentals return no error bound, so everything here
//! is computed from ball ring operations: argument reduction followed by a
//! power series whose truncation tail is bounded explicitly and added to
//! the radius. Each function therefore returns an enclosure of the exact
//! image of the input ball.
//!
//! Only the functions needed for Frobenius log-term evaluation are
//! provided: `pi`, `ln`, `exp`, `atan`, `atan2` and `sin_cos`.

use dashu::float::FBig;
use dashu::integer::{IBig, UBig};
use dashu::rational::RBig;

use crate::real::{fb_int, RealBall};
use crate::round::{dn_sub, pow2, up_div, up_mul};

/// A ball carrying no information (used where failure cannot be reported).
fn inf_ball(prec: usize) -> RealBall {
    let mut b = RealBall::zero(prec);
    b.add_error(f64::INFINITY);
    b
}

/// Sum of the odd power series `Σ x^{2i+1}/(2i+1)` (atanh) or its
/// alternating variant (atan), with a geometric tail bound.
///
/// Requires `|x| < 1` with some margin; returns `None` when the input is
/// too wide or the series fails to meet the precision target.
fn odd_series(x: &RealBall, alternating: bool) -> Option<RealBall> {
    let prec = x.precision();
    let xu = x.mag_upper();
    if xu >= 0.95 {
        return None;
    }
    let x2u = up_mul(xu, xu);
    let x2 = x.mul(x);
    let mut term = x.clone();
    let mut acc = RealBall::zero(prec);
    let thr = pow2(-(prec as i64) - 8);
    let cap = 8 * prec as i64 + 64;
    let mut i: i64 = 0;
    loop {
        let contrib = term.div_i64(2 * i + 1);
        acc = if alternating && i % 2 == 1 {
            acc.sub(&contrib)
        } else {
            acc.add(&contrib)
        };
        term = term.mul(&x2);
        i += 1;
        if term.mag_upper() < thr {
            break;
        }
        if i > cap {
            return None;
        }
    }
    // Remaining terms are dominated by term_mag * (1 + x² + x⁴ + ...).
    let tail = up_div(term.mag_upper(), dn_sub(1.0, x2u));
    acc.add_error(tail);
    Some(acc)
}

/// An enclosure of π at the given precision (Machin's formula).
#[must_use]
pub fn pi(prec: usize) -> RealBall {
    let p = prec + 16;
    let fifth = RealBall::from_rbig(
        &RBig::from_parts(IBig::from(1), UBig::from(5u8)),
        p,
    );
    let r239 = RealBall::from_rbig(
        &RBig::from_parts(IBig::from(1), UBig::from(239u16)),
        p,
    );
    let (a, b) = match (odd_series(&fifth, true), odd_series(&r239, true)) {
        (Some(a), Some(b)) => (a, b),
        _ => return inf_ball(prec),
    };
    a.mul_i64(16).sub(&b.mul_i64(4)).with_precision(prec)
}

/// `ln t` for an exact float `t` in `[1, 2]`, via `2 atanh((t-1)/(t+1))`.
fn ln_norm(t: FBig, prec: usize) -> Option<RealBall> {
    let tb = RealBall::from_fbig_exact(t, prec);
    let one = RealBall::one(prec);
    let u = tb.sub(&one).div(&tb.add(&one))?;
    if u.is_exact_zero() {
        return Some(RealBall::zero(prec));
    }
    Some(odd_series(&u, false)?.ldexp(1))
}

impl RealBall {
    /// Natural logarithm of a strictly positive ball.
    #[must_use]
    pub fn ln(&self) -> Option<RealBall> {
        if !self.is_strictly_positive() {
            return None;
        }
        let prec = self.precision() + 16;
        let two = fb_int(2);
        let one = fb_int(1);
        // Exact normalization of the midpoint into [1, 2).
        let mut t = self.midpoint().clone();
        let mut e: i64 = 0;
        let mut guard = 0u32;
        while t >= two {
            t = t / two.clone();
            e += 1;
            guard += 1;
            if guard > 1_000_000 {
                return None;
            }
        }
        while t < one {
            t = t * two.clone();
            e -= 1;
            guard += 1;
            if guard > 1_000_000 {
                return None;
            }
        }
        let mut r = ln_norm(t, prec)?;
        if e != 0 {
            let ln2 = ln_norm(two, prec)?;
            r = r.add(&ln2.mul_i64(e));
        }
        // |d ln| <= 1 / min |x| over the ball.
        r.add_error(up_div(self.radius(), self.mig_lower()));
        Some(r.with_precision(self.precision()))
    }

    /// Exponential of a ball.
    ///
    /// Returns `None` when the input is too wide or too large for the
    /// reduction, which callers treat as a precision failure.
    #[must_use]
    pub fn exp(&self) -> Option<RealBall> {
        let prec = self.precision() + 16;
        let mf = self.mid_f64();
        if !mf.is_finite() {
            return None;
        }
        let kf = (mf / std::f64::consts::LN_2).round();
        if kf.abs() > 1e5 {
            return None;
        }
        let k = kf as i64;
        let x = self.with_precision(prec);
        let w = if k != 0 {
            let two = fb_int(2);
            x.sub(&ln_norm(two, prec)?.mul_i64(k))
        } else {
            x
        };
        let wu = w.mag_upper();
        if wu >= 0.99 {
            return None;
        }
        let mut term = RealBall::one(prec);
        let mut acc = RealBall::one(prec);
        let thr = pow2(-(prec as i64) - 8);
        let cap = 8 * prec as i64 + 64;
        let mut i: i64 = 1;
        loop {
            term = term.mul(&w).div_i64(i);
            acc = acc.add(&term);
            if term.mag_upper() < thr {
                break;
            }
            i += 1;
            if i > cap {
                return None;
            }
        }
        let tail = up_div(up_mul(term.mag_upper(), wu), dn_sub(1.0, wu));
        acc.add_error(tail);
        Some(acc.ldexp(k).with_precision(self.precision()))
    }

    /// Arctangent of a ball, valid for any finite input.
    ///
    /// Three half-angle reductions bring the argument below `tan(π/16)`
    /// regardless of magnitude, then the alternating series applies.
    #[must_use]
    pub fn atan(&self) -> Option<RealBall> {
        let prec = self.precision() + 16;
        let one = RealBall::one(prec);
        let mut t = self.with_precision(prec);
        for _ in 0..3 {
            let s = one.add(&t.mul(&t)).sqrt()?;
            t = t.div(&s.add(&one))?;
        }
        Some(odd_series(&t, true)?.mul_i64(8).with_precision(self.precision()))
    }

    /// Simultaneous sine and cosine of a ball.
    #[must_use]
    pub fn sin_cos(&self) -> Option<(RealBall, RealBall)> {
        let mf = self.mid_f64();
        if !mf.is_finite() {
            return None;
        }
        let qf = (mf / std::f64::consts::FRAC_PI_2).round();
        if qf.abs() > 1e15 {
            return None;
        }
        let q = qf as i64;
        let qbits = 64 - q.unsigned_abs().leading_zeros() as usize;
        let prec = self.precision() + 16 + qbits;
        let y = if q != 0 {
            let half_pi = pi(prec).ldexp(-1);
            self.with_precision(prec).sub(&half_pi.mul_i64(q))
        } else {
            self.with_precision(prec)
        };
        if y.mag_upper() > 0.99 {
            return None;
        }
        let (s, c) = sin_cos_small(&y, prec)?;
        let (s, c) = match q.rem_euclid(4) {
            0 => (s, c),
            1 => (c, s.neg()),
            2 => (s.neg(), c.neg()),
            _ => (c.neg(), s),
        };
        Some((
            s.with_precision(self.precision()),
            c.with_precision(self.precision()),
        ))
    }
}

/// Sine and cosine series for `|y| < 1`.
fn sin_cos_small(y: &RealBall, prec: usize) -> Option<(RealBall, RealBall)> {
    let y2u = up_mul(y.mag_upper(), y.mag_upper());
    if y2u >= 0.99 {
        return None;
    }
    let y2 = y.mul(y);
    let mut tc = RealBall::one(prec);
    let mut ts = y.clone();
    let mut acc_c = tc.clone();
    let mut acc_s = ts.clone();
    let thr = pow2(-(prec as i64) - 8);
    let cap = 8 * prec as i64 + 64;
    let mut i: i64 = 1;
    loop {
        tc = tc.mul(&y2).div_i64((2 * i - 1) * (2 * i));
        ts = ts.mul(&y2).div_i64((2 * i) * (2 * i + 1));
        if i % 2 == 1 {
            acc_c = acc_c.sub(&tc);
            acc_s = acc_s.sub(&ts);
        } else {
            acc_c = acc_c.add(&tc);
            acc_s = acc_s.add(&ts);
        }
        if tc.mag_upper() < thr && ts.mag_upper() < thr {
            break;
        }
        i += 1;
        if i > cap {
            return None;
        }
    }
    let geo = dn_sub(1.0, y2u);
    acc_c.add_error(up_div(up_mul(tc.mag_upper(), y2u), geo));
    acc_s.add_error(up_div(up_mul(ts.mag_upper(), y2u), geo));
    Some((acc_s, acc_c))
}

/// Principal-branch argument of the point `(x, y)`: the angle in
/// `(-π, π]` of `x + iy`.
///
/// Returns `None` when the input balls straddle the branch cut or the
/// origin too widely to give a single enclosure.
#[must_use]
pub fn atan2(y: &RealBall, x: &RealBall) -> Option<RealBall> {
    let prec = y.precision().max(x.precision());
    if x.is_strictly_positive() {
        return y.div(x)?.atan();
    }
    if x.is_strictly_negative() {
        if y.is_exact_zero() {
            return Some(pi(prec));
        }
        if y.is_strictly_positive() {
            return Some(y.div(x)?.atan()?.add(&pi(prec)));
        }
        if y.is_strictly_negative() {
            return Some(y.div(x)?.atan()?.sub(&pi(prec)));
        }
        return None;
    }
    // x may contain zero: pivot on y instead.
    if y.is_strictly_positive() {
        return Some(pi(prec).ldexp(-1).sub(&x.div(y)?.atan()?));
    }
    if y.is_strictly_negative() {
        return Some(pi(prec).ldexp(-1).neg().sub(&x.div(y)?.atan()?));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(b: &RealBall, v: f64, tol: f64) {
        assert!(
            (b.mid_f64() - v).abs() < tol,
            "midpoint {} not within {} of {}",
            b.mid_f64(),
            tol,
            v
        );
        assert!(b.radius() < tol, "radius {} too wide", b.radius());
    }

    #[test]
    fn pi_matches_reference() {
        let p = pi(128);
        close(&p, std::f64::consts::PI, 1e-14);
        assert!(p.radius() < 1e-30);
    }

    #[test]
    fn ln_of_two() {
        let x = RealBall::from_i64(2, 128);
        let l = x.ln().unwrap();
        close(&l, std::f64::consts::LN_2, 1e-14);
    }

    #[test]
    fn ln_of_large_and_small() {
        let x = RealBall::from_i64(1024, 128);
        close(&x.ln().unwrap(), 1024f64.ln(), 1e-12);
        let y = RealBall::from_rbig(
            &RBig::from_parts(IBig::from(1), UBig::from(100u8)),
            128,
        );
        close(&y.ln().unwrap(), (0.01f64).ln(), 1e-12);
    }

    #[test]
    fn ln_rejects_nonpositive() {
        assert!(RealBall::from_i64(-3, 64).ln().is_none());
        assert!(RealBall::zero(64).ln().is_none());
    }

    #[test]
    fn exp_of_one_is_e() {
        let e = RealBall::one(128).exp().unwrap();
        close(&e, std::f64::consts::E, 1e-14);
    }

    #[test]
    fn exp_ln_round_trip() {
        let x = RealBall::from_i64(5, 160);
        let y = x.ln().unwrap().exp().unwrap();
        assert!(y.contains_rbig(&RBig::from(5)));
    }

    #[test]
    fn atan_of_one_is_quarter_pi() {
        let a = RealBall::one(128).atan().unwrap();
        close(&a, std::f64::consts::FRAC_PI_4, 1e-14);
    }

    #[test]
    fn atan_of_large_argument() {
        let a = RealBall::from_i64(1000, 128).atan().unwrap();
        close(&a, (1000f64).atan(), 1e-12);
    }

    #[test]
    fn sin_cos_at_known_points() {
        let (s, c) = RealBall::zero(128).sin_cos().unwrap();
        close(&s, 0.0, 1e-20);
        close(&c, 1.0, 1e-20);

        let one = RealBall::one(128);
        let (s1, c1) = one.sin_cos().unwrap();
        close(&s1, 1f64.sin(), 1e-14);
        close(&c1, 1f64.cos(), 1e-14);

        let big = RealBall::from_i64(100, 160);
        let (s2, c2) = big.sin_cos().unwrap();
        close(&s2, 100f64.sin(), 1e-12);
        close(&c2, 100f64.cos(), 1e-12);
    }

    #[test]
    fn atan2_quadrants() {
        let one = RealBall::one(128);
        let neg = one.neg();
        close(&atan2(&one, &one).unwrap(), std::f64::consts::FRAC_PI_4, 1e-13);
        close(
            &atan2(&one, &neg).unwrap(),
            3.0 * std::f64::consts::FRAC_PI_4,
            1e-13,
        );
        close(
            &atan2(&neg, &neg).unwrap(),
            -3.0 * std::f64::consts::FRAC_PI_4,
            1e-13,
        );
        close(
            &atan2(&RealBall::zero(128), &neg).unwrap(),
            std::f64::consts::PI,
            1e-13,
        );
        close(
            &atan2(&one, &RealBall::zero(128)).unwrap(),
            std::f64::consts::FRAC_PI_2,
            1e-13,
        );
    }
}
