//! Validated tail bounds for truncated local expansions.
//!
//! After computing coefficients `a_0 .. a_{N-1}` of a local solution, the
//! discarded tail must be bounded rigorously. The recurrence
//! `R_0(α+n) a_n = -Σ_{m≥1} R_m(α+n-m) a_{n-m}` is absolutized: with
//! envelopes `C_m ≥ sup_{n≥N} |R_m-action| / |R_0-action|` a ratio test
//! closes by induction, proving `|a_n| ≤ A βⁿ` for all `n ≥ N` from the
//! last computed window. All arithmetic here is f64 with outward
//! rounding; exactness lives upstream in the recurrence itself.
//!
//! The nilpotent log-coupling is absorbed by summing scaled derivative
//! magnitudes: `Σ_i |R^{(i)}(s)|/i!` is bounded by the absolute-value
//! polynomial of `R` evaluated at `|s|+1`, which also covers the block
//! action on every log column.

use prolatio_ball::round::{dn_mul, dn_sub, up_add, up_div, up_mul, up_pow};

use crate::coeffs::QiNum;
use crate::operator::ThetaForm;

/// Maximum admissible `β·|dz|`; beyond this the geometric tail converges
/// too slowly to certify.
pub const MAX_X: f64 = 0.75;

/// How many indices past the truncation are checked pointwise before the
/// asymptotic regime takes over.
const SCAN_SPAN: usize = 1024;

/// Why a tail could not be certified.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BoundFailure {
    /// More computed terms would help: the failure is near the
    /// truncation index.
    NeedLargerN,
    /// No admissible growth rate fits this step length; the step must be
    /// subdivided.
    StepTooLong,
}

/// The absolutized recurrence: everything the ratio test needs, reduced
/// to non-negative f64 data.
#[derive(Clone, Debug)]
pub struct RecAbs {
    /// `babs[m]` holds upper bounds on the absolute values of the
    /// coefficients of `R_m` shifted to `α` (ascending degrees).
    babs: Vec<Vec<f64>>,
    /// Lower bound on the leading coefficient of the indicial polynomial.
    lead_dn: f64,
    /// Upper bounds on `|ρ - α|` for every indicial root `ρ`, with
    /// multiplicity.
    root_dist: Vec<f64>,
}

impl RecAbs {
    /// Builds the absolutized recurrence for exponent `α` from the
    /// θ-form and the exact indicial roots.
    #[must_use]
    pub fn new(
        tf: &ThetaForm,
        alpha: &QiNum,
        roots: &[(QiNum, usize)],
    ) -> Self {
        let babs = (0..=tf.bandwidth())
            .map(|m| {
                tf.rpoly(m)
                    .shift(alpha)
                    .coeffs()
                    .iter()
                    .map(|c| c.to_ball(64).mag_upper())
                    .collect()
            })
            .collect();
        let lead_dn = tf
            .indicial()
            .leading_coeff()
            .to_ball(64)
            .mig_lower();
        let mut root_dist = Vec::new();
        for (rho, mult) in roots {
            let d = (rho.clone() - alpha.clone()).to_ball(64).mag_upper();
            for _ in 0..*mult {
                root_dist.push(d);
            }
        }
        Self {
            babs,
            lead_dn,
            root_dist,
        }
    }

    /// The recurrence band width `M`.
    #[must_use]
    pub fn bandwidth(&self) -> usize {
        self.babs.len() - 1
    }

    fn order(&self) -> usize {
        self.root_dist.len()
    }

    /// Upper bound on `Σ_i |R_m^{(i)}(α+ν)| / i!` for integer `ν ≥ 0`.
    fn envelope(&self, m: usize, nu: f64) -> f64 {
        eval_up(&self.babs[m], up_add(nu, 1.0))
    }

    /// Lower bound on the invertibility margin of the `R_0` block at
    /// `α+n`: `|R_0(α+n)| - Σ_{i≥1} |R_0^{(i)}(α+n)| / i!`.
    fn dlow(&self, n: f64) -> f64 {
        let mut prod = self.lead_dn;
        for d in &self.root_dist {
            let f = dn_sub(n, *d);
            if f <= 0.0 {
                return 0.0;
            }
            prod = dn_mul(prod, f);
        }
        // B(n+1) - B(n) ≤ B'(n+1) since B' has non-negative coefficients.
        let der: Vec<f64> = self.babs[0]
            .iter()
            .enumerate()
            .skip(1)
            .map(|(j, b)| up_mul(j as f64, *b))
            .collect();
        dn_sub(prod, eval_up(&der, up_add(n, 1.0)))
    }

    /// Start of the asymptotic regime: for `n` past this index,
    /// `dlow(n) ≥ 0.7 · lead · n^r` holds.
    fn asymptotic_start(&self) -> f64 {
        let r = self.order() as f64;
        let dmax = self
            .root_dist
            .iter()
            .fold(0.0_f64, |a, b| a.max(*b));
        let psi0p: f64 = self.babs[0]
            .iter()
            .enumerate()
            .skip(1)
            .fold(0.0, |a, (j, b)| up_add(a, up_mul(j as f64, *b)));
        let scale = (dmax + 1.0).max(psi0p / self.lead_dn).max(1.0);
        (8.0 * r * scale).ceil()
    }

    /// Upper bound on `sup_{n ≥ ncap} envelope(m, n-m) / dlow(n)`.
    fn asymptotic_ratio(&self, m: usize, ncap: f64) -> f64 {
        let r = self.order();
        let b = &self.babs[m];
        let b_top = b.get(r).copied().unwrap_or(0.0);
        let mut rest = 0.0;
        for (j, c) in b.iter().enumerate() {
            if j < r {
                rest = up_add(rest, *c);
            }
        }
        // envelope(m, n) ≤ (b_top + rest/ncap + slack for the +1 shift)·n^r.
        // The argument shift by one is absorbed by evaluating rest at
        // degree r-1 against (n+1) ≤ 2n for n ≥ 1.
        let shifted_top = up_mul(b_top, up_pow(1.0 + 1.0 / ncap, r));
        let num = up_add(shifted_top, up_div(up_mul(rest, up_pow(2.0, r)), ncap));
        up_div(num, dn_mul(0.7, self.lead_dn))
    }
}

/// Horner evaluation with upward rounding; coefficients and point are
/// non-negative.
fn eval_up(coeffs: &[f64], x: f64) -> f64 {
    let mut acc = 0.0;
    for c in coeffs.iter().rev() {
        acc = up_add(up_mul(acc, x), *c);
    }
    acc
}

/// A certified geometric bound on a series tail.
///
/// Guarantees `Σ_{n≥n0} |a_n| (n+c)^d |dz|^n ≤ series_tail(d, c)` for the
/// solution whose last computed coefficients produced the window.
#[derive(Clone, Copy, Debug)]
pub struct TailBound {
    /// `β·|dz|`, the certified geometric ratio at the step point.
    x: f64,
    /// `A·xⁿ⁰` where `|a_n| ≤ A βⁿ`: the scaled window amplitude.
    aprime: f64,
    /// Truncation index.
    n0: usize,
}

impl TailBound {
    /// Attempts to certify a tail for truncation index `n0`.
    ///
    /// `window[i]` must be an upper bound on `|a_{n0-M+i}|·|dz|^{n0-M+i}`
    /// (component-wise maximum over log columns), for `i` in `0..M`.
    ///
    /// # Errors
    ///
    /// `StepTooLong` when no admissible rate fits `|dz|`, `NeedLargerN`
    /// when extending the computed range would allow certification.
    pub fn certify(
        rec: &RecAbs,
        n0: usize,
        window: &[f64],
        dz_mag: f64,
    ) -> Result<Self, BoundFailure> {
        let m_band = rec.bandwidth();
        debug_assert_eq!(window.len(), m_band.max(1));
        if dz_mag == 0.0 {
            return Ok(Self {
                x: 0.0,
                aprime: 0.0,
                n0,
            });
        }
        let beta_max = MAX_X / dz_mag;
        let ncap = rec
            .asymptotic_start()
            .max((n0 + SCAN_SPAN) as f64);

        let mut beta = beta_max.min(1.0 / 64.0);
        let mut chosen = None;
        let mut saw_pointwise_failure = false;
        loop {
            match check_rate(rec, n0, ncap, beta) {
                RateCheck::Ok => {
                    chosen = Some(beta);
                    break;
                }
                RateCheck::PointwiseFail => saw_pointwise_failure = true,
                RateCheck::TailFail => {}
            }
            if beta >= beta_max {
                break;
            }
            beta = (beta * std::f64::consts::SQRT_2).min(beta_max);
        }
        let Some(beta) = chosen else {
            return Err(if saw_pointwise_failure {
                BoundFailure::NeedLargerN
            } else {
                BoundFailure::StepTooLong
            });
        };

        let x = up_mul(beta, dz_mag);
        if x > MAX_X {
            return Err(BoundFailure::StepTooLong);
        }
        // A' = max over the window of w_n · x^(n0-n).
        let mut aprime = 0.0_f64;
        for (i, w) in window.iter().enumerate() {
            let e = window.len() - i;
            aprime = aprime.max(up_mul(*w, up_pow(x, e)));
        }
        Ok(Self { x, aprime, n0 })
    }

    /// The certified geometric ratio at the step point.
    #[must_use]
    pub fn x(&self) -> f64 {
        self.x
    }

    /// Upper bound on `Σ_{n≥n0} |a_n| (n+c)^d |dz|^n`.
    ///
    /// `d` is the derivative order (each θ-derivative multiplies the
    /// coefficient by a factor of size at most `n+c`), `c` covers
    /// `|α| + log depth + d`.
    #[must_use]
    pub fn series_tail(&self, d: usize, c: f64) -> f64 {
        if self.aprime == 0.0 {
            return 0.0;
        }
        let nc = up_add(self.n0 as f64, c.max(0.0));
        let growth = up_add(1.0, up_div(1.0, nc));
        let xd = up_mul(self.x, up_pow(growth, d));
        if xd >= 1.0 {
            return f64::INFINITY;
        }
        up_div(
            up_mul(self.aprime, up_pow(nc, d)),
            dn_sub(1.0, xd),
        )
    }
}

enum RateCheck {
    Ok,
    PointwiseFail,
    TailFail,
}

fn check_rate(rec: &RecAbs, n0: usize, ncap: f64, beta: f64) -> RateCheck {
    let m_band = rec.bandwidth();
    let inv_beta = up_div(1.0, beta);

    // Asymptotic regime first: cheap, and failure there is a rate
    // problem rather than a truncation problem.
    let mut tail_sum = 0.0_f64;
    for m in 1..=m_band {
        tail_sum = up_add(
            tail_sum,
            up_mul(rec.asymptotic_ratio(m, ncap), up_pow(inv_beta, m)),
        );
    }
    if tail_sum > 0.5 {
        return RateCheck::TailFail;
    }

    // Pointwise scan over the pre-asymptotic range.
    let mut n = n0 as f64;
    while n <= ncap {
        let d = rec.dlow(n);
        if d <= 0.0 {
            return RateCheck::PointwiseFail;
        }
        let mut s = 0.0_f64;
        for m in 1..=m_band {
            let u = rec.envelope(m, n - m as f64);
            s = up_add(s, up_mul(u, up_pow(inv_beta, m)));
        }
        if up_div(s, d) > 0.5 {
            return RateCheck::PointwiseFail;
        }
        n += 1.0;
    }
    RateCheck::Ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::DiffOp;
    use crate::poly::QPoly;

    fn qp(cs: &[i64]) -> QPoly {
        QPoly::new(cs.iter().map(|&n| QiNum::from_integer(n)).collect())
    }

    fn rec_for(op: &DiffOp) -> RecAbs {
        let tf = op.theta_form(&QiNum::zero());
        let roots = crate::operator::rational_roots(tf.indicial()).unwrap();
        RecAbs::new(&tf, &QiNum::zero(), &roots)
    }

    #[test]
    fn exponential_tail_is_tiny() {
        // y' = y, coefficients 1/n!; truncate at N = 24, dz = 1/2.
        let op = DiffOp::new(vec![qp(&[-1]), qp(&[1])]).unwrap();
        let rec = rec_for(&op);
        let n0 = 24usize;
        // Window holds |a_23|·|dz|^23.
        let mut w = 1.0_f64;
        for k in 1..n0 {
            w = w * 0.5 / k as f64;
        }
        let tb = TailBound::certify(&rec, n0, &[w * 2.0], 0.5).unwrap();
        let tail = tb.series_tail(0, 0.0);
        assert!(tail > 0.0);
        assert!(tail < 1e-20, "tail {tail} too coarse");
        // The certified tail must dominate the true one.
        let truth: f64 = (n0..60)
            .map(|n| {
                let mut t = 1.0_f64;
                for k in 1..=n {
                    t = t * 0.5 / k as f64;
                }
                t
            })
            .sum();
        assert!(tail >= truth);
    }

    #[test]
    fn geometric_series_certifies_short_steps_only() {
        // (1-z) y' - y = 0, a_n = 1: radius of convergence 1.
        let op = DiffOp::new(vec![qp(&[-1]), qp(&[1, -1])]).unwrap();
        let rec = rec_for(&op);
        let n0 = 40usize;
        // Short step certifies.
        let dz: f64 = 0.05;
        let w = dz.powi(n0 as i32 - 1);
        let tb = TailBound::certify(&rec, n0, &[w], dz).unwrap();
        let tail = tb.series_tail(0, 0.0);
        let truth = dz.powi(n0 as i32) / (1.0 - dz);
        assert!(tail >= truth);
        assert!(tail < 1e-30);

        // A step past the singularity cannot certify at any rate.
        let err = TailBound::certify(&rec, n0, &[1.0], 1.5).unwrap_err();
        assert_eq!(err, BoundFailure::StepTooLong);
    }

    #[test]
    fn derivative_tails_grow_polynomially() {
        let op = DiffOp::new(vec![qp(&[-1]), qp(&[1])]).unwrap();
        let rec = rec_for(&op);
        let n0 = 24usize;
        let mut w = 1.0_f64;
        for k in 1..n0 {
            w = w * 0.5 / k as f64;
        }
        let tb = TailBound::certify(&rec, n0, &[w * 2.0], 0.5).unwrap();
        let t0 = tb.series_tail(0, 1.0);
        let t1 = tb.series_tail(1, 1.0);
        let t2 = tb.series_tail(2, 1.0);
        assert!(t0 < t1 && t1 < t2);
        assert!(t2 < 1e-15);
    }

    #[test]
    fn zero_window_gives_zero_tail() {
        let op = DiffOp::new(vec![qp(&[-1]), qp(&[1])]).unwrap();
        let rec = rec_for(&op);
        let tb = TailBound::certify(&rec, 24, &[0.0], 0.5).unwrap();
        assert_eq!(tb.series_tail(0, 0.0), 0.0);
        assert_eq!(tb.series_tail(3, 5.0), 0.0);
    }
}
