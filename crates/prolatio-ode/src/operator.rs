//! Differential operators with polynomial coefficients.
//!
//! An operator `L = Σ p_k(z) Dᵏ` is recentred at an expansion point `c`
//! by substituting `z = c + t` and rewriting in the Euler derivative
//! `θ = t d/dt`, using `Dᵏ = t⁻ᵏ θ(θ-1)⋯(θ-k+1)`. Multiplying by a power
//! of `t` clears negative exponents and yields the banded form
//! `t^{s₀} L = Σ_m t^m R_m(θ)`, whose action on `Σ a_n t^{α+n}` is the
//! finite recurrence `Σ_m R_m(α+n-m) a_{n-m} = 0`. `R_0` is the indicial
//! polynomial; its degree decides what kind of point `c` is.

use dashu::integer::{IBig, UBig};
use dashu::rational::RBig;
use num_complex::Complex64;

use crate::coeffs::{PathPoint, QiNum};
use crate::error::EvalError;
use crate::poly::QPoly;

/// A linear differential operator `Σ_{k=0}^{r} p_k(z) Dᵏ` with exact
/// Gaussian rational polynomial coefficients.
#[derive(Clone, Debug)]
pub struct DiffOp {
    /// `coeffs[k]` is `p_k`; the leading coefficient is non-zero.
    coeffs: Vec<QPoly>,
}

/// How an expansion point sits relative to the operator.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PointKind {
    /// The leading coefficient does not vanish: full Taylor basis.
    Ordinary,
    /// Leading coefficient vanishes but the indicial polynomial keeps
    /// full degree: Frobenius basis, possibly with logarithms.
    RegularSingular,
    /// The indicial polynomial drops degree: not handled.
    IrregularSingular,
}

impl DiffOp {
    /// Creates an operator from its coefficient polynomials, `coeffs[k]`
    /// multiplying the `k`-th derivative.
    ///
    /// # Errors
    ///
    /// Rejects operators of order zero or with a vanishing leading
    /// coefficient.
    pub fn new(mut coeffs: Vec<QPoly>) -> Result<Self, EvalError> {
        while coeffs.len() > 1 && coeffs.last().is_some_and(QPoly::is_zero) {
            coeffs.pop();
        }
        if coeffs.len() < 2 {
            return Err(EvalError::InvalidInput(
                "operator must have order at least one".into(),
            ));
        }
        if coeffs.last().is_some_and(QPoly::is_zero) {
            return Err(EvalError::InvalidInput(
                "leading coefficient must be non-zero".into(),
            ));
        }
        Ok(Self { coeffs })
    }

    /// The order `r` of the operator.
    #[must_use]
    pub fn order(&self) -> usize {
        self.coeffs.len() - 1
    }

    /// The coefficient polynomial of the `k`-th derivative.
    #[must_use]
    pub fn coeff(&self, k: usize) -> &QPoly {
        &self.coeffs[k]
    }

    /// The leading coefficient `p_r`.
    #[must_use]
    pub fn leading(&self) -> &QPoly {
        self.coeffs.last().expect("order is at least one")
    }

    /// True when the exact point `v` is a zero of the leading
    /// coefficient. This is an exact decision, not a numeric one.
    #[must_use]
    pub fn is_singular_vertex(&self, v: &PathPoint) -> bool {
        self.leading().eval(v).is_zero()
    }

    /// Numeric localisation of all singular points (roots of the leading
    /// coefficient), used for path-distance checks.
    #[must_use]
    pub fn singular_points(&self) -> Vec<Complex64> {
        durand_kerner(&poly_to_c64(self.leading()))
    }

    /// The θ-form of the operator recentred at `c`.
    #[must_use]
    pub fn theta_form(&self, c: &QiNum) -> ThetaForm {
        let shifted: Vec<QPoly> =
            self.coeffs.iter().map(|p| p.shift(c)).collect();

        let mut s0: i64 = 0;
        let mut top: i64 = 0;
        for (k, qk) in shifted.iter().enumerate() {
            for (j, coeff) in qk.coeffs().iter().enumerate() {
                if !coeff.is_zero() {
                    s0 = s0.max(k as i64 - j as i64);
                    top = top.max(j as i64 - k as i64);
                }
            }
        }

        let bandwidth = (s0 + top) as usize;
        let mut rpolys = vec![QPoly::zero(); bandwidth + 1];
        let ff = falling_factorials(self.order());
        for (k, qk) in shifted.iter().enumerate() {
            for (j, coeff) in qk.coeffs().iter().enumerate() {
                if coeff.is_zero() {
                    continue;
                }
                let m = (s0 + j as i64 - k as i64) as usize;
                rpolys[m] = rpolys[m].add(&ff[k].scale(coeff));
            }
        }
        ThetaForm { rpolys }
    }

    /// Classifies an expansion point.
    #[must_use]
    pub fn classify(&self, c: &QiNum) -> PointKind {
        if !self.leading().eval(c).is_zero() {
            return PointKind::Ordinary;
        }
        if self.theta_form(c).indicial().degree() == self.order() {
            PointKind::RegularSingular
        } else {
            PointKind::IrregularSingular
        }
    }
}

/// The recentred, banded form `t^{s₀} L = Σ_{m=0}^{M} t^m R_m(θ)`.
#[derive(Clone, Debug)]
pub struct ThetaForm {
    /// `rpolys[m]` is `R_m`; `rpolys[0]` is the indicial polynomial.
    rpolys: Vec<QPoly>,
}

impl ThetaForm {
    /// The indicial polynomial `R_0`.
    #[must_use]
    pub fn indicial(&self) -> &QPoly {
        &self.rpolys[0]
    }

    /// The band width `M`: coefficient `a_n` couples to `a_{n-1}` through
    /// `a_{n-M}`.
    #[must_use]
    pub fn bandwidth(&self) -> usize {
        self.rpolys.len() - 1
    }

    /// The recurrence polynomial `R_m`.
    #[must_use]
    pub fn rpoly(&self, m: usize) -> &QPoly {
        &self.rpolys[m]
    }
}

/// Falling factorial polynomials `[X]_0 ..= [X]_r`.
fn falling_factorials(r: usize) -> Vec<QPoly> {
    let mut ff = Vec::with_capacity(r + 1);
    ff.push(QPoly::one());
    for k in 0..r {
        let lin = QPoly::new(vec![
            QiNum::from_integer(-(k as i64)),
            QiNum::one(),
        ]);
        let next = ff[k].mul(&lin);
        ff.push(next);
    }
    ff
}

/// All exact Gaussian rational roots of `p` with multiplicities.
///
/// Roots are localised numerically, rationalized by continued fractions,
/// verified exactly and deflated. Returns `None` when some root is not a
/// Gaussian rational, which makes the corresponding expansion point
/// unsupported.
#[must_use]
pub fn rational_roots(p: &QPoly) -> Option<Vec<(QiNum, usize)>> {
    let mut work = p.clone();
    let mut out: Vec<(QiNum, usize)> = Vec::new();
    while work.degree() > 0 {
        let numeric = durand_kerner(&poly_to_c64(&work));
        let means = cluster_means(&numeric);
        let mut found = None;
        'search: for z in numeric.iter().chain(&means) {
            for cand in rational_candidates(*z) {
                if work.eval(&cand).is_zero() {
                    found = Some(cand);
                    break 'search;
                }
            }
        }
        let root = found?;
        let mut mult = 0;
        while work.degree() > 0 && work.eval(&root).is_zero() {
            work = work.deflate(&root);
            mult += 1;
        }
        out.push((root, mult));
    }
    Some(out)
}

fn poly_to_c64(p: &QPoly) -> Vec<Complex64> {
    p.coeffs().iter().map(QiNum::to_c64).collect()
}

/// Durand–Kerner simultaneous root iteration on f64 complexes.
///
/// Accuracy is heuristic; every consumer re-verifies exactly or keeps a
/// certified margin.
pub(crate) fn durand_kerner(poly: &[Complex64]) -> Vec<Complex64> {
    let n = poly.len() - 1;
    if n == 0 {
        return Vec::new();
    }
    let lead = poly[n];
    let monic: Vec<Complex64> = poly.iter().map(|c| c / lead).collect();
    let seed = Complex64::new(0.4, 0.9);
    let mut roots: Vec<Complex64> =
        (0..n).map(|k| seed.powu(k as u32 + 1)).collect();
    for _ in 0..500 {
        let mut worst = 0.0_f64;
        for i in 0..n {
            let mut val = Complex64::new(0.0, 0.0);
            for c in monic.iter().rev() {
                val = val * roots[i] + c;
            }
            let mut denom = Complex64::new(1.0, 0.0);
            for j in 0..n {
                if j != i {
                    denom *= roots[i] - roots[j];
                }
            }
            if denom.norm() == 0.0 {
                denom = Complex64::new(1e-12, 1e-12);
            }
            let step = val / denom;
            roots[i] -= step;
            worst = worst.max(step.norm());
        }
        if worst < 1e-14 {
            break;
        }
    }
    roots
}

/// Means of clusters of nearby root approximations.
///
/// At a root of multiplicity `m` the simultaneous iteration converges
/// only linearly and stalls at the f64 noise floor, leaving `m`
/// approximations scattered around the true root. The scatter is close
/// to symmetric, so the cluster mean recovers the accuracy the
/// individual approximations lack and rationalizes where they cannot.
fn cluster_means(roots: &[Complex64]) -> Vec<Complex64> {
    const CLUSTER_RADIUS: f64 = 1e-4;
    let mut used = vec![false; roots.len()];
    let mut out = Vec::new();
    for i in 0..roots.len() {
        if used[i] {
            continue;
        }
        let mut sum = roots[i];
        let mut n = 1.0_f64;
        for j in i + 1..roots.len() {
            if !used[j] && (roots[j] - roots[i]).norm() < CLUSTER_RADIUS {
                used[j] = true;
                sum += roots[j];
                n += 1.0;
            }
        }
        if n > 1.0 {
            out.push(sum / n);
        }
    }
    out
}

/// Candidate exact values near a numeric root.
fn rational_candidates(z: Complex64) -> Vec<QiNum> {
    let mut v = Vec::new();
    if let (Some(a), Some(b)) =
        (rationalize(z.re, 1 << 20), rationalize(z.im, 1 << 20))
    {
        v.push(QiNum::new(a, b));
    }
    if z.re.abs() < 1e15 && z.im.abs() < 1e15 {
        v.push(QiNum::new(
            RBig::from(z.re.round() as i64),
            RBig::from(z.im.round() as i64),
        ));
    }
    v
}

/// Best rational approximation `p/q` with `q` bounded, by continued
/// fractions; `None` when no convergent lands within tolerance.
fn rationalize(x: f64, max_den: u64) -> Option<RBig> {
    if !x.is_finite() || x.abs() > 1e18 {
        return None;
    }
    let tol = 1e-9 * x.abs().max(1.0);
    let neg = x < 0.0;
    let x0 = x.abs();
    let mut rest = x0;
    let (mut h0, mut k0, mut h1, mut k1) = (1i128, 0i128, x0.floor() as i128, 1i128);
    if (x0 - h1 as f64).abs() <= tol {
        return Some(signed_ratio(h1, 1, neg));
    }
    rest = rest - rest.floor();
    for _ in 0..48 {
        if rest < 1e-15 {
            break;
        }
        rest = 1.0 / rest;
        let a = rest.floor();
        if a > 1e18 {
            break;
        }
        let ai = a as i128;
        let h2 = ai * h1 + h0;
        let k2 = ai * k1 + k0;
        if k2 > i128::from(max_den) {
            break;
        }
        h0 = h1;
        k0 = k1;
        h1 = h2;
        k1 = k2;
        if (x0 - h1 as f64 / k1 as f64).abs() <= tol {
            return Some(signed_ratio(h1, k1, neg));
        }
        rest -= a;
    }
    None
}

fn signed_ratio(h: i128, k: i128, neg: bool) -> RBig {
    let num = if neg { -IBig::from(h) } else { IBig::from(h) };
    RBig::from_parts(num, UBig::from(k as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qp(cs: &[i64]) -> QPoly {
        QPoly::new(cs.iter().map(|&n| QiNum::from_integer(n)).collect())
    }

    /// y' = y as an operator: D - 1.
    fn exp_op() -> DiffOp {
        DiffOp::new(vec![qp(&[-1]), qp(&[1])]).unwrap()
    }

    /// θ² - 1 written in D: z²D² + zD - 1.
    fn euler_op() -> DiffOp {
        DiffOp::new(vec![qp(&[-1]), qp(&[0, 1]), qp(&[0, 0, 1])]).unwrap()
    }

    #[test]
    fn order_and_validation() {
        assert_eq!(exp_op().order(), 1);
        assert_eq!(euler_op().order(), 2);
        assert!(DiffOp::new(vec![qp(&[1])]).is_err());
        assert!(DiffOp::new(vec![qp(&[1]), QPoly::zero()]).is_err());
    }

    #[test]
    fn theta_form_of_exp_operator() {
        // t^1 (D - 1) = θ - t, so R_0 = X and R_1 = -1.
        let tf = exp_op().theta_form(&QiNum::zero());
        assert_eq!(tf.bandwidth(), 1);
        assert_eq!(tf.indicial(), &QPoly::x());
        assert_eq!(tf.rpoly(1), &qp(&[-1]));
    }

    #[test]
    fn theta_form_of_euler_operator() {
        // Already in θ form: R_0 = X² - 1, no band.
        let tf = euler_op().theta_form(&QiNum::zero());
        assert_eq!(tf.bandwidth(), 0);
        assert_eq!(tf.indicial(), &qp(&[-1, 0, 1]));
    }

    #[test]
    fn classification() {
        assert_eq!(exp_op().classify(&QiNum::zero()), PointKind::Ordinary);
        assert_eq!(
            euler_op().classify(&QiNum::zero()),
            PointKind::RegularSingular
        );
        assert_eq!(
            euler_op().classify(&QiNum::one()),
            PointKind::Ordinary
        );
        // z³y'' + y = 0 has an irregular singularity at 0.
        let irr = DiffOp::new(vec![qp(&[1]), QPoly::zero(), qp(&[0, 0, 0, 1])])
            .unwrap();
        assert_eq!(
            irr.classify(&QiNum::zero()),
            PointKind::IrregularSingular
        );
    }

    #[test]
    fn ordinary_indicial_has_roots_zero_to_r_minus_one() {
        let tf = euler_op().theta_form(&QiNum::from_integer(2));
        let ind = tf.indicial();
        assert_eq!(ind.degree(), 2);
        assert!(ind.eval(&QiNum::zero()).is_zero());
        assert!(ind.eval(&QiNum::one()).is_zero());
    }

    #[test]
    fn rational_roots_of_simple_polys() {
        // X² - 1.
        let roots = rational_roots(&qp(&[-1, 0, 1])).unwrap();
        assert_eq!(roots.len(), 2);
        assert!(roots.iter().any(|(r, m)| *m == 1 && r == &QiNum::one()));
        assert!(roots
            .iter()
            .any(|(r, m)| *m == 1 && r == &QiNum::from_integer(-1)));

        // (X - 1/2)² has a double rational root.
        let p = QPoly::new(vec![
            QiNum::from_ratio(1, 4),
            QiNum::from_integer(-1),
            QiNum::one(),
        ]);
        let roots = rational_roots(&p).unwrap();
        assert_eq!(roots, vec![(QiNum::from_ratio(1, 2), 2)]);
    }

    #[test]
    fn repeated_fractional_roots_are_recovered() {
        // (X - 1/2)²(X + 2) = X³ + X² - (7/4)X + 1/2. The numeric
        // localisation stalls near the double root; the exact machinery
        // must still pull out 1/2 with multiplicity two.
        let p = QPoly::new(vec![
            QiNum::from_ratio(1, 2),
            QiNum::from_ratio(-7, 4),
            QiNum::one(),
            QiNum::one(),
        ]);
        let roots = rational_roots(&p).unwrap();
        assert_eq!(roots.len(), 2);
        assert!(roots
            .iter()
            .any(|(r, m)| *m == 2 && r == &QiNum::from_ratio(1, 2)));
        assert!(roots
            .iter()
            .any(|(r, m)| *m == 1 && r == &QiNum::from_integer(-2)));
    }

    #[test]
    fn rational_roots_finds_gaussian_roots() {
        // X² + 1 = (X - i)(X + i).
        let roots = rational_roots(&qp(&[1, 0, 1])).unwrap();
        assert_eq!(roots.len(), 2);
        assert!(roots.iter().any(|(r, _)| r == &QiNum::i()));
    }

    #[test]
    fn irrational_roots_are_reported() {
        // X² - 2 has no rational roots.
        assert!(rational_roots(&qp(&[-2, 0, 1])).is_none());
    }

    #[test]
    fn singular_vertex_is_exact() {
        // Leading coefficient 4z - 1 vanishes exactly at 1/4.
        let op =
            DiffOp::new(vec![qp(&[4]), QPoly::zero(), qp(&[-1, 4])]).unwrap();
        assert!(op.is_singular_vertex(&QiNum::from_ratio(1, 4)));
        assert!(!op.is_singular_vertex(&QiNum::from_ratio(1, 5)));
        let pts = op.singular_points();
        assert_eq!(pts.len(), 1);
        assert!((pts[0].re - 0.25).abs() < 1e-10);
        assert!(pts[0].im.abs() < 1e-10);
    }
}
