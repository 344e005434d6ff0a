//! Canonical local solution bases.
//!
//! At an expansion point the solution space has a canonical basis indexed
//! by the indicial roots: Taylor solutions with unit derivative jets at an
//! ordinary point, Frobenius solutions `t^{α+n} lnᵏ(t)/k! · (1 + …)` at a
//! regular singular point. Roots differing by integers share an exponent
//! group; within a group the log structure is handled by running the
//! recurrence on vectors of log-column coefficients, on which θ acts as
//! `(α+n)·I + N` with `N` the column shift.
//!
//! The recurrence itself is exact (Gaussian rational polynomial data
//! evaluated at integers), so structural zeros at resonant offsets are
//! exact zeros and spurious logarithms cannot appear from rounding.
//! Coefficients are then materialised as complex balls at the working
//! precision, and truncation tails are certified by [`TailBound`].

use dashu::integer::IBig;
use dashu::rational::RBig;
use smallvec::SmallVec;
use rustc_hash::FxHashMap;

use prolatio_ball::round::{up_add, up_div, up_mul, up_pow};
use prolatio_ball::ComplexBall;

use crate::bounds::{BoundFailure, RecAbs, TailBound};
use crate::coeffs::QiNum;
use crate::error::EvalError;
use crate::operator::{rational_roots, DiffOp, PointKind, ThetaForm};

/// Coefficient vector over log columns; almost always a single column.
pub type LogVec = SmallVec<[ComplexBall; 2]>;

/// Hard ceiling on the number of computed series terms per element.
const MAX_TERMS: usize = 1 << 14;

/// A coset of indicial roots modulo ℤ.
#[derive(Clone, Debug)]
pub struct ExponentGroup {
    /// The smallest exponent of the group.
    pub alpha: QiNum,
    /// `(offset, multiplicity)` pairs, sorted by increasing offset;
    /// `alpha + offset` runs over the group's roots.
    pub offsets: Vec<(usize, usize)>,
    /// Total log depth `K`: the sum of the multiplicities.
    pub depth: usize,
}

/// Position of a basis element in the canonical layout.
#[derive(Clone, Copy, Debug)]
pub struct ElementSlot {
    /// Index into the group list.
    pub group: usize,
    /// Root offset the element is seeded at.
    pub offset: usize,
    /// Log column the seed occupies.
    pub level: usize,
}

/// Why a jet evaluation failed.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum JetFailure {
    /// The step is too long for any certified rate; subdivide.
    StepTooLong,
    /// The working precision does not support the computation; escalate.
    Precision,
}

/// The canonical local basis structure at one expansion point.
#[derive(Clone, Debug)]
pub struct LocalBasis {
    center: QiNum,
    kind: PointKind,
    tf: ThetaForm,
    roots: Vec<(QiNum, usize)>,
    groups: Vec<ExponentGroup>,
    layout: Vec<ElementSlot>,
}

impl LocalBasis {
    /// Analyses the expansion point and lays out the canonical basis.
    ///
    /// # Errors
    ///
    /// `SingularPointUnsupported` for irregular singular points and for
    /// indicial exponents outside the Gaussian rationals.
    pub fn new(op: &DiffOp, center: &QiNum) -> Result<Self, EvalError> {
        let kind = op.classify(center);
        let c64 = center.to_c64();
        if kind == PointKind::IrregularSingular {
            return Err(EvalError::SingularPointUnsupported {
                re: c64.re,
                im: c64.im,
                reason: "irregular singular point".into(),
            });
        }
        let tf = op.theta_form(center);
        let roots = rational_roots(tf.indicial()).ok_or_else(|| {
            EvalError::SingularPointUnsupported {
                re: c64.re,
                im: c64.im,
                reason: "indicial exponents are not Gaussian rationals".into(),
            }
        })?;

        let groups = group_roots(&roots, c64)?;
        let mut layout = Vec::new();
        for (g, group) in groups.iter().enumerate() {
            for &(offset, mult) in &group.offsets {
                for level in 0..mult {
                    layout.push(ElementSlot {
                        group: g,
                        offset,
                        level,
                    });
                }
            }
        }
        debug_assert_eq!(layout.len(), op.order());
        Ok(Self {
            center: center.clone(),
            kind,
            tf,
            roots,
            groups,
            layout,
        })
    }

    /// The expansion point.
    #[must_use]
    pub fn center(&self) -> &QiNum {
        &self.center
    }

    /// Point classification of the expansion point.
    #[must_use]
    pub fn kind(&self) -> PointKind {
        self.kind
    }

    /// Number of basis elements (the operator order).
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.layout.len()
    }

    /// The exponent groups.
    #[must_use]
    pub fn groups(&self) -> &[ExponentGroup] {
        &self.groups
    }

    /// The canonical element layout.
    #[must_use]
    pub fn layout(&self) -> &[ElementSlot] {
        &self.layout
    }

    /// Series coefficients of one basis element, `nterms` of them, as
    /// log-column vectors of balls at precision `prec`.
    #[must_use]
    pub fn expand(&self, elem: usize, nterms: usize, prec: usize) -> Vec<LogVec> {
        let slot = self.layout[elem];
        let group = &self.groups[slot.group];
        let depth = group.depth;
        let alpha = &group.alpha;

        // Scaled derivatives S^{(i)}/i! of the indicial polynomial and of
        // every band polynomial, all shifted to the group exponent.
        let dpolys = scaled_derivatives(&self.tf.indicial().shift(alpha), depth);
        let tpolys: Vec<Vec<crate::poly::QPoly>> = (1..=self.tf.bandwidth())
            .map(|m| scaled_derivatives(&self.tf.rpoly(m).shift(alpha), depth))
            .collect();

        let mults: FxHashMap<usize, usize> =
            group.offsets.iter().copied().collect();

        // At ordinary points the canonical elements carry unit derivative
        // jets, so seeds are 1/offset!.
        let seed = if self.kind == PointKind::Ordinary {
            let mut f = RBig::ONE;
            for k in 1..=slot.offset {
                f = f / RBig::from(k as u64);
            }
            QiNum::from_rbig(f)
        } else {
            QiNum::one()
        };

        let mut coeffs: Vec<LogVec> = Vec::with_capacity(nterms);
        for n in 0..nterms {
            let nq = QiNum::from_integer(n as i64);
            let mu = mults.get(&n).copied().unwrap_or(0);
            let d: Vec<QiNum> =
                (0..depth).map(|i| dpolys[i].eval(&nq)).collect();

            // b = -Σ_m R_m(J_{α+n-m}) a_{n-m}, per log column.
            let mut b: LogVec =
                (0..depth).map(|_| ComplexBall::zero(prec)).collect();
            for (mi, tm) in tpolys.iter().enumerate() {
                let m = mi + 1;
                if m > n {
                    break;
                }
                let arg = QiNum::from_integer((n - m) as i64);
                let prev = &coeffs[n - m];
                for i in 0..depth {
                    let t = tm[i].eval(&arg);
                    if t.is_zero() {
                        continue;
                    }
                    let tb = t.to_ball(prec);
                    for k in 0..depth - i {
                        let term = tb.mul(&prev[k + i]);
                        b[k] = b[k].sub(&term);
                    }
                }
            }

            let mut a: LogVec =
                (0..depth).map(|_| ComplexBall::zero(prec)).collect();
            if mu == 0 {
                // R_0(α+n) is invertible: solve the triangular block top
                // column down.
                let inv_d0 = d[0].inv().expect("non-resonant index");
                for k in (0..depth).rev() {
                    let mut rhs = b[k].clone();
                    for i in 1..depth - k {
                        if d[i].is_zero() {
                            continue;
                        }
                        rhs = rhs.sub(&d[i].to_ball(prec).mul(&a[k + i]));
                    }
                    a[k] = rhs.mul(&inv_d0.to_ball(prec));
                }
            } else {
                // Resonant offset: d_0 .. d_{μ-1} vanish exactly; levels
                // below μ are free and taken by seeds.
                debug_assert!(d[..mu.min(depth)].iter().all(QiNum::is_zero));
                if mu < depth {
                    let inv_dmu = d[mu].inv().expect("exact multiplicity");
                    for k in (0..depth - mu).rev() {
                        let mut rhs = b[k].clone();
                        for i in (mu + 1)..depth - k {
                            if d[i].is_zero() {
                                continue;
                            }
                            rhs = rhs.sub(&d[i].to_ball(prec).mul(&a[k + i]));
                        }
                        a[k + mu] = rhs.mul(&inv_dmu.to_ball(prec));
                    }
                }
                if n == slot.offset {
                    a[slot.level] = seed.to_ball(prec);
                }
            }
            coeffs.push(a);
        }
        coeffs
    }

    /// Value and derivative enclosures of one basis element at `c + dz`,
    /// orders `0..=derivs`, with the truncation tail folded into the
    /// radii.
    ///
    /// `tol_hint` guides how many terms are computed; the returned radii
    /// may still exceed it, in which case the caller escalates precision.
    ///
    /// # Errors
    ///
    /// See [`JetFailure`].
    pub fn eval_jet(
        &self,
        elem: usize,
        dz: &ComplexBall,
        derivs: usize,
        prec: usize,
        tol_hint: f64,
    ) -> Result<Vec<ComplexBall>, JetFailure> {
        let slot = self.layout[elem];
        let group = &self.groups[slot.group];
        let alpha = &group.alpha;
        let depth = group.depth;
        let rec = RecAbs::new(&self.tf, alpha, &self.roots);
        let m_band = self.tf.bandwidth().max(1);
        let max_offset = group.offsets.last().map_or(0, |&(o, _)| o);
        let dz_mag = dz.mag_upper();
        let cshift = alpha.to_ball(64).mag_upper() + (depth + derivs) as f64 + 1.0;

        let mut nterms = 64.max(max_offset + m_band + 1);
        let (coeffs, tb) = loop {
            if nterms > MAX_TERMS {
                return Err(JetFailure::Precision);
            }
            let coeffs = self.expand(elem, nterms, prec);
            let window: Vec<f64> = (nterms - m_band..nterms)
                .map(|n| {
                    let w = coeffs[n]
                        .iter()
                        .map(ComplexBall::mag_upper)
                        .fold(0.0_f64, f64::max);
                    up_mul(w, up_pow(dz_mag, n))
                })
                .collect();
            match TailBound::certify(&rec, nterms, &window, dz_mag) {
                Ok(tb) => {
                    if tb.series_tail(derivs, cshift) > tol_hint / 8.0
                        && nterms < MAX_TERMS
                    {
                        nterms *= 2;
                        continue;
                    }
                    break (coeffs, tb);
                }
                Err(BoundFailure::NeedLargerN) => {
                    nterms *= 2;
                }
                Err(BoundFailure::StepTooLong) => {
                    return Err(JetFailure::StepTooLong);
                }
            }
        };

        // Prefactors: dz^α, log powers lnᵏ(dz)/k!, inverse powers of dz.
        let pa = pow_alpha(dz, alpha, prec).ok_or(JetFailure::Precision)?;
        let mut lpows: Vec<ComplexBall> = vec![ComplexBall::one(prec)];
        if depth > 1 {
            let lnz = dz.ln().ok_or(JetFailure::Precision)?;
            for k in 1..depth {
                let next = lpows[k - 1].mul(&lnz).div_i64(k as i64);
                lpows.push(next);
            }
        }
        let lsum = lpows
            .iter()
            .map(ComplexBall::mag_upper)
            .fold(0.0_f64, up_add);
        let dz_inv = if derivs > 0 {
            Some(dz.inv().ok_or(JetFailure::Precision)?)
        } else {
            None
        };
        let inv_mag = up_div(1.0, dz.mig_lower());
        let pa_mag = pa.mag_upper();

        let dzpows = {
            let mut v = Vec::with_capacity(nterms);
            let mut p = ComplexBall::one(prec);
            for _ in 0..nterms {
                v.push(p.clone());
                p = p.mul(dz);
            }
            v
        };
        let alpha_ball = alpha.to_ball(prec);

        // bvec holds the θ-shifted coefficients [θ]_d applied to a_n.
        let mut bvec = coeffs;
        let mut out = Vec::with_capacity(derivs + 1);
        let mut inv_pow = ComplexBall::one(prec);
        for d in 0..=derivs {
            // Partial sums per log column.
            let mut col_sums: LogVec =
                (0..depth).map(|_| ComplexBall::zero(prec)).collect();
            for (n, an) in bvec.iter().enumerate() {
                for k in 0..depth {
                    if an[k].is_exact_zero() {
                        continue;
                    }
                    col_sums[k] = col_sums[k].add(&an[k].mul(&dzpows[n]));
                }
            }
            let mut value = ComplexBall::zero(prec);
            for k in 0..depth {
                value = value.add(&col_sums[k].mul(&lpows[k]));
            }
            value = value.mul(&pa).mul(&inv_pow);

            let tail = tb.series_tail(d, cshift);
            let factor =
                up_mul(pa_mag, up_mul(lsum, up_pow(inv_mag, d)));
            value.add_error(up_mul(tail, factor));
            out.push(value);

            if d < derivs {
                // Apply (θ - d): component k ← (α+n-d)·aₖ + aₖ₊₁.
                let shift = alpha_ball.sub(&ComplexBall::from_i64(d as i64, prec));
                for (n, an) in bvec.iter_mut().enumerate() {
                    let factor = shift.add(&ComplexBall::from_i64(n as i64, prec));
                    for k in 0..depth {
                        let mut v = an[k].mul(&factor);
                        if k + 1 < depth {
                            v = v.add(&an[k + 1]);
                        }
                        an[k] = v;
                    }
                }
                inv_pow = inv_pow.mul(dz_inv.as_ref().expect("derivs > 0"));
            }
        }
        Ok(out)
    }
}

/// Scaled derivative polynomials `p, p'/1!, p''/2!, …` up to `count`.
fn scaled_derivatives(p: &crate::poly::QPoly, count: usize) -> Vec<crate::poly::QPoly> {
    let mut out = Vec::with_capacity(count);
    out.push(p.clone());
    for i in 1..count {
        let next = out[i - 1]
            .derivative()
            .scale(&QiNum::from_ratio(1, i as u64));
        out.push(next);
    }
    out
}

/// `dz^α` for a Gaussian rational exponent, principal branch.
fn pow_alpha(dz: &ComplexBall, alpha: &QiNum, prec: usize) -> Option<ComplexBall> {
    if alpha.is_zero() {
        return Some(ComplexBall::one(prec));
    }
    if alpha.is_real() {
        return dz.pow_rbig(&alpha.re);
    }
    let ab = alpha.to_ball(prec);
    dz.ln()?.mul(&ab).exp()
}

/// Partitions indicial roots into cosets modulo ℤ, rebasing each coset
/// on its smallest member.
fn group_roots(
    roots: &[(QiNum, usize)],
    c64: num_complex::Complex64,
) -> Result<Vec<ExponentGroup>, EvalError> {
    struct Raw {
        base: QiNum,
        members: Vec<(IBig, usize)>,
    }
    let mut raw: Vec<Raw> = Vec::new();
    for (rho, mult) in roots {
        let mut placed = false;
        for g in &mut raw {
            if let Some(d) = rho.integer_difference(&g.base) {
                g.members.push((d, *mult));
                placed = true;
                break;
            }
        }
        if !placed {
            raw.push(Raw {
                base: rho.clone(),
                members: vec![(IBig::from(0), *mult)],
            });
        }
    }

    let mut groups = Vec::with_capacity(raw.len());
    for g in raw {
        let min = g
            .members
            .iter()
            .map(|(d, _)| d.clone())
            .min()
            .expect("group is non-empty");
        let alpha = g.base.clone()
            + QiNum::from_rbig(RBig::from(min.clone()));
        let mut offsets = Vec::with_capacity(g.members.len());
        let mut depth = 0;
        for (d, mult) in g.members {
            let rel = d - min.clone();
            let off = i64::try_from(rel)
                .ok()
                .and_then(|v| usize::try_from(v).ok())
                .ok_or_else(|| EvalError::SingularPointUnsupported {
                    re: c64.re,
                    im: c64.im,
                    reason: "integer exponent spread too large".into(),
                })?;
            offsets.push((off, mult));
            depth += mult;
        }
        offsets.sort_unstable();
        groups.push(ExponentGroup {
            alpha,
            offsets,
            depth,
        });
    }
    groups.sort_by(|a, b| {
        (&a.alpha.re, &a.alpha.im).cmp(&(&b.alpha.re, &b.alpha.im))
    });
    Ok(groups)
}
