//! Certified evaluation of solutions along a path.
//!
//! [`evaluate`] is the top-level entry point: given an operator, initial
//! coefficients in the canonical basis at the first path vertex, and a
//! polygonal path, it returns enclosures guaranteed to contain the true
//! analytic continuation. Work runs at an adaptive precision: a step
//! that cannot be certified retries at doubled precision on the spot,
//! and when radii already committed to the state leave the accuracy
//! target out of reach the whole path is rewalked at a higher starting
//! precision, up to a configurable ceiling.

use std::time::{Duration, Instant};

use dashu::integer::{IBig, UBig};
use dashu::rational::RBig;
use num_complex::Complex64;
use rayon::prelude::*;

use prolatio_ball::ComplexBall;

use crate::coeffs::{interpolate, PathPoint};
use crate::error::EvalError;
use crate::local::LocalBasis;
use crate::operator::{DiffOp, PointKind};
use crate::path::validate_path;
use crate::precision::PrecisionCtl;
use crate::step::{Budget, Observer, PathStepper, RunFailure};

/// Tuning knobs for one evaluation.
#[derive(Clone, Debug)]
pub struct EvalOptions {
    /// Radius the final enclosures must not exceed.
    pub target_error: f64,
    /// Working-precision ceiling, in bits.
    pub max_prec_bits: usize,
    /// Starting working precision in bits; `None` derives it from the
    /// accuracy target.
    pub initial_prec_bits: Option<usize>,
    /// Number of derivatives wanted beyond the value itself, at an
    /// ordinary endpoint.
    pub derivatives: usize,
    /// Maximum number of continuation steps before cancelling.
    pub max_steps: usize,
    /// Wall-clock budget, if any.
    pub time_budget: Option<Duration>,
    /// Overrides the operator's own singularity localisation. Useful
    /// when the caller already knows the singular locus to higher
    /// accuracy.
    pub singular_points: Option<Vec<Complex64>>,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            target_error: 1e-16,
            max_prec_bits: 1 << 14,
            initial_prec_bits: None,
            derivatives: 0,
            max_steps: 4096,
            time_budget: None,
            singular_points: None,
        }
    }
}

/// Continues the solution determined by `initial` along `path` and
/// returns certified enclosures at the final vertex.
///
/// `initial` gives the coefficients of the solution in the canonical
/// local basis at `path[0]`: at an ordinary point these are the
/// derivatives `y(z₀), y'(z₀), …, y^(r-1)(z₀)`; at a regular singular
/// point they weight the Frobenius elements in the canonical order.
/// Exact initial conditions should be passed as zero-radius balls
/// (raising their precision later is then lossless); the radii of
/// inexact initial conditions floor the achievable accuracy.
///
/// At an ordinary final vertex the result holds `derivatives + 1`
/// enclosures `y, y', …`; at a singular final vertex it holds the `r`
/// coefficients of the solution in the canonical basis there.
///
/// # Errors
///
/// See [`EvalError`] for the failure taxonomy.
pub fn evaluate(
    op: &DiffOp,
    initial: &[ComplexBall],
    path: &[PathPoint],
    opts: &EvalOptions,
) -> Result<Vec<ComplexBall>, EvalError> {
    evaluate_inner(op, initial, path, opts, None)
}

/// Like [`evaluate`], reporting every completed step to `observer`,
/// together with the solution state at the centre just reached.
///
/// The observer also sees steps of runs that are later discarded by a
/// precision escalation; `StepInfo::precision_bits` tells runs apart.
///
/// # Errors
///
/// See [`EvalError`].
pub fn evaluate_with_observer(
    op: &DiffOp,
    initial: &[ComplexBall],
    path: &[PathPoint],
    opts: &EvalOptions,
    observer: Observer<'_, '_>,
) -> Result<Vec<ComplexBall>, EvalError> {
    evaluate_inner(op, initial, path, opts, Some(observer))
}

/// Evaluates many (initial conditions, path) jobs in parallel.
#[must_use]
pub fn evaluate_batch(
    op: &DiffOp,
    jobs: &[(Vec<ComplexBall>, Vec<PathPoint>)],
    opts: &EvalOptions,
) -> Vec<Result<Vec<ComplexBall>, EvalError>> {
    jobs.par_iter()
        .map(|(initial, path)| evaluate(op, initial, path, opts))
        .collect()
}

fn evaluate_inner(
    op: &DiffOp,
    initial: &[ComplexBall],
    path: &[PathPoint],
    opts: &EvalOptions,
    mut observer: Option<Observer<'_, '_>>,
) -> Result<Vec<ComplexBall>, EvalError> {
    let r = op.order();
    if initial.len() != r {
        return Err(EvalError::InvalidInput(format!(
            "expected {r} initial coefficients, got {}",
            initial.len()
        )));
    }
    if path.is_empty() {
        return Err(EvalError::InvalidInput("path must not be empty".into()));
    }
    if !(opts.target_error > 0.0 && opts.target_error.is_finite()) {
        return Err(EvalError::InvalidInput(
            "target error must be positive and finite".into(),
        ));
    }
    let singular = opts
        .singular_points
        .clone()
        .unwrap_or_else(|| op.singular_points());
    validate_path(op, path, &singular, opts.max_prec_bits)?;
    let path = preprocess(op, path)?;
    let deadline = opts.time_budget.map(|d| Instant::now() + d);
    let budget = Budget {
        max_steps: opts.max_steps,
        deadline,
    };

    let mut pc = match opts.initial_prec_bits {
        Some(bits) => PrecisionCtl::new(bits, opts.max_prec_bits),
        None => PrecisionCtl::for_target(opts.target_error, opts.max_prec_bits),
    };
    let mut steps_done = 0_usize;
    loop {
        let prec = pc.bits();
        let state0: Vec<ComplexBall> =
            initial.iter().map(|b| b.with_precision(prec)).collect();
        let (steps, outcome) = run_once(
            op,
            &path,
            &singular,
            state0,
            prec,
            opts,
            budget,
            steps_done,
            observer.as_deref_mut(),
        );
        steps_done = steps;
        match outcome {
            Ok(out) => {
                let radius = out
                    .iter()
                    .map(ComplexBall::rad_upper)
                    .fold(0.0_f64, f64::max);
                if radius <= opts.target_error {
                    return Ok(out);
                }
                if !pc.escalate() {
                    return Err(EvalError::PrecisionExceeded {
                        step: 0,
                        ceiling_bits: pc.ceiling(),
                    });
                }
            }
            Err(RunFailure::Precision { step, division }) => {
                if !pc.escalate() {
                    return Err(if division {
                        EvalError::DivisionByZero { step }
                    } else {
                        EvalError::PrecisionExceeded {
                            step,
                            ceiling_bits: pc.ceiling(),
                        }
                    });
                }
            }
            Err(RunFailure::Hard(e)) => return Err(e),
        }
    }
}

/// One walk of the whole path; returns the cumulative step count along
/// with the outcome so rewalks share a single budget.
#[allow(clippy::too_many_arguments)]
fn run_once(
    op: &DiffOp,
    path: &[PathPoint],
    singular: &[Complex64],
    state0: Vec<ComplexBall>,
    prec: usize,
    opts: &EvalOptions,
    budget: Budget,
    steps_done: usize,
    observer: Option<Observer<'_, '_>>,
) -> (usize, Result<Vec<ComplexBall>, RunFailure>) {
    let mut stepper = PathStepper::new(
        op,
        path,
        singular,
        prec,
        opts.max_prec_bits,
        opts.target_error,
        opts.derivatives,
        budget,
        steps_done,
        observer,
    );
    let walked = stepper.run(state0);
    let steps = stepper.steps_taken();
    (steps, walked.and_then(|state| finish(op, path, state, opts, prec)))
}

/// Shapes the final state into the deliverable for the endpoint kind.
fn finish(
    op: &DiffOp,
    path: &[PathPoint],
    state: Vec<ComplexBall>,
    opts: &EvalOptions,
    prec: usize,
) -> Result<Vec<ComplexBall>, RunFailure> {
    let last = path.last().unwrap_or(&path[0]);
    let basis = LocalBasis::new(op, last).map_err(RunFailure::Hard)?;
    if basis.kind() != PointKind::Ordinary {
        // Singular endpoint: the deliverable is the coefficient vector.
        return Ok(state);
    }
    let wanted = opts.derivatives + 1;
    if state.len() >= wanted {
        return Ok(state[..wanted].to_vec());
    }
    // The path never left its base vertex, so the state is the bare
    // r-jet; higher derivatives come straight from the local series.
    Ok(extend_jet_at_center(&basis, &state, opts.derivatives, prec))
}

/// Derivatives `0..=derivs` at the expansion centre itself, from the
/// coefficient recurrence: `y^(d)(z₀) = d! · a_d`.
fn extend_jet_at_center(
    basis: &LocalBasis,
    state: &[ComplexBall],
    derivs: usize,
    prec: usize,
) -> Vec<ComplexBall> {
    let nterms = derivs + 1;
    let mut out = vec![ComplexBall::zero(prec); nterms];
    for (j, c) in state.iter().enumerate() {
        if c.is_exact_zero() {
            continue;
        }
        let coeffs = basis.expand(j, nterms, prec);
        for (d, o) in out.iter_mut().enumerate() {
            *o = o.add(&c.mul(&coeffs[d][0]));
        }
    }
    let mut factorial = ComplexBall::one(prec);
    for (d, o) in out.iter_mut().enumerate().skip(1) {
        factorial = factorial.mul_i64(d as i64);
        *o = o.mul(&factorial);
    }
    out
}

/// Rewrites the path so no two consecutive vertices are both singular:
/// the connection machinery always matches jets at an ordinary point in
/// between.
fn preprocess(
    op: &DiffOp,
    path: &[PathPoint],
) -> Result<Vec<PathPoint>, EvalError> {
    let mut out = Vec::with_capacity(path.len());
    out.push(path[0].clone());
    for pair in path.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if a != b
            && op.is_singular_vertex(a)
            && op.is_singular_vertex(b)
        {
            out.push(ordinary_between(op, a, b)?);
        }
        out.push(b.clone());
    }
    Ok(out)
}

/// An exact rational point strictly between `a` and `b` that is not
/// singular. The leading coefficient has finitely many roots, so one of
/// the candidate fractions is always free for operators of reasonable
/// degree.
fn ordinary_between(
    op: &DiffOp,
    a: &PathPoint,
    b: &PathPoint,
) -> Result<PathPoint, EvalError> {
    for den in [2u64, 3, 5, 7, 11, 13, 17, 19, 23] {
        for num in 1..den {
            let t = RBig::from_parts(IBig::from(num), UBig::from(den));
            let m = interpolate(a, b, &t);
            if !op.is_singular_vertex(&m) {
                return Ok(m);
            }
        }
    }
    Err(EvalError::InvalidInput(
        "no ordinary point found between consecutive singular vertices"
            .into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coeffs::QiNum;
    use crate::poly::QPoly;

    fn qp(cs: &[i64]) -> QPoly {
        QPoly::new(cs.iter().map(|&n| QiNum::from_integer(n)).collect())
    }

    /// y' = y.
    fn exp_op() -> DiffOp {
        DiffOp::new(vec![qp(&[-1]), qp(&[1])]).unwrap()
    }

    fn z(n: i64) -> QiNum {
        QiNum::from_integer(n)
    }

    /// Exact (zero-radius) initial condition.
    fn b(n: i64) -> ComplexBall {
        ComplexBall::from_i64(n, 64)
    }

    #[test]
    fn exponential_at_one() {
        let op = exp_op();
        let opts = EvalOptions {
            target_error: 1e-30,
            ..EvalOptions::default()
        };
        let out = evaluate(&op, &[b(1)], &[z(0), z(1)], &opts).unwrap();
        assert_eq!(out.len(), 1);
        assert!(out[0].rad_upper() <= 1e-30);
        assert!((out[0].re().mid_f64() - std::f64::consts::E).abs() < 1e-12);
        assert!(out[0].im().mid_f64().abs() < 1e-12);
    }

    #[test]
    fn derivatives_of_the_exponential_all_match() {
        let op = exp_op();
        let opts = EvalOptions {
            target_error: 1e-20,
            derivatives: 2,
            ..EvalOptions::default()
        };
        let out = evaluate(&op, &[b(1)], &[z(0), z(1)], &opts).unwrap();
        assert_eq!(out.len(), 3);
        for v in &out {
            assert!((v.re().mid_f64() - std::f64::consts::E).abs() < 1e-12);
        }
    }

    #[test]
    fn base_point_evaluation_without_stepping() {
        let op = exp_op();
        let opts = EvalOptions {
            target_error: 1e-20,
            derivatives: 3,
            ..EvalOptions::default()
        };
        let out = evaluate(&op, &[b(1)], &[z(0)], &opts).unwrap();
        assert_eq!(out.len(), 4);
        for v in &out {
            // All derivatives of e^z are 1 at the origin.
            assert!((v.re().mid_f64() - 1.0).abs() < 1e-15);
            assert!(v.rad_upper() < 1e-15);
        }
    }

    #[test]
    fn wrong_initial_length_is_rejected() {
        let op = exp_op();
        let err = evaluate(
            &op,
            &[b(1), b(0)],
            &[z(0), z(1)],
            &EvalOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, EvalError::InvalidInput(_)));
    }

    #[test]
    fn zero_step_budget_cancels() {
        let op = exp_op();
        let opts = EvalOptions {
            max_steps: 0,
            ..EvalOptions::default()
        };
        let err = evaluate(&op, &[b(1)], &[z(0), z(1)], &opts).unwrap_err();
        assert_eq!(err, EvalError::Cancelled { steps: 0 });
    }

    #[test]
    fn low_starting_precision_still_meets_the_target() {
        let op = exp_op();
        let opts = EvalOptions {
            target_error: 1e-40,
            initial_prec_bits: Some(64),
            ..EvalOptions::default()
        };
        let out = evaluate(&op, &[b(1)], &[z(0), z(1)], &opts).unwrap();
        assert!(out[0].rad_upper() <= 1e-40);
        assert!((out[0].re().mid_f64() - std::f64::consts::E).abs() < 1e-12);
    }

    #[test]
    fn refinement_is_monotone() {
        let op = exp_op();
        let loose = EvalOptions {
            target_error: 1e-10,
            ..EvalOptions::default()
        };
        let tight = EvalOptions {
            target_error: 1e-25,
            ..EvalOptions::default()
        };
        let a = evaluate(&op, &[b(1)], &[z(0), z(1)], &loose).unwrap();
        let b = evaluate(&op, &[b(1)], &[z(0), z(1)], &tight).unwrap();
        assert!(b[0].rad_upper() <= a[0].rad_upper());
        assert!(a[0].rad_upper() <= 1e-10);
        assert!(b[0].rad_upper() <= 1e-25);
    }

    #[test]
    fn batch_matches_individual_runs() {
        let op = exp_op();
        let opts = EvalOptions {
            target_error: 1e-15,
            ..EvalOptions::default()
        };
        let jobs = vec![
            (vec![b(1)], vec![z(0), z(1)]),
            (vec![b(2)], vec![z(0), z(1)]),
        ];
        let batch = evaluate_batch(&op, &jobs, &opts);
        for (job, res) in jobs.iter().zip(&batch) {
            let single = evaluate(&op, &job.0, &job.1, &opts).unwrap();
            let got = res.as_ref().unwrap();
            assert!(
                (got[0].re().mid_f64() - single[0].re().mid_f64()).abs()
                    < 1e-14
            );
        }
    }

    #[test]
    fn observer_sees_steps() {
        let op = exp_op();
        let opts = EvalOptions {
            target_error: 1e-15,
            ..EvalOptions::default()
        };
        let mut seen = 0_usize;
        let out = evaluate_with_observer(
            &op,
            &[b(1)],
            &[z(0), z(1)],
            &opts,
            &mut |info, state| {
                assert!(info.precision_bits >= 64);
                assert_eq!(state.len(), 1);
                seen += 1;
            },
        )
        .unwrap();
        assert!(seen >= 1);
        assert!(out[0].rad_upper() <= 1e-15);
    }

    #[test]
    fn path_through_singularity_is_refused() {
        // (4z - 1) y'' + 4 y' = 0 is singular at z = 1/4.
        let op =
            DiffOp::new(vec![QPoly::zero(), qp(&[4]), qp(&[-1, 4])]).unwrap();
        let err = evaluate(
            &op,
            &[b(0), b(1)],
            &[z(0), z(1)],
            &EvalOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EvalError::PathTooCloseToSingularity { segment: 0, .. }
        ));
    }
}
