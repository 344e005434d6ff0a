//! Stepping along a continuation path.
//!
//! The state carried from vertex to vertex is the coefficient vector of
//! the solution in the canonical local basis of the current expansion
//! point. At an ordinary point those coefficients are exactly the
//! derivative jet `(y, y', …, y^{(r-1)})`; at a regular singular point
//! they weight the Frobenius elements.
//!
//! Between vertices the stepper inserts intermediate ordinary expansion
//! points on the segment, keeping each sub-step within half the distance
//! to the nearest singularity. Sub-step endpoints lie on an exact dyadic
//! grid of the segment so every expansion centre stays an exact Gaussian
//! rational. A step that is too long is halved; a step that cannot be
//! certified at the current precision is retried at doubled precision up
//! to the ceiling. A connection into a singular vertex is a certified
//! linear solve against the target basis.

use std::time::Instant;

use dashu::integer::{IBig, UBig};
use dashu::rational::RBig;
use num_complex::Complex64;

use prolatio_ball::ComplexBall;

use crate::coeffs::{interpolate, PathPoint};
use crate::error::EvalError;
use crate::local::{JetFailure, LocalBasis};
use crate::matrix::BallMatrix;
use crate::operator::{DiffOp, PointKind};
use crate::path::{nearest_singularity, SEGMENT_GRAIN as GRAIN};

/// Fraction of the singularity distance a sub-step may span.
const STEP_FRACTION: f64 = 0.5;

/// Observer callback: receives the step report and the solution state
/// (canonical-basis coefficients at the centre just reached) after every
/// completed step. The reference and closure lifetimes are independent
/// so callers can re-lend the same observer to consecutive runs.
pub type Observer<'a, 'f> = &'a mut (dyn FnMut(&StepInfo, &[ComplexBall]) + 'f);

/// Progress report for one completed step.
#[derive(Clone, Copy, Debug)]
pub struct StepInfo {
    /// Step counter across the whole evaluation.
    pub step: usize,
    /// Expansion centre the step started from.
    pub from: Complex64,
    /// Expansion centre reached.
    pub to: Complex64,
    /// Working precision of the step, in bits.
    pub precision_bits: usize,
    /// Largest enclosure radius of the state after the step.
    pub radius: f64,
}

/// Step and wall-clock budgets for one evaluation.
#[derive(Clone, Copy, Debug)]
pub struct Budget {
    /// Maximum number of continuation steps.
    pub max_steps: usize,
    /// Absolute deadline, if any.
    pub deadline: Option<Instant>,
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            max_steps: 4096,
            deadline: None,
        }
    }
}

/// How a precision run ended short of success.
#[derive(Debug)]
pub(crate) enum RunFailure {
    /// The working precision is insufficient; the caller escalates.
    /// `division` marks failures rooted in dividing by an enclosure of
    /// zero, which get their own error at the ceiling.
    Precision { step: usize, division: bool },
    /// A failure escalation cannot fix.
    Hard(EvalError),
}

/// Walks one path, escalating its working precision step-locally up to
/// the ceiling.
pub(crate) struct PathStepper<'a, 'o, 'f> {
    op: &'a DiffOp,
    path: &'a [PathPoint],
    singular: &'a [Complex64],
    prec: usize,
    prec_ceiling: usize,
    target_error: f64,
    derivs: usize,
    budget: Budget,
    observer: Option<Observer<'o, 'f>>,
    step_count: usize,
    too_long_hint: bool,
}

impl<'a, 'o, 'f> PathStepper<'a, 'o, 'f> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        op: &'a DiffOp,
        path: &'a [PathPoint],
        singular: &'a [Complex64],
        prec: usize,
        prec_ceiling: usize,
        target_error: f64,
        derivs: usize,
        budget: Budget,
        steps_done: usize,
        observer: Option<Observer<'o, 'f>>,
    ) -> Self {
        Self {
            op,
            path,
            singular,
            prec,
            prec_ceiling: prec_ceiling.max(prec),
            target_error,
            derivs,
            budget,
            observer,
            step_count: steps_done,
            too_long_hint: false,
        }
    }

    /// Steps completed so far, including those of earlier runs the
    /// stepper was seeded with.
    pub(crate) fn steps_taken(&self) -> usize {
        self.step_count
    }

    /// Doubles the working precision; `false` at the ceiling.
    fn escalate(&mut self) -> bool {
        if self.prec >= self.prec_ceiling {
            return false;
        }
        self.prec = (self.prec * 2).min(self.prec_ceiling);
        true
    }

    /// Error budget for the next step; the budgets over all steps sum to
    /// at most a quarter of the target.
    fn step_tolerance(&self) -> f64 {
        if self.target_error <= 0.0 {
            return 0.0;
        }
        let j = self.step_count as f64;
        self.target_error / (4.0 * (j + 1.0) * (j + 2.0))
    }

    fn tick(&mut self) -> Result<(), RunFailure> {
        self.step_count += 1;
        if self.step_count > self.budget.max_steps {
            return Err(RunFailure::Hard(EvalError::Cancelled {
                steps: self.step_count - 1,
            }));
        }
        if let Some(deadline) = self.budget.deadline {
            if Instant::now() > deadline {
                return Err(RunFailure::Hard(EvalError::Cancelled {
                    steps: self.step_count - 1,
                }));
            }
        }
        Ok(())
    }

    /// Runs the whole path, returning the state at the final vertex.
    pub(crate) fn run(
        &mut self,
        initial: Vec<ComplexBall>,
    ) -> Result<Vec<ComplexBall>, RunFailure> {
        let path = self.path;
        let mut basis = LocalBasis::new(self.op, &path[0])
            .map_err(RunFailure::Hard)?;
        let mut state = initial;

        for v in 0..path.len() - 1 {
            let (a, b) = (&path[v], &path[v + 1]);
            if a == b {
                continue;
            }
            let a64 = a.to_c64();
            let b64 = b.to_c64();
            let seg_len = (b64 - a64).norm();
            let final_vertex = v + 2 == path.len();

            let mut units: u64 = 0;
            let mut cur = a.clone();
            while units < GRAIN {
                self.tick()?;
                let cur64 = cur.to_c64();
                let excl = (basis.kind() != PointKind::Ordinary)
                    .then_some(cur64);
                let dist = nearest_singularity(cur64, self.singular, excl);
                let max_len = STEP_FRACTION * dist;
                let remaining = (b64 - cur64).norm();

                let mut k = if remaining <= max_len {
                    GRAIN - units
                } else {
                    let frac = max_len / seg_len;
                    (((frac * GRAIN as f64).floor() as u64).max(1))
                        .min(GRAIN - units)
                };

                // Halve on StepTooLong, escalate the precision on
                // certification failures, until the step commits.
                let (target, next_state, next_basis, radius) = loop {
                    let at_vertex = units + k == GRAIN;
                    let mut target = if at_vertex {
                        b.clone()
                    } else {
                        self.grid_point(a, b, units + k)
                    };
                    // An interior grid point landing exactly on a
                    // singularity is nudged by one grid unit.
                    if !at_vertex && self.op.is_singular_vertex(&target) {
                        if k > 1 {
                            k -= 1;
                        } else {
                            k += 1;
                        }
                        target = if units + k == GRAIN {
                            b.clone()
                        } else {
                            self.grid_point(a, b, units + k)
                        };
                    }

                    let attempt = if self.op.is_singular_vertex(&target) {
                        self.connect(&basis, &state, &cur, &target)
                    } else {
                        let d_eval = if at_vertex && final_vertex {
                            (self.op.order() - 1).max(self.derivs)
                        } else {
                            self.op.order() - 1
                        };
                        self.transfer(&basis, &state, &cur, &target, d_eval)
                    };
                    match attempt {
                        Ok((ns, nb)) => {
                            let radius = ns
                                .iter()
                                .map(ComplexBall::rad_upper)
                                .fold(0.0_f64, f64::max);
                            if self.target_error > 0.0
                                && radius > self.target_error / 2.0
                            {
                                if self.escalate() {
                                    state = Self::lift(&state, self.prec);
                                    continue;
                                }
                                return Err(RunFailure::Precision {
                                    step: self.step_count,
                                    division: false,
                                });
                            }
                            break (target, ns, nb, radius);
                        }
                        // set in transfer on StepTooLong
                        Err(RunFailure::Precision {
                            division: false, ..
                        }) if self.too_long_hint => {
                            self.too_long_hint = false;
                            if k > 1 {
                                k /= 2;
                            } else {
                                return Err(RunFailure::Precision {
                                    step: self.step_count,
                                    division: false,
                                });
                            }
                        }
                        Err(RunFailure::Precision { step, division }) => {
                            if self.escalate() {
                                state = Self::lift(&state, self.prec);
                            } else {
                                return Err(RunFailure::Precision {
                                    step,
                                    division,
                                });
                            }
                        }
                        Err(e) => return Err(e),
                    }
                };

                units += k.min(GRAIN - units);
                // Recompute units from target when the vertex was reached
                // via the nudge path.
                if target == *b {
                    units = GRAIN;
                }
                state = next_state;
                basis = next_basis;
                if let Some(obs) = self.observer.as_mut() {
                    obs(
                        &StepInfo {
                            step: self.step_count,
                            from: cur64,
                            to: target.to_c64(),
                            precision_bits: self.prec,
                            radius,
                        },
                        &state,
                    );
                }
                cur = target;
            }
        }
        Ok(state)
    }

    fn grid_point(&self, a: &PathPoint, b: &PathPoint, units: u64) -> PathPoint {
        let t = RBig::from_parts(IBig::from(units), UBig::from(GRAIN));
        interpolate(a, b, &t)
    }

    /// Re-clamps the state to the current working precision; exact
    /// midpoints extend losslessly, radii are untouched.
    fn lift(state: &[ComplexBall], prec: usize) -> Vec<ComplexBall> {
        state.iter().map(|b| b.with_precision(prec)).collect()
    }

    /// Moves the state to an ordinary centre `target`, evaluating jets of
    /// order `d_eval` there.
    fn transfer(
        &mut self,
        basis: &LocalBasis,
        state: &[ComplexBall],
        cur: &PathPoint,
        target: &PathPoint,
        d_eval: usize,
    ) -> Result<(Vec<ComplexBall>, LocalBasis), RunFailure> {
        let dz = (target.clone() - cur.clone()).to_ball(self.prec);
        let tol = self.step_tolerance()
            / (basis.dimension() as f64).max(1.0);
        let mut out = vec![ComplexBall::zero(self.prec); d_eval + 1];
        for (j, c) in state.iter().enumerate() {
            if c.is_exact_zero() {
                continue;
            }
            let jet = basis
                .eval_jet(j, &dz, d_eval, self.prec, tol)
                .map_err(|e| self.jet_failure(e))?;
            for (o, jk) in out.iter_mut().zip(jet.iter()) {
                *o = o.add(&c.mul(jk));
            }
        }
        let next_basis = LocalBasis::new(self.op, target)
            .map_err(RunFailure::Hard)?;
        Ok((out, next_basis))
    }

    /// Connects into a singular vertex: solves for the coefficients of
    /// the incoming solution in the target's canonical basis, matching
    /// jets at the current (ordinary) centre.
    fn connect(
        &mut self,
        basis: &LocalBasis,
        state: &[ComplexBall],
        cur: &PathPoint,
        target: &PathPoint,
    ) -> Result<(Vec<ComplexBall>, LocalBasis), RunFailure> {
        let r = self.op.order();
        let target_basis = LocalBasis::new(self.op, target)
            .map_err(RunFailure::Hard)?;
        // The source centre is always ordinary here (consecutive singular
        // vertices get an ordinary midpoint inserted up front), so the
        // state is already the derivative jet.
        if basis.kind() != PointKind::Ordinary {
            return Err(RunFailure::Precision {
                step: self.step_count,
                division: false,
            });
        }
        let jet_here = state.to_vec();

        let dz_back = (cur.clone() - target.clone()).to_ball(self.prec);
        let tol = self.step_tolerance() / (r as f64);
        let mut columns = Vec::with_capacity(r);
        for j in 0..r {
            let col = target_basis
                .eval_jet(j, &dz_back, r - 1, self.prec, tol)
                .map_err(|e| self.jet_failure(e))?;
            columns.push(col);
        }
        let w = BallMatrix::from_columns(r, &columns, self.prec);
        let coeffs = w.solve(&jet_here[..r]).ok_or(RunFailure::Precision {
            step: self.step_count,
            division: true,
        })?;
        Ok((coeffs, target_basis))
    }

    fn jet_failure(&mut self, e: JetFailure) -> RunFailure {
        match e {
            JetFailure::StepTooLong => {
                self.too_long_hint = true;
                RunFailure::Precision {
                    step: self.step_count,
                    division: false,
                }
            }
            JetFailure::Precision => RunFailure::Precision {
                step: self.step_count,
                division: false,
            },
        }
    }
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

    fn unit_path() -> [PathPoint; 2] {
        [QiNum::from_integer(0), QiNum::from_integer(1)]
    }

    #[test]
    fn tight_target_escalates_mid_walk() {
        // 64 bits cannot meet a 1e-40 budget; the stepper must raise its
        // own working precision to commit the step.
        let op = exp_op();
        let path = unit_path();
        let mut stepper = PathStepper::new(
            &op,
            &path,
            &[],
            64,
            1 << 12,
            1e-40,
            0,
            Budget::default(),
            0,
            None,
        );
        let state = stepper.run(vec![ComplexBall::one(64)]).unwrap();
        assert!(state[0].rad_upper() <= 0.5e-40);
        assert!(stepper.steps_taken() >= 1);
    }

    #[test]
    fn precision_ceiling_bounds_mid_walk_escalation() {
        let op = exp_op();
        let path = unit_path();
        let mut stepper = PathStepper::new(
            &op,
            &path,
            &[],
            64,
            64,
            1e-40,
            0,
            Budget::default(),
            0,
            None,
        );
        let err = stepper.run(vec![ComplexBall::one(64)]).unwrap_err();
        assert!(matches!(err, RunFailure::Precision { .. }));
    }

    #[test]
    fn step_budget_counts_earlier_walks() {
        // Seeded with three steps from previous runs against a budget of
        // three, the walk must cancel before doing any work.
        let op = exp_op();
        let path = unit_path();
        let budget = Budget {
            max_steps: 3,
            deadline: None,
        };
        let mut stepper = PathStepper::new(
            &op, &path, &[], 128, 1 << 12, 1e-10, 0, budget, 3, None,
        );
        let err = stepper.run(vec![ComplexBall::one(128)]).unwrap_err();
        match err {
            RunFailure::Hard(EvalError::Cancelled { steps }) => {
                assert_eq!(steps, 3);
            }
            other => panic!("unexpected failure {other:?}"),
        }
    }
}
