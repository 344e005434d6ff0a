//! Property-based tests for the exact coefficient layer.
//!
//! The polynomial and Gaussian rational operations feed the recurrence,
//! so they must be exactly consistent with each other: shifting commutes
//! with evaluation, deflation inverts multiplication by a root factor,
//! and field inverses are exact.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use dashu::rational::RBig;

    use crate::coeffs::{interpolate, QiNum};
    use crate::poly::QPoly;

    fn small_qi() -> impl Strategy<Value = QiNum> {
        (-20i64..20i64, -20i64..20i64)
            .prop_map(|(re, im)| QiNum::new(RBig::from(re), RBig::from(im)))
    }

    fn nonzero_qi() -> impl Strategy<Value = QiNum> {
        small_qi().prop_filter("must be non-zero", |q| !q.is_zero())
    }

    fn small_poly() -> impl Strategy<Value = QPoly> {
        prop::collection::vec(small_qi(), 1..6).prop_map(QPoly::new)
    }

    proptest! {
        #[test]
        fn inverse_is_exact(a in nonzero_qi()) {
            let inv = a.inv().unwrap();
            prop_assert!((a * inv).is_one());
        }

        #[test]
        fn integer_difference_detects_shifts(
            a in small_qi(),
            n in -30i64..30i64,
        ) {
            let b = a.clone() + QiNum::from_integer(n);
            let d = a.integer_difference(&b).unwrap();
            prop_assert_eq!(i64::try_from(d).unwrap(), -n);
        }

        #[test]
        fn shift_commutes_with_evaluation(
            p in small_poly(),
            c in small_qi(),
            x in small_qi(),
        ) {
            let lhs = p.shift(&c).eval(&x);
            let rhs = p.eval(&(x + c));
            prop_assert_eq!(lhs, rhs);
        }

        #[test]
        fn deflation_inverts_the_root_factor(
            p in small_poly(),
            r in small_qi(),
        ) {
            // q = (x - r)·p has r as a root; deflating recovers p.
            let factor = QPoly::new(vec![-r.clone(), QiNum::one()]);
            let q = factor.mul(&p);
            prop_assert_eq!(q.deflate(&r), p);
        }

        #[test]
        fn derivative_of_product_follows_leibniz(
            p in small_poly(),
            q in small_poly(),
        ) {
            let lhs = p.mul(&q).derivative();
            let rhs = p.derivative().mul(&q).add(&p.mul(&q.derivative()));
            prop_assert_eq!(lhs, rhs);
        }

        #[test]
        fn interpolation_hits_the_endpoints(
            a in small_qi(),
            b in small_qi(),
        ) {
            prop_assert_eq!(interpolate(&a, &b, &RBig::ZERO), a.clone());
            prop_assert_eq!(interpolate(&a, &b, &RBig::ONE), b.clone());
        }
    }
}
