//! Continues √z once around the origin and walks a logarithmic branch
//! point on both sides, printing the certified enclosures.

use prolatio::prelude::*;

fn z(n: i64) -> QiNum {
    QiNum::from_integer(n)
}

fn b(n: i64) -> ComplexBall {
    ComplexBall::from_i64(n, 64)
}

fn qp(cs: &[i64]) -> QPoly {
    QPoly::new(cs.iter().map(|&n| QiNum::from_integer(n)).collect())
}

fn main() {
    let opts = EvalOptions {
        target_error: 1e-40,
        ..EvalOptions::default()
    };

    // 2z y' - y = 0: the solution through y(1) = 1 is √z. One loop
    // around the branch point at the origin flips the sign.
    let sqrt_op = DiffOp::new(vec![qp(&[-1]), qp(&[0, 2])]).unwrap();
    let loop_path = [z(1), QiNum::i(), z(-1), -QiNum::i(), z(1)];
    let looped = evaluate(&sqrt_op, &[b(1)], &loop_path, &opts).unwrap();
    println!("sqrt(1) after one loop around 0: {}", looped[0]);

    // (4z - 1) y'' + 4 y' = 0: the solution through y(0) = 0, y'(0) = 1
    // picks up different logarithm branches above and below z = 1/4.
    let log_op =
        DiffOp::new(vec![QPoly::zero(), qp(&[4]), qp(&[-1, 4])]).unwrap();
    let half_i = QiNum::i() * QiNum::from_ratio(1, 2);
    let initial = [b(0), b(1)];
    let above =
        evaluate(&log_op, &initial, &[z(0), half_i.clone(), z(1)], &opts)
            .unwrap();
    let below =
        evaluate(&log_op, &initial, &[z(0), -half_i, z(1)], &opts).unwrap();
    println!("detour above the branch point: {}", above[0]);
    println!("detour below the branch point: {}", below[0]);
}
