//! Benchmarks for certified continuation at increasing accuracy targets.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

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

/// y' = y.
fn exp_op() -> DiffOp {
    DiffOp::new(vec![qp(&[-1]), qp(&[1])]).unwrap()
}

/// y'' - z y = 0.
fn airy_op() -> DiffOp {
    DiffOp::new(vec![qp(&[0, -1]), QPoly::zero(), qp(&[1])]).unwrap()
}

fn bench_accuracy_targets(c: &mut Criterion) {
    let mut group = c.benchmark_group("exp_at_one");
    let op = exp_op();

    for digits in [15_u32, 30, 60, 120] {
        let opts = EvalOptions {
            target_error: 10.0_f64.powi(-(digits as i32)),
            ..EvalOptions::default()
        };
        group.bench_with_input(
            BenchmarkId::new("digits", digits),
            &digits,
            |b, _| {
                b.iter(|| {
                    black_box(
                        evaluate(&op, &[b(1)], &[z(0), z(1)], &opts).unwrap(),
                    )
                })
            },
        );
    }

    group.finish();
}

fn bench_path_length(c: &mut Criterion) {
    let mut group = c.benchmark_group("airy_path");
    let op = airy_op();
    let opts = EvalOptions {
        target_error: 1e-30,
        ..EvalOptions::default()
    };

    for endpoint in [1_i64, 2, 4, 8] {
        let path = [z(0), z(endpoint)];
        group.bench_with_input(
            BenchmarkId::new("endpoint", endpoint),
            &endpoint,
            |b, _| {
                b.iter(|| {
                    black_box(
                        evaluate(&op, &[b(1), b(0)], &path, &opts).unwrap(),
                    )
                })
            },
        );
    }

    group.finish();
}

fn bench_monodromy_loop(c: &mut Criterion) {
    let op = DiffOp::new(vec![qp(&[-1]), qp(&[0, 2])]).unwrap();
    let loop_path = [z(1), QiNum::i(), z(-1), -QiNum::i(), z(1)];
    let opts = EvalOptions {
        target_error: 1e-30,
        ..EvalOptions::default()
    };

    c.bench_function("sqrt_monodromy_loop", |b| {
        b.iter(|| {
            black_box(evaluate(&op, &[b(1)], &loop_path, &opts).unwrap())
        })
    });
}

criterion_group!(
    benches,
    bench_accuracy_targets,
    bench_path_length,
    bench_monodromy_loop
);
criterion_main!(benches);
