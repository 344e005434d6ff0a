//! Dense matrices of complex balls and certified linear solving.
//!
//! Used for connection problems: expressing an incoming solution jet in
//! the canonical local basis of the next expansion point. Elimination
//! pivots on the largest guaranteed magnitude; a pivot column whose every
//! candidate may contain zero means the working precision does not
//! separate the basis, which callers treat as a precision failure.

use prolatio_ball::ComplexBall;

/// A row-major dense matrix of complex balls.
#[derive(Clone, Debug)]
pub struct BallMatrix {
    rows: usize,
    cols: usize,
    data: Vec<ComplexBall>,
}

impl BallMatrix {
    /// Creates a zero matrix.
    #[must_use]
    pub fn zeros(rows: usize, cols: usize, prec: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![ComplexBall::zero(prec); rows * cols],
        }
    }

    /// Builds a matrix from its columns. All columns must have length
    /// `rows`.
    #[must_use]
    pub fn from_columns(rows: usize, columns: &[Vec<ComplexBall>], prec: usize) -> Self {
        let mut m = Self::zeros(rows, columns.len(), prec);
        for (j, col) in columns.iter().enumerate() {
            debug_assert_eq!(col.len(), rows);
            for (i, v) in col.iter().enumerate() {
                m.set(i, j, v.clone());
            }
        }
        m
    }

    /// Number of rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// The entry at `(i, j)`.
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> &ComplexBall {
        &self.data[i * self.cols + j]
    }

    /// Sets the entry at `(i, j)`.
    pub fn set(&mut self, i: usize, j: usize, v: ComplexBall) {
        self.data[i * self.cols + j] = v;
    }

    fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        for j in 0..self.cols {
            self.data.swap(a * self.cols + j, b * self.cols + j);
        }
    }

    /// Matrix-vector product.
    #[must_use]
    pub fn mul_vec(&self, v: &[ComplexBall], prec: usize) -> Vec<ComplexBall> {
        debug_assert_eq!(v.len(), self.cols);
        (0..self.rows)
            .map(|i| {
                let mut acc = ComplexBall::zero(prec);
                for j in 0..self.cols {
                    acc = acc.add(&self.get(i, j).mul(&v[j]));
                }
                acc
            })
            .collect()
    }

    /// Solves the square system `self * x = rhs` by Gaussian elimination
    /// with guaranteed-magnitude pivoting.
    ///
    /// Returns `None` when some pivot column contains only balls that may
    /// be zero, i.e. the precision at hand cannot certify invertibility.
    #[must_use]
    pub fn solve(&self, rhs: &[ComplexBall]) -> Option<Vec<ComplexBall>> {
        debug_assert_eq!(self.rows, self.cols);
        debug_assert_eq!(rhs.len(), self.rows);
        let n = self.rows;
        let mut a = self.clone();
        let mut b = rhs.to_vec();

        for k in 0..n {
            // Pivot on the row with the largest guaranteed magnitude.
            let mut best = k;
            let mut best_mig = a.get(k, k).mig_lower();
            for i in (k + 1)..n {
                let m = a.get(i, k).mig_lower();
                if m > best_mig {
                    best = i;
                    best_mig = m;
                }
            }
            if best_mig <= 0.0 {
                return None;
            }
            a.swap_rows(k, best);
            b.swap(k, best);

            let pivot = a.get(k, k).clone();
            for i in (k + 1)..n {
                let factor = a.get(i, k).div(&pivot)?;
                for j in k..n {
                    let v = a.get(i, j).sub(&factor.mul(a.get(k, j)));
                    a.set(i, j, v);
                }
                b[i] = b[i].sub(&factor.mul(&b[k]));
            }
        }

        // Back substitution.
        let prec = rhs
            .iter()
            .map(ComplexBall::precision)
            .max()
            .unwrap_or(64);
        let mut x = vec![ComplexBall::zero(prec); n];
        for k in (0..n).rev() {
            let mut acc = b[k].clone();
            for j in (k + 1)..n {
                acc = acc.sub(&a.get(k, j).mul(&x[j]));
            }
            x[k] = acc.div(a.get(k, k))?;
        }
        Some(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashu::rational::RBig;

    fn cb(n: i64) -> ComplexBall {
        ComplexBall::from_i64(n, 128)
    }

    #[test]
    fn solve_identity() {
        let mut m = BallMatrix::zeros(2, 2, 128);
        m.set(0, 0, cb(1));
        m.set(1, 1, cb(1));
        let x = m.solve(&[cb(3), cb(-4)]).unwrap();
        assert!(x[0].contains_rbig_pair(&RBig::from(3), &RBig::ZERO));
        assert!(x[1].contains_rbig_pair(&RBig::from(-4), &RBig::ZERO));
    }

    #[test]
    fn solve_requires_pivoting() {
        // [[0, 1], [1, 0]] x = [5, 7] -> x = [7, 5].
        let mut m = BallMatrix::zeros(2, 2, 128);
        m.set(0, 1, cb(1));
        m.set(1, 0, cb(1));
        let x = m.solve(&[cb(5), cb(7)]).unwrap();
        assert!(x[0].contains_rbig_pair(&RBig::from(7), &RBig::ZERO));
        assert!(x[1].contains_rbig_pair(&RBig::from(5), &RBig::ZERO));
    }

    #[test]
    fn solve_general_system() {
        // [[2, 1], [1, 3]] x = [5, 10] -> x = [1, 3].
        let mut m = BallMatrix::zeros(2, 2, 128);
        m.set(0, 0, cb(2));
        m.set(0, 1, cb(1));
        m.set(1, 0, cb(1));
        m.set(1, 1, cb(3));
        let x = m.solve(&[cb(5), cb(10)]).unwrap();
        assert!(x[0].contains_rbig_pair(&RBig::ONE, &RBig::ZERO));
        assert!(x[1].contains_rbig_pair(&RBig::from(3), &RBig::ZERO));
    }

    #[test]
    fn singular_system_is_rejected() {
        let mut m = BallMatrix::zeros(2, 2, 128);
        m.set(0, 0, cb(1));
        m.set(0, 1, cb(2));
        m.set(1, 0, cb(2));
        m.set(1, 1, cb(4));
        assert!(m.solve(&[cb(1), cb(2)]).is_none());
    }

    #[test]
    fn solution_verifies_by_multiplication() {
        let mut m = BallMatrix::zeros(3, 3, 128);
        let entries = [[3, 1, 0], [1, 4, 1], [0, 2, 5]];
        for (i, row) in entries.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                m.set(i, j, cb(v));
            }
        }
        let rhs = [cb(4), cb(6), cb(7)];
        let x = m.solve(&rhs).unwrap();
        let back = m.mul_vec(&x, 128);
        for (bi, ri) in back.iter().zip(rhs.iter()) {
            assert!(bi.sub(ri).re().contains_rbig(&RBig::ZERO));
            assert!(bi.sub(ri).im().contains_rbig(&RBig::ZERO));
        }
    }
}
