//! Dense lower-triangular matrix over `f64`, per spec section 4.1.
//!
//! Ported from `original_source/src/Util/Matrix.C`: entries are stored
//! compactly (`n*(n+1)/2` doubles) and addressed by the linear index
//! `i*(i+1)/2 + j` for `j <= i`. A default-constructed matrix of size `n` is
//! the identity.
//!
//! Unsafe: no

use alloc::vec;
use alloc::vec::Vec;

/// Dense lower-triangular `n x n` matrix, stored compactly.
///
/// All operations that write a [`Matrix`] preserve its triangular shape
/// (spec section 4.1 invariant): entries `(i, j)` with `j > i` are never
/// materialized, so the invariant holds by construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    size: usize,
    data: Vec<f64>,
}

#[inline]
const fn tri_len_impl(size: usize) -> usize {
    size * (size + 1) / 2
}

#[inline]
const fn idx(i: usize, j: usize) -> usize {
    i * (i + 1) / 2 + j
}

impl Matrix {
    /// Identity matrix of the given size (default construction, per spec
    /// section 3).
    #[must_use]
    pub fn identity(size: usize) -> Self {
        let mut data = vec![0.0; tri_len_impl(size)];
        for i in 0..size {
            data[idx(i, i)] = 1.0;
        }
        Self { size, data }
    }

    /// The empty (size-0) matrix, which behaves as a neutral element under
    /// multiplication (spec section 4.1: "Empty ... multiplied with anything
    /// yields the other operand unchanged").
    #[must_use]
    #[inline]
    pub fn empty() -> Self {
        Self {
            size: 0,
            data: Vec::new(),
        }
    }

    /// All-zero matrix of the given size (not a valid triangular "identity",
    /// only used as scratch storage before entries are filled in).
    #[must_use]
    fn zeroed(size: usize) -> Self {
        Self {
            size,
            data: vec![0.0; tri_len_impl(size)],
        }
    }

    /// Size `n` of this `n x n` matrix.
    #[must_use]
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of stored entries for an `n x n` triangular matrix,
    /// `n*(n+1)/2`. Exposed so callers can compute raw flat indices, e.g.
    /// for reverse-mode result extraction (spec section 4.7).
    #[must_use]
    #[inline]
    pub const fn tri_len(size: usize) -> usize {
        tri_len_impl(size)
    }

    /// Reads the raw flat-storage entry at `index` directly, bypassing the
    /// `(i, j)` coordinate mapping. Panics if `index >= tri_len(self.size())`.
    #[must_use]
    #[inline]
    pub fn element_at(&self, index: usize) -> f64 {
        self.data[index]
    }

    /// Reads entry `(i, j)`. Returns `0.0` for `j > i` (above the diagonal)
    /// without panicking, matching the triangular invariant.
    #[must_use]
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        if j > i {
            0.0
        } else {
            self.data[idx(i, j)]
        }
    }

    /// Writes entry `(i, j)`. Panics if `j > i`: callers must never write
    /// above the diagonal.
    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        assert!(j <= i, "Matrix::set: ({i}, {j}) is above the diagonal");
        self.data[idx(i, j)] = value;
    }

    /// Reallocates and copies `other`'s entries into `self`, matching
    /// `Matrix::operator=` in the original.
    pub fn assign(&mut self, other: &Self) {
        if self.size != other.size {
            self.size = other.size;
            self.data = vec![0.0; tri_len_impl(other.size)];
        }
        self.data.copy_from_slice(&other.data);
    }

    /// Row sum `sum_{j=0..=i} A[i,j]`, per spec section 4.1.
    #[must_use]
    pub fn row_sum(&self, i: usize) -> f64 {
        if i >= self.size {
            return 0.0;
        }
        self.data[idx(i, 0)..=idx(i, i)].iter().sum()
    }

    /// Multiplies two lower-triangular matrices: `C[i,j] = sum_{k=j..=i}
    /// A[i,k] * B[k,j]`. Empty operands pass the other through unchanged
    /// (spec section 4.1).
    #[must_use]
    pub fn multiply(&self, rhs: &Self) -> Self {
        if self.size == 0 {
            return rhs.clone();
        }
        if rhs.size == 0 {
            return self.clone();
        }
        assert_eq!(self.size, rhs.size, "Matrix::multiply: size mismatch");

        let n = self.size;
        let mut out = Self::zeroed(n);
        for i in 0..n {
            for j in 0..=i {
                let mut acc = 0.0;
                for k in j..=i {
                    acc += self.get(i, k) * rhs.get(k, j);
                }
                out.data[idx(i, j)] = acc;
            }
        }
        out
    }

    /// Multiplies only the rows `>= from_row` of `C = A . B`, leaving rows
    /// `< from_row` of `self` untouched.
    ///
    /// Used by [`crate::chain::Chain::mult`] to avoid recomputing the
    /// upper-left submatrix that a previous chain already filled correctly
    /// (spec section 4.4).
    pub fn multiply_from(&mut self, a: &Self, b: &Self, from_row: usize) {
        let n = a.size;
        if self.size != n {
            self.size = n;
            self.data = vec![0.0; tri_len_impl(n)];
        }
        for i in from_row..n {
            for j in 0..=i {
                let mut acc = 0.0;
                for k in j..=i {
                    acc += a.get(i, k) * b.get(k, j);
                }
                self.data[idx(i, j)] = acc;
            }
        }
    }

    /// In-place `A *= B`. Delegates to [`Self::square`] when `self` and
    /// `rhs` are the same matrix, per spec section 4.1.
    pub fn multiply_assign(&mut self, rhs: &Self) {
        if core::ptr::eq(self, rhs) {
            self.square();
        } else if self.size == 0 {
            self.assign(rhs);
        } else if rhs.size > 0 {
            let product = self.multiply(rhs);
            *self = product;
        }
    }

    /// In-place squaring, `A = A * A`.
    pub fn square(&mut self) {
        if self.size == 0 {
            return;
        }
        let squared = self.multiply(&self.clone());
        *self = squared;
    }

    /// Raises this matrix to a non-negative integer power by repeated
    /// squaring. `A^0 = I_n`.
    #[must_use]
    pub fn pow(&self, mut power: u64) -> Self {
        if self.size == 0 {
            return self.clone();
        }
        let mut answer = Self::identity(self.size);
        let mut accumulator = self.clone();
        while power != 0 {
            if power % 2 == 1 {
                answer = answer.multiply(&accumulator);
            }
            if power > 1 {
                accumulator.square();
            }
            power /= 2;
        }
        answer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn identity_is_triangular_and_diagonal_one() {
        let m = Matrix::identity(4);
        for i in 0..4 {
            for j in 0..=i {
                assert_eq!(m.get(i, j), if i == j { 1.0 } else { 0.0 });
            }
        }
    }

    #[test]
    fn identity_neutral() {
        let mut m = Matrix::identity(3);
        m.set(1, 0, 0.5);
        m.set(2, 0, 0.25);
        m.set(2, 1, 0.75);

        let id = Matrix::identity(3);
        assert_eq!(id.multiply(&m), m);
        assert_eq!(m.multiply(&id), m);
        assert_eq!(m.pow(0), Matrix::identity(3));
        assert_eq!(m.pow(1), m);
    }

    #[test]
    fn power_consistency() {
        let mut m = Matrix::identity(3);
        m.set(1, 0, 0.5);
        m.set(2, 0, 0.25);
        m.set(2, 1, 0.75);
        m.set(2, 2, 0.9);

        let a = 3u64;
        let b = 4u64;
        let lhs = m.pow(a + b);
        let rhs = m.pow(a).multiply(&m.pow(b));
        for i in 0..3 {
            for j in 0..=i {
                assert_relative_eq!(lhs.get(i, j), rhs.get(i, j), max_relative = 1e-10);
            }
        }
    }

    #[test]
    fn empty_is_neutral() {
        let e = Matrix::empty();
        let m = Matrix::identity(2);
        assert_eq!(e.multiply(&m), m);
        assert_eq!(m.multiply(&e), m);
    }

    #[test]
    fn row_sum_matches_manual_sum() {
        let mut m = Matrix::identity(3);
        m.set(2, 0, 0.1);
        m.set(2, 1, 0.2);
        assert_relative_eq!(m.row_sum(2), 0.1 + 0.2 + 1.0);
    }
}
