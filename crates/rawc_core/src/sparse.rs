//! Sparse symmetric solver.
//!
//! A symmetric `n x n` matrix is factorized in place as `A = L^T D L` (unit lower `L`,
//! diagonal `D`), visiting only the entries reachable through a caller-supplied
//! elimination forest. The forest fixes the elimination order; no pivoting or reordering
//! is performed, so the caller is responsible for an order that is numerically safe.
//!
//! Storage is the usual dense column-major `n x n` buffer. After factorization the
//! strictly lower entries on each chain hold `L` and the diagonal holds `D`.

use crate::error::{KernelError, Result};
use crate::traits::Scalar;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SparseOp {
    /// In-place LTDL factorization.
    Factorize,
    /// `b <- D^-1 L^-T b`.
    DinvLinvt,
    /// `b <- L^-1 b`.
    Linv,
    /// `b <- L^-T b`.
    Linvt,
    /// `b <- D^-1 b`.
    Dinv,
    /// Factorize a copy of `A`, then run both substitution passes.
    Linsolve,
}

impl SparseOp {
    pub const ALL: [SparseOp; 6] = [
        SparseOp::Factorize,
        SparseOp::DinvLinvt,
        SparseOp::Linv,
        SparseOp::Linvt,
        SparseOp::Dinv,
        SparseOp::Linsolve,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SparseOp::Factorize => "sltdl",
            SparseOp::DinvLinvt => "sltdl_dinv_linvt",
            SparseOp::Linv => "sltdl_linv",
            SparseOp::Linvt => "sltdl_linvt",
            SparseOp::Dinv => "sltdl_dinv",
            SparseOp::Linsolve => "slinsolve",
        }
    }

    pub fn arity(self) -> usize {
        match self {
            SparseOp::Factorize => 1,
            _ => 2,
        }
    }
}

/// Elimination forest over the rows of a symmetric matrix.
///
/// `parent(i)` is the next lower-indexed row in column `i`'s elimination chain. Parents
/// strictly descend, so every chain terminates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EliminationForest {
    parents: Vec<Option<usize>>,
}

impl EliminationForest {
    pub fn from_parents(parents: &[Option<usize>]) -> Result<Self> {
        let size = parents.len();
        for (index, parent) in parents.iter().enumerate() {
            if let Some(p) = *parent {
                if p >= index {
                    return Err(KernelError::InvalidEliminationChain {
                        index,
                        parent: p as i64,
                        size,
                    });
                }
            }
        }
        Ok(Self {
            parents: parents.to_vec(),
        })
    }

    /// Builds a forest from a flat index array where any negative entry ends a chain.
    pub fn from_sentinels(parents: &[i64]) -> Result<Self> {
        let size = parents.len();
        let mut converted = Vec::with_capacity(size);
        for (index, &parent) in parents.iter().enumerate() {
            if parent < 0 {
                converted.push(None);
            } else if (parent as usize) < index {
                converted.push(Some(parent as usize));
            } else {
                return Err(KernelError::InvalidEliminationChain {
                    index,
                    parent,
                    size,
                });
            }
        }
        Ok(Self { parents: converted })
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn parent(&self, index: usize) -> Option<usize> {
        self.parents.get(index).copied().flatten()
    }

    /// Rows reachable from `index`, excluding `index` itself.
    pub fn chain(&self, index: usize) -> Chain<'_> {
        Chain {
            parents: &self.parents,
            next: self.parent(index),
        }
    }

    /// `index` followed by its chain.
    pub fn path(&self, index: usize) -> Chain<'_> {
        Chain {
            parents: &self.parents,
            next: (index < self.parents.len()).then_some(index),
        }
    }
}

/// Iterator along an elimination chain.
#[derive(Debug, Clone)]
pub struct Chain<'a> {
    parents: &'a [Option<usize>],
    next: Option<usize>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let current = self.next?;
        self.next = self.parents[current];
        Some(current)
    }
}

fn check_square(operation: &'static str, len: usize, n: usize) -> Result<()> {
    if len != n * n {
        return Err(KernelError::mismatch(
            operation,
            format!("{} elements for a {}x{} system", n * n, n, n),
            len,
        ));
    }
    Ok(())
}

fn check_rhs(operation: &'static str, len: usize, n: usize, columns: usize) -> Result<()> {
    if len != n * columns {
        return Err(KernelError::mismatch(
            operation,
            format!("{} right-hand side elements ({}x{})", n * columns, n, columns),
            len,
        ));
    }
    Ok(())
}

/// Factorizes `a` in place. Fails if a pivot on the diagonal comes out zero or non-finite.
pub fn ltdl_factorize<T: Scalar>(a: &mut [T], forest: &EliminationForest) -> Result<()> {
    let name = SparseOp::Factorize.name();
    let n = forest.len();
    check_square(name, a.len(), n)?;
    ltdl_factorize_unchecked(a, forest);

    if let Some(k) = (0..n).find(|&k| {
        let d = a[k * n + k];
        d == T::zero() || !d.is_finite()
    }) {
        warn!(pivot = k, "ltdl factorization hit a degenerate pivot");
        return Err(KernelError::SingularOrIllConditioned { operation: name });
    }
    Ok(())
}

pub fn ltdl_factorize_unchecked<T: Scalar>(a: &mut [T], forest: &EliminationForest) {
    let n = forest.len();
    for k in (0..n).rev() {
        let pivot = a[k * n + k];
        for i in forest.chain(k) {
            let m = a[k + i * n] / pivot;
            for j in forest.path(i) {
                a[i + j * n] = a[i + j * n] - m * a[k + j * n];
            }
            a[k + i * n] = m;
        }
    }
}

fn for_each_column<T: Scalar>(
    operation: &'static str,
    factored: &[T],
    forest: &EliminationForest,
    b: &mut [T],
    columns: usize,
    pass: fn(&[T], &EliminationForest, &mut [T]),
) -> Result<()> {
    let n = forest.len();
    check_square(operation, factored.len(), n)?;
    check_rhs(operation, b.len(), n, columns)?;
    if n > 0 {
        for column in b.chunks_mut(n) {
            pass(factored, forest, column);
        }
    }
    Ok(())
}

/// Applies `D^-1 L^-T` to each of the `columns` right-hand sides in `b`.
pub fn solve_dinv_linvt<T: Scalar>(
    factored: &[T],
    forest: &EliminationForest,
    b: &mut [T],
    columns: usize,
) -> Result<()> {
    for_each_column(SparseOp::DinvLinvt.name(), factored, forest, b, columns, dinv_linvt_pass)
}

/// Applies `L^-1` to each of the `columns` right-hand sides in `b`.
pub fn solve_linv<T: Scalar>(
    factored: &[T],
    forest: &EliminationForest,
    b: &mut [T],
    columns: usize,
) -> Result<()> {
    for_each_column(SparseOp::Linv.name(), factored, forest, b, columns, linv_pass)
}

/// Applies `L^-T` to each of the `columns` right-hand sides in `b`.
pub fn solve_linvt<T: Scalar>(
    factored: &[T],
    forest: &EliminationForest,
    b: &mut [T],
    columns: usize,
) -> Result<()> {
    for_each_column(SparseOp::Linvt.name(), factored, forest, b, columns, linvt_pass)
}

/// Applies `D^-1` to each of the `columns` right-hand sides in `b`.
pub fn solve_dinv<T: Scalar>(
    factored: &[T],
    forest: &EliminationForest,
    b: &mut [T],
    columns: usize,
) -> Result<()> {
    for_each_column(SparseOp::Dinv.name(), factored, forest, b, columns, dinv_pass)
}

/// Both substitution passes over already-factorized data, in place.
pub fn ltdl_solve<T: Scalar>(
    factored: &[T],
    forest: &EliminationForest,
    b: &mut [T],
    columns: usize,
) -> Result<()> {
    for_each_column(SparseOp::Linsolve.name(), factored, forest, b, columns, ltdl_solve_pass)
}

/// Solves `a * x = b` for the `columns` right-hand sides in `b`, leaving `a` untouched.
pub fn slinsolve<T: Scalar>(
    a: &[T],
    forest: &EliminationForest,
    b: &[T],
    columns: usize,
) -> Result<Vec<T>> {
    let name = SparseOp::Linsolve.name();
    let n = forest.len();
    check_square(name, a.len(), n)?;
    check_rhs(name, b.len(), n, columns)?;
    debug!(n, columns, "slinsolve");

    let mut factored = a.to_vec();
    ltdl_factorize(&mut factored, forest).map_err(|err| match err {
        KernelError::SingularOrIllConditioned { .. } => {
            KernelError::SingularOrIllConditioned { operation: name }
        }
        other => other,
    })?;

    let mut x = b.to_vec();
    ltdl_solve(&factored, forest, &mut x, columns)?;
    Ok(x)
}

fn dinv_linvt_pass<T: Scalar>(a: &[T], forest: &EliminationForest, b: &mut [T]) {
    let n = forest.len();
    for i in (0..n).rev() {
        let bi = b[i];
        for j in forest.chain(i) {
            b[j] = b[j] - a[i + j * n] * bi;
        }
        b[i] = bi / a[i * n + i];
    }
}

fn linv_pass<T: Scalar>(a: &[T], forest: &EliminationForest, b: &mut [T]) {
    let n = forest.len();
    for i in 0..n {
        let mut bi = b[i];
        for j in forest.chain(i) {
            bi = bi - a[i + j * n] * b[j];
        }
        b[i] = bi;
    }
}

fn linvt_pass<T: Scalar>(a: &[T], forest: &EliminationForest, b: &mut [T]) {
    let n = forest.len();
    for i in (0..n).rev() {
        let bi = b[i];
        for j in forest.chain(i) {
            b[j] = b[j] - a[i + j * n] * bi;
        }
    }
}

fn dinv_pass<T: Scalar>(a: &[T], forest: &EliminationForest, b: &mut [T]) {
    let n = forest.len();
    for i in 0..n {
        b[i] = b[i] / a[i * n + i];
    }
}

fn ltdl_solve_pass<T: Scalar>(a: &[T], forest: &EliminationForest, b: &mut [T]) {
    dinv_linvt_pass(a, forest, b);
    linv_pass(a, forest, b);
}
