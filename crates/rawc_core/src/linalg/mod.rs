//! Dense solver suite.
//!
//! Every routine goes through a [`DenseBackend`] strategy. [`VendorBackend`] delegates to
//! nalgebra's column-major factorizations; [`PortableBackend`] is the self-contained
//! fallback and only implements matrix multiplication. `linsolve`, `inverse`, `qr` and
//! `pseudoinverse` have no portable fallback: asking the portable backend for them
//! yields `MissingBackend`, and the capability negotiator refuses such a configuration
//! before any kernel runs.

mod portable;
mod vendor;

pub use portable::PortableBackend;
pub use vendor::VendorBackend;

use crate::error::{KernelError, Result};
use crate::matrix::DenseMatrix;
use crate::traits::LinalgScalar;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DenseOp {
    MatrixMultiply,
    Linsolve,
    Inverse,
    Qr,
    PseudoInverse,
}

impl DenseOp {
    pub const ALL: [DenseOp; 5] = [
        DenseOp::MatrixMultiply,
        DenseOp::Linsolve,
        DenseOp::Inverse,
        DenseOp::Qr,
        DenseOp::PseudoInverse,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DenseOp::MatrixMultiply => "matrix_multiply",
            DenseOp::Linsolve => "linsolve",
            DenseOp::Inverse => "inverse",
            DenseOp::Qr => "qr",
            DenseOp::PseudoInverse => "pseudoinverse",
        }
    }

    pub fn arity(self) -> usize {
        match self {
            DenseOp::Inverse | DenseOp::Qr => 1,
            _ => 2,
        }
    }

    /// True for routines that cannot run without a linear-algebra backend.
    pub fn requires_backend(self) -> bool {
        !matches!(self, DenseOp::MatrixMultiply)
    }
}

/// Orthogonal-triangular factors: `q` is `rows x rows`, `r` is `rows x columns` and
/// zero below the diagonal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QrFactors<T> {
    pub q: DenseMatrix<T>,
    pub r: DenseMatrix<T>,
}

/// Strategy for the dense routines. Implementations may assume shapes were validated
/// by [`DenseSuite`].
pub trait DenseBackend<T: LinalgScalar>: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// `out (a.rows x b.columns) = a * b`.
    fn matrix_multiply(
        &self,
        a: &DenseMatrix<T>,
        b: &DenseMatrix<T>,
        out: &mut [T],
    ) -> Result<()>;

    /// Solves `a * x = b` for square `a`.
    fn linsolve(&self, a: &DenseMatrix<T>, b: &DenseMatrix<T>) -> Result<DenseMatrix<T>>;

    fn inverse(&self, a: &DenseMatrix<T>) -> Result<DenseMatrix<T>>;

    fn qr(&self, a: &DenseMatrix<T>) -> Result<QrFactors<T>>;

    /// Least-squares solution of `a * x = b`, shape `a.columns x b.columns`.
    fn pseudoinverse(&self, a: &DenseMatrix<T>, b: &DenseMatrix<T>) -> Result<DenseMatrix<T>>;
}

/// Shape-checked front end over a [`DenseBackend`].
#[derive(Debug)]
pub struct DenseSuite<T: LinalgScalar> {
    backend: Box<dyn DenseBackend<T>>,
}

impl<T: LinalgScalar> DenseSuite<T> {
    pub fn new(backend: Box<dyn DenseBackend<T>>) -> Self {
        Self { backend }
    }

    pub fn portable() -> Self {
        Self::new(Box::new(PortableBackend))
    }

    pub fn vendor() -> Self {
        Self::new(Box::new(VendorBackend))
    }

    /// The vendor backend when `backend_available`, otherwise the portable fallback.
    pub fn select(backend_available: bool) -> Self {
        let suite = if backend_available {
            Self::vendor()
        } else {
            Self::portable()
        };
        debug!(backend = suite.backend_name(), "selected dense backend");
        suite
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn matrix_multiply(
        &self,
        a: &DenseMatrix<T>,
        b: &DenseMatrix<T>,
    ) -> Result<DenseMatrix<T>> {
        let mut out = DenseMatrix::zeros(a.rows(), b.columns());
        self.matrix_multiply_into(a, b, out.as_mut_slice())?;
        Ok(out)
    }

    /// Multiplies into a caller-supplied `a.rows x b.columns` buffer.
    pub fn matrix_multiply_into(
        &self,
        a: &DenseMatrix<T>,
        b: &DenseMatrix<T>,
        out: &mut [T],
    ) -> Result<()> {
        let name = DenseOp::MatrixMultiply.name();
        if a.columns() != b.rows() {
            return Err(KernelError::mismatch(
                name,
                format!("{} rows in the right operand", a.columns()),
                b.rows(),
            ));
        }
        if out.len() != a.rows() * b.columns() {
            return Err(KernelError::mismatch(
                name,
                format!("an output of {} elements", a.rows() * b.columns()),
                out.len(),
            ));
        }
        debug!(
            backend = self.backend.name(),
            rows = a.rows(),
            inner = a.columns(),
            columns = b.columns(),
            "matrix_multiply"
        );
        self.backend.matrix_multiply(a, b, out)
    }

    /// Scalar form of the product, for a `1 x n` row times an `n x 1` column.
    pub fn matrix_multiply_scalar(&self, a: &DenseMatrix<T>, b: &DenseMatrix<T>) -> Result<T> {
        if a.rows() != 1 || b.columns() != 1 {
            return Err(KernelError::mismatch(
                DenseOp::MatrixMultiply.name(),
                "a 1x1 product",
                format!("{}x{}", a.rows(), b.columns()),
            ));
        }
        let mut out = [T::zero()];
        self.matrix_multiply_into(a, b, &mut out)?;
        Ok(out[0])
    }

    pub fn linsolve(&self, a: &DenseMatrix<T>, b: &DenseMatrix<T>) -> Result<DenseMatrix<T>> {
        let name = DenseOp::Linsolve.name();
        require_square(name, a)?;
        if b.rows() != a.rows() {
            return Err(KernelError::mismatch(
                name,
                format!("{} rows in the right-hand side", a.rows()),
                b.rows(),
            ));
        }
        debug!(backend = self.backend.name(), n = a.rows(), rhs = b.columns(), "linsolve");
        report(name, self.backend.linsolve(a, b))
    }

    pub fn inverse(&self, a: &DenseMatrix<T>) -> Result<DenseMatrix<T>> {
        let name = DenseOp::Inverse.name();
        require_square(name, a)?;
        debug!(backend = self.backend.name(), n = a.rows(), "inverse");
        report(name, self.backend.inverse(a))
    }

    pub fn qr(&self, a: &DenseMatrix<T>) -> Result<QrFactors<T>> {
        debug!(backend = self.backend.name(), rows = a.rows(), columns = a.columns(), "qr");
        self.backend.qr(a)
    }

    /// QR factors packed contiguously as `[Q | R]`: `rows * rows` elements of `Q`
    /// followed by `rows * columns` elements of `R`.
    pub fn qr_packed(&self, a: &DenseMatrix<T>) -> Result<Vec<T>> {
        let QrFactors { q, r } = self.qr(a)?;
        let mut packed = q.into_vec();
        packed.extend_from_slice(r.as_slice());
        Ok(packed)
    }

    pub fn pseudoinverse(&self, a: &DenseMatrix<T>, b: &DenseMatrix<T>) -> Result<DenseMatrix<T>> {
        let name = DenseOp::PseudoInverse.name();
        if b.rows() != a.rows() {
            return Err(KernelError::mismatch(
                name,
                format!("{} rows in the right-hand side", a.rows()),
                b.rows(),
            ));
        }
        debug!(
            backend = self.backend.name(),
            rows = a.rows(),
            columns = a.columns(),
            rhs = b.columns(),
            "pseudoinverse"
        );
        self.backend.pseudoinverse(a, b)
    }

    /// Moore-Penrose pseudo-inverse of `a`, shape `a.columns x a.rows`.
    pub fn pinv(&self, a: &DenseMatrix<T>) -> Result<DenseMatrix<T>> {
        self.pseudoinverse(a, &DenseMatrix::identity(a.rows()))
    }
}

fn require_square<T: LinalgScalar>(operation: &'static str, a: &DenseMatrix<T>) -> Result<()> {
    if !a.is_square() {
        return Err(KernelError::mismatch(operation, "a square matrix", a.shape()));
    }
    Ok(())
}

fn report<V>(operation: &'static str, result: Result<V>) -> Result<V> {
    if let Err(KernelError::SingularOrIllConditioned { .. }) = &result {
        warn!(operation, "singular or ill-conditioned system");
    }
    result
}
