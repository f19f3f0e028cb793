use super::{DenseBackend, DenseOp, QrFactors};
use crate::error::{KernelError, Result};
use crate::matrix::DenseMatrix;
use crate::traits::LinalgScalar;

/// Self-contained fallback. Only matrix multiplication has a safe portable form.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortableBackend;

fn missing(op: DenseOp) -> KernelError {
    KernelError::MissingBackend {
        operation: op.name().to_string(),
    }
}

impl<T: LinalgScalar> DenseBackend<T> for PortableBackend {
    fn name(&self) -> &'static str {
        "portable"
    }

    fn matrix_multiply(
        &self,
        a: &DenseMatrix<T>,
        b: &DenseMatrix<T>,
        out: &mut [T],
    ) -> Result<()> {
        multiply_unchecked(
            a.as_slice(),
            b.as_slice(),
            a.rows(),
            a.columns(),
            b.columns(),
            out,
        );
        Ok(())
    }

    fn linsolve(&self, _a: &DenseMatrix<T>, _b: &DenseMatrix<T>) -> Result<DenseMatrix<T>> {
        Err(missing(DenseOp::Linsolve))
    }

    fn inverse(&self, _a: &DenseMatrix<T>) -> Result<DenseMatrix<T>> {
        Err(missing(DenseOp::Inverse))
    }

    fn qr(&self, _a: &DenseMatrix<T>) -> Result<QrFactors<T>> {
        Err(missing(DenseOp::Qr))
    }

    fn pseudoinverse(&self, _a: &DenseMatrix<T>, _b: &DenseMatrix<T>) -> Result<DenseMatrix<T>> {
        Err(missing(DenseOp::PseudoInverse))
    }
}

/// Column-major triple loop: result columns, then result rows, then the shared dimension.
pub(crate) fn multiply_unchecked<T: LinalgScalar>(
    a: &[T],
    b: &[T],
    rows: usize,
    inner: usize,
    columns: usize,
    out: &mut [T],
) {
    for c in 0..columns {
        let b_column = &b[c * inner..(c + 1) * inner];
        for r in 0..rows {
            let mut acc = T::zero();
            for (i, &bv) in b_column.iter().enumerate() {
                acc = acc + a[r + i * rows] * bv;
            }
            out[c * rows + r] = acc;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiply_small_matrices() {
        // [[1, 2], [3, 4]] * [[5], [6]]
        let a = [1.0, 3.0, 2.0, 4.0];
        let b = [5.0, 6.0];
        let mut out = [0.0; 2];
        multiply_unchecked(&a, &b, 2, 2, 1, &mut out);
        assert_eq!(out, [17.0, 39.0]);
    }

    #[test]
    fn empty_inner_dimension_yields_zeros() {
        let mut out = [1.0_f64; 4];
        multiply_unchecked(&[], &[], 2, 0, 2, &mut out);
        assert_eq!(out, [0.0; 4]);
    }
}
