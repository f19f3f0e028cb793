use super::{DenseBackend, DenseOp, QrFactors};
use crate::error::{KernelError, Result};
use crate::matrix::DenseMatrix;
use crate::traits::LinalgScalar;
use nalgebra::linalg::SVD;
use nalgebra::DMatrix;
use num_traits::Float;

/// Backend delegating to nalgebra's column-major dense routines.
#[derive(Debug, Clone, Copy, Default)]
pub struct VendorBackend;

fn to_dmatrix<T: LinalgScalar>(m: &DenseMatrix<T>) -> DMatrix<T> {
    DMatrix::from_column_slice(m.rows(), m.columns(), m.as_slice())
}

fn from_dmatrix<T: LinalgScalar>(m: DMatrix<T>) -> Result<DenseMatrix<T>> {
    let (rows, columns) = m.shape();
    DenseMatrix::new(rows, columns, m.as_slice().to_vec())
}

fn singular(op: DenseOp) -> KernelError {
    KernelError::SingularOrIllConditioned {
        operation: op.name(),
    }
}

/// Rejects results the factorization could not produce as finite numbers.
fn finite<T: LinalgScalar>(op: DenseOp, m: DMatrix<T>) -> Result<DMatrix<T>> {
    if m.iter().all(|v| Float::is_finite(*v)) {
        Ok(m)
    } else {
        Err(singular(op))
    }
}

impl<T: LinalgScalar> DenseBackend<T> for VendorBackend {
    fn name(&self) -> &'static str {
        "nalgebra"
    }

    fn matrix_multiply(
        &self,
        a: &DenseMatrix<T>,
        b: &DenseMatrix<T>,
        out: &mut [T],
    ) -> Result<()> {
        let a = to_dmatrix(a);
        let b = to_dmatrix(b);
        let mut c = DMatrix::<T>::zeros(a.nrows(), b.ncols());
        c.gemm(T::one(), &a, &b, T::zero());
        out.copy_from_slice(c.as_slice());
        Ok(())
    }

    fn linsolve(&self, a: &DenseMatrix<T>, b: &DenseMatrix<T>) -> Result<DenseMatrix<T>> {
        let lu = to_dmatrix(a).lu();
        let x = lu
            .solve(&to_dmatrix(b))
            .ok_or_else(|| singular(DenseOp::Linsolve))?;
        from_dmatrix(finite(DenseOp::Linsolve, x)?)
    }

    fn inverse(&self, a: &DenseMatrix<T>) -> Result<DenseMatrix<T>> {
        let inv = to_dmatrix(a)
            .lu()
            .try_inverse()
            .ok_or_else(|| singular(DenseOp::Inverse))?;
        from_dmatrix(finite(DenseOp::Inverse, inv)?)
    }

    fn qr(&self, a: &DenseMatrix<T>) -> Result<QrFactors<T>> {
        let (rows, columns) = (a.rows(), a.columns());
        let qr = to_dmatrix(a).qr();

        // Applying the stored reflectors to the identity yields the full Q^T.
        let mut q_tr = DMatrix::<T>::identity(rows, rows);
        qr.q_tr_mul(&mut q_tr);
        let q = q_tr.transpose();

        let compact = qr.r();
        let mut r = DMatrix::<T>::zeros(rows, columns);
        r.view_mut((0, 0), (compact.nrows(), compact.ncols()))
            .copy_from(&compact);

        Ok(QrFactors {
            q: from_dmatrix(q)?,
            r: from_dmatrix(r)?,
        })
    }

    fn pseudoinverse(&self, a: &DenseMatrix<T>, b: &DenseMatrix<T>) -> Result<DenseMatrix<T>> {
        let svd = SVD::new(to_dmatrix(a), true, true);

        let sigma_max = svd
            .singular_values
            .iter()
            .fold(T::zero(), |m, &s| if s > m { s } else { m });
        let cutoff = <T as Float>::epsilon() * sigma_max;

        let x = svd
            .solve(&to_dmatrix(b), cutoff)
            .map_err(|_| singular(DenseOp::PseudoInverse))?;
        from_dmatrix(finite(DenseOp::PseudoInverse, x)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_precision_solve() {
        let a = DenseMatrix::<f32>::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 4.0]).expect("a");
        let b = DenseMatrix::<f32>::from_row_slice(2, 1, &[1.0, 1.0]).expect("b");
        let x = VendorBackend.linsolve(&a, &b).expect("solve");
        assert_eq!(x.as_slice(), &[0.5, 0.25]);
    }

    #[test]
    fn full_q_is_square_for_tall_input() {
        let a = DenseMatrix::<f64>::from_row_slice(3, 1, &[3.0, 0.0, 4.0]).expect("a");
        let factors = VendorBackend.qr(&a).expect("qr");
        assert_eq!((factors.q.rows(), factors.q.columns()), (3, 3));
        let r00 = factors.r.get(0, 0).expect("r00");
        assert!((r00.abs() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn pseudoinverse_keeps_singular_values_above_machine_epsilon() {
        // sigma = (1, 1e-14): kept by eps * sigma_max, lost to a 64 * eps * sigma_max cutoff.
        let mut a = DenseMatrix::<f64>::zeros(64, 2);
        a.as_mut_slice()[0] = 1.0;
        a.as_mut_slice()[64 + 1] = 1e-14;
        let identity = DenseMatrix::<f64>::identity(64);
        let x = VendorBackend.pseudoinverse(&a, &identity).expect("pinv");
        assert_eq!((x.rows(), x.columns()), (2, 64));
        let small = x.get(1, 1).expect("x11");
        assert!((small / 1e14 - 1.0).abs() < 1e-6);
        assert!((x.get(0, 0).expect("x00") - 1.0).abs() < 1e-12);
    }

    #[test]
    fn pseudoinverse_drops_singular_values_below_machine_epsilon() {
        let a = DenseMatrix::<f64>::from_diagonal(&[1.0, 1e-17]);
        let identity = DenseMatrix::<f64>::identity(2);
        let x = VendorBackend.pseudoinverse(&a, &identity).expect("pinv");
        assert!(x.get(1, 1).expect("x11").abs() < 1e-12);
        assert!((x.get(0, 0).expect("x00").abs() - 1.0).abs() < 1e-12);
    }
}
