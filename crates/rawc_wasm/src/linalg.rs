//! Dense and sparse solvers exposed to JavaScript. Matrices cross the boundary as
//! column-major `Float64Array`s with explicit dimensions.

use crate::kernels::{builtin_only, js_error, WasmKernels};
use js_sys::Float64Array;
use rawc_core::catalog::{KernelId, Operation};
use rawc_core::error::KernelError;
use rawc_core::linalg::{DenseOp, QrFactors};
use rawc_core::matrix::DenseMatrix;
use rawc_core::negotiate::KernelSet;
use rawc_core::sparse::{self, EliminationForest, SparseOp};
use serde_wasm_bindgen::to_value;
use wasm_bindgen::prelude::*;

fn dense(values: &[f64], rows: usize, columns: usize) -> Result<DenseMatrix<f64>, KernelError> {
    DenseMatrix::from_column_slice(rows, columns, values)
}

fn dense_kernel(set: &KernelSet<f64>, op: DenseOp) -> Result<(), KernelError> {
    builtin_only(set, &KernelId::vector(Operation::Dense(op)))
}

pub(crate) fn run_matrix_multiply(
    set: &KernelSet<f64>,
    a: &[f64],
    a_rows: usize,
    a_columns: usize,
    b: &[f64],
    b_columns: usize,
) -> Result<Vec<f64>, KernelError> {
    dense_kernel(set, DenseOp::MatrixMultiply)?;
    let a = dense(a, a_rows, a_columns)?;
    let b = dense(b, a_columns, b_columns)?;
    Ok(set.dense().matrix_multiply(&a, &b)?.into_vec())
}

pub(crate) fn run_linsolve(
    set: &KernelSet<f64>,
    a: &[f64],
    n: usize,
    b: &[f64],
    b_columns: usize,
) -> Result<Vec<f64>, KernelError> {
    dense_kernel(set, DenseOp::Linsolve)?;
    let a = dense(a, n, n)?;
    let b = dense(b, n, b_columns)?;
    Ok(set.dense().linsolve(&a, &b)?.into_vec())
}

pub(crate) fn run_inverse(
    set: &KernelSet<f64>,
    a: &[f64],
    n: usize,
) -> Result<Vec<f64>, KernelError> {
    dense_kernel(set, DenseOp::Inverse)?;
    Ok(set.dense().inverse(&dense(a, n, n)?)?.into_vec())
}

pub(crate) fn run_qr(
    set: &KernelSet<f64>,
    a: &[f64],
    rows: usize,
    columns: usize,
) -> Result<QrFactors<f64>, KernelError> {
    dense_kernel(set, DenseOp::Qr)?;
    set.dense().qr(&dense(a, rows, columns)?)
}

pub(crate) fn run_pinv(
    set: &KernelSet<f64>,
    a: &[f64],
    rows: usize,
    columns: usize,
) -> Result<Vec<f64>, KernelError> {
    dense_kernel(set, DenseOp::PseudoInverse)?;
    Ok(set.dense().pinv(&dense(a, rows, columns)?)?.into_vec())
}

/// Solves with parents given as a flat array where `-1` ends a chain.
pub(crate) fn run_slinsolve(
    set: &KernelSet<f64>,
    a: &[f64],
    parents: &[i32],
    b: &[f64],
    b_columns: usize,
) -> Result<Vec<f64>, KernelError> {
    builtin_only(set, &KernelId::vector(Operation::Sparse(SparseOp::Linsolve)))?;
    let parents: Vec<i64> = parents.iter().map(|&p| i64::from(p)).collect();
    let forest = EliminationForest::from_sentinels(&parents)?;
    sparse::slinsolve(a, &forest, b, b_columns)
}

#[wasm_bindgen]
impl WasmKernels {
    /// `(a_rows x a_columns) * (a_columns x b_columns)`.
    pub fn matrix_multiply(
        &self,
        a: &[f64],
        a_rows: usize,
        a_columns: usize,
        b: &[f64],
        b_columns: usize,
    ) -> Result<Float64Array, JsValue> {
        let out = run_matrix_multiply(&self.set, a, a_rows, a_columns, b, b_columns)
            .map_err(|e| js_error("matrix_multiply", e))?;
        Ok(Float64Array::from(out.as_slice()))
    }

    pub fn linsolve(
        &self,
        a: &[f64],
        n: usize,
        b: &[f64],
        b_columns: usize,
    ) -> Result<Float64Array, JsValue> {
        let out = run_linsolve(&self.set, a, n, b, b_columns)
            .map_err(|e| js_error("linsolve", e))?;
        Ok(Float64Array::from(out.as_slice()))
    }

    pub fn inverse(&self, a: &[f64], n: usize) -> Result<Float64Array, JsValue> {
        let inv = run_inverse(&self.set, a, n).map_err(|e| js_error("inverse", e))?;
        Ok(Float64Array::from(inv.as_slice()))
    }

    /// Returns `{ q, r }`, each `{ rows, columns, data }` in column-major order.
    pub fn qr(&self, a: &[f64], rows: usize, columns: usize) -> Result<JsValue, JsValue> {
        let factors = run_qr(&self.set, a, rows, columns).map_err(|e| js_error("qr", e))?;
        to_value(&factors).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Moore-Penrose pseudo-inverse, `columns x rows`.
    pub fn pinv(&self, a: &[f64], rows: usize, columns: usize) -> Result<Float64Array, JsValue> {
        let pinv = run_pinv(&self.set, a, rows, columns).map_err(|e| js_error("pinv", e))?;
        Ok(Float64Array::from(pinv.as_slice()))
    }

    pub fn slinsolve(
        &self,
        a: &[f64],
        parents: &[i32],
        b: &[f64],
        b_columns: usize,
    ) -> Result<Float64Array, JsValue> {
        let out = run_slinsolve(&self.set, a, parents, b, b_columns)
            .map_err(|e| js_error("slinsolve", e))?;
        Ok(Float64Array::from(out.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::default_declaration;
    use rawc_core::config::CapabilityDeclaration;
    use rawc_core::traits::ElementType;

    fn kernels(backend: bool) -> KernelSet<f64> {
        KernelSet::resolve(&default_declaration(backend)).expect("resolve")
    }

    #[test]
    fn multiply_through_the_bridge() {
        let set = kernels(false);
        let out = run_matrix_multiply(&set, &[1.0, 3.0, 2.0, 4.0], 2, 2, &[5.0, 6.0], 1)
            .expect("multiply");
        assert_eq!(out, vec![17.0, 39.0]);
        assert!(run_matrix_multiply(&set, &[1.0, 2.0], 2, 2, &[1.0, 1.0], 1).is_err());
    }

    #[test]
    fn linsolve_needs_the_vendor_backend() {
        let a = [2.0, 0.0, 0.0, 4.0];
        let b = [1.0, 1.0];
        let x = run_linsolve(&kernels(true), &a, 2, &b, 1).expect("solve");
        assert_eq!(x, vec![0.5, 0.25]);
        assert!(matches!(
            run_linsolve(&kernels(false), &a, 2, &b, 1),
            Err(KernelError::NotResolved { .. })
        ));
    }

    #[test]
    fn factorizations_run_only_when_resolved() {
        let a = [4.0, 0.0, 0.0, 2.0];
        let inv = run_inverse(&kernels(true), &a, 2).expect("inverse");
        assert_eq!(inv, vec![0.25, 0.0, 0.0, 0.5]);
        let factors = run_qr(&kernels(true), &a, 2, 2).expect("qr");
        assert_eq!((factors.q.rows(), factors.r.columns()), (2, 2));

        let only_multiply = CapabilityDeclaration::new(ElementType::Double, true)
            .require("matrix_multiply_v");
        let set = KernelSet::<f64>::resolve(&only_multiply).expect("resolve");
        assert!(matches!(
            run_pinv(&set, &a, 2, 2),
            Err(KernelError::NotResolved { .. })
        ));
        assert!(run_matrix_multiply(&set, &a, 2, 2, &[1.0, 1.0], 1).is_ok());
    }

    #[test]
    fn sparse_solve_accepts_sentinel_parents() {
        let set = kernels(false);
        let a = [4.0, 1.0, 0.0, 1.0, 4.0, 1.0, 0.0, 1.0, 4.0];
        let x = run_slinsolve(&set, &a, &[-1, 0, 1], &[6.0, 12.0, 14.0], 1).expect("solve");
        for (got, want) in x.iter().zip([1.0, 2.0, 3.0]) {
            assert!((got - want).abs() < 1e-12);
        }
        assert!(matches!(
            run_slinsolve(&set, &a, &[-1, 2, 1], &[6.0, 12.0, 14.0], 1),
            Err(KernelError::InvalidEliminationChain { index: 1, .. })
        ));
    }
}
