//! Column-major dense matrices and the structural kernels over them.
//!
//! Element `(row, column)` of a `rows x columns` matrix lives at `column * rows + row`.

use crate::catalog::OperandShape;
use crate::error::{KernelError, Result};
use crate::traits::Scalar;
use serde::{Deserialize, Serialize};

/// Kernels that rearrange or aggregate matrix elements without arithmetic beyond sums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StructuralOp {
    Transpose,
    /// Gathers elements by a list of linear indices.
    Index,
    VCat,
    HCat,
    /// Extracts the diagonal of a square matrix.
    DiagExtract,
    /// Builds a diagonal matrix from a vector.
    DiagBuild,
    Tril,
    Triu,
    CSum,
    RSum,
}

impl StructuralOp {
    pub const ALL: [StructuralOp; 10] = [
        StructuralOp::Transpose,
        StructuralOp::Index,
        StructuralOp::VCat,
        StructuralOp::HCat,
        StructuralOp::DiagExtract,
        StructuralOp::DiagBuild,
        StructuralOp::Tril,
        StructuralOp::Triu,
        StructuralOp::CSum,
        StructuralOp::RSum,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StructuralOp::Transpose => "transpose",
            StructuralOp::Index => "index",
            StructuralOp::VCat => "vcat",
            StructuralOp::HCat => "hcat",
            StructuralOp::DiagExtract | StructuralOp::DiagBuild => "diag",
            StructuralOp::Tril => "tril",
            StructuralOp::Triu => "triu",
            StructuralOp::CSum => "csum",
            StructuralOp::RSum => "rsum",
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            StructuralOp::VCat | StructuralOp::HCat => 2,
            _ => 1,
        }
    }
}

/// A dense `rows x columns` matrix stored column-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseMatrix<T> {
    rows: usize,
    columns: usize,
    data: Vec<T>,
}

impl<T: Scalar> DenseMatrix<T> {
    /// Wraps a column-major buffer, checking its length.
    pub fn new(rows: usize, columns: usize, data: Vec<T>) -> Result<Self> {
        if data.len() != rows * columns {
            return Err(KernelError::mismatch(
                "matrix",
                format!("{} elements for a {}x{} matrix", rows * columns, rows, columns),
                data.len(),
            ));
        }
        Ok(Self {
            rows,
            columns,
            data,
        })
    }

    pub fn zeros(rows: usize, columns: usize) -> Self {
        Self {
            rows,
            columns,
            data: vec![T::zero(); rows * columns],
        }
    }

    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m.data[i * n + i] = T::one();
        }
        m
    }

    pub fn from_column_slice(rows: usize, columns: usize, values: &[T]) -> Result<Self> {
        Self::new(rows, columns, values.to_vec())
    }

    /// Builds a matrix from row-major values.
    pub fn from_row_slice(rows: usize, columns: usize, values: &[T]) -> Result<Self> {
        if values.len() != rows * columns {
            return Err(KernelError::mismatch(
                "matrix",
                format!("{} elements for a {}x{} matrix", rows * columns, rows, columns),
                values.len(),
            ));
        }
        let mut data = vec![T::zero(); rows * columns];
        transpose_into(values, columns, rows, &mut data);
        Ok(Self {
            rows,
            columns,
            data,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn shape(&self) -> OperandShape {
        OperandShape::dense(self.rows, self.columns)
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.columns
    }

    pub fn get(&self, row: usize, column: usize) -> Option<T> {
        if row >= self.rows || column >= self.columns {
            return None;
        }
        Some(self.data[column * self.rows + row])
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    pub fn transpose(&self) -> Self {
        let mut data = vec![T::zero(); self.data.len()];
        transpose_into(&self.data, self.rows, self.columns, &mut data);
        Self {
            rows: self.columns,
            columns: self.rows,
            data,
        }
    }

    /// Stacks `other` below `self`.
    pub fn vcat(&self, other: &Self) -> Result<Self> {
        if other.columns != self.columns {
            return Err(KernelError::mismatch(
                "vcat",
                format!("{} columns", self.columns),
                other.columns,
            ));
        }
        let data = vcat(
            &self.data,
            self.rows,
            &other.data,
            other.rows,
            self.columns,
        )?;
        Ok(Self {
            rows: self.rows + other.rows,
            columns: self.columns,
            data,
        })
    }

    /// Places `other` to the right of `self`.
    pub fn hcat(&self, other: &Self) -> Result<Self> {
        if other.rows != self.rows {
            return Err(KernelError::mismatch(
                "hcat",
                format!("{} rows", self.rows),
                other.rows,
            ));
        }
        Ok(Self {
            rows: self.rows,
            columns: self.columns + other.columns,
            data: hcat(&self.data, &other.data),
        })
    }

    pub fn diag(&self) -> Result<Vec<T>> {
        if !self.is_square() {
            return Err(KernelError::mismatch(
                "diag",
                "a square matrix",
                self.shape(),
            ));
        }
        Ok(diag_extract(&self.data, self.rows))
    }

    pub fn from_diagonal(values: &[T]) -> Self {
        let n = values.len();
        Self {
            rows: n,
            columns: n,
            data: diag_build(values),
        }
    }

    pub fn tril(&self) -> Self {
        let mut out = self.clone();
        tril_in_place(&mut out.data, self.rows, self.columns);
        out
    }

    pub fn triu(&self) -> Self {
        let mut out = self.clone();
        triu_in_place(&mut out.data, self.rows, self.columns);
        out
    }

    pub fn index(&self, indices: &[usize]) -> Result<Vec<T>> {
        index(&self.data, indices)
    }
}

fn check_len(operation: &'static str, len: usize, rows: usize, columns: usize) -> Result<()> {
    if len != rows * columns {
        return Err(KernelError::mismatch(
            operation,
            format!("{} elements for a {}x{} matrix", rows * columns, rows, columns),
            len,
        ));
    }
    Ok(())
}

/// Transposes a `rows x columns` matrix into a new `columns x rows` buffer.
pub fn transpose<T: Scalar>(values: &[T], rows: usize, columns: usize) -> Result<Vec<T>> {
    check_len("transpose", values.len(), rows, columns)?;
    let mut out = vec![T::zero(); values.len()];
    transpose_into(values, rows, columns, &mut out);
    Ok(out)
}

/// Unchecked transpose; `out` must be disjoint from `values` and the same length.
pub fn transpose_into<T: Scalar>(values: &[T], rows: usize, columns: usize, out: &mut [T]) {
    for c in 0..columns {
        for r in 0..rows {
            out[r * columns + c] = values[c * rows + r];
        }
    }
}

/// Gathers `values[indices[k]]` for every `k`.
pub fn index<T: Scalar>(values: &[T], indices: &[usize]) -> Result<Vec<T>> {
    if let Some(&bad) = indices.iter().find(|&&i| i >= values.len()) {
        return Err(KernelError::mismatch(
            "index",
            format!("indices below {}", values.len()),
            bad,
        ));
    }
    Ok(indices.iter().map(|&i| values[i]).collect())
}

/// Stacks a `rows_a x columns` matrix on top of a `rows_b x columns` matrix.
pub fn vcat<T: Scalar>(
    a: &[T],
    rows_a: usize,
    b: &[T],
    rows_b: usize,
    columns: usize,
) -> Result<Vec<T>> {
    check_len("vcat", a.len(), rows_a, columns)?;
    check_len("vcat", b.len(), rows_b, columns)?;

    let mut out = Vec::with_capacity(a.len() + b.len());
    for c in 0..columns {
        out.extend_from_slice(&a[c * rows_a..(c + 1) * rows_a]);
        out.extend_from_slice(&b[c * rows_b..(c + 1) * rows_b]);
    }
    Ok(out)
}

/// Joins two matrices with the same row count side by side.
pub fn hcat<T: Scalar>(a: &[T], b: &[T]) -> Vec<T> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    out.extend_from_slice(a);
    out.extend_from_slice(b);
    out
}

pub fn diag_extract<T: Scalar>(values: &[T], n: usize) -> Vec<T> {
    (0..n).map(|i| values[i * n + i]).collect()
}

pub fn diag_build<T: Scalar>(values: &[T]) -> Vec<T> {
    let n = values.len();
    let mut out = vec![T::zero(); n * n];
    for (i, &v) in values.iter().enumerate() {
        out[i * n + i] = v;
    }
    out
}

/// Zeroes everything above the main diagonal.
pub fn tril_in_place<T: Scalar>(values: &mut [T], rows: usize, columns: usize) {
    for c in 0..columns {
        for r in 0..c.min(rows) {
            values[c * rows + r] = T::zero();
        }
    }
}

/// Zeroes everything below the main diagonal.
pub fn triu_in_place<T: Scalar>(values: &mut [T], rows: usize, columns: usize) {
    for c in 0..columns {
        for r in (c + 1)..rows {
            values[c * rows + r] = T::zero();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> DenseMatrix<f64> {
        DenseMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).expect("matrix")
    }

    #[test]
    fn row_slices_are_stored_column_major() {
        let m = sample();
        assert_eq!(m.as_slice(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
        assert_eq!(m.get(1, 2), Some(6.0));
        assert_eq!(m.get(2, 0), None);
    }

    #[test]
    fn transpose_swaps_rows_and_columns() {
        let t = sample().transpose();
        assert_eq!((t.rows(), t.columns()), (3, 2));
        assert_eq!(t.as_slice(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(t.get(2, 1), Some(6.0));
    }

    #[test]
    fn concatenation_respects_layout() {
        let m = sample();
        let stacked = m.vcat(&m).expect("vcat");
        assert_eq!((stacked.rows(), stacked.columns()), (4, 3));
        assert_eq!(stacked.get(3, 2), Some(6.0));
        assert_eq!(stacked.get(2, 1), Some(2.0));

        let wide = m.hcat(&m).expect("hcat");
        assert_eq!((wide.rows(), wide.columns()), (2, 6));
        assert_eq!(wide.get(0, 3), Some(1.0));

        assert!(m.vcat(&m.transpose()).is_err());
        assert!(m.hcat(&m.transpose()).is_err());
    }

    #[test]
    fn diagonal_extract_and_build() {
        let m = DenseMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]).expect("matrix");
        assert_eq!(m.diag().expect("diag"), vec![1.0, 4.0]);
        assert!(sample().diag().is_err());

        let d = DenseMatrix::from_diagonal(&[2.0, 3.0]);
        assert_eq!(d.as_slice(), &[2.0, 0.0, 0.0, 3.0]);
    }

    #[test]
    fn triangular_parts() {
        let m = sample();
        assert_eq!(m.tril().as_slice(), &[1.0, 4.0, 0.0, 5.0, 0.0, 0.0]);
        assert_eq!(m.triu().as_slice(), &[1.0, 0.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn index_gathers_and_checks_bounds() {
        let m = sample();
        assert_eq!(m.index(&[5, 0, 0]).expect("index"), vec![6.0, 1.0, 1.0]);
        let err = m.index(&[6]).expect_err("expected out of range");
        assert!(matches!(err, KernelError::DimensionMismatch { operation: "index", .. }));
    }

    #[test]
    fn buffer_length_is_checked() {
        assert!(DenseMatrix::new(2, 2, vec![1.0_f64; 3]).is_err());
        assert!(transpose(&[1.0_f64; 5], 2, 3).is_err());
    }

    proptest! {
        #[test]
        fn transpose_is_an_involution(
            rows in 1usize..6,
            columns in 1usize..6,
            seed in -100.0f64..100.0,
        ) {
            let data: Vec<f64> = (0..rows * columns).map(|i| seed + i as f64 * 0.5).collect();
            let m = DenseMatrix::new(rows, columns, data).expect("matrix");
            prop_assert_eq!(m.transpose().transpose(), m);
        }
    }
}
