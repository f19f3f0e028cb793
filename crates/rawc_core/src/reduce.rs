//! Reduction engine: folds a vector into a scalar, plus row and column sums.

use crate::error::{KernelError, Result};
use crate::ops;
use crate::traits::Scalar;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Reduction {
    Sum,
    Product,
    Max,
    Min,
    /// Sum of squares.
    SqSum,
    /// Euclidean norm.
    Hypot,
}

impl Reduction {
    pub const ALL: [Reduction; 6] = [
        Reduction::Sum,
        Reduction::Product,
        Reduction::Max,
        Reduction::Min,
        Reduction::SqSum,
        Reduction::Hypot,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Reduction::Sum => "sum",
            Reduction::Product => "product",
            Reduction::Max => "max",
            Reduction::Min => "min",
            Reduction::SqSum => "sqsum",
            Reduction::Hypot => "hypot",
        }
    }

    fn seed<T: Scalar>(&self, first: T) -> T {
        match self {
            Reduction::SqSum | Reduction::Hypot => first * first,
            _ => first,
        }
    }

    fn accumulate<T: Scalar>(&self, acc: T, x: T) -> T {
        match self {
            Reduction::Sum => acc + x,
            Reduction::Product => acc * x,
            Reduction::Max => ops::max(acc, x),
            Reduction::Min => ops::min(acc, x),
            Reduction::SqSum | Reduction::Hypot => acc + x * x,
        }
    }

    fn finish<T: Scalar>(&self, acc: T) -> T {
        match self {
            Reduction::Hypot => acc.sqrt(),
            _ => acc,
        }
    }
}

/// Folds `values` with `op`. Fails with `DegenerateReduction` on an empty input.
pub fn reduce<T: Scalar>(op: Reduction, values: &[T]) -> Result<T> {
    if values.is_empty() {
        return Err(KernelError::DegenerateReduction {
            operation: op.name(),
        });
    }
    Ok(reduce_unchecked(op, values))
}

/// Folds `values` with `op`; the first element seeds the fold.
///
/// Callers guarantee `values` is non-empty. An empty input yields NaN.
pub fn reduce_unchecked<T: Scalar>(op: Reduction, values: &[T]) -> T {
    match values.split_first() {
        Some((first, rest)) => {
            let acc = rest
                .iter()
                .fold(op.seed(*first), |acc, &x| op.accumulate(acc, x));
            op.finish(acc)
        }
        None => T::nan(),
    }
}

fn check_matrix(operation: &'static str, len: usize, rows: usize, columns: usize) -> Result<()> {
    if len != rows * columns {
        return Err(KernelError::mismatch(
            operation,
            format!("{} elements for a {}x{} matrix", rows * columns, rows, columns),
            len,
        ));
    }
    Ok(())
}

/// Sums each row across its columns, producing a `rows`-vector.
pub fn csum<T: Scalar>(values: &[T], rows: usize, columns: usize) -> Result<Vec<T>> {
    check_matrix("csum", values.len(), rows, columns)?;
    let mut out = vec![T::zero(); rows];
    csum_into(values, rows, columns, &mut out);
    Ok(out)
}

/// Unchecked `csum` into a caller-supplied `rows`-vector.
pub fn csum_into<T: Scalar>(values: &[T], rows: usize, columns: usize, out: &mut [T]) {
    if columns == 1 {
        out[..rows].copy_from_slice(&values[..rows]);
        return;
    }
    for (r, slot) in out.iter_mut().enumerate().take(rows) {
        *slot = (0..columns).fold(T::zero(), |acc, c| acc + values[c * rows + r]);
    }
}

/// Sums each column down its rows, producing a `columns`-vector.
pub fn rsum<T: Scalar>(values: &[T], rows: usize, columns: usize) -> Result<Vec<T>> {
    check_matrix("rsum", values.len(), rows, columns)?;
    let mut out = vec![T::zero(); columns];
    rsum_into(values, rows, columns, &mut out);
    Ok(out)
}

/// Unchecked `rsum` into a caller-supplied `columns`-vector.
pub fn rsum_into<T: Scalar>(values: &[T], rows: usize, columns: usize, out: &mut [T]) {
    if rows == 0 {
        out[..columns].fill(T::zero());
        return;
    }
    for (column, slot) in values.chunks(rows).zip(out.iter_mut()).take(columns) {
        *slot = column.iter().fold(T::zero(), |acc, &x| acc + x);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn sum_of_single_element_is_that_element() {
        assert_eq!(reduce(Reduction::Sum, &[5.0]).expect("sum"), 5.0);
    }

    #[test]
    fn reductions_of_small_vector() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(reduce(Reduction::Sum, &v).expect("sum"), 10.0);
        assert_eq!(reduce(Reduction::Product, &v).expect("product"), 24.0);
        assert_eq!(reduce(Reduction::Max, &v).expect("max"), 4.0);
        assert_eq!(reduce(Reduction::Min, &v).expect("min"), 1.0);
        assert_eq!(reduce(Reduction::SqSum, &v).expect("sqsum"), 30.0);
        assert!((reduce(Reduction::Hypot, &v).expect("hypot") - 30.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn hypot_of_single_element_is_its_magnitude() {
        assert_eq!(reduce(Reduction::Hypot, &[-3.0_f32]).expect("hypot"), 3.0);
    }

    #[test]
    fn empty_reduction_is_rejected() {
        let empty: [f64; 0] = [];
        let err = reduce(Reduction::Max, &empty).expect_err("expected failure");
        assert_eq!(err, KernelError::DegenerateReduction { operation: "max" });
        assert!(reduce_unchecked(Reduction::Sum, &empty).is_nan());
    }

    #[test]
    fn row_and_column_sums() {
        // 2x3, column-major: [[1, 3, 5], [2, 4, 6]]
        let m = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert_eq!(csum(&m, 2, 3).expect("csum"), vec![9.0, 12.0]);
        assert_eq!(rsum(&m, 2, 3).expect("rsum"), vec![3.0, 7.0, 11.0]);
        assert_eq!(csum(&[7.0, 8.0], 2, 1).expect("csum"), vec![7.0, 8.0]);
    }

    #[test]
    fn row_sum_rejects_wrong_length() {
        let err = rsum(&[1.0, 2.0, 3.0], 2, 2).expect_err("expected mismatch");
        assert!(matches!(err, KernelError::DimensionMismatch { operation: "rsum", .. }));
    }

    proptest! {
        #[test]
        fn max_and_min_return_extremal_elements(
            values in prop::collection::vec(-1e6f64..1e6, 1..64),
        ) {
            let max = reduce(Reduction::Max, &values).expect("max");
            let min = reduce(Reduction::Min, &values).expect("min");
            prop_assert!(values.iter().all(|&v| v <= max && v >= min));
            prop_assert!(values.contains(&max));
            prop_assert!(values.contains(&min));
        }

        #[test]
        fn norm_squared_matches_sum_of_squares(
            values in prop::collection::vec(-1e3f64..1e3, 1..64),
        ) {
            let norm = reduce(Reduction::Hypot, &values).expect("hypot");
            let sqsum = reduce(Reduction::SqSum, &values).expect("sqsum");
            prop_assert!((norm * norm - sqsum).abs() <= 1e-9 * sqsum.max(1.0));
        }
    }
}
