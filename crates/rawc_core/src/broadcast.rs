//! Broadcasting engine.
//!
//! Elementwise kernels run over operands of one logical length `L`; every operand is
//! either a scalar repeated across all positions or a vector of exactly `L` values.
//! Out-of-place calls write into a caller-supplied, disjoint `out` buffer. In-place
//! calls overwrite a single mutable target, which must be the first vector operand.
//!
//! The checked entry points validate lengths and report `DimensionMismatch`; the
//! `*_unchecked` variants skip validation for call sites that already went through
//! [`Catalog::select`](crate::catalog::Catalog::select).

use crate::catalog::Broadcast;
use crate::error::{KernelError, Result};
use crate::ops::{BinaryOp, TernaryOp, UnaryOp};
use crate::traits::Scalar;

/// A read-only operand.
#[derive(Debug, Clone, Copy)]
pub enum Operand<'a, T> {
    Scalar(T),
    Vector(&'a [T]),
}

impl<'a, T: Scalar> Operand<'a, T> {
    #[inline]
    fn at(&self, i: usize) -> T {
        match self {
            Operand::Scalar(v) => *v,
            Operand::Vector(values) => values[i],
        }
    }

    fn len(&self) -> Option<usize> {
        match self {
            Operand::Scalar(_) => None,
            Operand::Vector(values) => Some(values.len()),
        }
    }
}

impl<'a, T> From<&'a [T]> for Operand<'a, T> {
    fn from(values: &'a [T]) -> Self {
        Operand::Vector(values)
    }
}

impl<'a, T> From<&'a Vec<T>> for Operand<'a, T> {
    fn from(values: &'a Vec<T>) -> Self {
        Operand::Vector(values.as_slice())
    }
}

/// An operand of an in-place call; `Target` marks the buffer being overwritten.
#[derive(Debug, Clone, Copy)]
pub enum Arg<'a, T> {
    Scalar(T),
    Vector(&'a [T]),
    Target,
}

impl<'a, T: Scalar> Arg<'a, T> {
    #[inline]
    fn at(&self, i: usize, current: T) -> T {
        match self {
            Arg::Scalar(v) => *v,
            Arg::Vector(values) => values[i],
            Arg::Target => current,
        }
    }
}

fn check_operands<T: Scalar>(
    operation: &'static str,
    operands: &[Operand<'_, T>],
    len: usize,
) -> Result<()> {
    if operands.iter().all(|o| o.len().is_none()) {
        return Err(KernelError::UnsupportedSignature {
            operation: operation.to_string(),
            signature: "all-scalar operands into a vector".to_string(),
        });
    }
    for operand in operands {
        if let Some(n) = operand.len() {
            if n != len {
                return Err(KernelError::mismatch(
                    operation,
                    format!("vectors of length {}", len),
                    format!("length {}", n),
                ));
            }
        }
    }
    Ok(())
}

fn check_args<T: Scalar>(operation: &'static str, args: &[Arg<'_, T>], len: usize) -> Result<()> {
    let first_vector = args.iter().position(|a| !matches!(a, Arg::Scalar(_)));
    let targets = args.iter().filter(|a| matches!(a, Arg::Target)).count();
    match first_vector {
        Some(pos) if targets == 1 && matches!(args[pos], Arg::Target) => {}
        _ => return Err(KernelError::InvalidTarget { operation }),
    }
    for arg in args {
        if let Arg::Vector(values) = arg {
            if values.len() != len {
                return Err(KernelError::mismatch(
                    operation,
                    format!("vectors of length {}", len),
                    format!("length {}", values.len()),
                ));
            }
        }
    }
    Ok(())
}

pub fn unary<T: Scalar>(op: UnaryOp, x: &[T], out: &mut [T]) -> Result<()> {
    if x.len() != out.len() {
        return Err(KernelError::mismatch(
            op.name(),
            format!("vectors of length {}", out.len()),
            format!("length {}", x.len()),
        ));
    }
    unary_unchecked(op, x, out);
    Ok(())
}

#[inline]
pub fn unary_unchecked<T: Scalar>(op: UnaryOp, x: &[T], out: &mut [T]) {
    for (o, &v) in out.iter_mut().zip(x) {
        *o = op.apply(v);
    }
}

/// In-place unary kernel. Always succeeds: the target is the only operand.
pub fn unary_in_place<T: Scalar>(op: UnaryOp, x: &mut [T]) {
    for v in x.iter_mut() {
        *v = op.apply(*v);
    }
}

pub fn binary<T: Scalar>(
    op: BinaryOp,
    x0: Operand<'_, T>,
    x1: Operand<'_, T>,
    out: &mut [T],
) -> Result<()> {
    check_operands(op.name(), &[x0, x1], out.len())?;
    binary_unchecked(op, x0, x1, out);
    Ok(())
}

#[inline]
pub fn binary_unchecked<T: Scalar>(
    op: BinaryOp,
    x0: Operand<'_, T>,
    x1: Operand<'_, T>,
    out: &mut [T],
) {
    for (i, o) in out.iter_mut().enumerate() {
        *o = op.apply(x0.at(i), x1.at(i));
    }
}

/// In-place binary kernel writing into `target`.
pub fn binary_in_place<T: Scalar>(
    op: BinaryOp,
    target: &mut [T],
    x0: Arg<'_, T>,
    x1: Arg<'_, T>,
) -> Result<()> {
    check_args(op.name(), &[x0, x1], target.len())?;
    binary_in_place_unchecked(op, target, x0, x1);
    Ok(())
}

#[inline]
pub fn binary_in_place_unchecked<T: Scalar>(
    op: BinaryOp,
    target: &mut [T],
    x0: Arg<'_, T>,
    x1: Arg<'_, T>,
) {
    for (i, t) in target.iter_mut().enumerate() {
        *t = op.apply(x0.at(i, *t), x1.at(i, *t));
    }
}

pub fn ternary<T: Scalar>(
    op: TernaryOp,
    x0: Operand<'_, T>,
    x1: Operand<'_, T>,
    x2: Operand<'_, T>,
    out: &mut [T],
) -> Result<()> {
    check_operands(op.name(), &[x0, x1, x2], out.len())?;
    ternary_unchecked(op, x0, x1, x2, out);
    Ok(())
}

#[inline]
pub fn ternary_unchecked<T: Scalar>(
    op: TernaryOp,
    x0: Operand<'_, T>,
    x1: Operand<'_, T>,
    x2: Operand<'_, T>,
    out: &mut [T],
) {
    for (i, o) in out.iter_mut().enumerate() {
        *o = op.apply(x0.at(i), x1.at(i), x2.at(i));
    }
}

pub fn ternary_in_place<T: Scalar>(
    op: TernaryOp,
    target: &mut [T],
    x0: Arg<'_, T>,
    x1: Arg<'_, T>,
    x2: Arg<'_, T>,
) -> Result<()> {
    check_args(op.name(), &[x0, x1, x2], target.len())?;
    ternary_in_place_unchecked(op, target, x0, x1, x2);
    Ok(())
}

#[inline]
pub fn ternary_in_place_unchecked<T: Scalar>(
    op: TernaryOp,
    target: &mut [T],
    x0: Arg<'_, T>,
    x1: Arg<'_, T>,
    x2: Arg<'_, T>,
) {
    for (i, t) in target.iter_mut().enumerate() {
        let current = *t;
        *t = op.apply(x0.at(i, current), x1.at(i, current), x2.at(i, current));
    }
}

/// Combines a `rows x columns` matrix with a vector indexed by row (`ColumnWise`) or by
/// column (`RowWise`). The operand that has the matrix's length is the matrix, the other
/// one the vector. Either way the result is `matrix[i] op vector[sel]`.
pub fn binary_broadcast<T: Scalar>(
    op: BinaryOp,
    broadcast: Broadcast,
    x0: &[T],
    x1: &[T],
    rows: usize,
    columns: usize,
    out: &mut [T],
) -> Result<()> {
    let name = op.name();
    let n = rows * columns;

    if broadcast == Broadcast::Elementwise {
        return binary(op, Operand::Vector(x0), Operand::Vector(x1), out);
    }
    if !op.is_operator() {
        return Err(KernelError::UnsupportedSignature {
            operation: name.to_string(),
            signature: format!("{:?}", broadcast),
        });
    }
    if out.len() != n {
        return Err(KernelError::mismatch(
            name,
            format!("an output of {} elements", n),
            out.len(),
        ));
    }

    let vector_len = match broadcast {
        Broadcast::ColumnWise => rows,
        _ => columns,
    };
    let matrix_first = if x0.len() == n && x1.len() == vector_len {
        true
    } else if x1.len() == n && x0.len() == vector_len {
        false
    } else {
        return Err(KernelError::mismatch(
            name,
            format!("a {}x{} matrix and a vector of {}", rows, columns, vector_len),
            format!("lengths {} and {}", x0.len(), x1.len()),
        ));
    };

    binary_broadcast_unchecked(op, broadcast, matrix_first, x0, x1, rows, columns, out);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn binary_broadcast_unchecked<T: Scalar>(
    op: BinaryOp,
    broadcast: Broadcast,
    matrix_first: bool,
    x0: &[T],
    x1: &[T],
    rows: usize,
    columns: usize,
    out: &mut [T],
) {
    let (matrix, vector) = if matrix_first { (x0, x1) } else { (x1, x0) };
    for c in 0..columns {
        for r in 0..rows {
            let i = c * rows + r;
            let v = match broadcast {
                Broadcast::ColumnWise => vector[r],
                Broadcast::RowWise => vector[c],
                Broadcast::Elementwise => vector[i],
            };
            out[i] = op.apply(matrix[i], v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn same_bits(a: &[f64], b: &[f64]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
    }

    #[test]
    fn unary_out_of_place_and_in_place_agree() {
        let x = [0.25, -1.5, 2.0, -0.0];
        for op in UnaryOp::ALL {
            let mut out = [0.0; 4];
            unary(op, &x, &mut out).expect("unary");
            let mut target = x;
            unary_in_place(op, &mut target);
            assert!(same_bits(&out, &target), "{}", op.name());
        }
    }

    #[test]
    fn scalar_operands_are_broadcast() {
        let x = [1.0, 2.0, 3.0];
        let mut out = [0.0; 3];
        binary(BinaryOp::Minus, Operand::Scalar(10.0), Operand::Vector(&x), &mut out)
            .expect("minus");
        assert_eq!(out, [9.0, 8.0, 7.0]);

        binary(BinaryOp::Greater, Operand::Vector(&x), Operand::Scalar(1.5), &mut out)
            .expect("greater");
        assert_eq!(out, [0.0, 1.0, 1.0]);

        ternary(
            TernaryOp::Clip,
            Operand::Vector(&[-5.0, 0.5, 5.0]),
            Operand::Scalar(0.0),
            Operand::Scalar(1.0),
            &mut out,
        )
        .expect("clip");
        assert_eq!(out, [0.0, 0.5, 1.0]);
    }

    #[test]
    fn in_place_target_must_be_first_vector_operand() {
        let other = [1.0, 2.0];
        let mut target = [5.0, 5.0];

        binary_in_place(BinaryOp::Minus, &mut target, Arg::Scalar(1.0), Arg::Target)
            .expect("scalar first is fine");
        assert_eq!(target, [-4.0, -4.0]);

        let err = binary_in_place(BinaryOp::Minus, &mut target, Arg::Vector(&other), Arg::Target)
            .expect_err("target is not the first vector");
        assert_eq!(err, KernelError::InvalidTarget { operation: "minus" });

        let err = binary_in_place(BinaryOp::Plus, &mut target, Arg::Target, Arg::Target)
            .expect_err("two targets");
        assert!(matches!(err, KernelError::InvalidTarget { .. }));

        let err = ternary_in_place(
            TernaryOp::Lerp,
            &mut target,
            Arg::Scalar(0.5),
            Arg::Scalar(0.0),
            Arg::Scalar(1.0),
        )
        .expect_err("no target");
        assert!(matches!(err, KernelError::InvalidTarget { .. }));
    }

    #[test]
    fn length_mismatches_are_reported() {
        let mut out = [0.0; 3];
        let err = binary(
            BinaryOp::Plus,
            Operand::Vector(&[1.0, 2.0]),
            Operand::Scalar(1.0),
            &mut out,
        )
        .expect_err("short operand");
        assert!(matches!(err, KernelError::DimensionMismatch { operation: "plus", .. }));

        let err = binary(BinaryOp::Plus, Operand::Scalar(1.0), Operand::Scalar(2.0), &mut out)
            .expect_err("no vector operand");
        assert!(matches!(err, KernelError::UnsupportedSignature { .. }));

        let mut target = [0.0; 2];
        let err = binary_in_place(BinaryOp::Plus, &mut target, Arg::Target, Arg::Vector(&[1.0]))
            .expect_err("short operand");
        assert!(matches!(err, KernelError::DimensionMismatch { .. }));
    }

    #[test]
    fn column_and_row_wise_broadcast() {
        // 2x3, column-major: [[1, 3, 5], [2, 4, 6]]
        let m = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let mut out = [0.0; 6];

        binary_broadcast(BinaryOp::Minus, Broadcast::ColumnWise, &m, &[1.0, 2.0], 2, 3, &mut out)
            .expect("cwise");
        assert_eq!(out, [0.0, 0.0, 2.0, 2.0, 4.0, 4.0]);

        let v = [10.0, 20.0, 30.0];
        binary_broadcast(BinaryOp::Minus, Broadcast::RowWise, &m, &v, 2, 3, &mut out)
            .expect("rwise");
        assert_eq!(out, [-9.0, -8.0, -17.0, -16.0, -25.0, -24.0]);

        let err = binary_broadcast(BinaryOp::Plus, Broadcast::RowWise, &m, &v[..2], 2, 3, &mut out)
            .expect_err("row-wise needs one entry per column");
        assert!(matches!(err, KernelError::DimensionMismatch { .. }));

        let err = binary_broadcast(
            BinaryOp::Atan2,
            Broadcast::ColumnWise,
            &m,
            &[1.0, 2.0],
            2,
            3,
            &mut out,
        )
        .expect_err("only operators broadcast by row or column");
        assert!(matches!(err, KernelError::UnsupportedSignature { .. }));
    }

    #[test]
    fn vector_first_broadcast_keeps_the_matrix_on_the_left() {
        // 2x2 [[1, 3], [2, 4]]
        let m = [1.0, 2.0, 3.0, 4.0];
        let v = [10.0, 20.0];
        let mut vector_first = [0.0; 4];
        let mut matrix_first = [0.0; 4];

        binary_broadcast(BinaryOp::Minus, Broadcast::ColumnWise, &v, &m, 2, 2, &mut vector_first)
            .expect("cwise 1 m");
        assert_eq!(vector_first, [-9.0, -18.0, -7.0, -16.0]);

        binary_broadcast(BinaryOp::Minus, Broadcast::ColumnWise, &m, &v, 2, 2, &mut matrix_first)
            .expect("cwise m 1");
        assert_eq!(vector_first, matrix_first);

        let row = [5.0, 1.0];
        binary_broadcast(BinaryOp::Less, Broadcast::RowWise, &row, &m, 2, 2, &mut vector_first)
            .expect("rwise 1 m");
        assert_eq!(vector_first, [1.0, 1.0, 0.0, 0.0]);
    }

    proptest! {
        #[test]
        fn binary_in_place_matches_out_of_place(
            a in prop::collection::vec(-50.0f64..50.0, 1..16),
            s in -50.0f64..50.0,
        ) {
            let b: Vec<f64> = a.iter().map(|v| v * 0.5 - 1.0).collect();
            let n = a.len();
            for op in BinaryOp::ALL {
                // vector-vector
                let mut out = vec![0.0; n];
                binary(op, Operand::Vector(&a), Operand::Vector(&b), &mut out).expect("vv");
                let mut target = a.clone();
                binary_in_place(op, &mut target, Arg::Target, Arg::Vector(&b)).expect("vv ip");
                prop_assert!(same_bits(&out, &target), "{} vv", op.name());

                // vector-scalar
                binary(op, Operand::Vector(&a), Operand::Scalar(s), &mut out).expect("vs");
                let mut target = a.clone();
                binary_in_place(op, &mut target, Arg::Target, Arg::Scalar(s)).expect("vs ip");
                prop_assert!(same_bits(&out, &target), "{} vs", op.name());

                // scalar-vector
                binary(op, Operand::Scalar(s), Operand::Vector(&a), &mut out).expect("sv");
                let mut target = a.clone();
                binary_in_place(op, &mut target, Arg::Scalar(s), Arg::Target).expect("sv ip");
                prop_assert!(same_bits(&out, &target), "{} sv", op.name());
            }
        }

        #[test]
        fn plus_undoes_minus(
            a in prop::collection::vec(-1e6f64..1e6, 1..32),
            shift in -1e6f64..1e6,
        ) {
            let b: Vec<f64> = a.iter().map(|v| v * 0.25 + shift).collect();
            let mut diff = vec![0.0; a.len()];
            binary(BinaryOp::Minus, Operand::from(&a), Operand::from(&b), &mut diff)
                .expect("minus");
            binary_in_place(BinaryOp::Plus, &mut diff, Arg::Target, Arg::Vector(&b)).expect("plus");
            for (x, y) in diff.iter().zip(&a) {
                prop_assert!((x - y).abs() <= 1e-9 * y.abs().max(1.0));
            }
        }

        #[test]
        fn ternary_in_place_matches_out_of_place(
            x in prop::collection::vec(-10.0f64..10.0, 1..16),
            lo in -5.0f64..0.0,
            width in 0.5f64..5.0,
        ) {
            let hi = lo + width;
            let n = x.len();
            for op in TernaryOp::ALL {
                let mut out = vec![0.0; n];
                ternary(op, Operand::Vector(&x), Operand::Scalar(lo), Operand::Scalar(hi), &mut out)
                    .expect("ternary");
                let mut target = x.clone();
                ternary_in_place(op, &mut target, Arg::Target, Arg::Scalar(lo), Arg::Scalar(hi))
                    .expect("ternary ip");
                prop_assert!(same_bits(&out, &target), "{}", op.name());
            }
        }
    }
}
