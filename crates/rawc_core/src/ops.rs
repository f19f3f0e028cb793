//! Elementwise operations and their exact scalar semantics.
//!
//! Every vector kernel in the broadcasting engine reduces to one of the `apply`
//! methods below, evaluated per position.

use crate::traits::Scalar;
use serde::{Deserialize, Serialize};

/// Single-operand elementwise operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Sqrt,
    Floor,
    Ceil,
    Round,
    Exp,
    Erf,
    Log10,
    Exp2,
    InvSqrt,
    Abs,
    Ln,
    Sign,
    /// Arithmetic negation (`-x`).
    UMinus,
    /// Logical not (`!x`), yielding `1.0`/`0.0`.
    Negate,
}

impl UnaryOp {
    pub const ALL: [UnaryOp; 23] = [
        UnaryOp::Sin,
        UnaryOp::Cos,
        UnaryOp::Tan,
        UnaryOp::Asin,
        UnaryOp::Acos,
        UnaryOp::Atan,
        UnaryOp::Sinh,
        UnaryOp::Cosh,
        UnaryOp::Tanh,
        UnaryOp::Sqrt,
        UnaryOp::Floor,
        UnaryOp::Ceil,
        UnaryOp::Round,
        UnaryOp::Exp,
        UnaryOp::Erf,
        UnaryOp::Log10,
        UnaryOp::Exp2,
        UnaryOp::InvSqrt,
        UnaryOp::Abs,
        UnaryOp::Ln,
        UnaryOp::Sign,
        UnaryOp::UMinus,
        UnaryOp::Negate,
    ];

    pub fn name(self) -> &'static str {
        match self {
            UnaryOp::Sin => "sin",
            UnaryOp::Cos => "cos",
            UnaryOp::Tan => "tan",
            UnaryOp::Asin => "asin",
            UnaryOp::Acos => "acos",
            UnaryOp::Atan => "atan",
            UnaryOp::Sinh => "sinh",
            UnaryOp::Cosh => "cosh",
            UnaryOp::Tanh => "tanh",
            UnaryOp::Sqrt => "sqrt",
            UnaryOp::Floor => "floor",
            UnaryOp::Ceil => "ceil",
            UnaryOp::Round => "round",
            UnaryOp::Exp => "exp",
            UnaryOp::Erf => "erf",
            UnaryOp::Log10 => "log10",
            UnaryOp::Exp2 => "exp2",
            UnaryOp::InvSqrt => "invsqrt",
            UnaryOp::Abs => "abs",
            UnaryOp::Ln => "ln",
            UnaryOp::Sign => "sign",
            UnaryOp::UMinus => "uminus",
            UnaryOp::Negate => "negate",
        }
    }

    /// Operators are expanded inline and have no standalone scalar kernel.
    pub fn is_operator(self) -> bool {
        matches!(self, UnaryOp::UMinus | UnaryOp::Negate)
    }

    #[inline]
    pub fn apply<T: Scalar>(self, x: T) -> T {
        match self {
            UnaryOp::Sin => x.sin(),
            UnaryOp::Cos => x.cos(),
            UnaryOp::Tan => x.tan(),
            UnaryOp::Asin => x.asin(),
            UnaryOp::Acos => x.acos(),
            UnaryOp::Atan => x.atan(),
            UnaryOp::Sinh => x.sinh(),
            UnaryOp::Cosh => x.cosh(),
            UnaryOp::Tanh => x.tanh(),
            UnaryOp::Sqrt => x.sqrt(),
            UnaryOp::Floor => x.floor(),
            UnaryOp::Ceil => x.ceil(),
            UnaryOp::Round => x.round(),
            UnaryOp::Exp => x.exp(),
            UnaryOp::Erf => erf(x),
            UnaryOp::Log10 => x.log10(),
            UnaryOp::Exp2 => x.exp2(),
            UnaryOp::InvSqrt => invsqrt(x),
            UnaryOp::Abs => x.abs(),
            UnaryOp::Ln => x.ln(),
            UnaryOp::Sign => sign(x),
            UnaryOp::UMinus => -x,
            UnaryOp::Negate => T::from_bool(x == T::zero()),
        }
    }
}

/// Two-operand elementwise operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Atan2,
    Pow,
    Hypot,
    Max,
    Min,
    Modulo,
    CSign,
    Sum,
    Product,
    SqSum,
    Plus,
    Minus,
    EMultiply,
    Divide,
    Greater,
    Less,
    GreaterOrEqual,
    LessOrEqual,
    Equal,
    NEqual,
    Or,
    And,
}

impl BinaryOp {
    pub const ALL: [BinaryOp; 22] = [
        BinaryOp::Atan2,
        BinaryOp::Pow,
        BinaryOp::Hypot,
        BinaryOp::Max,
        BinaryOp::Min,
        BinaryOp::Modulo,
        BinaryOp::CSign,
        BinaryOp::Sum,
        BinaryOp::Product,
        BinaryOp::SqSum,
        BinaryOp::Plus,
        BinaryOp::Minus,
        BinaryOp::EMultiply,
        BinaryOp::Divide,
        BinaryOp::Greater,
        BinaryOp::Less,
        BinaryOp::GreaterOrEqual,
        BinaryOp::LessOrEqual,
        BinaryOp::Equal,
        BinaryOp::NEqual,
        BinaryOp::Or,
        BinaryOp::And,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BinaryOp::Atan2 => "atan2",
            BinaryOp::Pow => "pow",
            BinaryOp::Hypot => "hypot",
            BinaryOp::Max => "max",
            BinaryOp::Min => "min",
            BinaryOp::Modulo => "modulo",
            BinaryOp::CSign => "csign",
            BinaryOp::Sum => "sum",
            BinaryOp::Product => "product",
            BinaryOp::SqSum => "sqsum",
            BinaryOp::Plus => "plus",
            BinaryOp::Minus => "minus",
            BinaryOp::EMultiply => "emultiply",
            BinaryOp::Divide => "divide",
            BinaryOp::Greater => "greater",
            BinaryOp::Less => "less",
            BinaryOp::GreaterOrEqual => "greater_or_equal",
            BinaryOp::LessOrEqual => "less_or_equal",
            BinaryOp::Equal => "equal",
            BinaryOp::NEqual => "nequal",
            BinaryOp::Or => "or",
            BinaryOp::And => "and",
        }
    }

    /// Operators have no scalar kernel but gain row-/column-wise broadcast variants.
    pub fn is_operator(self) -> bool {
        matches!(
            self,
            BinaryOp::Plus
                | BinaryOp::Minus
                | BinaryOp::EMultiply
                | BinaryOp::Divide
                | BinaryOp::Greater
                | BinaryOp::Less
                | BinaryOp::GreaterOrEqual
                | BinaryOp::LessOrEqual
                | BinaryOp::Equal
                | BinaryOp::NEqual
                | BinaryOp::Or
                | BinaryOp::And
        )
    }

    #[inline]
    pub fn apply<T: Scalar>(self, x0: T, x1: T) -> T {
        let zero = T::zero();
        match self {
            BinaryOp::Atan2 => x0.atan2(x1),
            BinaryOp::Pow => x0.powf(x1),
            BinaryOp::Hypot => x0.hypot(x1),
            BinaryOp::Max => max(x0, x1),
            BinaryOp::Min => min(x0, x1),
            BinaryOp::Modulo => modulo(x0, x1),
            BinaryOp::CSign => x0.copysign(x1),
            BinaryOp::Sum => x0 + x1,
            BinaryOp::Product => x0 * x1,
            BinaryOp::SqSum => x0 * x0 + x1 * x1,
            BinaryOp::Plus => x0 + x1,
            BinaryOp::Minus => x0 - x1,
            BinaryOp::EMultiply => x0 * x1,
            BinaryOp::Divide => x0 / x1,
            BinaryOp::Greater => T::from_bool(x0 > x1),
            BinaryOp::Less => T::from_bool(x0 < x1),
            BinaryOp::GreaterOrEqual => T::from_bool(x0 >= x1),
            BinaryOp::LessOrEqual => T::from_bool(x0 <= x1),
            BinaryOp::Equal => T::from_bool(x0 == x1),
            BinaryOp::NEqual => T::from_bool(x0 != x1),
            BinaryOp::Or => T::from_bool(x0 != zero || x1 != zero),
            BinaryOp::And => T::from_bool(x0 != zero && x1 != zero),
        }
    }
}

/// Three-operand elementwise operations. `x0` is the value, `x1`/`x2` the bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TernaryOp {
    Lerp,
    Clip,
    Cycle,
}

impl TernaryOp {
    pub const ALL: [TernaryOp; 3] = [TernaryOp::Lerp, TernaryOp::Clip, TernaryOp::Cycle];

    pub fn name(self) -> &'static str {
        match self {
            TernaryOp::Lerp => "lerp",
            TernaryOp::Clip => "clip",
            TernaryOp::Cycle => "cycle",
        }
    }

    #[inline]
    pub fn apply<T: Scalar>(self, x0: T, x1: T, x2: T) -> T {
        match self {
            TernaryOp::Lerp => lerp(x0, x1, x2),
            TernaryOp::Clip => clip(x0, x1, x2),
            TernaryOp::Cycle => cycle(x0, x1, x2),
        }
    }
}

/// `-1` when the sign bit is set (negative zero included), `+1` otherwise.
#[inline]
pub fn sign<T: Scalar>(x: T) -> T {
    if x.is_sign_negative() {
        -T::one()
    } else {
        T::one()
    }
}

#[inline]
pub fn invsqrt<T: Scalar>(x: T) -> T {
    T::one() / x.sqrt()
}

#[inline]
pub fn max<T: Scalar>(x0: T, x1: T) -> T {
    if x0 > x1 {
        x0
    } else {
        x1
    }
}

#[inline]
pub fn min<T: Scalar>(x0: T, x1: T) -> T {
    if x0 < x1 {
        x0
    } else {
        x1
    }
}

/// Floored modulo: a nonzero raw remainder whose sign differs from `y` is shifted by `y`,
/// so the result always follows the sign of `y`.
#[inline]
pub fn modulo<T: Scalar>(x: T, y: T) -> T {
    let ans = x % y;
    if ans != T::zero() && (ans < T::zero()) != (y < T::zero()) {
        ans + y
    } else {
        ans
    }
}

/// `lerp(x, a, b) = a + (b - a) x`.
#[inline]
pub fn lerp<T: Scalar>(x: T, a: T, b: T) -> T {
    a + (b - a) * x
}

/// Assumes `lo <= hi`; the bounds are never swapped.
#[inline]
pub fn clip<T: Scalar>(x: T, lo: T, hi: T) -> T {
    if x < lo {
        lo
    } else if x > hi {
        hi
    } else {
        x
    }
}

/// Periodic wrap of `x` onto `[lo, hi]`.
#[inline]
pub fn cycle<T: Scalar>(x: T, lo: T, hi: T) -> T {
    if x < lo {
        hi - (lo - x) % (hi - lo)
    } else if x > hi {
        lo + (x - lo) % (hi - lo)
    } else {
        x
    }
}

/// Abramowitz & Stegun 7.1.26 (|error| < 1.5e-7).
pub fn erf<T: Scalar>(x: T) -> T {
    let a1 = T::lit(0.254829592);
    let a2 = T::lit(-0.284496736);
    let a3 = T::lit(1.421413741);
    let a4 = T::lit(-1.453152027);
    let a5 = T::lit(1.061405429);
    let p = T::lit(0.3275911);

    let s = if x < T::zero() { -T::one() } else { T::one() };
    let v = x.abs();

    let t = T::one() / (T::one() + p * v);
    let y = T::one() - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-v * v).exp();

    s * y
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn comparisons_yield_numeric_truth_values() {
        assert_eq!(BinaryOp::Greater.apply(2.0, 1.0), 1.0);
        assert_eq!(BinaryOp::Less.apply(2.0, 1.0), 0.0);
        assert_eq!(BinaryOp::Equal.apply(3.0_f32, 3.0), 1.0);
        assert_eq!(BinaryOp::And.apply(1.0, 0.0), 0.0);
        assert_eq!(BinaryOp::Or.apply(0.0, -2.0), 1.0);
        assert_eq!(UnaryOp::Negate.apply(0.0), 1.0);
        assert_eq!(UnaryOp::Negate.apply(5.0), 0.0);
    }

    #[test]
    fn sign_treats_negative_zero_as_negative() {
        assert_eq!(sign(-0.0_f64), -1.0);
        assert_eq!(sign(0.0_f64), 1.0);
        assert_eq!(sign(-3.5_f64), -1.0);
    }

    #[test]
    fn modulo_follows_divisor_sign() {
        assert_eq!(modulo(-1.0, 3.0), 2.0);
        assert_eq!(modulo(7.0, 3.0), 1.0);
        assert_eq!(modulo(6.0, 3.0), 0.0);
        assert_eq!(modulo(1.0, -3.0), -2.0);
        assert_eq!(modulo(-1.0, -3.0), -1.0);
    }

    #[test]
    fn cycle_wraps_both_directions() {
        assert!((cycle(-1.0_f64, 0.0, 4.0) - 3.0).abs() < 1e-12);
        assert!((cycle(5.0_f64, 0.0, 4.0) - 1.0).abs() < 1e-12);
        assert_eq!(cycle(2.0, 0.0, 4.0), 2.0);
    }

    #[test]
    fn lerp_and_csign_match_definitions() {
        assert_eq!(lerp(0.25, 2.0, 6.0), 3.0);
        assert_eq!(BinaryOp::CSign.apply(3.0, -0.0), -3.0);
        assert_eq!(BinaryOp::SqSum.apply(3.0, 4.0), 25.0);
        assert!((invsqrt(4.0_f64) - 0.5).abs() < 1e-15);
    }

    #[test]
    fn erf_approximation_is_close() {
        assert!(erf(0.0_f64).abs() < 1e-8);
        assert!((erf(1.0_f64) - 0.8427007929).abs() < 1e-6);
        assert!((erf(-1.0_f64) + 0.8427007929).abs() < 1e-6);
    }

    proptest! {
        #[test]
        fn clip_stays_within_bounds(x in -1e6f64..1e6, a in -1e3f64..1e3, b in -1e3f64..1e3) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let c = clip(x, lo, hi);
            prop_assert!(c >= lo && c <= hi);
            if x >= lo && x <= hi {
                prop_assert_eq!(c, x);
            }
        }

        #[test]
        fn modulo_has_sign_of_divisor(
            x in -1e6f64..1e6,
            y in prop_oneof![-1e3f64..-1e-3, 1e-3f64..1e3],
        ) {
            let m = modulo(x, y);
            prop_assert!(m == 0.0 || m.signum() == y.signum(), "modulo({}, {}) = {}", x, y, m);
        }
    }
}
