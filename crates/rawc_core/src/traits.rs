use nalgebra::RealField;
use num_traits::{Float, FromPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};

/// Precision of every value flowing through one compiled kernel set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Single,
    Double,
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::Single => write!(f, "single"),
            ElementType::Double => write!(f, "double"),
        }
    }
}

/// A trait for types that can be used as kernel element values.
/// Must support basic arithmetic, debug printing, and conversion from f64.
///
/// Only `f32` and `f64` implement it; there is no mixed precision within one operation.
pub trait Scalar: Float + FromPrimitive + Debug + Default + Send + Sync + 'static {
    /// The element type this scalar realizes.
    const ELEMENT: ElementType;

    /// Converts a literal constant. Every finite `f64` is representable (possibly rounded)
    /// in both supported element types.
    fn lit(value: f64) -> Self;

    /// The boolean encoding used by comparisons and logical operators.
    fn from_bool(value: bool) -> Self {
        if value {
            Self::one()
        } else {
            Self::zero()
        }
    }
}

impl Scalar for f32 {
    const ELEMENT: ElementType = ElementType::Single;

    fn lit(value: f64) -> Self {
        value as f32
    }
}

impl Scalar for f64 {
    const ELEMENT: ElementType = ElementType::Double;

    fn lit(value: f64) -> Self {
        value
    }
}

/// Scalars that can also be handed to the vendor linear-algebra backend.
///
/// Kept separate from `Scalar` because `Float` and `RealField` expose methods with the
/// same names; elementwise kernels only ever see `Scalar`.
pub trait LinalgScalar: Scalar + RealField {}

impl<T: Scalar + RealField> LinalgScalar for T {}
