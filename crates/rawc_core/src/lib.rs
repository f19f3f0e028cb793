//! The `rawc_core` crate is the numeric kernel library behind compiled networks.
//! It is generic over one element type (`f32` or `f64`) per resolved kernel set.
//!
//! Key components:
//! - **Catalog**: every supported operation, its arity and operand-shape signatures.
//! - **Negotiator**: decides from `(required, available)` flags which kernels need a built-in
//!   fallback, and dispatches each resolved kernel.
//! - **Broadcast / Reduce**: elementwise kernels over scalar and vector operands, and vector folds.
//! - **Linalg**: dense multiply, LU solve, inverse, QR and pseudo-inverse behind a backend
//!   strategy.
//! - **Sparse**: in-place LTDL factorization and substitution along an elimination forest.

pub mod broadcast;
pub mod catalog;
pub mod config;
pub mod error;
pub mod linalg;
pub mod matrix;
pub mod negotiate;
pub mod ops;
pub mod reduce;
pub mod sparse;
pub mod traits;

pub use catalog::{Catalog, KernelId, OperandShape, Operation, OperationSignature};
pub use config::CapabilityDeclaration;
pub use error::{KernelError, Result};
pub use matrix::DenseMatrix;
pub use negotiate::{CapabilityFlag, Dispatch, ExternalKernel, FeatureTable, KernelSet};
pub use traits::{ElementType, LinalgScalar, Scalar};
