//! Error types for the kernel library.

use crate::traits::ElementType;
use thiserror::Error;

/// Result type alias using the kernel library's error.
pub type Result<T> = std::result::Result<T, KernelError>;

/// Errors raised by kernels, the catalog and the capability negotiator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KernelError {
    /// A dense routine with no portable fallback was requested without a linear-algebra backend.
    #[error("Operation '{operation}' requires a linear-algebra backend, but none is available.")]
    MissingBackend { operation: String },

    /// Operand shapes are inconsistent with the selected signature.
    #[error("Dimension mismatch in '{operation}': expected {expected}, got {got}.")]
    DimensionMismatch {
        operation: &'static str,
        expected: String,
        got: String,
    },

    /// The backend reported a degenerate system.
    #[error("Operation '{operation}' failed: system is singular or ill-conditioned.")]
    SingularOrIllConditioned { operation: &'static str },

    /// A reduction was asked to fold an empty vector.
    #[error("Reduction '{operation}' requires at least one element.")]
    DegenerateReduction { operation: &'static str },

    #[error("Unknown operation or kernel '{name}'.")]
    UnknownOperation { name: String },

    #[error("Operation '{operation}' has no kernel for signature {signature}.")]
    UnsupportedSignature {
        operation: String,
        signature: String,
    },

    /// An elimination chain points outside the matrix or does not descend.
    #[error("Invalid elimination chain: parent[{index}] = {parent} for a system of size {size}.")]
    InvalidEliminationChain {
        index: usize,
        parent: i64,
        size: usize,
    },

    #[error("Declared element type {declared} does not match compiled element type {compiled}.")]
    ElementTypeMismatch {
        declared: ElementType,
        compiled: ElementType,
    },

    /// A kernel was called that the resolved kernel set never required.
    #[error("Kernel '{kernel}' is not part of the resolved kernel set.")]
    NotResolved { kernel: String },

    #[error("External kernel '{kernel}' {reason}.")]
    ExternalKernel { kernel: String, reason: &'static str },

    /// An in-place call did not designate exactly one mutable operand in a valid position.
    #[error("In-place call to '{operation}' must target the first vector operand.")]
    InvalidTarget { operation: &'static str },
}

impl KernelError {
    pub(crate) fn mismatch(
        operation: &'static str,
        expected: impl ToString,
        got: impl ToString,
    ) -> Self {
        KernelError::DimensionMismatch {
            operation,
            expected: expected.to_string(),
            got: got.to_string(),
        }
    }
}
