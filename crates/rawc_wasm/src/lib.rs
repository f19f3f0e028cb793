//! WASM bridge for the `rawc_core` kernel library.
//!
//! Exposes a resolved double-precision [`WasmKernels`] set to JavaScript. Errors cross the
//! boundary as strings.

mod kernels;
mod linalg;

pub use kernels::WasmKernels;
