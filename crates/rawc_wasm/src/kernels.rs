//! Elementwise and reduction kernels exposed to JavaScript.

use js_sys::Float64Array;
use rawc_core::broadcast::{self, Operand};
use rawc_core::catalog::{Broadcast, Catalog, KernelId, OperandShape, Operation, ShapeClass};
use rawc_core::config::CapabilityDeclaration;
use rawc_core::error::KernelError;
use rawc_core::matrix::{self, StructuralOp};
use rawc_core::negotiate::{Dispatch, KernelSet};
use rawc_core::reduce;
use rawc_core::traits::ElementType;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

/// A resolved double-precision kernel set.
#[wasm_bindgen]
pub struct WasmKernels {
    pub(crate) set: KernelSet<f64>,
}

pub(crate) fn js_error(context: &str, err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{} failed: {}", context, err))
}

/// Every catalog kernel the configuration can satisfy: all of them with a backend,
/// everything except the backend-only dense routines without one.
pub(crate) fn default_declaration(linear_algebra_backend: bool) -> CapabilityDeclaration {
    let mut declaration = CapabilityDeclaration::new(ElementType::Double, linear_algebra_backend);
    for id in Catalog::standard().kernels() {
        let backend_only = matches!(id.operation, Operation::Dense(op) if op.requires_backend());
        if linear_algebra_backend || !backend_only {
            declaration = declaration.require(id.name());
        }
    }
    declaration
}

fn unsupported(id: &KernelId) -> KernelError {
    KernelError::UnsupportedSignature {
        operation: id.operation.name().to_string(),
        signature: id.signature.to_string(),
    }
}

/// A length-1 argument is a broadcast scalar unless every argument has length 1.
fn shapes(args: &[&[f64]]) -> Vec<OperandShape> {
    let all_single = args.iter().all(|a| a.len() == 1);
    args.iter()
        .map(|a| {
            if a.len() == 1 && !all_single {
                OperandShape::Scalar
            } else {
                OperandShape::vector(a.len())
            }
        })
        .collect()
}

fn operand<'a>(values: &'a [f64], shape: &OperandShape) -> Operand<'a, f64> {
    match shape {
        OperandShape::Scalar => Operand::Scalar(values[0]),
        OperandShape::Dense { .. } => Operand::Vector(values),
    }
}

fn output_len(shapes: &[OperandShape]) -> usize {
    shapes
        .iter()
        .filter(|s| s.class() == ShapeClass::Matrix)
        .map(|s| s.len())
        .max()
        .unwrap_or(1)
}

/// Runs `id` on its supplied implementation when it has one, otherwise on `builtin`.
fn execute(
    set: &KernelSet<f64>,
    id: &KernelId,
    operands: &[&[f64]],
    out: &mut [f64],
    builtin: impl FnOnce(&mut [f64]),
) -> Result<(), KernelError> {
    match set.lookup(id)? {
        Dispatch::External(kernel) => kernel(operands, out),
        Dispatch::Fallback | Dispatch::Backend => builtin(out),
    }
    Ok(())
}

/// Gate for routines that only run inside this crate: the kernel must be resolved, and
/// nothing supplied externally can stand in for it.
pub(crate) fn builtin_only(set: &KernelSet<f64>, id: &KernelId) -> Result<(), KernelError> {
    match set.lookup(id)? {
        Dispatch::Fallback | Dispatch::Backend => Ok(()),
        Dispatch::External(_) => Err(unsupported(id)),
    }
}

pub(crate) fn run_unary(
    set: &KernelSet<f64>,
    name: &str,
    x: &[f64],
) -> Result<Vec<f64>, KernelError> {
    let id = Catalog::standard().select(name, &[OperandShape::vector(x.len())], false)?;
    let Operation::Unary(op) = id.operation else {
        return Err(unsupported(&id));
    };
    let mut out = vec![0.0; x.len()];
    execute(set, &id, &[x], &mut out, |out| broadcast::unary_unchecked(op, x, out))?;
    Ok(out)
}

pub(crate) fn run_binary(
    set: &KernelSet<f64>,
    name: &str,
    x0: &[f64],
    x1: &[f64],
) -> Result<Vec<f64>, KernelError> {
    let shapes = shapes(&[x0, x1]);
    let id = Catalog::standard().select(name, &shapes, false)?;
    let Operation::Binary(op) = id.operation else {
        return Err(unsupported(&id));
    };
    let mut out = vec![0.0; output_len(&shapes)];
    execute(set, &id, &[x0, x1], &mut out, |out| {
        broadcast::binary_unchecked(op, operand(x0, &shapes[0]), operand(x1, &shapes[1]), out)
    })?;
    Ok(out)
}

/// Binary operation over explicitly shaped operands, enabling row-/column-wise broadcast.
pub(crate) fn run_binary_matrix(
    set: &KernelSet<f64>,
    name: &str,
    x0: &[f64],
    shape0: OperandShape,
    x1: &[f64],
    shape1: OperandShape,
) -> Result<Vec<f64>, KernelError> {
    for (values, shape) in [(x0, shape0), (x1, shape1)] {
        if values.len() != shape.len() {
            return Err(KernelError::DimensionMismatch {
                operation: "binary",
                expected: format!("{} elements for {}", shape.len(), shape),
                got: values.len().to_string(),
            });
        }
    }

    let id = Catalog::standard().select(name, &[shape0, shape1], false)?;
    let Operation::Binary(op) = id.operation else {
        return Err(unsupported(&id));
    };

    match id.signature.broadcast {
        Broadcast::Elementwise => run_binary(set, name, x0, x1),
        layout => {
            let matrix_first = id.signature.operands[0] == ShapeClass::Matrix;
            let matrix = if matrix_first { shape0 } else { shape1 };
            let mut out = vec![0.0; matrix.len()];
            execute(set, &id, &[x0, x1], &mut out, |out| {
                broadcast::binary_broadcast_unchecked(
                    op,
                    layout,
                    matrix_first,
                    x0,
                    x1,
                    matrix.rows(),
                    matrix.columns(),
                    out,
                )
            })?;
            Ok(out)
        }
    }
}

pub(crate) fn run_ternary(
    set: &KernelSet<f64>,
    name: &str,
    x0: &[f64],
    x1: &[f64],
    x2: &[f64],
) -> Result<Vec<f64>, KernelError> {
    let shapes = shapes(&[x0, x1, x2]);
    let id = Catalog::standard().select(name, &shapes, false)?;
    let Operation::Ternary(op) = id.operation else {
        return Err(unsupported(&id));
    };
    let mut out = vec![0.0; output_len(&shapes)];
    execute(set, &id, &[x0, x1, x2], &mut out, |out| {
        broadcast::ternary_unchecked(
            op,
            operand(x0, &shapes[0]),
            operand(x1, &shapes[1]),
            operand(x2, &shapes[2]),
            out,
        )
    })?;
    Ok(out)
}

pub(crate) fn run_reduce(
    set: &KernelSet<f64>,
    name: &str,
    x: &[f64],
) -> Result<f64, KernelError> {
    let id = Catalog::standard().select(name, &[OperandShape::vector(x.len())], false)?;
    let Operation::Reduce(op) = id.operation else {
        return Err(unsupported(&id));
    };
    let mut out = [0.0];
    execute(set, &id, &[x], &mut out, |out| {
        out[0] = reduce::reduce_unchecked(op, x);
    })?;
    Ok(out[0])
}

pub(crate) fn run_transpose(
    set: &KernelSet<f64>,
    x: &[f64],
    rows: usize,
    columns: usize,
) -> Result<Vec<f64>, KernelError> {
    let id = KernelId::vector(Operation::Structure(StructuralOp::Transpose));
    let expected = rows * columns;
    if x.len() != expected {
        return Err(KernelError::DimensionMismatch {
            operation: "transpose",
            expected: format!("{} elements for a {}x{} matrix", expected, rows, columns),
            got: x.len().to_string(),
        });
    }
    let mut out = vec![0.0; x.len()];
    execute(set, &id, &[x], &mut out, |out| {
        matrix::transpose_into(x, rows, columns, out);
    })?;
    Ok(out)
}

#[wasm_bindgen]
impl WasmKernels {
    /// Requires every kernel the configuration can satisfy.
    #[wasm_bindgen(constructor)]
    pub fn new(linear_algebra_backend: bool) -> Result<WasmKernels, JsValue> {
        console_error_panic_hook::set_once();
        let set = KernelSet::resolve(&default_declaration(linear_algebra_backend))
            .map_err(|e| js_error("Kernel negotiation", e))?;
        Ok(WasmKernels { set })
    }

    /// Resolves a serialized capability declaration.
    pub fn from_declaration(declaration: JsValue) -> Result<WasmKernels, JsValue> {
        console_error_panic_hook::set_once();
        let declaration: CapabilityDeclaration = from_value(declaration)
            .map_err(|e| js_error("Reading capability declaration", e))?;
        let set = KernelSet::resolve(&declaration).map_err(|e| js_error("Kernel negotiation", e))?;
        Ok(WasmKernels { set })
    }

    /// Names of the kernels that run on built-in fallbacks.
    pub fn fallbacks(&self) -> Result<JsValue, JsValue> {
        to_value(&self.set.negotiation().fallback_names())
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    pub fn backend(&self) -> String {
        self.set.dense().backend_name().to_string()
    }

    /// Whether dense routines go through the linear-algebra backend.
    pub fn has_backend(&self) -> bool {
        self.set.negotiation().backend_available()
    }

    pub fn unary(&self, name: &str, x: &[f64]) -> Result<Float64Array, JsValue> {
        let out = run_unary(&self.set, name, x).map_err(|e| js_error(name, e))?;
        Ok(Float64Array::from(out.as_slice()))
    }

    pub fn binary(&self, name: &str, x0: &[f64], x1: &[f64]) -> Result<Float64Array, JsValue> {
        let out = run_binary(&self.set, name, x0, x1).map_err(|e| js_error(name, e))?;
        Ok(Float64Array::from(out.as_slice()))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn binary_matrix(
        &self,
        name: &str,
        x0: &[f64],
        rows0: usize,
        columns0: usize,
        x1: &[f64],
        rows1: usize,
        columns1: usize,
    ) -> Result<Float64Array, JsValue> {
        let out = run_binary_matrix(
            &self.set,
            name,
            x0,
            OperandShape::dense(rows0, columns0),
            x1,
            OperandShape::dense(rows1, columns1),
        )
        .map_err(|e| js_error(name, e))?;
        Ok(Float64Array::from(out.as_slice()))
    }

    pub fn ternary(
        &self,
        name: &str,
        x0: &[f64],
        x1: &[f64],
        x2: &[f64],
    ) -> Result<Float64Array, JsValue> {
        let out = run_ternary(&self.set, name, x0, x1, x2).map_err(|e| js_error(name, e))?;
        Ok(Float64Array::from(out.as_slice()))
    }

    pub fn reduce(&self, name: &str, x: &[f64]) -> Result<f64, JsValue> {
        run_reduce(&self.set, name, x).map_err(|e| js_error(name, e))
    }

    pub fn transpose(
        &self,
        x: &[f64],
        rows: usize,
        columns: usize,
    ) -> Result<Float64Array, JsValue> {
        let out =
            run_transpose(&self.set, x, rows, columns).map_err(|e| js_error("transpose", e))?;
        Ok(Float64Array::from(out.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn kernels() -> KernelSet<f64> {
        KernelSet::resolve(&default_declaration(false)).expect("resolve")
    }

    #[test]
    fn length_one_arguments_broadcast() {
        let set = kernels();
        let out = run_binary(&set, "minus", &[10.0], &[1.0, 2.0, 3.0]).expect("minus");
        assert_eq!(out, vec![9.0, 8.0, 7.0]);

        let out = run_ternary(&set, "clip", &[-1.0, 0.5, 2.0], &[0.0], &[1.0]).expect("clip");
        assert_eq!(out, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn single_element_arguments_stay_vectors() {
        let set = kernels();
        assert_eq!(run_binary(&set, "hypot", &[3.0], &[4.0]).expect("hypot"), vec![5.0]);
        assert_eq!(run_binary(&set, "plus", &[3.0], &[4.0]).expect("plus"), vec![7.0]);
        assert_eq!(
            run_ternary(&set, "lerp", &[0.25], &[0.0], &[8.0]).expect("lerp"),
            vec![2.0]
        );
    }

    #[test]
    fn unary_and_reduction_by_name() {
        let set = kernels();
        assert_eq!(run_unary(&set, "uminus", &[1.0, -2.0]).expect("uminus"), vec![-1.0, 2.0]);
        assert_eq!(run_reduce(&set, "product", &[1.0, 2.0, 3.0, 4.0]).expect("product"), 24.0);
        assert!(matches!(
            run_reduce(&set, "sum", &[]),
            Err(KernelError::DegenerateReduction { .. })
        ));
        assert!(matches!(
            run_unary(&set, "nope", &[1.0]),
            Err(KernelError::UnknownOperation { .. })
        ));
    }

    #[test]
    fn shaped_binary_broadcasts_by_column() {
        let set = kernels();
        // 2x2 [[1, 3], [2, 4]] plus a 2x1 column.
        let out = run_binary_matrix(
            &set,
            "plus",
            &[1.0, 2.0, 3.0, 4.0],
            OperandShape::dense(2, 2),
            &[10.0, 20.0],
            OperandShape::dense(2, 1),
        )
        .expect("plus");
        assert_eq!(out, vec![11.0, 22.0, 13.0, 24.0]);

        let out = run_binary_matrix(
            &set,
            "minus",
            &[10.0, 20.0],
            OperandShape::dense(2, 1),
            &[1.0, 2.0, 3.0, 4.0],
            OperandShape::dense(2, 2),
        )
        .expect("minus");
        assert_eq!(out, vec![-9.0, -18.0, -7.0, -16.0]);

        assert!(run_binary_matrix(
            &set,
            "plus",
            &[1.0, 2.0, 3.0],
            OperandShape::dense(2, 2),
            &[1.0],
            OperandShape::dense(1, 1),
        )
        .is_err());
    }

    #[test]
    fn declaration_without_backend_excludes_factorizations() {
        let declaration = default_declaration(false);
        assert!(!declaration.kernels.contains_key("linsolve_v"));
        assert!(declaration.kernels.contains_key("matrix_multiply_v"));
        let set = KernelSet::<f64>::resolve(&declaration).expect("resolve");
        assert_eq!(set.dense().backend_name(), "portable");
    }

    #[test]
    fn calls_are_limited_to_the_resolved_set() {
        let declaration = CapabilityDeclaration::new(ElementType::Double, false).require("cos_v");
        let set = KernelSet::<f64>::resolve(&declaration).expect("resolve");

        assert_eq!(run_unary(&set, "cos", &[0.0]).expect("cos"), vec![1.0]);
        assert_eq!(
            run_unary(&set, "sin", &[0.0]).expect_err("sin_v was never required"),
            KernelError::NotResolved {
                kernel: "sin_v".to_string()
            }
        );
        assert!(matches!(
            run_transpose(&set, &[1.0, 2.0], 1, 2),
            Err(KernelError::NotResolved { .. })
        ));
    }

    fn halve(operands: &[&[f64]], out: &mut [f64]) {
        for (o, x) in out.iter_mut().zip(operands[0]) {
            *o = x / 2.0;
        }
    }

    #[test]
    fn available_kernels_use_the_supplied_implementation() {
        let declaration = CapabilityDeclaration::new(ElementType::Double, false)
            .require("sqrt_v")
            .provide("sqrt_v");
        let set = KernelSet::<f64>::resolve(&declaration).expect("resolve");
        assert!(matches!(
            run_unary(&set, "sqrt", &[4.0]),
            Err(KernelError::ExternalKernel { .. })
        ));

        let sqrt_v = KernelId::from_name("sqrt_v").expect("sqrt_v");
        let set = set.with_external(sqrt_v, Arc::new(halve)).expect("supply");
        assert_eq!(run_unary(&set, "sqrt", &[4.0, 9.0]).expect("sqrt"), vec![2.0, 4.5]);
    }

    #[test]
    fn transpose_checks_its_dimensions() {
        let set = kernels();
        let out = run_transpose(&set, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 3).expect("transpose");
        assert_eq!(out, vec![1.0, 3.0, 5.0, 2.0, 4.0, 6.0]);
        assert!(matches!(
            run_transpose(&set, &[1.0, 2.0, 3.0], 2, 2),
            Err(KernelError::DimensionMismatch { .. })
        ));
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    #[wasm_bindgen_test]
    fn constructor_resolves_with_backend() {
        let kernels = WasmKernels::new(true).expect("kernels");
        assert_eq!(kernels.backend(), "nalgebra");
        let out = kernels.unary("sqrt", &[4.0, 9.0]).expect("sqrt");
        assert_eq!(out.to_vec(), vec![2.0, 3.0]);
    }

    #[wasm_bindgen_test]
    fn unknown_names_surface_as_errors() {
        let kernels = WasmKernels::new(false).expect("kernels");
        assert!(kernels.binary("frobnicate", &[1.0], &[2.0]).is_err());
    }
}
