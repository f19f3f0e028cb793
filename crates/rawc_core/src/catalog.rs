//! The operation catalog.
//!
//! The catalog is the fixed set of supported operations, their arities and the operand
//! shape combinations each one has a kernel for. It is built once and never mutated;
//! consumers select a kernel by operation name plus operand shapes.

use crate::error::{KernelError, Result};
use crate::linalg::DenseOp;
use crate::matrix::StructuralOp;
use crate::ops::{BinaryOp, TernaryOp, UnaryOp};
use crate::reduce::Reduction;
use crate::sparse::SparseOp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

/// Whether an operand position holds a broadcast scalar (`1`) or a dense array (`m`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ShapeClass {
    Scalar,
    Matrix,
}

impl ShapeClass {
    fn tag(self) -> &'static str {
        match self {
            ShapeClass::Scalar => "1",
            ShapeClass::Matrix => "m",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "1" => Some(ShapeClass::Scalar),
            "m" => Some(ShapeClass::Matrix),
            _ => None,
        }
    }
}

/// Concrete shape of an operand: a scalar, or a `rows x columns` column-major array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperandShape {
    Scalar,
    Dense { rows: usize, columns: usize },
}

impl OperandShape {
    pub fn dense(rows: usize, columns: usize) -> Self {
        OperandShape::Dense { rows, columns }
    }

    pub fn vector(len: usize) -> Self {
        OperandShape::Dense {
            rows: len,
            columns: 1,
        }
    }

    pub fn class(&self) -> ShapeClass {
        match self {
            OperandShape::Scalar => ShapeClass::Scalar,
            OperandShape::Dense { .. } => ShapeClass::Matrix,
        }
    }

    /// Number of stored elements.
    pub fn len(&self) -> usize {
        match self {
            OperandShape::Scalar => 1,
            OperandShape::Dense { rows, columns } => rows * columns,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn rows(&self) -> usize {
        match self {
            OperandShape::Scalar => 1,
            OperandShape::Dense { rows, .. } => *rows,
        }
    }

    pub fn columns(&self) -> usize {
        match self {
            OperandShape::Scalar => 1,
            OperandShape::Dense { columns, .. } => *columns,
        }
    }

    fn is_square(&self) -> bool {
        self.rows() == self.columns()
    }
}

impl fmt::Display for OperandShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperandShape::Scalar => write!(f, "scalar"),
            OperandShape::Dense { rows, columns } => write!(f, "{}x{}", rows, columns),
        }
    }
}

/// How a binary operator lines up a matrix with a vector operand.
///
/// For the row and column layouts the matrix is always the left operand, so
/// `minus_v_cwise_1_m(v, M)` and `minus_v_cwise_m_1(M, v)` both compute `M[i] - v[r]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Broadcast {
    /// Positions pair up one to one; scalars are repeated.
    Elementwise,
    /// The vector has one entry per matrix row and is indexed by row.
    ColumnWise,
    /// The vector has one entry per matrix column and is indexed by column.
    RowWise,
}

/// One supported calling convention of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationSignature {
    pub operands: Vec<ShapeClass>,
    pub result: ShapeClass,
    pub in_place: bool,
    pub broadcast: Broadcast,
}

impl OperationSignature {
    fn new(operands: Vec<ShapeClass>, result: ShapeClass) -> Self {
        Self {
            operands,
            result,
            in_place: false,
            broadcast: Broadcast::Elementwise,
        }
    }

    fn in_place(mut self) -> Self {
        self.in_place = true;
        self
    }

    fn with_broadcast(mut self, broadcast: Broadcast) -> Self {
        self.broadcast = broadcast;
        self
    }

    pub fn arity(&self) -> usize {
        self.operands.len()
    }

    /// True for the plain scalar kernel of an elementwise function.
    pub fn is_scalar(&self) -> bool {
        self.result == ShapeClass::Scalar && self.operands.iter().all(|c| *c == ShapeClass::Scalar)
    }

    fn tags(&self) -> String {
        self.operands
            .iter()
            .map(|c| c.tag())
            .collect::<Vec<_>>()
            .join("_")
    }
}

impl fmt::Display for OperationSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.tags())?;
        if self.broadcast != Broadcast::Elementwise {
            write!(f, " {:?}", self.broadcast)?;
        }
        if self.in_place {
            write!(f, " in-place")?;
        }
        Ok(())
    }
}

/// Every operation known to the kernel library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Operation {
    Unary(UnaryOp),
    Binary(BinaryOp),
    Ternary(TernaryOp),
    Reduce(Reduction),
    Structure(StructuralOp),
    Dense(DenseOp),
    Sparse(SparseOp),
}

const ELEMENTWISE_BINARY: [[ShapeClass; 2]; 3] = [
    [ShapeClass::Matrix, ShapeClass::Matrix],
    [ShapeClass::Matrix, ShapeClass::Scalar],
    [ShapeClass::Scalar, ShapeClass::Matrix],
];

const ELEMENTWISE_TERNARY: [[ShapeClass; 3]; 7] = [
    [ShapeClass::Matrix, ShapeClass::Matrix, ShapeClass::Matrix],
    [ShapeClass::Matrix, ShapeClass::Matrix, ShapeClass::Scalar],
    [ShapeClass::Matrix, ShapeClass::Scalar, ShapeClass::Matrix],
    [ShapeClass::Matrix, ShapeClass::Scalar, ShapeClass::Scalar],
    [ShapeClass::Scalar, ShapeClass::Matrix, ShapeClass::Matrix],
    [ShapeClass::Scalar, ShapeClass::Matrix, ShapeClass::Scalar],
    [ShapeClass::Scalar, ShapeClass::Scalar, ShapeClass::Matrix],
];

impl Operation {
    /// All operations in catalog order.
    pub fn all() -> Vec<Operation> {
        let mut ops = Vec::new();
        ops.extend(UnaryOp::ALL.iter().copied().map(Operation::Unary));
        ops.extend(BinaryOp::ALL.iter().copied().map(Operation::Binary));
        ops.extend(TernaryOp::ALL.iter().copied().map(Operation::Ternary));
        ops.extend(Reduction::ALL.iter().copied().map(Operation::Reduce));
        ops.extend(StructuralOp::ALL.iter().copied().map(Operation::Structure));
        ops.extend(DenseOp::ALL.iter().copied().map(Operation::Dense));
        ops.extend(SparseOp::ALL.iter().copied().map(Operation::Sparse));
        ops
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::Unary(op) => op.name(),
            Operation::Binary(op) => op.name(),
            Operation::Ternary(op) => op.name(),
            Operation::Reduce(op) => op.name(),
            Operation::Structure(op) => op.name(),
            Operation::Dense(op) => op.name(),
            Operation::Sparse(op) => op.name(),
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Operation::Unary(_) | Operation::Reduce(_) => 1,
            Operation::Binary(_) => 2,
            Operation::Ternary(_) => 3,
            Operation::Structure(op) => op.arity(),
            Operation::Dense(op) => op.arity(),
            Operation::Sparse(op) => op.arity(),
        }
    }

    fn has_scalar_kernel(&self) -> bool {
        match self {
            Operation::Unary(op) => !op.is_operator(),
            Operation::Binary(op) => !op.is_operator(),
            Operation::Ternary(_) => true,
            _ => false,
        }
    }

    /// The complete, fixed list of signatures this operation supports.
    pub fn signatures(&self) -> Vec<OperationSignature> {
        use ShapeClass::{Matrix, Scalar};

        let mut out = Vec::new();
        let arity = self.arity();

        match self {
            Operation::Unary(_) | Operation::Binary(_) | Operation::Ternary(_) => {
                if self.has_scalar_kernel() {
                    out.push(OperationSignature::new(vec![Scalar; arity], Scalar));
                }
                let combos: Vec<Vec<ShapeClass>> = match arity {
                    1 => vec![vec![Matrix]],
                    2 => ELEMENTWISE_BINARY.iter().map(|c| c.to_vec()).collect(),
                    _ => ELEMENTWISE_TERNARY.iter().map(|c| c.to_vec()).collect(),
                };
                for combo in combos {
                    let sig = OperationSignature::new(combo, Matrix);
                    out.push(sig.clone());
                    out.push(sig.in_place());
                }
                if let Operation::Binary(op) = self {
                    if op.is_operator() {
                        for broadcast in [Broadcast::ColumnWise, Broadcast::RowWise] {
                            for combo in [[Scalar, Matrix], [Matrix, Scalar]] {
                                out.push(
                                    OperationSignature::new(combo.to_vec(), Matrix)
                                        .with_broadcast(broadcast),
                                );
                            }
                        }
                    }
                }
            }
            Operation::Reduce(_) => out.push(OperationSignature::new(vec![Matrix], Scalar)),
            Operation::Dense(DenseOp::MatrixMultiply) => {
                out.push(OperationSignature::new(vec![Matrix, Matrix], Scalar));
                out.push(OperationSignature::new(vec![Matrix, Matrix], Matrix));
            }
            _ => out.push(OperationSignature::new(vec![Matrix; arity], Matrix)),
        }

        out
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A concrete kernel: an operation together with one of its signatures.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KernelId {
    pub operation: Operation,
    pub signature: OperationSignature,
}

impl KernelId {
    pub fn new(operation: Operation, signature: OperationSignature) -> Self {
        Self {
            operation,
            signature,
        }
    }

    /// The plain scalar kernel of an elementwise function.
    pub fn scalar(operation: Operation) -> Self {
        let arity = operation.arity();
        Self::new(
            operation,
            OperationSignature::new(vec![ShapeClass::Scalar; arity], ShapeClass::Scalar),
        )
    }

    /// The vector (out-of-place) kernel of a non-elementwise operation.
    pub fn vector(operation: Operation) -> Self {
        let arity = operation.arity();
        let result = match operation {
            Operation::Reduce(_) => ShapeClass::Scalar,
            _ => ShapeClass::Matrix,
        };
        Self::new(
            operation,
            OperationSignature::new(vec![ShapeClass::Matrix; arity], result),
        )
    }

    /// Parses a stable kernel name back into its identifier.
    ///
    /// The name is split into operation, signature tags and the `_ip` suffix; the
    /// candidate must be one of the operation's signatures and print back to `name`.
    pub fn from_name(name: &str) -> Result<KernelId> {
        let (base, in_place) = match name.strip_suffix("_ip") {
            Some(base) => (base, true),
            None => (name, false),
        };
        let catalog = Catalog::standard();

        for (op_name, rest) in split_operation(base) {
            let Some(form) = NameForm::parse(rest) else {
                continue;
            };
            let Ok(operations) = catalog.operations(op_name) else {
                continue;
            };
            for &op in operations {
                for signature in op.signatures() {
                    if signature.in_place != in_place || !form.matches(op, &signature) {
                        continue;
                    }
                    let id = KernelId::new(op, signature);
                    if id.name() == name {
                        return Ok(id);
                    }
                }
            }
        }

        Err(KernelError::UnknownOperation {
            name: name.to_string(),
        })
    }

    /// Stable kernel name, e.g. `sin`, `sin_v`, `plus_v_m_1_ip`, `minus_v_cwise_1_m`, `sum_v`.
    pub fn name(&self) -> String {
        let op = self.operation.name();
        let sig = &self.signature;

        let mut name = match self.operation {
            Operation::Unary(_) | Operation::Binary(_) | Operation::Ternary(_) => {
                if sig.is_scalar() {
                    op.to_string()
                } else if sig.arity() == 1 {
                    format!("{}_v", op)
                } else {
                    match sig.broadcast {
                        Broadcast::Elementwise => format!("{}_v_{}", op, sig.tags()),
                        Broadcast::ColumnWise => format!("{}_v_cwise_{}", op, sig.tags()),
                        Broadcast::RowWise => format!("{}_v_rwise_{}", op, sig.tags()),
                    }
                }
            }
            Operation::Structure(StructuralOp::DiagExtract) => "diag_v_m".to_string(),
            Operation::Structure(StructuralOp::DiagBuild) => "diag_v_v".to_string(),
            Operation::Sparse(_) => op.to_string(),
            Operation::Reduce(_) => format!("{}_v", op),
            Operation::Structure(_) | Operation::Dense(_) => {
                if sig.result == ShapeClass::Scalar {
                    op.to_string()
                } else {
                    format!("{}_v", op)
                }
            }
        };

        if sig.in_place {
            name.push_str("_ip");
        }
        name
    }
}

/// Candidate `(operation, signature part)` splits of a kernel name: the whole name, then
/// every split in front of a `_v` segment.
fn split_operation(base: &str) -> impl Iterator<Item = (&str, &str)> {
    std::iter::once((base, "")).chain(
        base.match_indices("_v")
            .map(move |(i, _)| base.split_at(i))
            .filter(|(_, rest)| rest.len() == 2 || rest[2..].starts_with('_')),
    )
}

/// Signature part of a kernel name.
#[derive(Debug, PartialEq)]
enum NameForm {
    /// No suffix: scalar kernels, sparse kernels and scalar-result dense forms.
    Plain,
    /// `_v`: unary vector kernels, reductions, structural and dense kernels.
    Vector,
    /// `_v_<tags>`, `_v_cwise_<tags>` or `_v_rwise_<tags>`.
    Tagged(Broadcast, Vec<ShapeClass>),
}

impl NameForm {
    fn parse(rest: &str) -> Option<Self> {
        let Some(tail) = rest.strip_prefix("_v") else {
            return rest.is_empty().then_some(NameForm::Plain);
        };
        let Some(tail) = tail.strip_prefix('_') else {
            return tail.is_empty().then_some(NameForm::Vector);
        };

        let (broadcast, tags) = if let Some(tags) = tail.strip_prefix("cwise_") {
            (Broadcast::ColumnWise, tags)
        } else if let Some(tags) = tail.strip_prefix("rwise_") {
            (Broadcast::RowWise, tags)
        } else {
            (Broadcast::Elementwise, tail)
        };

        // `v` marks a vector operand, as in `diag_v_v`.
        let classes = tags
            .split('_')
            .map(|tag| match tag {
                "v" => Some(ShapeClass::Matrix),
                tag => ShapeClass::from_tag(tag),
            })
            .collect::<Option<Vec<_>>>()?;
        Some(NameForm::Tagged(broadcast, classes))
    }

    fn matches(&self, op: Operation, signature: &OperationSignature) -> bool {
        let elementwise = matches!(
            op,
            Operation::Unary(_) | Operation::Binary(_) | Operation::Ternary(_)
        );
        match self {
            NameForm::Plain => signature.is_scalar() || !elementwise,
            NameForm::Vector => {
                !signature.is_scalar() && signature.broadcast == Broadcast::Elementwise
            }
            NameForm::Tagged(broadcast, classes) => {
                signature.broadcast == *broadcast && signature.operands == *classes
            }
        }
    }
}

impl fmt::Display for KernelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// The fixed catalog of operations and kernels.
#[derive(Debug)]
pub struct Catalog {
    by_name: BTreeMap<&'static str, Vec<Operation>>,
    kernels: BTreeMap<String, KernelId>,
}

impl Catalog {
    fn build() -> Self {
        let mut by_name: BTreeMap<&'static str, Vec<Operation>> = BTreeMap::new();
        let mut kernels = BTreeMap::new();

        for op in Operation::all() {
            by_name.entry(op.name()).or_default().push(op);
            for signature in op.signatures() {
                let id = KernelId::new(op, signature);
                kernels.insert(id.name(), id);
            }
        }

        Self { by_name, kernels }
    }

    /// The process-wide catalog.
    pub fn standard() -> &'static Catalog {
        static CATALOG: OnceLock<Catalog> = OnceLock::new();
        CATALOG.get_or_init(Catalog::build)
    }

    /// Operations sharing a name (e.g. `sum` is both a binary function and a reduction).
    pub fn operations(&self, name: &str) -> Result<&[Operation]> {
        self.by_name
            .get(name)
            .map(|ops| ops.as_slice())
            .ok_or_else(|| KernelError::UnknownOperation {
                name: name.to_string(),
            })
    }

    pub fn kernels(&self) -> impl Iterator<Item = &KernelId> {
        self.kernels.values()
    }

    /// Looks up a kernel by its stable name.
    pub fn kernel(&self, name: &str) -> Result<&KernelId> {
        self.kernels
            .get(name)
            .ok_or_else(|| KernelError::UnknownOperation {
                name: name.to_string(),
            })
    }

    /// Selects the kernel for `name` applied to operands of the given shapes.
    ///
    /// Shapes are validated here, so the returned kernel may be executed on the engines'
    /// unchecked paths.
    pub fn select(&self, name: &str, shapes: &[OperandShape], in_place: bool) -> Result<KernelId> {
        let candidates = self.operations(name)?;
        let mut last_err = None;

        for op in candidates.iter().filter(|op| op.arity() == shapes.len()) {
            match select_for(*op, shapes, in_place) {
                Ok(id) => return Ok(id),
                Err(err) => last_err = Some(err),
            }
        }

        Err(last_err.unwrap_or_else(|| KernelError::UnsupportedSignature {
            operation: name.to_string(),
            signature: describe(shapes, in_place),
        }))
    }
}

fn describe(shapes: &[OperandShape], in_place: bool) -> String {
    let parts: Vec<String> = shapes.iter().map(|s| s.to_string()).collect();
    format!(
        "({}){}",
        parts.join(", "),
        if in_place { " in-place" } else { "" }
    )
}

fn unsupported(op: Operation, shapes: &[OperandShape], in_place: bool) -> KernelError {
    KernelError::UnsupportedSignature {
        operation: op.name().to_string(),
        signature: describe(shapes, in_place),
    }
}

fn select_for(op: Operation, shapes: &[OperandShape], in_place: bool) -> Result<KernelId> {
    let classes: Vec<ShapeClass> = shapes.iter().map(|s| s.class()).collect();

    match op {
        Operation::Unary(_) | Operation::Binary(_) | Operation::Ternary(_) => {
            select_elementwise(op, shapes, classes, in_place)
        }
        Operation::Reduce(_) => {
            if in_place || classes[0] != ShapeClass::Matrix {
                return Err(unsupported(op, shapes, in_place));
            }
            if shapes[0].is_empty() {
                return Err(KernelError::DegenerateReduction {
                    operation: op.name(),
                });
            }
            Ok(KernelId::vector(op))
        }
        _ => {
            if in_place || classes.iter().any(|c| *c != ShapeClass::Matrix) {
                return Err(unsupported(op, shapes, in_place));
            }
            validate_matrix_shapes(op, shapes)?;
            if let Operation::Dense(DenseOp::MatrixMultiply) = op {
                if shapes[0].rows() == 1 && shapes[1].columns() == 1 {
                    return Ok(KernelId::new(
                        op,
                        OperationSignature::new(classes, ShapeClass::Scalar),
                    ));
                }
            }
            Ok(KernelId::vector(op))
        }
    }
}

fn select_elementwise(
    op: Operation,
    shapes: &[OperandShape],
    classes: Vec<ShapeClass>,
    in_place: bool,
) -> Result<KernelId> {
    let dense: Vec<&OperandShape> = shapes
        .iter()
        .filter(|s| s.class() == ShapeClass::Matrix)
        .collect();

    if dense.is_empty() {
        if in_place || !op.has_scalar_kernel() {
            return Err(unsupported(op, shapes, in_place));
        }
        return Ok(KernelId::scalar(op));
    }

    let len = dense[0].len();
    if dense.iter().all(|s| s.len() == len) {
        let mut sig = OperationSignature::new(classes, ShapeClass::Matrix);
        if in_place {
            sig = sig.in_place();
        }
        return Ok(KernelId::new(op, sig));
    }

    // Unequal lengths: only a binary operator combining a matrix with a row/column vector.
    let is_operator = matches!(op, Operation::Binary(b) if b.is_operator());
    if !is_operator || in_place || dense.len() != 2 {
        return Err(KernelError::mismatch(
            op.name(),
            format!("operands of length {}", len),
            describe(shapes, in_place),
        ));
    }

    let (matrix_pos, vector) = if shapes[1].columns() == 1 || shapes[1].rows() == 1 {
        (0, shapes[1])
    } else {
        (1, shapes[0])
    };
    let matrix = shapes[matrix_pos];

    let broadcast = if vector.columns() == 1 && vector.rows() == matrix.rows() {
        Broadcast::ColumnWise
    } else if vector.rows() == 1 && vector.columns() == matrix.columns() {
        Broadcast::RowWise
    } else {
        return Err(KernelError::mismatch(
            op.name(),
            format!(
                "a {}x1 or 1x{} vector",
                matrix.rows(),
                matrix.columns()
            ),
            vector,
        ));
    };

    let combo = if matrix_pos == 0 {
        vec![ShapeClass::Matrix, ShapeClass::Scalar]
    } else {
        vec![ShapeClass::Scalar, ShapeClass::Matrix]
    };
    Ok(KernelId::new(
        op,
        OperationSignature::new(combo, ShapeClass::Matrix).with_broadcast(broadcast),
    ))
}

fn validate_matrix_shapes(op: Operation, shapes: &[OperandShape]) -> Result<()> {
    let name = op.name();
    let square = |s: &OperandShape| -> Result<()> {
        if s.is_square() {
            Ok(())
        } else {
            Err(KernelError::mismatch(name, "a square matrix", s))
        }
    };

    match op {
        Operation::Structure(StructuralOp::VCat) => {
            if shapes[0].columns() != shapes[1].columns() {
                return Err(KernelError::mismatch(
                    name,
                    format!("{} columns", shapes[0].columns()),
                    shapes[1],
                ));
            }
        }
        Operation::Structure(StructuralOp::HCat) => {
            if shapes[0].rows() != shapes[1].rows() {
                return Err(KernelError::mismatch(
                    name,
                    format!("{} rows", shapes[0].rows()),
                    shapes[1],
                ));
            }
        }
        Operation::Structure(StructuralOp::DiagExtract) => square(&shapes[0])?,
        Operation::Structure(StructuralOp::DiagBuild) => {
            if shapes[0].rows() != 1 && shapes[0].columns() != 1 {
                return Err(KernelError::mismatch(name, "a vector", shapes[0]));
            }
        }
        Operation::Dense(DenseOp::MatrixMultiply) => {
            if shapes[0].columns() != shapes[1].rows() {
                return Err(KernelError::mismatch(
                    name,
                    format!("{} rows in the right operand", shapes[0].columns()),
                    shapes[1],
                ));
            }
        }
        Operation::Dense(DenseOp::Linsolve) => {
            square(&shapes[0])?;
            if shapes[1].rows() != shapes[0].rows() {
                return Err(KernelError::mismatch(
                    name,
                    format!("{} rows in the right-hand side", shapes[0].rows()),
                    shapes[1],
                ));
            }
        }
        Operation::Dense(DenseOp::Inverse) => square(&shapes[0])?,
        Operation::Dense(DenseOp::PseudoInverse) => {
            if shapes[1].rows() != shapes[0].rows() {
                return Err(KernelError::mismatch(
                    name,
                    format!("{} rows in the right-hand side", shapes[0].rows()),
                    shapes[1],
                ));
            }
        }
        Operation::Sparse(SparseOp::Factorize) => square(&shapes[0])?,
        Operation::Sparse(_) => {
            square(&shapes[0])?;
            if shapes[1].rows() != shapes[0].rows() {
                return Err(KernelError::mismatch(
                    name,
                    format!("{} rows in the right-hand side", shapes[0].rows()),
                    shapes[1],
                ));
            }
        }
        _ => {}
    }

    Ok(())
}
