//! Capability negotiation.
//!
//! The negotiator turns per-kernel `(required, available)` flags into the exact set of
//! kernels that need a built-in fallback. A fallback is materialized iff the kernel is
//! required and not available. Requirements cascade: a vector kernel that falls back
//! needs its scalar kernel, composites need their building blocks, and so on until a
//! fixed point. Dense routines ignore per-kernel availability and follow the single
//! linear-algebra backend flag.
//!
//! Resolution happens once, up front. Call sites ask the resulting [`KernelSet`] how to
//! run a kernel through [`KernelSet::lookup`] rather than re-deciding per call.

use crate::catalog::{Catalog, KernelId, Operation, ShapeClass};
use crate::config::CapabilityDeclaration;
use crate::error::{KernelError, Result};
use crate::linalg::{DenseOp, DenseSuite};
use crate::ops::{BinaryOp, UnaryOp};
use crate::reduce::Reduction;
use crate::sparse::SparseOp;
use crate::traits::{ElementType, LinalgScalar};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapabilityFlag {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub available: bool,
}

impl CapabilityFlag {
    pub fn new(required: bool, available: bool) -> Self {
        Self {
            required,
            available,
        }
    }

    pub fn needs_fallback(&self) -> bool {
        self.required && !self.available
    }
}

/// Kernel identifier to capability flag, plus the coarse dense-backend flag.
#[derive(Debug, Clone, Default)]
pub struct FeatureTable {
    flags: BTreeMap<KernelId, CapabilityFlag>,
    backend_available: bool,
}

impl FeatureTable {
    pub fn new(backend_available: bool) -> Self {
        Self {
            flags: BTreeMap::new(),
            backend_available,
        }
    }

    /// Resolves every kernel name in the declaration against the catalog.
    pub fn from_declaration(declaration: &CapabilityDeclaration) -> Result<Self> {
        let catalog = Catalog::standard();
        let mut table = Self::new(declaration.linear_algebra_backend);
        for (name, flag) in &declaration.kernels {
            table.set(catalog.kernel(name)?.clone(), *flag);
        }
        Ok(table)
    }

    pub fn backend_available(&self) -> bool {
        self.backend_available
    }

    pub fn set(&mut self, id: KernelId, flag: CapabilityFlag) {
        self.flags.insert(id, flag);
    }

    pub fn require(&mut self, id: KernelId) {
        self.flags.entry(id).or_default().required = true;
    }

    pub fn provide(&mut self, id: KernelId) {
        self.flags.entry(id).or_default().available = true;
    }

    /// The flag as seen by the negotiator, with dense availability taken from the backend.
    pub fn flag(&self, id: &KernelId) -> CapabilityFlag {
        let mut flag = self.flags.get(id).copied().unwrap_or_default();
        if let Operation::Dense(_) = id.operation {
            flag.available = self.backend_available;
        }
        flag
    }

    /// Propagates requirements to a fixed point and returns the fallback set.
    pub fn negotiate(&self) -> Result<Negotiation> {
        let mut flags = self.flags.clone();
        let mut fallbacks = BTreeSet::new();
        let mut propagated = BTreeSet::new();
        let mut worklist: Vec<KernelId> = Vec::new();

        for id in self.flags.keys() {
            if self.flag(id).needs_fallback() && fallbacks.insert(id.clone()) {
                worklist.push(id.clone());
            }
        }

        while let Some(id) = worklist.pop() {
            for dep in dependencies(&id) {
                let entry = flags.entry(dep.clone()).or_default();
                if !entry.required {
                    entry.required = true;
                    propagated.insert(dep.clone());
                    trace!(kernel = %dep, from = %id, "requirement propagated");
                }

                let mut effective = *entry;
                if let Operation::Dense(_) = dep.operation {
                    effective.available = self.backend_available;
                }
                if effective.needs_fallback() && fallbacks.insert(dep.clone()) {
                    worklist.push(dep);
                }
            }
        }

        if !self.backend_available {
            if let Some(id) = fallbacks.iter().find(|id| {
                matches!(id.operation, Operation::Dense(op) if op.requires_backend())
            }) {
                return Err(KernelError::MissingBackend {
                    operation: id.name(),
                });
            }
        }

        let resolved: BTreeSet<KernelId> = flags
            .into_iter()
            .filter(|(_, flag)| flag.required)
            .map(|(id, _)| id)
            .collect();

        debug!(
            resolved = resolved.len(),
            fallbacks = fallbacks.len(),
            propagated = propagated.len(),
            backend = self.backend_available,
            "capability negotiation resolved"
        );

        Ok(Negotiation {
            resolved,
            fallbacks,
            propagated,
            backend_available: self.backend_available,
        })
    }
}

/// Kernels that a fallback for `id` is built from.
fn dependencies(id: &KernelId) -> Vec<KernelId> {
    let sig = &id.signature;
    let mut deps = Vec::new();

    match id.operation {
        op @ (Operation::Unary(_) | Operation::Binary(_) | Operation::Ternary(_)) => {
            if !sig.is_scalar() && !is_operator(op) {
                deps.push(KernelId::scalar(op));
            }
            if sig.is_scalar() {
                match op {
                    Operation::Unary(UnaryOp::InvSqrt) | Operation::Binary(BinaryOp::Hypot) => {
                        deps.push(KernelId::scalar(Operation::Unary(UnaryOp::Sqrt)));
                    }
                    _ => {}
                }
            }
        }
        Operation::Reduce(Reduction::Max) => {
            deps.push(KernelId::scalar(Operation::Binary(BinaryOp::Max)));
        }
        Operation::Reduce(Reduction::Min) => {
            deps.push(KernelId::scalar(Operation::Binary(BinaryOp::Min)));
        }
        Operation::Reduce(Reduction::Hypot) => {
            deps.push(KernelId::scalar(Operation::Unary(UnaryOp::Sqrt)));
        }
        Operation::Dense(DenseOp::MatrixMultiply) if sig.result == ShapeClass::Scalar => {
            deps.push(KernelId::vector(Operation::Dense(DenseOp::MatrixMultiply)));
        }
        Operation::Sparse(SparseOp::Linsolve) => {
            for op in [SparseOp::Factorize, SparseOp::DinvLinvt, SparseOp::Linv] {
                deps.push(KernelId::vector(Operation::Sparse(op)));
            }
        }
        _ => {}
    }

    deps
}

fn is_operator(op: Operation) -> bool {
    match op {
        Operation::Unary(u) => u.is_operator(),
        Operation::Binary(b) => b.is_operator(),
        _ => false,
    }
}

/// Outcome of negotiation: every required kernel, and the exact subset needing a built-in
/// fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiation {
    resolved: BTreeSet<KernelId>,
    fallbacks: BTreeSet<KernelId>,
    propagated: BTreeSet<KernelId>,
    backend_available: bool,
}

impl Negotiation {
    /// Kernels required after propagation, whether built in or externally provided.
    pub fn resolved(&self) -> &BTreeSet<KernelId> {
        &self.resolved
    }

    pub fn contains(&self, id: &KernelId) -> bool {
        self.resolved.contains(id)
    }

    pub fn fallbacks(&self) -> &BTreeSet<KernelId> {
        &self.fallbacks
    }

    /// Kernels that only became required through propagation.
    pub fn propagated(&self) -> &BTreeSet<KernelId> {
        &self.propagated
    }

    pub fn needs_fallback(&self, id: &KernelId) -> bool {
        self.fallbacks.contains(id)
    }

    pub fn fallback_names(&self) -> Vec<String> {
        self.fallbacks.iter().map(|id| id.name()).collect()
    }

    pub fn backend_available(&self) -> bool {
        self.backend_available
    }
}

/// Kernel body supplied for an available kernel: operand buffers in call order, then the
/// output. Scalar operands arrive as one-element slices, reductions write one element.
pub type ExternalKernel<T> = Arc<dyn Fn(&[&[T]], &mut [T]) + Send + Sync>;

/// How a kernel of the resolved set runs.
pub enum Dispatch<'a, T> {
    /// The crate's built-in kernel.
    Fallback,
    /// A dense routine on the linear-algebra backend.
    Backend,
    External(&'a ExternalKernel<T>),
}

impl<T> fmt::Debug for Dispatch<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dispatch::Fallback => f.write_str("Fallback"),
            Dispatch::Backend => f.write_str("Backend"),
            Dispatch::External(_) => f.write_str("External"),
        }
    }
}

/// A resolved, immutable kernel set for one element type.
pub struct KernelSet<T: LinalgScalar> {
    negotiation: Negotiation,
    dense: DenseSuite<T>,
    external: BTreeMap<KernelId, ExternalKernel<T>>,
}

impl<T: LinalgScalar> fmt::Debug for KernelSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelSet")
            .field("negotiation", &self.negotiation)
            .field("dense", &self.dense)
            .field("external", &self.external.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<T: LinalgScalar> KernelSet<T> {
    /// Resolves a declaration once. Rejects declarations for another element type.
    pub fn resolve(declaration: &CapabilityDeclaration) -> Result<Self> {
        if declaration.element_type != T::ELEMENT {
            return Err(KernelError::ElementTypeMismatch {
                declared: declaration.element_type,
                compiled: T::ELEMENT,
            });
        }
        Self::from_table(&FeatureTable::from_declaration(declaration)?)
    }

    pub fn from_table(table: &FeatureTable) -> Result<Self> {
        let negotiation = table.negotiate()?;
        let dense = DenseSuite::select(negotiation.backend_available());
        Ok(Self {
            negotiation,
            dense,
            external: BTreeMap::new(),
        })
    }

    /// Supplies the implementation of a kernel declared available.
    ///
    /// Kernels outside the set, kernels that fall back to the built-in version and dense
    /// routines served by the backend are rejected.
    pub fn with_external(mut self, id: KernelId, kernel: ExternalKernel<T>) -> Result<Self> {
        if !self.negotiation.contains(&id) {
            return Err(KernelError::NotResolved { kernel: id.name() });
        }
        let rejected = if self.negotiation.needs_fallback(&id) {
            Some("would replace a built-in fallback")
        } else if let Operation::Dense(_) = id.operation {
            Some("would replace the linear-algebra backend")
        } else {
            None
        };
        if let Some(reason) = rejected {
            return Err(KernelError::ExternalKernel {
                kernel: id.name(),
                reason,
            });
        }

        debug!(kernel = %id, "external kernel supplied");
        self.external.insert(id, kernel);
        Ok(self)
    }

    /// How `id` runs in this set.
    pub fn lookup(&self, id: &KernelId) -> Result<Dispatch<'_, T>> {
        if !self.negotiation.contains(id) {
            return Err(KernelError::NotResolved { kernel: id.name() });
        }
        if self.negotiation.needs_fallback(id) {
            return Ok(Dispatch::Fallback);
        }
        if let Operation::Dense(_) = id.operation {
            return Ok(Dispatch::Backend);
        }
        self.external
            .get(id)
            .map(Dispatch::External)
            .ok_or_else(|| KernelError::ExternalKernel {
                kernel: id.name(),
                reason: "is declared available but was never supplied",
            })
    }

    pub fn element_type(&self) -> ElementType {
        T::ELEMENT
    }

    pub fn negotiation(&self) -> &Negotiation {
        &self.negotiation
    }

    pub fn fallbacks(&self) -> &BTreeSet<KernelId> {
        self.negotiation.fallbacks()
    }

    pub fn dense(&self) -> &DenseSuite<T> {
        &self.dense
    }
}
