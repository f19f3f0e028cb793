//! Capability declarations supplied by the build or configuration layer.
//!
//! ```json
//! { "element_type": "double", "linear_algebra_backend": true,
//!   "kernels": { "plus_v_m_1": { "required": true, "available": false } } }
//! ```

use crate::catalog::Catalog;
use crate::negotiate::CapabilityFlag;
use crate::traits::ElementType;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityDeclaration {
    pub element_type: ElementType,
    #[serde(default)]
    pub linear_algebra_backend: bool,
    /// Flags keyed by stable kernel name.
    #[serde(default)]
    pub kernels: BTreeMap<String, CapabilityFlag>,
}

impl Default for CapabilityDeclaration {
    fn default() -> Self {
        Self::new(ElementType::Double, false)
    }
}

impl CapabilityDeclaration {
    pub fn new(element_type: ElementType, linear_algebra_backend: bool) -> Self {
        Self {
            element_type,
            linear_algebra_backend,
            kernels: BTreeMap::new(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse capability declaration.")
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        serde_json::from_reader(reader).context("Failed to read capability declaration.")
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize capability declaration.")
    }

    /// Marks a kernel as required.
    pub fn require(mut self, kernel: impl Into<String>) -> Self {
        self.kernels.entry(kernel.into()).or_default().required = true;
        self
    }

    /// Marks a kernel as already provided by an external backend.
    pub fn provide(mut self, kernel: impl Into<String>) -> Self {
        self.kernels.entry(kernel.into()).or_default().available = true;
        self
    }

    /// Requires every kernel in the catalog.
    pub fn require_all(mut self) -> Self {
        for id in Catalog::standard().kernels() {
            self.kernels.entry(id.name()).or_default().required = true;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_declaration() {
        let declaration = CapabilityDeclaration::from_json_str(
            r#"{
                "element_type": "single",
                "linear_algebra_backend": true,
                "kernels": {
                    "plus_v_m_1": { "required": true, "available": false },
                    "sqrt": { "available": true }
                }
            }"#,
        )
        .expect("declaration should parse");

        assert_eq!(declaration.element_type, ElementType::Single);
        assert!(declaration.linear_algebra_backend);
        assert_eq!(
            declaration.kernels["plus_v_m_1"],
            CapabilityFlag::new(true, false)
        );
        assert_eq!(declaration.kernels["sqrt"], CapabilityFlag::new(false, true));
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let json = r#"{"element_type":"double"}"#;
        let declaration =
            CapabilityDeclaration::from_reader(json.as_bytes()).expect("declaration should parse");
        assert_eq!(declaration, CapabilityDeclaration::default());
    }

    #[test]
    fn malformed_input_reports_context() {
        let err = CapabilityDeclaration::from_json_str(r#"{"element_type":"quad"}"#)
            .expect_err("unknown element type");
        assert!(err.to_string().contains("Failed to parse capability declaration."));
    }

    #[test]
    fn builder_round_trips_through_json() {
        let declaration = CapabilityDeclaration::new(ElementType::Double, false)
            .require("sin_v")
            .provide("sin_v")
            .require("sum_v");
        let json = declaration.to_json_string().expect("serialize");
        let parsed = CapabilityDeclaration::from_json_str(&json).expect("parse");
        assert_eq!(parsed, declaration);
        assert_eq!(parsed.kernels["sin_v"], CapabilityFlag::new(true, true));
    }

    #[test]
    fn require_all_covers_the_catalog() {
        let declaration = CapabilityDeclaration::default().require_all();
        assert_eq!(declaration.kernels.len(), Catalog::standard().kernels().count());
        assert!(declaration.kernels.values().all(|flag| flag.required));
    }
}
