//! Structural acceptance checks on declared resources

use crate::error::{Error, Result};
use crate::types::{DeclaredResource, ResourceSpec};

/// Verdict for one declared resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub name: String,
    pub passed: bool,
}

/// A spec is accepted only if it declares at least one file and at least
/// one package.
pub fn validate(spec: &ResourceSpec) -> bool {
    !spec.files.is_empty() && !spec.packages.is_empty()
}

/// Check every resource; one rejection does not stop the others
pub fn validate_all(resources: &[DeclaredResource]) -> Vec<Validation> {
    resources
        .iter()
        .map(|resource| {
            let passed = validate(&resource.spec);
            if !passed {
                log::warn!(
                    "Resource {} must declare at least one file and one package",
                    resource.name
                );
            }
            Validation {
                name: resource.name.clone(),
                passed,
            }
        })
        .collect()
}

/// All-or-nothing gate: fails naming every rejected resource
pub fn ensure_valid(resources: &[DeclaredResource]) -> Result<()> {
    let rejected: Vec<String> = validate_all(resources)
        .into_iter()
        .filter(|v| !v.passed)
        .map(|v| v.name)
        .collect();

    if rejected.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation { rejected })
    }
}
