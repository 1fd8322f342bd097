//! Validation of declared deployment ordering.

use std::collections::HashSet;

use crate::core::{ResolveError, Result};
use crate::descriptor::Module;
use crate::schema::SchemaCapabilities;

/// Live view of the target platform, consulted when an ordering constraint
/// names a module outside the current selection.
pub trait PlatformLookup {
    /// Whether an application with this name already exists on the platform.
    fn application_exists(&self, name: &str) -> anyhow::Result<bool>;
}

/// Checks every selected module's `deployed-after` list: each named module
/// must be part of the selection or already exist on the platform.
pub struct DeployedAfterValidator<'a> {
    platform: &'a dyn PlatformLookup,
}

impl<'a> DeployedAfterValidator<'a> {
    pub fn new(platform: &'a dyn PlatformLookup) -> Self {
        Self { platform }
    }

    /// Validate `selected`, collecting every unsatisfiable name into one
    /// error. Descriptors below the schema baseline carry no ordering
    /// declarations to check.
    pub fn validate(
        &self,
        selected: &[Module],
        capabilities: &SchemaCapabilities,
    ) -> Result<()> {
        if !capabilities.deployed_after_validation {
            return Ok(());
        }
        let selected_names: HashSet<&str> = selected.iter().map(|m| m.name.as_str()).collect();

        // Platform answers are cached so a name shared by several modules'
        // lists is looked up once.
        let mut confirmed: HashSet<&str> = HashSet::new();
        let mut unresolved: Vec<String> = Vec::new();
        for module in selected {
            let Some(predecessors) = &module.deployed_after else {
                continue;
            };
            for name in predecessors {
                if selected_names.contains(name.as_str())
                    || confirmed.contains(name.as_str())
                    || unresolved.iter().any(|n| n == name)
                {
                    continue;
                }
                if self.platform.application_exists(name)? {
                    confirmed.insert(name);
                } else {
                    unresolved.push(name.clone());
                }
            }
        }

        if unresolved.is_empty() {
            Ok(())
        } else {
            Err(ResolveError::UnresolvedModuleDependencies {
                names: unresolved,
            })
        }
    }
}
