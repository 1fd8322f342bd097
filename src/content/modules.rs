//! Module selection.

use std::collections::HashSet;

use serde_json::Value;
use tracing::warn;

use crate::core::{ResolveError, Result};
use crate::descriptor::{DeploymentDescriptor, Module};

use super::DeploymentContext;

/// Module parameter carrying a Docker image configuration; such modules
/// deploy without archive content.
pub const PARAMETER_DOCKER: &str = "docker";
/// Module parameter marking a one-off task; such modules always deploy.
pub const PARAMETER_ONE_OFF_TASK: &str = "one-off-task";

/// Selects the modules that take part in a deployment.
///
/// A module is selected when it is flagged always-deploy (Docker image or
/// one-off task), or when the uploaded archive contains it and it declares a
/// type. A caller-supplied allow-list further restricts the result. After
/// selection, every module referenced as a dependency target must be either
/// selected or already deployed.
pub struct ModulesContentCalculator<'a> {
    context: &'a DeploymentContext,
}

impl<'a> ModulesContentCalculator<'a> {
    pub fn new(context: &'a DeploymentContext) -> Self {
        Self { context }
    }

    /// Select the deployable subset of `descriptor`'s modules, in declared
    /// order.
    pub fn select(&self, descriptor: &DeploymentDescriptor) -> Result<Vec<Module>> {
        let mut selected = Vec::new();
        for module in &descriptor.modules {
            if !self.is_deployable(module) {
                continue;
            }
            if let Some(allowed) = &self.context.modules_allow_list
                && !allowed.contains(&module.name)
            {
                continue;
            }
            selected.push(module.clone());
        }
        self.check_dependency_closure(descriptor, &selected)?;
        Ok(selected)
    }

    fn is_deployable(&self, module: &Module) -> bool {
        if always_deploys(module) {
            return true;
        }
        let in_archive = self.context.archive_modules.contains(&module.name);
        if in_archive && module.module_type.is_some() {
            return true;
        }
        if self.context.deployed_modules.contains(&module.name) {
            warn!(module = %module.name, "previously deployed module is no longer described");
        }
        false
    }

    /// Every module name used as a dependency target must be selected or
    /// already deployed. Failures across all modules are reported as one
    /// error.
    fn check_dependency_closure(
        &self,
        descriptor: &DeploymentDescriptor,
        selected: &[Module],
    ) -> Result<()> {
        let module_names: HashSet<&str> =
            descriptor.modules.iter().map(|m| m.name.as_str()).collect();
        let available: HashSet<&str> = selected
            .iter()
            .map(|m| m.name.as_str())
            .chain(self.context.deployed_modules.iter().map(String::as_str))
            .collect();

        let mut unresolved: Vec<String> = Vec::new();
        let referenced = descriptor
            .modules
            .iter()
            .flat_map(|m| &m.required_dependencies)
            .chain(descriptor.resources.iter().flat_map(|r| &r.required_dependencies))
            .map(|dependency| dependency.name.as_str());
        for name in referenced {
            if module_names.contains(name)
                && !available.contains(name)
                && !unresolved.iter().any(|n| n == name)
            {
                unresolved.push(name.to_string());
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

/// Whether the module deploys regardless of archive contents.
fn always_deploys(module: &Module) -> bool {
    module.parameters.contains_key(PARAMETER_DOCKER)
        || module.parameters.get(PARAMETER_ONE_OFF_TASK) == Some(&Value::Bool(true))
}
