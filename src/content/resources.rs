//! Resource selection.

use serde_json::Value;
use tracing::warn;

use crate::descriptor::{DeploymentDescriptor, Resource};

use super::DeploymentContext;

/// Resource types that classify as platform services.
pub const SERVICE_RESOURCE_TYPES: &[&str] = &[
    "org.cloudfoundry.managed-service",
    "org.cloudfoundry.existing-service",
    "org.cloudfoundry.user-provided-service",
];

/// Selects the resources that take part in a deployment: service-typed,
/// active under the descriptor's schema, and inside the caller's allow-list
/// when one is given.
pub struct ResourcesContentCalculator<'a> {
    context: &'a DeploymentContext,
    emit_warnings: bool,
}

impl<'a> ResourcesContentCalculator<'a> {
    pub fn new(context: &'a DeploymentContext) -> Self {
        Self {
            context,
            emit_warnings: true,
        }
    }

    /// Suppress the warnings normally emitted for dropped resources.
    #[must_use]
    pub fn without_warnings(mut self) -> Self {
        self.emit_warnings = false;
        self
    }

    /// Select the deployable subset of `descriptor`'s resources, in declared
    /// order. Dropping a resource is never an error.
    pub fn select(&self, descriptor: &DeploymentDescriptor) -> Vec<Resource> {
        let capabilities = descriptor.capabilities();
        let mut selected = Vec::new();
        for resource in &descriptor.resources {
            if !is_service(resource, descriptor) {
                // Optional resources were declared with the expectation they
                // may not materialize; flag the others silently passing by.
                if resource.optional && self.emit_warnings {
                    warn!(resource = %resource.name, "optional resource is not a service and will not be created");
                }
                continue;
            }
            if !resource.is_active(&capabilities) {
                if self.emit_warnings {
                    warn!(resource = %resource.name, "resource is declared inactive and will not be created");
                }
                continue;
            }
            if let Some(allowed) = &self.context.resources_allow_list
                && !allowed.contains(&resource.name)
            {
                continue;
            }
            selected.push(resource.clone());
        }
        selected
    }
}

/// Whether the resource's effective `type` parameter names a service type.
/// The resource's own parameter wins over the descriptor-level one.
fn is_service(resource: &Resource, descriptor: &DeploymentDescriptor) -> bool {
    resource
        .parameters
        .get(crate::filter::keys::TYPE)
        .or_else(|| descriptor.parameters.get(crate::filter::keys::TYPE))
        .and_then(Value::as_str)
        .is_some_and(|declared| SERVICE_RESOURCE_TYPES.contains(&declared))
}
