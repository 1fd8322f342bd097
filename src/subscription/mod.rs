//! Configuration subscriptions.
//!
//! A module that consumes a configuration reference through a *managed*
//! dependency keeps tracking the provider after deployment: when the provider
//! publishes a new entry, the subscriber is re-resolved and updated. The
//! [`SubscriptionFactory`] derives the durable subscription records from a
//! descriptor, and a [`SubscriptionStore`] persists them.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::Result;
use crate::descriptor::{DeploymentDescriptor, Module, Resource};
use crate::entries::EntryStore;
use crate::filter::ConfigurationFilter;
use crate::resolver::{PartialReferenceResolver, ResolutionContext, ResolvedConfigurationReference};

pub mod store;

pub use store::{InMemorySubscriptionStore, SubscriptionId, SubscriptionStore};

#[cfg(test)]
mod subscription_tests;

/// Module parameter overriding the deployed application's name.
pub const PARAMETER_APP_NAME: &str = "app-name";

/// A durable record tying one deployed application to one configuration
/// reference it consumes through a managed dependency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationSubscription {
    /// Identifier of the subscribing MTA
    pub mta_id: String,
    /// The space the subscriber is deployed into
    pub space_id: String,
    /// Name of the deployed application backing the subscribing module
    pub app_name: String,
    /// The filter to re-evaluate when the provider publishes
    pub filter: ConfigurationFilter,
    /// The subscribing module, reduced to the one tracked dependency, with
    /// everything outside the tracked reference already resolved
    pub module: Module,
    /// The declaring resource as it appeared in the descriptor, prior to any
    /// entry content being merged in
    pub resource: Resource,
}

/// Derives [`ConfigurationSubscription`] records from a descriptor.
pub struct SubscriptionFactory<'a> {
    store: &'a dyn EntryStore,
    context: ResolutionContext,
}

impl<'a> SubscriptionFactory<'a> {
    pub fn new(store: &'a dyn EntryStore, context: ResolutionContext) -> Self {
        Self { store, context }
    }

    /// Create the subscriptions implied by `descriptor`.
    ///
    /// `resolved_references` are the configuration references a preceding
    /// full resolve matched. Their names become the ignore set of a partial
    /// resolve over the original descriptor, so each subscription's module
    /// carries the tracked reference in symbolic form while everything else
    /// is already literal. One subscription is produced per (module, managed
    /// dependency) pair whose dependency names a resolved reference.
    pub fn create(
        &self,
        descriptor: DeploymentDescriptor,
        resolved_references: &[ResolvedConfigurationReference],
        space_id: &str,
    ) -> Result<Vec<ConfigurationSubscription>> {
        let mta_id = descriptor.id.clone();
        let ignore = resolved_references
            .iter()
            .map(|reference| reference.name().to_string())
            .collect();

        let partial = PartialReferenceResolver::new(self.store, self.context.clone(), ignore)
            .resolve(descriptor)?;

        let mut subscriptions = Vec::new();
        for module in &partial.descriptor.modules {
            for dependency in &module.required_dependencies {
                if !dependency.is_managed() {
                    continue;
                }
                let Some(reference) =
                    resolved_references.iter().find(|r| r.name() == dependency.name)
                else {
                    debug!(
                        module = %module.name,
                        dependency = %dependency.name,
                        "managed dependency does not name a configuration reference"
                    );
                    continue;
                };
                subscriptions.push(ConfigurationSubscription {
                    mta_id: mta_id.clone(),
                    space_id: space_id.to_string(),
                    app_name: application_name(module),
                    filter: reference.filter.clone(),
                    module: reduce_to_dependency(module, &dependency.name),
                    resource: reference.resource.clone(),
                });
            }
        }
        Ok(subscriptions)
    }
}

/// The deployed application's name: the `app-name` module parameter when
/// present, the module name otherwise.
fn application_name(module: &Module) -> String {
    module
        .parameters
        .get(PARAMETER_APP_NAME)
        .and_then(serde_json::Value::as_str)
        .unwrap_or(&module.name)
        .to_string()
}

/// A copy of `module` whose dependency list holds only the tracked one.
fn reduce_to_dependency(module: &Module, dependency_name: &str) -> Module {
    let mut reduced = module.clone();
    reduced
        .required_dependencies
        .retain(|dependency| dependency.name == dependency_name);
    reduced
}
