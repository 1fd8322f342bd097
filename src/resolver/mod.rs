//! Descriptor reference resolution.
//!
//! [`ReferenceResolver`] turns a merged deployment descriptor into a resolved
//! one: it rejects cyclic or dangling references, resolves each
//! configuration-reference resource against the entry store (expanding
//! multi-entry matches into indexed resources when the match policy allows),
//! and substitutes every structural placeholder with the literal value it
//! points at. Dynamic `{ds/...}` placeholders are left intact and reported as
//! [`DynamicResolvableParameter`] records for deployment-time resolution.
//!
//! Resolution is a pure transformation: the descriptor is passed in by value
//! and a new [`ResolvedDescriptor`] comes out. Resolving an already-resolved
//! descriptor is idempotent — substituted values carry no tokens, so a second
//! pass has nothing left to do.
//!
//! [`PartialReferenceResolver`] is the restricted variant used while
//! preparing configuration subscriptions: dependencies named in its ignore
//! set are left completely untouched so managed references stay symbolic.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{ResolveError, Result};
use crate::descriptor::{DeploymentDescriptor, Module, PropertiesMap, Resource};
use crate::entries::{ConfigurationEntry, EntryMatcher, EntryStore};
use crate::filter::{ConfigurationFilter, FilterParser};
use crate::schema::MatchPolicy;

mod graph;
mod partial;
mod placeholders;

pub use partial::PartialReferenceResolver;

use placeholders::{SubstitutionReport, SubstitutionScope, substitute_map};

/// The ambient surroundings of one resolve operation: the organization/space
/// being deployed into and the caller's namespace.
#[derive(Debug, Clone)]
pub struct ResolutionContext {
    /// The target the descriptor is being deployed into
    pub current_target: crate::descriptor::CloudTarget,
    /// Namespace applied to filters that do not declare their own
    pub namespace: Option<String>,
}

impl ResolutionContext {
    /// Create a context for the given deployment target.
    pub fn new(current_target: crate::descriptor::CloudTarget) -> Self {
        Self {
            current_target,
            namespace: None,
        }
    }

    /// Set the ambient namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

/// One occurrence of a dynamic placeholder, resolved only at actual
/// deployment time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DynamicResolvableParameter {
    /// The parameter whose value becomes known after deployment
    pub parameter_name: String,
    /// The dependency the value belongs to
    pub relationship_entity_name: String,
}

/// A configuration reference that was resolved during this operation: the
/// filter that was evaluated and a snapshot of the declaring resource as it
/// appeared in the descriptor, before any entry content was merged in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedConfigurationReference {
    pub filter: ConfigurationFilter,
    pub resource: Resource,
}

impl ResolvedConfigurationReference {
    /// Name of the declaring resource.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.resource.name
    }
}

/// The outputs of a resolve operation.
#[derive(Debug)]
pub struct ResolvedDescriptor {
    /// The new descriptor, with all structural placeholders substituted
    pub descriptor: DeploymentDescriptor,
    /// Every dynamic placeholder encountered, for deployment-time resolution
    pub dynamic_parameters: HashSet<DynamicResolvableParameter>,
    /// The configuration references that were matched, in descriptor order;
    /// their names form the ignore set for subscription creation
    pub resolved_references: Vec<ResolvedConfigurationReference>,
}

/// Walks a descriptor and substitutes its placeholder expressions.
pub struct ReferenceResolver<'a> {
    store: &'a dyn EntryStore,
    context: ResolutionContext,
    policy: Option<MatchPolicy>,
    ignore: HashSet<String>,
    eager_dynamic: bool,
}

impl<'a> ReferenceResolver<'a> {
    /// Create a resolver over `store` for the given context.
    ///
    /// The multiple-match policy defaults to the one implied by the
    /// descriptor's schema version; see [`Self::with_match_policy`].
    pub fn new(store: &'a dyn EntryStore, context: ResolutionContext) -> Self {
        Self {
            store,
            context,
            policy: None,
            ignore: HashSet::new(),
            eager_dynamic: false,
        }
    }

    /// Override the schema-derived multiple-match policy.
    #[must_use]
    pub fn with_match_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Force dynamic `{ds/...}` placeholders to resolve now, failing when no
    /// value is available. Used by re-resolution flows that run after the
    /// providing dependencies are already deployed.
    #[must_use]
    pub fn with_eager_dynamic(mut self) -> Self {
        self.eager_dynamic = true;
        self
    }

    pub(crate) fn with_ignored_dependencies(mut self, ignore: HashSet<String>) -> Self {
        self.ignore = ignore;
        self
    }

    /// Resolve `descriptor`, consuming it and returning the resolved value.
    pub fn resolve(&self, mut descriptor: DeploymentDescriptor) -> Result<ResolvedDescriptor> {
        let policy =
            self.policy.unwrap_or_else(|| descriptor.capabilities().default_match_policy());

        graph::ReferenceGraph::from_descriptor(&descriptor).detect_cycles()?;
        self.validate_dependency_names(&descriptor)?;

        let resolved_references =
            self.resolve_configuration_resources(&mut descriptor, policy)?;
        let dynamic_parameters = self.substitute_descriptor(&mut descriptor)?;

        Ok(ResolvedDescriptor {
            descriptor,
            dynamic_parameters,
            resolved_references,
        })
    }

    /// Every declared dependency must point at exactly one known entity, or
    /// be excluded via the ignore set. All failures are collected before
    /// erroring so the user sees the complete list.
    fn validate_dependency_names(&self, descriptor: &DeploymentDescriptor) -> Result<()> {
        let known = descriptor.referencable_names();
        let mut unresolved: Vec<String> = Vec::new();

        let module_dependencies =
            descriptor.modules.iter().flat_map(|m| &m.required_dependencies);
        let resource_dependencies =
            descriptor.resources.iter().flat_map(|r| &r.required_dependencies);
        for dependency in module_dependencies.chain(resource_dependencies) {
            if known.contains(&dependency.name)
                || self.ignore.contains(&dependency.name)
                || unresolved.contains(&dependency.name)
            {
                continue;
            }
            if let Some(suggestion) = closest_name(&dependency.name, &known) {
                debug!(dependency = %dependency.name, %suggestion, "unknown dependency target");
            }
            unresolved.push(dependency.name.clone());
        }

        if unresolved.is_empty() {
            Ok(())
        } else {
            Err(ResolveError::UnresolvedModuleDependencies {
                names: unresolved,
            })
        }
    }

    fn resolve_configuration_resources(
        &self,
        descriptor: &mut DeploymentDescriptor,
        policy: MatchPolicy,
    ) -> Result<Vec<ResolvedConfigurationReference>> {
        let ambient_parameters = descriptor.parameters.clone();
        let parser = FilterParser::new(
            &ambient_parameters,
            self.context.current_target.clone(),
            self.context.namespace.clone(),
        );
        let matcher = EntryMatcher::new(self.store, policy);

        let mut resolved_references = Vec::new();
        let mut expansions: HashMap<String, Vec<String>> = HashMap::new();
        let mut resources = Vec::with_capacity(descriptor.resources.len());

        for resource in std::mem::take(&mut descriptor.resources) {
            if self.ignore.contains(&resource.name) {
                resources.push(resource);
                continue;
            }
            let Some(filter) = parser.parse(&resource)? else {
                resources.push(resource);
                continue;
            };

            let entries = matcher.resolve(&filter, &resource.name)?;
            resolved_references.push(ResolvedConfigurationReference {
                filter,
                resource: resource.clone(),
            });

            if let [entry] = entries.as_slice() {
                let mut resource = resource;
                merge_entry_content(&mut resource, entry);
                strip_reference_parameters(&mut resource);
                resources.push(resource);
            } else {
                // Fan-out: replace the declaring resource by one indexed copy
                // per match, in store-query order.
                let expanded_names: Vec<String> =
                    (1..=entries.len()).map(|index| format!("{}-{index}", resource.name)).collect();
                for (expanded_name, entry) in expanded_names.iter().zip(&entries) {
                    let mut expanded = resource.clone();
                    expanded.name.clone_from(expanded_name);
                    merge_entry_content(&mut expanded, entry);
                    strip_reference_parameters(&mut expanded);
                    resources.push(expanded);
                }
                expansions.insert(resource.name.clone(), expanded_names);
            }
        }

        descriptor.resources = resources;
        if !expansions.is_empty() {
            repoint_expanded_dependencies(descriptor, &expansions);
        }
        Ok(resolved_references)
    }

    /// Substitute placeholders everywhere: resources first, in declared
    /// order, so that dependents of a resolved resource see literal values,
    /// then modules.
    fn substitute_descriptor(
        &self,
        descriptor: &mut DeploymentDescriptor,
    ) -> Result<HashSet<DynamicResolvableParameter>> {
        let (mut properties, parameters) = collect_tables(descriptor);
        let mut report = SubstitutionReport::default();

        for index in 0..descriptor.resources.len() {
            let resource =
                self.substitute_resource(&descriptor.resources[index], &properties, &parameters, &mut report)?;
            properties.insert(resource.name.clone(), resource.properties.clone());
            descriptor.resources[index] = resource;
        }
        for index in 0..descriptor.modules.len() {
            descriptor.modules[index] =
                self.substitute_module(&descriptor.modules[index], &properties, &parameters, &mut report)?;
        }

        if report.unresolved_targets.is_empty() {
            Ok(report.dynamic_parameters)
        } else {
            Err(ResolveError::UnresolvedModuleDependencies {
                names: report.unresolved_targets,
            })
        }
    }

    fn substitute_resource(
        &self,
        resource: &Resource,
        properties: &HashMap<String, PropertiesMap>,
        parameters: &HashMap<String, PropertiesMap>,
        report: &mut SubstitutionReport,
    ) -> Result<Resource> {
        if self.ignore.contains(&resource.name) {
            return Ok(resource.clone());
        }
        let scope = SubstitutionScope {
            properties,
            parameters,
            ignore: &self.ignore,
            default_target: None,
            owner: &resource.name,
            eager_dynamic: self.eager_dynamic,
        };

        let mut resolved = resource.clone();
        resolved.properties = substitute_map(&resource.properties, &scope, report)?;
        resolved.parameters = substitute_map(&resource.parameters, &scope, report)?;
        resolved.required_dependencies = resource
            .required_dependencies
            .iter()
            .map(|dependency| self.substitute_dependency(dependency, &resource.name, properties, parameters, report))
            .collect::<Result<_>>()?;
        Ok(resolved)
    }

    fn substitute_module(
        &self,
        module: &Module,
        properties: &HashMap<String, PropertiesMap>,
        parameters: &HashMap<String, PropertiesMap>,
        report: &mut SubstitutionReport,
    ) -> Result<Module> {
        let module_scope = SubstitutionScope {
            properties,
            parameters,
            ignore: &self.ignore,
            default_target: None,
            owner: &module.name,
            eager_dynamic: self.eager_dynamic,
        };

        let mut resolved = module.clone();
        resolved.properties = substitute_map(&module.properties, &module_scope, report)?;
        resolved.parameters = substitute_map(&module.parameters, &module_scope, report)?;
        resolved.required_dependencies = module
            .required_dependencies
            .iter()
            .map(|dependency| self.substitute_dependency(dependency, &module.name, properties, parameters, report))
            .collect::<Result<_>>()?;
        resolved.provided_dependencies = module
            .provided_dependencies
            .iter()
            .map(|provided| {
                let scope = SubstitutionScope {
                    properties,
                    parameters,
                    ignore: &self.ignore,
                    default_target: None,
                    owner: &provided.name,
                    eager_dynamic: self.eager_dynamic,
                };
                let mut resolved_provided = provided.clone();
                resolved_provided.properties =
                    substitute_map(&provided.properties, &scope, report)?;
                resolved_provided.parameters =
                    substitute_map(&provided.parameters, &scope, report)?;
                Ok(resolved_provided)
            })
            .collect::<Result<_>>()?;
        Ok(resolved)
    }

    fn substitute_dependency(
        &self,
        dependency: &crate::descriptor::RequiredDependency,
        owner: &str,
        properties: &HashMap<String, PropertiesMap>,
        parameters: &HashMap<String, PropertiesMap>,
        report: &mut SubstitutionReport,
    ) -> Result<crate::descriptor::RequiredDependency> {
        if self.ignore.contains(&dependency.name) {
            return Ok(dependency.clone());
        }
        let scope = SubstitutionScope {
            properties,
            parameters,
            ignore: &self.ignore,
            default_target: Some(&dependency.name),
            owner,
            eager_dynamic: self.eager_dynamic,
        };
        let mut resolved = dependency.clone();
        resolved.properties = substitute_map(&dependency.properties, &scope, report)?;
        resolved.parameters = substitute_map(&dependency.parameters, &scope, report)?;
        Ok(resolved)
    }
}

/// Build the entity name → properties and entity name → parameters lookup
/// tables consulted during substitution.
fn collect_tables(
    descriptor: &DeploymentDescriptor,
) -> (HashMap<String, PropertiesMap>, HashMap<String, PropertiesMap>) {
    let mut properties = HashMap::new();
    let mut parameters = HashMap::new();
    let mut record = |name: &str, props: &PropertiesMap, params: &PropertiesMap| {
        properties.insert(name.to_string(), props.clone());
        parameters.insert(name.to_string(), params.clone());
    };
    for module in &descriptor.modules {
        record(&module.name, &module.properties, &module.parameters);
        for provided in &module.provided_dependencies {
            record(&provided.name, &provided.properties, &provided.parameters);
        }
    }
    for resource in &descriptor.resources {
        record(&resource.name, &resource.properties, &resource.parameters);
    }
    (properties, parameters)
}

/// Remove the configuration-reference parameters from a resource whose entry
/// content has been merged. A resolved resource no longer declares a filter,
/// so a later resolve pass leaves it untouched instead of matching (and
/// fanning out) again.
fn strip_reference_parameters(resource: &mut Resource) {
    use crate::filter::keys;
    for key in [
        keys::TYPE,
        keys::VERSION,
        keys::PROVIDER_NID,
        keys::PROVIDER_ID,
        keys::PROVIDER_NAMESPACE,
        keys::FILTER,
        keys::TARGET,
        keys::MTA_ID,
        keys::MTA_VERSION,
        keys::MTA_PROVIDES_DEPENDENCY,
    ] {
        resource.parameters.remove(key);
    }
}

/// Merge a matched entry's JSON content into the resource's properties.
/// Content that is not a JSON object contributes nothing.
fn merge_entry_content(resource: &mut Resource, entry: &ConfigurationEntry) {
    match serde_json::from_str::<serde_json::Value>(&entry.content) {
        Ok(serde_json::Value::Object(content)) => {
            for (key, value) in content {
                resource.properties.insert(key, value);
            }
        }
        _ => {
            debug!(resource = %resource.name, "matched entry content is not a JSON object");
        }
    }
}

/// Point dependencies that named a fanned-out resource at its expanded
/// copies, one dependency per copy.
fn repoint_expanded_dependencies(
    descriptor: &mut DeploymentDescriptor,
    expansions: &HashMap<String, Vec<String>>,
) {
    let repoint = |dependencies: &mut Vec<crate::descriptor::RequiredDependency>| {
        let declared = std::mem::take(dependencies);
        for dependency in declared {
            match expansions.get(&dependency.name) {
                Some(expanded_names) => {
                    for name in expanded_names {
                        let mut copy = dependency.clone();
                        copy.name.clone_from(name);
                        dependencies.push(copy);
                    }
                }
                None => dependencies.push(dependency),
            }
        }
    };

    for module in &mut descriptor.modules {
        repoint(&mut module.required_dependencies);
    }
    for resource in &mut descriptor.resources {
        repoint(&mut resource.required_dependencies);
    }
}

/// The closest known name to `name`, if any is similar enough to be a likely
/// typo.
fn closest_name(name: &str, known: &HashSet<String>) -> Option<String> {
    known
        .iter()
        .map(|candidate| (strsim::jaro_winkler(name, candidate), candidate))
        .filter(|(score, _)| *score > 0.85)
        .max_by(|(a, _), (b, _)| a.total_cmp(b))
        .map(|(_, candidate)| candidate.clone())
}
