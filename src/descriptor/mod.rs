//! The deployment descriptor data model.
//!
//! A [`DeploymentDescriptor`] is the merged, parsed form of an MTA deployment
//! descriptor: an identifier, a version, and ordered sequences of [`Module`]
//! and [`Resource`] entities with their declared dependencies. Parsing from
//! YAML/archive bytes is out of scope for this crate; the types derive
//! `Deserialize` with the kebab-case key names used by descriptor files, and
//! the test suites build fixtures through `serde_yaml`.
//!
//! The resolution pipeline owns a descriptor for the duration of one resolve
//! operation: callers pass the value in and receive a new resolved value out.
//! Nothing here is mutated in place across calls.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::{SchemaCapabilities, SchemaVersion};


/// Property and parameter maps attached to descriptor entities.
pub type PropertiesMap = serde_json::Map<String, Value>;

/// The wildcard component accepted in visibility targets.
pub const TARGET_WILDCARD: &str = "*";

/// Dependency parameter marking a reference as managed (deferred to a
/// subscription instead of being resolved immediately).
pub const PARAMETER_MANAGED: &str = "managed";

/// Dependency parameter overriding the environment variable the dependency's
/// content is injected under.
pub const PARAMETER_ENV_VAR_NAME: &str = "env-var-name";

/// An `(organization, space)` pair identifying a deployment target.
///
/// Equality is exact. The wildcard rules of the visibility relation live in
/// [`CloudTarget::matches_with_wildcards`], never in `PartialEq`, so that a
/// literal `*` stored in an entry cannot accidentally compare equal to a
/// concrete target elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CloudTarget {
    /// Organization name, possibly `*`
    pub org: String,
    /// Space name, possibly `*`
    pub space: String,
}

impl CloudTarget {
    /// Create a target from organization and space names.
    pub fn new(org: impl Into<String>, space: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            space: space.into(),
        }
    }

    /// Component-wise wildcard match: either side's `*` matches any value of
    /// that component.
    #[must_use]
    pub fn matches_with_wildcards(&self, other: &Self) -> bool {
        component_matches(&self.org, &other.org) && component_matches(&self.space, &other.space)
    }
}

fn component_matches(a: &str, b: &str) -> bool {
    a == TARGET_WILDCARD || b == TARGET_WILDCARD || a == b
}

/// A dependency declared by a module or resource on another named entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequiredDependency {
    /// Name of the module, resource, or provided dependency this points at
    pub name: String,
    /// Group key: sibling dependencies sharing a group are injected together
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// List key: the dependency's content is injected as a list element
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<String>,
    #[serde(default, skip_serializing_if = "PropertiesMap::is_empty")]
    pub properties: PropertiesMap,
    #[serde(default, skip_serializing_if = "PropertiesMap::is_empty")]
    pub parameters: PropertiesMap,
}

impl RequiredDependency {
    /// Create a dependency on `name` with empty maps.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: None,
            list: None,
            properties: PropertiesMap::new(),
            parameters: PropertiesMap::new(),
        }
    }

    /// Whether the dependency is marked `managed: true` and must be deferred
    /// to a configuration subscription.
    #[must_use]
    pub fn is_managed(&self) -> bool {
        self.parameters.get(PARAMETER_MANAGED) == Some(&Value::Bool(true))
    }

    /// The environment variable name the dependency's content is published
    /// under, defaulting to the dependency name.
    #[must_use]
    pub fn env_var_name(&self) -> &str {
        self.parameters
            .get(PARAMETER_ENV_VAR_NAME)
            .and_then(Value::as_str)
            .unwrap_or(&self.name)
    }
}

/// A value set a module offers to other entities, within or across MTAs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProvidedDependency {
    pub name: String,
    /// Whether the provided values are published for other MTAs. Substitution
    /// within the same descriptor ignores this flag.
    #[serde(default)]
    pub public: bool,
    #[serde(default, skip_serializing_if = "PropertiesMap::is_empty")]
    pub properties: PropertiesMap,
    #[serde(default, skip_serializing_if = "PropertiesMap::is_empty")]
    pub parameters: PropertiesMap,
}

impl ProvidedDependency {
    /// Create a provided dependency named `name` with empty maps.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            public: false,
            properties: PropertiesMap::new(),
            parameters: PropertiesMap::new(),
        }
    }
}

/// A deployable module of the MTA.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    /// Name, unique within the descriptor
    pub name: String,
    /// Declared module type; a module without one is not deployable
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub module_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "PropertiesMap::is_empty")]
    pub properties: PropertiesMap,
    #[serde(default, skip_serializing_if = "PropertiesMap::is_empty")]
    pub parameters: PropertiesMap,
    /// Names of modules that must be deployed before this one
    #[serde(rename = "deployed-after", default, skip_serializing_if = "Option::is_none")]
    pub deployed_after: Option<Vec<String>>,
    #[serde(rename = "requires", default, skip_serializing_if = "Vec::is_empty")]
    pub required_dependencies: Vec<RequiredDependency>,
    #[serde(rename = "provides", default, skip_serializing_if = "Vec::is_empty")]
    pub provided_dependencies: Vec<ProvidedDependency>,
}

impl Module {
    /// Create a module of the given type with empty maps and dependency lists.
    pub fn new(name: impl Into<String>, module_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module_type: Some(module_type.into()),
            description: None,
            properties: PropertiesMap::new(),
            parameters: PropertiesMap::new(),
            deployed_after: None,
            required_dependencies: Vec::new(),
            provided_dependencies: Vec::new(),
        }
    }
}

/// A resource of the MTA: a service to create, or a configuration reference
/// to resolve against previously published entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Name, unique within the descriptor
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Explicit activity flag; only honored at schema major version 3 and up
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    /// Whether the deployment tolerates this resource being unavailable
    #[serde(default)]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "PropertiesMap::is_empty")]
    pub properties: PropertiesMap,
    #[serde(default, skip_serializing_if = "PropertiesMap::is_empty")]
    pub parameters: PropertiesMap,
    #[serde(rename = "requires", default, skip_serializing_if = "Vec::is_empty")]
    pub required_dependencies: Vec<RequiredDependency>,
}

impl Resource {
    /// Create a resource with empty maps and no dependencies.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            active: None,
            optional: false,
            properties: PropertiesMap::new(),
            parameters: PropertiesMap::new(),
            required_dependencies: Vec::new(),
        }
    }

    /// Whether the resource takes part in the deployment. Below schema major
    /// version 3 the `active` flag does not exist and every resource is
    /// active.
    #[must_use]
    pub fn is_active(&self, capabilities: &SchemaCapabilities) -> bool {
        if !capabilities.resource_activity_flags {
            return true;
        }
        self.active.unwrap_or(true)
    }
}

/// The root of the descriptor tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentDescriptor {
    #[serde(rename = "_schema-version")]
    pub schema_version: SchemaVersion,
    #[serde(rename = "ID")]
    pub id: String,
    pub version: semver::Version,
    /// Descriptor-level parameters; the ambient end of the
    /// parameter-inheritance chain consulted by the filter parser
    #[serde(default, skip_serializing_if = "PropertiesMap::is_empty")]
    pub parameters: PropertiesMap,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modules: Vec<Module>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<Resource>,
}

impl DeploymentDescriptor {
    /// Create an empty descriptor.
    pub fn new(id: impl Into<String>, version: semver::Version, schema: SchemaVersion) -> Self {
        Self {
            schema_version: schema,
            id: id.into(),
            version,
            parameters: PropertiesMap::new(),
            modules: Vec::new(),
            resources: Vec::new(),
        }
    }

    /// The capability set implied by the declared schema version.
    #[must_use]
    pub fn capabilities(&self) -> SchemaCapabilities {
        SchemaCapabilities::for_version(self.schema_version)
    }

    /// Look up a module by name.
    #[must_use]
    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Look up a resource by name.
    #[must_use]
    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// Every name a structural reference or required dependency may point at:
    /// modules, resources, and module-provided dependencies.
    #[must_use]
    pub fn referencable_names(&self) -> std::collections::HashSet<String> {
        let mut names = std::collections::HashSet::new();
        for module in &self.modules {
            names.insert(module.name.clone());
            for provided in &module.provided_dependencies {
                names.insert(provided.name.clone());
            }
        }
        for resource in &self.resources {
            names.insert(resource.name.clone());
        }
        names
    }
}
