//! Configuration-reference filters and their extraction from resources.
//!
//! A resource whose effective `type` parameter marks it as a configuration
//! reference carries the query that selects previously published
//! configuration entries. Two historical syntaxes are supported:
//!
//! - **Current** (`type: configuration`): optional `version` range,
//!   `provider-nid`, `provider-namespace`, `provider-id`, a free-form
//!   `filter` map of required content, and an optional explicit `target`.
//! - **Legacy** (`type: mta-provides-dependency`): requires `mta-id`,
//!   `mta-provides-dependency` and `mta-version`; the provider id is computed
//!   from the two MTA identifiers.
//!
//! A resource matching neither syntax yields `Ok(None)`: it is simply not
//! subject to configuration matching, which is distinct both from a parse
//! failure (`Err`) and from a filter that matches nothing (a matcher error).

use semver::VersionReq;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{ResolveError, Result};
use crate::descriptor::{CloudTarget, PropertiesMap, Resource};

/// The well-known provider namespace identifier for MTA-published entries.
pub const PROVIDER_NID: &str = "mta";

/// Resource `type` value selecting the current filter syntax.
pub const RESOURCE_TYPE_CONFIGURATION: &str = "configuration";

/// Resource `type` value selecting the legacy filter syntax.
pub const RESOURCE_TYPE_LEGACY: &str = "mta-provides-dependency";

pub(crate) mod keys {
    pub const TYPE: &str = "type";
    pub const VERSION: &str = "version";
    pub const PROVIDER_NID: &str = "provider-nid";
    pub const PROVIDER_ID: &str = "provider-id";
    pub const PROVIDER_NAMESPACE: &str = "provider-namespace";
    pub const FILTER: &str = "filter";
    pub const TARGET: &str = "target";
    pub const TARGET_ORG: &str = "org";
    pub const TARGET_SPACE: &str = "space";
    pub const MTA_ID: &str = "mta-id";
    pub const MTA_VERSION: &str = "mta-version";
    pub const MTA_PROVIDES_DEPENDENCY: &str = "mta-provides-dependency";
}

/// The constraints a configuration entry must satisfy to resolve a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationFilter {
    /// Provider namespace identifier, exact match when present
    pub provider_nid: Option<String>,
    /// Provider identifier, exact match when present
    pub provider_id: Option<String>,
    /// Semantic version range the provider version must satisfy
    pub provider_version: Option<VersionReq>,
    /// Provider namespace; an empty namespace matches entries without one
    pub provider_namespace: Option<String>,
    /// The target the visibility relation is evaluated against
    pub target: CloudTarget,
    /// Content constraints: every key must exist in the entry's content with
    /// an equal value
    pub required_content: PropertiesMap,
    /// Whether `target` was declared explicitly on the resource. A strict
    /// target only matches entries published exactly into that target.
    pub strict_target: bool,
}

/// Extracts [`ConfigurationFilter`]s from resources.
///
/// The parser is constructed with the ambient end of the resource's
/// parameter-inheritance chain: the descriptor-level parameters, the caller's
/// current target, and the caller's namespace. Resource parameters take
/// precedence over descriptor parameters when both define a key.
pub struct FilterParser<'a> {
    descriptor_parameters: &'a PropertiesMap,
    current_target: CloudTarget,
    default_namespace: Option<String>,
}

impl<'a> FilterParser<'a> {
    /// Create a parser for the given ambient parameter chain and target.
    pub fn new(
        descriptor_parameters: &'a PropertiesMap,
        current_target: CloudTarget,
        default_namespace: Option<String>,
    ) -> Self {
        Self {
            descriptor_parameters,
            current_target,
            default_namespace,
        }
    }

    /// Extract the configuration filter declared by `resource`, if any.
    ///
    /// Returns `Ok(None)` when the resource's effective `type` parameter
    /// matches neither supported syntax.
    pub fn parse(&self, resource: &Resource) -> Result<Option<ConfigurationFilter>> {
        match self.effective_parameter(resource, keys::TYPE).and_then(Value::as_str) {
            Some(RESOURCE_TYPE_CONFIGURATION) => self.parse_current(resource).map(Some),
            Some(RESOURCE_TYPE_LEGACY) => self.parse_legacy(resource).map(Some),
            _ => Ok(None),
        }
    }

    fn parse_current(&self, resource: &Resource) -> Result<ConfigurationFilter> {
        let provider_nid = self
            .string_parameter(resource, keys::PROVIDER_NID)
            .unwrap_or_else(|| PROVIDER_NID.to_string());
        let provider_id = self.string_parameter(resource, keys::PROVIDER_ID);
        let provider_namespace = self
            .string_parameter(resource, keys::PROVIDER_NAMESPACE)
            .or_else(|| self.default_namespace.clone());
        let provider_version = match self.string_parameter(resource, keys::VERSION) {
            Some(raw) => Some(parse_version_requirement(&raw)?),
            None => None,
        };
        let required_content = self
            .effective_parameter(resource, keys::FILTER)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let (target, strict_target) = match self.effective_parameter(resource, keys::TARGET) {
            Some(declared) => (parse_target(declared)?, true),
            None => (self.current_target.clone(), false),
        };

        Ok(ConfigurationFilter {
            provider_nid: Some(provider_nid),
            provider_id,
            provider_version,
            provider_namespace,
            target,
            required_content,
            strict_target,
        })
    }

    fn parse_legacy(&self, resource: &Resource) -> Result<ConfigurationFilter> {
        let mta_id = self.required_string(resource, keys::MTA_ID)?;
        let provided_dependency = self.required_string(resource, keys::MTA_PROVIDES_DEPENDENCY)?;
        let mta_version = self.required_string(resource, keys::MTA_VERSION)?;

        // Legacy filters pin the exact published version.
        let provider_version = parse_version_requirement(&format!("={mta_version}"))?;

        Ok(ConfigurationFilter {
            provider_nid: Some(PROVIDER_NID.to_string()),
            provider_id: Some(format!("{mta_id}:{provided_dependency}")),
            provider_version: Some(provider_version),
            provider_namespace: self.default_namespace.clone(),
            target: self.current_target.clone(),
            required_content: PropertiesMap::new(),
            strict_target: false,
        })
    }

    fn effective_parameter<'r>(&'r self, resource: &'r Resource, key: &str) -> Option<&'r Value> {
        resource.parameters.get(key).or_else(|| self.descriptor_parameters.get(key))
    }

    fn string_parameter(&self, resource: &Resource, key: &str) -> Option<String> {
        self.effective_parameter(resource, key).and_then(Value::as_str).map(str::to_string)
    }

    fn required_string(&self, resource: &Resource, key: &str) -> Result<String> {
        self.string_parameter(resource, key).ok_or_else(|| ResolveError::RequiredPropertyMissing {
            property: key.to_string(),
        })
    }
}

fn parse_version_requirement(raw: &str) -> Result<VersionReq> {
    VersionReq::parse(raw).map_err(|source| ResolveError::InvalidVersionRequirement {
        requirement: raw.to_string(),
        source,
    })
}

fn parse_target(declared: &Value) -> Result<CloudTarget> {
    let map = declared.as_object();
    let component = |key: &str| -> Result<String> {
        map.and_then(|m| m.get(key)).and_then(Value::as_str).map(str::to_string).ok_or_else(|| {
            ResolveError::RequiredPropertyMissing {
                property: key.to_string(),
            }
        })
    };
    Ok(CloudTarget::new(component(keys::TARGET_ORG)?, component(keys::TARGET_SPACE)?))
}
