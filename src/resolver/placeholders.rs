//! Placeholder token grammar and substitution.
//!
//! Two placeholder families appear in descriptor property and parameter
//! values:
//!
//! - **Structural** — `~{dependency/property}` or, inside a required
//!   dependency's own maps, the short form `~{property}` (resolved against
//!   the dependency the enclosing declaration names). Structural references
//!   are substituted exactly one hop deep: a substituted value is never
//!   re-scanned for further tokens.
//! - **Dynamic** — `{ds/dependency/parameter}`, a value only known after the
//!   dependency is actually deployed. Dynamic tokens are left intact and
//!   reported as [`DynamicResolvableParameter`] records, unless the resolver
//!   runs in eager mode.
//!
//! A value that consists of exactly one token keeps the replacement's JSON
//! type; a token embedded in a longer string is spliced in as text.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::core::{ResolveError, Result};
use crate::descriptor::PropertiesMap;

use super::DynamicResolvableParameter;

fn structural_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"~\{([^{}/\s]+)(?:/([^{}/\s]+))?\}").unwrap())
}

fn dynamic_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{ds/([^{}/\s]+)/([^{}/\s]+)\}").unwrap())
}

/// Everything a substitution pass needs to know about its surroundings.
pub(crate) struct SubstitutionScope<'a> {
    /// Property values reachable by structural references, per entity name
    pub properties: &'a HashMap<String, PropertiesMap>,
    /// Parameter values consulted by eager dynamic resolution
    pub parameters: &'a HashMap<String, PropertiesMap>,
    /// Dependency names that must be left completely untouched
    pub ignore: &'a HashSet<String>,
    /// The dependency name short-form tokens resolve against
    pub default_target: Option<&'a str>,
    /// Name of the entity being substituted, for error reporting
    pub owner: &'a str,
    /// Whether dynamic tokens are forced to resolve now
    pub eager_dynamic: bool,
}

/// Outputs collected across a substitution pass.
#[derive(Debug, Default)]
pub(crate) struct SubstitutionReport {
    pub dynamic_parameters: HashSet<DynamicResolvableParameter>,
    /// Structural targets that exist in no entity; aggregated into one error
    /// by the caller
    pub unresolved_targets: Vec<String>,
}

impl SubstitutionReport {
    fn record_unresolved(&mut self, name: &str) {
        if !self.unresolved_targets.iter().any(|n| n == name) {
            self.unresolved_targets.push(name.to_string());
        }
    }
}

/// Substitute every placeholder in `map`, returning a new map.
pub(crate) fn substitute_map(
    map: &PropertiesMap,
    scope: &SubstitutionScope<'_>,
    report: &mut SubstitutionReport,
) -> Result<PropertiesMap> {
    map.iter()
        .map(|(key, value)| Ok((key.clone(), substitute_value(value, scope, report)?)))
        .collect()
}

fn substitute_value(
    value: &Value,
    scope: &SubstitutionScope<'_>,
    report: &mut SubstitutionReport,
) -> Result<Value> {
    match value {
        Value::String(text) => substitute_string(text, scope, report),
        Value::Array(items) => Ok(Value::Array(
            items.iter().map(|item| substitute_value(item, scope, report)).collect::<Result<_>>()?,
        )),
        Value::Object(map) => Ok(Value::Object(substitute_map(map, scope, report)?)),
        other => Ok(other.clone()),
    }
}

fn substitute_string(
    text: &str,
    scope: &SubstitutionScope<'_>,
    report: &mut SubstitutionReport,
) -> Result<Value> {
    // Whole-token values keep the replacement's JSON type.
    if let Some(captures) = structural_pattern().captures(text)
        && captures.get(0).map(|m| m.as_str()) == Some(text)
        && let Resolution::Value(replacement) = resolve_structural(&captures, scope, report)?
    {
        return Ok(replacement);
    }
    if let Some(captures) = dynamic_pattern().captures(text)
        && captures.get(0).map(|m| m.as_str()) == Some(text)
        && let Resolution::Value(replacement) = resolve_dynamic(&captures, scope, report)?
    {
        return Ok(replacement);
    }

    let after_structural = replace_all(structural_pattern(), text, |captures| {
        resolve_structural(captures, scope, report)
    })?;
    let after_dynamic = replace_all(dynamic_pattern(), &after_structural, |captures| {
        resolve_dynamic(captures, scope, report)
    })?;
    Ok(Value::String(after_dynamic))
}

/// Outcome of resolving one token occurrence.
enum Resolution {
    /// Replace the token with this value
    Value(Value),
    /// Leave the token in place (ignored, deferred, or unknown target)
    Keep,
}

fn resolve_structural(
    captures: &regex::Captures<'_>,
    scope: &SubstitutionScope<'_>,
    report: &mut SubstitutionReport,
) -> Result<Resolution> {
    let (target, property) = match captures.get(2) {
        Some(property) => (Some(&captures[1]), property.as_str()),
        None => (scope.default_target, &captures[1]),
    };
    // A short-form token outside a dependency context has no target; it is
    // left for a later resolution pass.
    let Some(target) = target else {
        return Ok(Resolution::Keep);
    };
    if scope.ignore.contains(target) {
        return Ok(Resolution::Keep);
    }
    let Some(target_properties) = scope.properties.get(target) else {
        report.record_unresolved(target);
        return Ok(Resolution::Keep);
    };
    match target_properties.get(property) {
        Some(value) => Ok(Resolution::Value(value.clone())),
        None => Err(ResolveError::RequiredPropertyMissing {
            property: property.to_string(),
        }),
    }
}

fn resolve_dynamic(
    captures: &regex::Captures<'_>,
    scope: &SubstitutionScope<'_>,
    report: &mut SubstitutionReport,
) -> Result<Resolution> {
    let dependency = &captures[1];
    let parameter = &captures[2];
    report.dynamic_parameters.insert(DynamicResolvableParameter {
        parameter_name: parameter.to_string(),
        relationship_entity_name: dependency.to_string(),
    });
    if !scope.eager_dynamic || scope.ignore.contains(dependency) {
        return Ok(Resolution::Keep);
    }
    scope
        .parameters
        .get(dependency)
        .and_then(|parameters| parameters.get(parameter))
        .map(|value| Resolution::Value(value.clone()))
        .ok_or_else(|| ResolveError::UnresolvedDynamicParameter {
            resource: scope.owner.to_string(),
            dependency: dependency.to_string(),
        })
}

fn replace_all(
    pattern: &Regex,
    text: &str,
    mut resolve: impl FnMut(&regex::Captures<'_>) -> Result<Resolution>,
) -> Result<String> {
    let mut result = String::with_capacity(text.len());
    let mut last_end = 0;
    for captures in pattern.captures_iter(text) {
        let matched = captures.get(0).expect("capture group 0 always exists");
        result.push_str(&text[last_end..matched.start()]);
        match resolve(&captures)? {
            Resolution::Value(value) => result.push_str(&render(&value)),
            Resolution::Keep => result.push_str(matched.as_str()),
        }
        last_end = matched.end();
    }
    result.push_str(&text[last_end..]);
    Ok(result)
}

fn render(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Names of the entities the structural tokens in `map` point at, used to
/// build the reference graph. Short-form tokens resolve to `default_target`.
pub(crate) fn structural_targets(map: &PropertiesMap, default_target: Option<&str>) -> Vec<String> {
    let mut targets = Vec::new();
    collect_targets(map, default_target, &mut targets);
    targets
}

fn collect_targets(map: &PropertiesMap, default_target: Option<&str>, targets: &mut Vec<String>) {
    for value in map.values() {
        collect_value_targets(value, default_target, targets);
    }
}

fn collect_value_targets(value: &Value, default_target: Option<&str>, targets: &mut Vec<String>) {
    match value {
        Value::String(text) => {
            for captures in structural_pattern().captures_iter(text) {
                let target = match captures.get(2) {
                    Some(_) => Some(captures[1].to_string()),
                    None => default_target.map(str::to_string),
                };
                if let Some(target) = target
                    && !targets.contains(&target)
                {
                    targets.push(target);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_value_targets(item, default_target, targets);
            }
        }
        Value::Object(map) => collect_targets(map, default_target, targets),
        _ => {}
    }
}
