//! Matching configuration filters against the entry store.

use serde_json::Value;
use tracing::debug;

use crate::core::{ResolveError, Result};
use crate::filter::ConfigurationFilter;
use crate::schema::MatchPolicy;

use super::{ConfigurationEntry, EntryStore};

/// Applies a [`ConfigurationFilter`]'s constraints to the entry store.
///
/// The matcher queries by exact provider nid/id and then applies, in order:
/// the version range, the namespace, the required content, and the visibility
/// relation. The multiple-match behavior is an explicit [`MatchPolicy`]
/// passed at construction, never a hidden default.
pub struct EntryMatcher<'a> {
    store: &'a dyn EntryStore,
    policy: MatchPolicy,
}

impl<'a> EntryMatcher<'a> {
    /// Create a matcher over `store` with the given multiple-match policy.
    pub fn new(store: &'a dyn EntryStore, policy: MatchPolicy) -> Self {
        Self {
            store,
            policy,
        }
    }

    /// The policy this matcher applies when a filter matches multiple entries.
    #[must_use]
    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Resolve `filter` to the entries it matches.
    ///
    /// Zero matches is a hard error naming `resource_name`. Multiple matches
    /// error under [`MatchPolicy::Singular`] and are returned in store-query
    /// order under [`MatchPolicy::FanOut`].
    pub fn resolve(
        &self,
        filter: &ConfigurationFilter,
        resource_name: &str,
    ) -> Result<Vec<ConfigurationEntry>> {
        let candidates =
            self.store.query(filter.provider_nid.as_deref(), filter.provider_id.as_deref())?;
        let candidate_count = candidates.len();

        let matches: Vec<ConfigurationEntry> = candidates
            .into_iter()
            .filter(|entry| {
                satisfies_version(entry, filter)
                    && satisfies_namespace(entry, filter)
                    && satisfies_content(entry, filter)
                    && satisfies_visibility(entry, filter)
            })
            .collect();
        debug!(
            resource = resource_name,
            candidates = candidate_count,
            matches = matches.len(),
            "matched configuration entries"
        );

        match (matches.len(), self.policy) {
            (0, _) => Err(ResolveError::EntryNotFound {
                resource: resource_name.to_string(),
            }),
            (1, _) | (_, MatchPolicy::FanOut) => Ok(matches),
            (_, MatchPolicy::Singular) => Err(ResolveError::AmbiguousEntries {
                resource: resource_name.to_string(),
            }),
        }
    }
}

fn satisfies_version(entry: &ConfigurationEntry, filter: &ConfigurationFilter) -> bool {
    match &filter.provider_version {
        // A version-constrained filter rejects entries without a version.
        Some(requirement) => {
            entry.provider_version.as_ref().is_some_and(|version| requirement.matches(version))
        }
        None => true,
    }
}

fn satisfies_namespace(entry: &ConfigurationEntry, filter: &ConfigurationFilter) -> bool {
    let effective = filter.provider_namespace.as_deref().filter(|n| !n.is_empty());
    let entry_namespace = entry.provider_namespace.as_deref().filter(|n| !n.is_empty());
    effective == entry_namespace
}

fn satisfies_content(entry: &ConfigurationEntry, filter: &ConfigurationFilter) -> bool {
    if filter.required_content.is_empty() {
        return true;
    }
    // Unparseable stored content is a non-match, not an error: one bad entry
    // must not block resolution against the valid ones.
    let Ok(Value::Object(content)) = serde_json::from_str::<Value>(&entry.content) else {
        return false;
    };
    filter.required_content.iter().all(|(key, expected)| content.get(key) == Some(expected))
}

fn satisfies_visibility(entry: &ConfigurationEntry, filter: &ConfigurationFilter) -> bool {
    if filter.strict_target {
        return entry.target_space == filter.target;
    }
    entry
        .visibility_targets()
        .iter()
        .any(|visible_to| filter.target.matches_with_wildcards(visible_to))
}
