//! Published configuration entries and the store they are matched against.
//!
//! A [`ConfigurationEntry`] is a record published by a previous deployment:
//! a provider identity (nid/id/version/namespace), the target space it was
//! published into, free-form JSON content, and an optional explicit
//! visibility list. Entries are read-only to this crate; matching them
//! against filters is the [`matcher::EntryMatcher`]'s job.
//!
//! The [`EntryStore`] trait is the seam to the real persistence layer. The
//! store is shared across concurrently executing deployment operations, so
//! implementations must be safe for concurrent reads; [`InMemoryEntryStore`]
//! demonstrates the contract and backs the test suites.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::descriptor::CloudTarget;

pub mod matcher;

pub use matcher::EntryMatcher;

/// A previously published configuration entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationEntry {
    pub provider_nid: Option<String>,
    pub provider_id: Option<String>,
    pub provider_version: Option<semver::Version>,
    pub provider_namespace: Option<String>,
    /// The space the entry was published into
    pub target_space: CloudTarget,
    /// Free-form JSON content; unparseable content makes the entry
    /// non-matching for content-constrained filters, never an error
    pub content: String,
    /// Explicit visibility list. `None` means the implicit default
    /// `(entry organization, *)`.
    pub visibility: Option<Vec<CloudTarget>>,
}

impl ConfigurationEntry {
    /// Create an entry with the given provider identity, published into
    /// `target_space` with `content`.
    pub fn new(
        provider_nid: impl Into<String>,
        provider_id: impl Into<String>,
        provider_version: Option<semver::Version>,
        target_space: CloudTarget,
        content: impl Into<String>,
    ) -> Self {
        Self {
            provider_nid: Some(provider_nid.into()),
            provider_id: Some(provider_id.into()),
            provider_version,
            provider_namespace: None,
            target_space,
            content: content.into(),
            visibility: None,
        }
    }

    /// The targets this entry is visible to: the explicit visibility list, or
    /// the implicit `(entry organization, *)` default.
    #[must_use]
    pub fn visibility_targets(&self) -> Vec<CloudTarget> {
        match &self.visibility {
            Some(targets) => targets.clone(),
            None => vec![CloudTarget::new(
                self.target_space.org.clone(),
                crate::descriptor::TARGET_WILDCARD,
            )],
        }
    }
}

/// Read-only access to the configuration-entry store.
///
/// `query` narrows by exact provider nid/id when present; all further
/// constraints (version range, namespace, content, visibility) are applied by
/// the matcher. Implementations must be safe under concurrent access and
/// should return entries in a stable order: fan-out resource naming is
/// derived from it.
pub trait EntryStore: Send + Sync {
    /// Fetch candidate entries, filtered by exact provider nid and id when
    /// those are given.
    fn query(
        &self,
        provider_nid: Option<&str>,
        provider_id: Option<&str>,
    ) -> anyhow::Result<Vec<ConfigurationEntry>>;
}

/// A concurrent in-memory [`EntryStore`].
///
/// Entries are returned in publication (insertion) order, which makes
/// fan-out naming deterministic in tests.
#[derive(Debug, Default)]
pub struct InMemoryEntryStore {
    entries: DashMap<u64, ConfigurationEntry>,
    sequence: AtomicU64,
}

impl InMemoryEntryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish an entry.
    pub fn publish(&self, entry: ConfigurationEntry) {
        let id = self.sequence.fetch_add(1, Ordering::SeqCst);
        self.entries.insert(id, entry);
    }
}

impl EntryStore for InMemoryEntryStore {
    fn query(
        &self,
        provider_nid: Option<&str>,
        provider_id: Option<&str>,
    ) -> anyhow::Result<Vec<ConfigurationEntry>> {
        let mut matches: Vec<(u64, ConfigurationEntry)> = self
            .entries
            .iter()
            .filter(|item| {
                let entry = item.value();
                let nid_matches = match provider_nid {
                    Some(nid) => entry.provider_nid.as_deref() == Some(nid),
                    None => true,
                };
                let id_matches = match provider_id {
                    Some(id) => entry.provider_id.as_deref() == Some(id),
                    None => true,
                };
                nid_matches && id_matches
            })
            .map(|item| (*item.key(), item.value().clone()))
            .collect();
        matches.sort_by_key(|(id, _)| *id);
        Ok(matches.into_iter().map(|(_, entry)| entry).collect())
    }
}
