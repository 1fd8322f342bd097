//! Error handling for the resolution pipeline.
//!
//! Every failure mode of the resolution pipeline surfaces as a [`ResolveError`]
//! variant. The variants fall into three categories that callers are expected
//! to route differently (see [`ResolveError::is_content_error`] and
//! [`ResolveError::is_conflict`]):
//!
//! - **Content errors** — the descriptor input is malformed or contradictory
//!   (missing filter property, zero/many entry matches when a single match is
//!   required, unresolved dependency name, unresolvable dynamic placeholder).
//!   These are never retried by the pipeline; they are the final, user-visible
//!   failure of the resolve operation.
//! - **Conflict errors** — a duplicate subscription insert. Callers may choose
//!   to ignore them or surface them differently from content errors.
//! - **Store errors** — failures of an external collaborator (entry store,
//!   subscription store, platform lookup), wrapped transparently as
//!   [`anyhow::Error`].
//!
//! Malformed JSON content on a stored configuration entry is deliberately
//! *not* an error: the matcher treats such entries as non-matching so one bad
//! entry cannot block resolution against other, valid entries.
//!
//! Several messages are matched on verbatim by callers; their wording is part
//! of the public contract and must not be reworded.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ResolveError>;

/// The error type for descriptor resolution operations.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// A configuration filter matched no entry in the store.
    ///
    /// The message wording is a compatibility contract with callers.
    #[error("No configuration entries were found matching the filter specified in resource \"{resource}\"")]
    EntryNotFound {
        /// Name of the resource that declared the filter
        resource: String,
    },

    /// A configuration filter matched more than one entry while the matcher
    /// was configured for a single match.
    #[error("Multiple configuration entries were found matching the filter specified in resource \"{resource}\"")]
    AmbiguousEntries {
        /// Name of the resource that declared the filter
        resource: String,
    },

    /// A filter syntax requires a parameter that was not supplied.
    #[error("Could not find required property \"{property}\"")]
    RequiredPropertyMissing {
        /// The missing parameter key
        property: String,
    },

    /// One or more dependency targets could not be resolved to a module that
    /// is part of the deployment or already deployed.
    ///
    /// All offending names are collected before this error is raised so the
    /// user sees every problem at once.
    #[error("Unresolved module dependencies: {}", quoted_list(.names))]
    UnresolvedModuleDependencies {
        /// The dependency names that failed to resolve, in discovery order
        names: Vec<String>,
    },

    /// A dynamic `{ds/...}` placeholder was forced to resolve eagerly but the
    /// target dependency carries no value for it.
    #[error("Could not resolve dynamic parameter of dependency \"{dependency}\" in \"{resource}\"")]
    UnresolvedDynamicParameter {
        /// Name of the entity whose properties contain the placeholder
        resource: String,
        /// Name of the dependency the placeholder points at
        dependency: String,
    },

    /// The structural references in the descriptor form a cycle.
    #[error("Circular reference detected: {path}")]
    CircularReference {
        /// The cycle, rendered as `a → b → a`
        path: String,
    },

    /// A `version` filter parameter is not a valid semantic version range.
    #[error("Invalid version requirement \"{requirement}\"")]
    InvalidVersionRequirement {
        /// The requirement string that failed to parse
        requirement: String,
        /// The underlying semver parse failure
        #[source]
        source: semver::Error,
    },

    /// A subscription with the same `(mta, application, resource, space)` key
    /// already exists. This is the only conflict-category error.
    #[error("Configuration subscription for MTA \"{mta_id}\", application \"{app_name}\" and resource \"{resource_name}\" already exists in space \"{space_id}\"")]
    SubscriptionExists {
        /// Identifier of the consuming MTA
        mta_id: String,
        /// Name of the consuming application
        app_name: String,
        /// Name of the providing resource
        resource_name: String,
        /// Space the subscription belongs to
        space_id: String,
    },

    /// A failure of an external collaborator (entry store, subscription
    /// store, platform lookup).
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl ResolveError {
    /// Whether this error denotes malformed or contradictory descriptor
    /// input. Content errors are final; nothing in this crate retries them.
    #[must_use]
    pub fn is_content_error(&self) -> bool {
        !matches!(self, Self::SubscriptionExists { .. } | Self::Store(_))
    }

    /// Whether this error is a uniqueness conflict (duplicate subscription).
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::SubscriptionExists { .. })
    }
}

/// Render a name list as `"a", "b", "c"` for aggregate error messages.
pub(crate) fn quoted_list(names: &[String]) -> String {
    names.iter().map(|n| format!("\"{n}\"")).collect::<Vec<_>>().join(", ")
}
