use std::collections::HashSet;

use crate::core::Result;
use crate::descriptor::DeploymentDescriptor;
use crate::entries::EntryStore;
use crate::schema::MatchPolicy;

use super::{ReferenceResolver, ResolutionContext, ResolvedDescriptor};

/// A [`ReferenceResolver`] that leaves a chosen set of dependencies
/// completely symbolic.
///
/// Resources, dependencies, and placeholder tokens whose target appears in
/// the ignore set pass through untouched: their filters are not evaluated and
/// their tokens are not substituted. Subscription creation uses this to keep
/// configuration references in their declared form while everything around
/// them resolves normally.
pub struct PartialReferenceResolver<'a> {
    inner: ReferenceResolver<'a>,
}

impl<'a> PartialReferenceResolver<'a> {
    pub fn new(
        store: &'a dyn EntryStore,
        context: ResolutionContext,
        dependencies_to_ignore: HashSet<String>,
    ) -> Self {
        Self {
            inner: ReferenceResolver::new(store, context)
                .with_ignored_dependencies(dependencies_to_ignore),
        }
    }

    /// Override the schema-derived multiple-match policy.
    #[must_use]
    pub fn with_match_policy(mut self, policy: MatchPolicy) -> Self {
        self.inner = self.inner.with_match_policy(policy);
        self
    }

    /// Resolve everything outside the ignore set.
    pub fn resolve(&self, descriptor: DeploymentDescriptor) -> Result<ResolvedDescriptor> {
        self.inner.resolve(descriptor)
    }
}
