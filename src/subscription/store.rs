//! Subscription persistence.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use crate::core::{ResolveError, Result};

use super::ConfigurationSubscription;

/// Opaque identifier assigned to a stored subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub Uuid);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Persistence seam for [`ConfigurationSubscription`] records.
///
/// A subscription is identified by the tuple (mta id, app name, resource
/// name, space id); adding a second record with the same identity fails with
/// [`ResolveError::SubscriptionExists`]. Implementations must be safe under
/// concurrent access.
pub trait SubscriptionStore: Send + Sync {
    /// Persist `subscription`, failing when one with the same identity
    /// already exists.
    fn add(&self, subscription: ConfigurationSubscription) -> Result<SubscriptionId>;

    /// All subscriptions in the given space.
    fn find_by_space(&self, space_id: &str) -> Result<Vec<ConfigurationSubscription>>;

    /// Remove every subscription belonging to the given MTA in the given
    /// space, returning how many were removed.
    fn remove_for_mta(&self, mta_id: &str, space_id: &str) -> Result<usize>;
}

/// The `(mta, app, resource, space)` identity tuple subscriptions are unique
/// on.
type IdentityKey = (String, String, String, String);

fn identity_key(subscription: &ConfigurationSubscription) -> IdentityKey {
    (
        subscription.mta_id.clone(),
        subscription.app_name.clone(),
        subscription.resource.name.clone(),
        subscription.space_id.clone(),
    )
}

/// A concurrent in-memory [`SubscriptionStore`].
///
/// Uniqueness is enforced through an identity index claimed atomically via
/// the map's entry API, so concurrent `add`s with the same identity cannot
/// both succeed.
#[derive(Debug, Default)]
pub struct InMemorySubscriptionStore {
    subscriptions: DashMap<SubscriptionId, ConfigurationSubscription>,
    identities: DashMap<IdentityKey, SubscriptionId>,
}

impl InMemorySubscriptionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SubscriptionStore for InMemorySubscriptionStore {
    fn add(&self, subscription: ConfigurationSubscription) -> Result<SubscriptionId> {
        match self.identities.entry(identity_key(&subscription)) {
            Entry::Occupied(_) => Err(ResolveError::SubscriptionExists {
                mta_id: subscription.mta_id,
                app_name: subscription.app_name,
                resource_name: subscription.resource.name,
                space_id: subscription.space_id,
            }),
            Entry::Vacant(slot) => {
                let id = SubscriptionId(Uuid::new_v4());
                slot.insert(id);
                self.subscriptions.insert(id, subscription);
                Ok(id)
            }
        }
    }

    fn find_by_space(&self, space_id: &str) -> Result<Vec<ConfigurationSubscription>> {
        Ok(self
            .subscriptions
            .iter()
            .filter(|entry| entry.space_id == space_id)
            .map(|entry| entry.value().clone())
            .collect())
    }

    fn remove_for_mta(&self, mta_id: &str, space_id: &str) -> Result<usize> {
        let doomed: Vec<SubscriptionId> = self
            .subscriptions
            .iter()
            .filter(|entry| entry.mta_id == mta_id && entry.space_id == space_id)
            .map(|entry| *entry.key())
            .collect();
        for id in &doomed {
            if let Some((_, subscription)) = self.subscriptions.remove(id) {
                self.identities.remove(&identity_key(&subscription));
            }
        }
        Ok(doomed.len())
    }
}
