use serde_json::json;

use crate::descriptor::{CloudTarget, DeploymentDescriptor};
use crate::entries::{ConfigurationEntry, InMemoryEntryStore};
use crate::resolver::{ReferenceResolver, ResolutionContext};

use super::*;

fn descriptor(yaml: &str) -> DeploymentDescriptor {
    serde_yaml::from_str(yaml).expect("valid descriptor fixture")
}

fn context() -> ResolutionContext {
    ResolutionContext::new(CloudTarget::new("acme", "dev"))
}

fn seeded_store() -> InMemoryEntryStore {
    let store = InMemoryEntryStore::new();
    store.publish(ConfigurationEntry::new(
        "mta",
        "team:db",
        Some(semver::Version::new(1, 2, 0)),
        CloudTarget::new("acme", "dev"),
        r#"{"url":"jdbc://db.internal:5432/shop"}"#,
    ));
    store
}

const SHOP: &str = r#"
_schema-version: "3.1"
ID: shop
version: 1.0.0
modules:
  - name: app
    type: application
    parameters:
      app-name: shop-frontend
    requires:
      - name: db
        parameters:
          managed: true
        properties:
          db-url: "~{url}"
resources:
  - name: db
    parameters:
      type: configuration
      provider-id: "team:db"
"#;

fn subscriptions_for(fixture: &str) -> Vec<ConfigurationSubscription> {
    let store = seeded_store();
    let resolved = ReferenceResolver::new(&store, context())
        .resolve(descriptor(fixture))
        .unwrap();
    SubscriptionFactory::new(&store, context())
        .create(descriptor(fixture), &resolved.resolved_references, "space-guid")
        .unwrap()
}

#[test]
fn managed_dependency_produces_one_subscription() {
    let subscriptions = subscriptions_for(SHOP);
    assert_eq!(subscriptions.len(), 1);

    let subscription = &subscriptions[0];
    assert_eq!(subscription.mta_id, "shop");
    assert_eq!(subscription.space_id, "space-guid");
    assert_eq!(subscription.app_name, "shop-frontend");
    assert_eq!(subscription.filter.provider_id.as_deref(), Some("team:db"));
    assert_eq!(subscription.resource.name, "db");
    // The resource snapshot predates any entry-content merge.
    assert!(subscription.resource.properties.is_empty());

    // The module keeps only the tracked dependency, with its reference still
    // in symbolic form.
    assert_eq!(subscription.module.required_dependencies.len(), 1);
    let dependency = &subscription.module.required_dependencies[0];
    assert_eq!(dependency.name, "db");
    assert_eq!(dependency.properties.get("db-url"), Some(&json!("~{url}")));
}

#[test]
fn unmanaged_dependency_produces_no_subscription() {
    let fixture = SHOP.replace("managed: true", "managed: false");
    assert!(subscriptions_for(&fixture).is_empty());
}

#[test]
fn app_name_falls_back_to_module_name() {
    let fixture = SHOP.replace("      app-name: shop-frontend\n", "");
    let subscriptions = subscriptions_for(&fixture);
    assert_eq!(subscriptions[0].app_name, "app");
}

#[test]
fn store_rejects_duplicate_identity() {
    let subscriptions = subscriptions_for(SHOP);
    let store = InMemorySubscriptionStore::new();
    store.add(subscriptions[0].clone()).unwrap();

    let err = store.add(subscriptions[0].clone()).unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(
        err.to_string(),
        "Configuration subscription for MTA \"shop\", application \"shop-frontend\" and \
         resource \"db\" already exists in space \"space-guid\""
    );
}

#[test]
fn concurrent_adds_with_the_same_identity_store_one_record() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    let subscriptions = subscriptions_for(SHOP);
    let store = InMemorySubscriptionStore::new();
    let successes = AtomicUsize::new(0);

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                if store.add(subscriptions[0].clone()).is_ok() {
                    successes.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
    });

    assert_eq!(successes.load(Ordering::SeqCst), 1);
    assert_eq!(store.find_by_space("space-guid").unwrap().len(), 1);
}

#[test]
fn removal_releases_the_identity_for_reuse() {
    let subscriptions = subscriptions_for(SHOP);
    let store = InMemorySubscriptionStore::new();
    store.add(subscriptions[0].clone()).unwrap();
    assert_eq!(store.remove_for_mta("shop", "space-guid").unwrap(), 1);

    // The identity is free again after removal.
    store.add(subscriptions[0].clone()).unwrap();
    assert_eq!(store.find_by_space("space-guid").unwrap().len(), 1);
}

#[test]
fn store_scopes_removal_to_mta_and_space() {
    let subscriptions = subscriptions_for(SHOP);
    let store = InMemorySubscriptionStore::new();
    store.add(subscriptions[0].clone()).unwrap();

    let mut other_space = subscriptions[0].clone();
    other_space.space_id = "other-space".to_string();
    store.add(other_space).unwrap();

    assert_eq!(store.remove_for_mta("shop", "space-guid").unwrap(), 1);
    assert_eq!(store.find_by_space("space-guid").unwrap().len(), 0);
    assert_eq!(store.find_by_space("other-space").unwrap().len(), 1);
}
