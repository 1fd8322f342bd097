//! Happy-path scenarios: a descriptor flows through resolution, subscription
//! creation, and content selection.

use serde_json::json;

use mta_resolver::content::{
    DeployedAfterValidator, DeploymentContext, ModulesContentCalculator, PlatformLookup,
    ResourcesContentCalculator,
};
use mta_resolver::descriptor::{CloudTarget, DeploymentDescriptor};
use mta_resolver::entries::{ConfigurationEntry, InMemoryEntryStore};
use mta_resolver::resolver::{ReferenceResolver, ResolutionContext};
use mta_resolver::schema::MatchPolicy;
use mta_resolver::subscription::{
    InMemorySubscriptionStore, SubscriptionFactory, SubscriptionStore,
};

const SHOP: &str = r#"
_schema-version: "3.1"
ID: com.acme.shop
version: 1.0.0
modules:
  - name: frontend
    type: application
    deployed-after: [backend]
    requires:
      - name: backend-api
        properties:
          url: "~{url}"
      - name: plugins
        parameters:
          managed: true
        properties:
          plugin-list: "~{list}"
  - name: backend
    type: application
    provides:
      - name: backend-api
        properties:
          url: "https://backend.internal"
resources:
  - name: plugins
    parameters:
      type: configuration
      provider-id: "com.acme.svc"
      version: "^1.0.0"
  - name: shop-db
    parameters:
      type: org.cloudfoundry.managed-service
"#;

fn descriptor() -> DeploymentDescriptor {
    serde_yaml::from_str(SHOP).expect("valid descriptor fixture")
}

fn context() -> ResolutionContext {
    ResolutionContext::new(CloudTarget::new("org1", "space1"))
}

fn seeded_store() -> InMemoryEntryStore {
    let store = InMemoryEntryStore::new();
    store.publish(ConfigurationEntry::new(
        "mta",
        "com.acme.svc",
        Some(semver::Version::new(1, 0, 0)),
        CloudTarget::new("org1", "space1"),
        r#"{"list":"analytics,search"}"#,
    ));
    store
}

struct EmptyPlatform;

impl PlatformLookup for EmptyPlatform {
    fn application_exists(&self, _name: &str) -> anyhow::Result<bool> {
        Ok(false)
    }
}

#[test]
fn full_deployment_flow() {
    crate::support::init_tracing();
    let store = seeded_store();
    let resolved = ReferenceResolver::new(&store, context())
        .resolve(descriptor())
        .unwrap();

    // Structural references resolved one hop deep, configuration content
    // merged into the declaring resource.
    let frontend = resolved.descriptor.module("frontend").unwrap();
    assert_eq!(
        frontend.required_dependencies[0].properties.get("url"),
        Some(&json!("https://backend.internal"))
    );
    assert_eq!(
        frontend.required_dependencies[1].properties.get("plugin-list"),
        Some(&json!("analytics,search"))
    );

    // The managed dependency becomes exactly one subscription; its module
    // keeps the reference symbolic for later re-resolution.
    let subscriptions = SubscriptionFactory::new(&store, context())
        .create(descriptor(), &resolved.resolved_references, "space-guid-1")
        .unwrap();
    assert_eq!(subscriptions.len(), 1);
    assert_eq!(subscriptions[0].mta_id, "com.acme.shop");
    assert_eq!(subscriptions[0].app_name, "frontend");
    assert_eq!(subscriptions[0].resource.name, "plugins");
    assert_eq!(
        subscriptions[0].module.required_dependencies[0].properties.get("plugin-list"),
        Some(&json!("~{list}"))
    );

    let subscription_store = InMemorySubscriptionStore::new();
    subscription_store.add(subscriptions[0].clone()).unwrap();
    let duplicate = subscription_store.add(subscriptions[0].clone()).unwrap_err();
    assert!(duplicate.is_conflict());

    // Content selection: both modules are in the archive; only the service
    // resource is created.
    let deployment = DeploymentContext::new(["frontend", "backend"]);
    let modules = ModulesContentCalculator::new(&deployment)
        .select(&resolved.descriptor)
        .unwrap();
    let module_names: Vec<&str> = modules.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(module_names, vec!["frontend", "backend"]);

    let resources = ResourcesContentCalculator::new(&deployment).select(&resolved.descriptor);
    let resource_names: Vec<&str> = resources.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(resource_names, vec!["shop-db"]);

    // frontend's deployed-after names backend, which is selected.
    DeployedAfterValidator::new(&EmptyPlatform)
        .validate(&modules, &resolved.descriptor.capabilities())
        .unwrap();
}

#[test]
fn fan_out_produces_indexed_resources() {
    crate::support::init_tracing();
    let store = seeded_store();
    store.publish(ConfigurationEntry::new(
        "mta",
        "com.acme.svc",
        Some(semver::Version::new(1, 1, 0)),
        CloudTarget::new("org1", "space1"),
        r#"{"list":"payments"}"#,
    ));

    let resolved = ReferenceResolver::new(&store, context())
        .with_match_policy(MatchPolicy::FanOut)
        .resolve(descriptor())
        .unwrap();

    let names: Vec<&str> = resolved
        .descriptor
        .resources
        .iter()
        .map(|r| r.name.as_str())
        .collect();
    assert_eq!(names, vec!["plugins-1", "plugins-2", "shop-db"]);

    let frontend = resolved.descriptor.module("frontend").unwrap();
    let dependency_names: Vec<&str> = frontend
        .required_dependencies
        .iter()
        .map(|d| d.name.as_str())
        .collect();
    assert_eq!(dependency_names, vec!["backend-api", "plugins-1", "plugins-2"]);

    // The expanded resources carry no filter anymore; a second pass over the
    // result must not expand them again.
    let again = ReferenceResolver::new(&store, context())
        .with_match_policy(MatchPolicy::FanOut)
        .resolve(resolved.descriptor.clone())
        .unwrap();
    let names: Vec<&str> = again
        .descriptor
        .resources
        .iter()
        .map(|r| r.name.as_str())
        .collect();
    assert_eq!(names, vec!["plugins-1", "plugins-2", "shop-db"]);
    assert_eq!(again.descriptor, resolved.descriptor);
}

#[test]
fn re_resolving_a_resolved_descriptor_is_idempotent() {
    crate::support::init_tracing();
    let store = seeded_store();
    let resolver = ReferenceResolver::new(&store, context());
    let once = resolver.resolve(descriptor()).unwrap();
    let twice = resolver.resolve(once.descriptor.clone()).unwrap();
    assert_eq!(once.descriptor, twice.descriptor);
    assert!(twice.dynamic_parameters.is_empty());
}
