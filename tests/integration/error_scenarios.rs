//! Content-error propagation, with the exact messages callers match on.

use mta_resolver::ResolveError;
use mta_resolver::descriptor::{CloudTarget, DeploymentDescriptor};
use mta_resolver::entries::{ConfigurationEntry, InMemoryEntryStore};
use mta_resolver::resolver::{ReferenceResolver, ResolutionContext};
use mta_resolver::schema::MatchPolicy;

fn descriptor(yaml: &str) -> DeploymentDescriptor {
    serde_yaml::from_str(yaml).expect("valid descriptor fixture")
}

fn context() -> ResolutionContext {
    ResolutionContext::new(CloudTarget::new("org1", "space1"))
}

const CONSUMER: &str = r#"
_schema-version: "3.1"
ID: consumer
version: 1.0.0
resources:
  - name: X
    parameters:
      type: configuration
      provider-id: "com.acme.svc"
      version: "^1.0.0"
"#;

fn entry(version: semver::Version) -> ConfigurationEntry {
    ConfigurationEntry::new(
        "mta",
        "com.acme.svc",
        Some(version),
        CloudTarget::new("org1", "space1"),
        r#"{"key":"value"}"#,
    )
}

#[test]
fn zero_matches_is_a_content_error_with_a_verbatim_message() {
    crate::support::init_tracing();
    let store = InMemoryEntryStore::new();
    let err = ReferenceResolver::new(&store, context())
        .resolve(descriptor(CONSUMER))
        .unwrap_err();
    assert!(err.is_content_error());
    assert_eq!(
        err.to_string(),
        "No configuration entries were found matching the filter specified in resource \"X\""
    );
}

#[test]
fn many_matches_under_singular_policy() {
    crate::support::init_tracing();
    let store = InMemoryEntryStore::new();
    store.publish(entry(semver::Version::new(1, 0, 0)));
    store.publish(entry(semver::Version::new(1, 2, 0)));

    let err = ReferenceResolver::new(&store, context())
        .with_match_policy(MatchPolicy::Singular)
        .resolve(descriptor(CONSUMER))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Multiple configuration entries were found matching the filter specified in resource \"X\""
    );
}

#[test]
fn missing_referenced_property() {
    crate::support::init_tracing();
    let fixture = r#"
_schema-version: "3.1"
ID: consumer
version: 1.0.0
modules:
  - name: app
    type: application
    requires:
      - name: provider
        properties:
          token: "~{provider/missing}"
  - name: provider
    type: application
    properties:
      present: true
"#;
    let store = InMemoryEntryStore::new();
    let err = ReferenceResolver::new(&store, context())
        .resolve(descriptor(fixture))
        .unwrap_err();
    assert_eq!(err.to_string(), "Could not find required property \"missing\"");
}

#[test]
fn dangling_dependency_names_are_reported_together() {
    crate::support::init_tracing();
    let fixture = r#"
_schema-version: "3.1"
ID: consumer
version: 1.0.0
modules:
  - name: app
    type: application
    requires:
      - name: db
      - name: cache
"#;
    let store = InMemoryEntryStore::new();
    let err = ReferenceResolver::new(&store, context())
        .resolve(descriptor(fixture))
        .unwrap_err();
    assert!(matches!(
        &err,
        ResolveError::UnresolvedModuleDependencies { names } if names.len() == 2
    ));
    assert_eq!(err.to_string(), "Unresolved module dependencies: \"db\", \"cache\"");
}

#[test]
fn unparseable_entry_content_is_a_non_match_not_an_abort() {
    crate::support::init_tracing();
    let store = InMemoryEntryStore::new();
    let mut broken = entry(semver::Version::new(1, 0, 0));
    broken.content = "{not json".to_string();
    store.publish(broken);
    store.publish(entry(semver::Version::new(1, 1, 0)));

    // A content constraint makes the broken entry a non-match; the valid
    // entry still resolves the reference.
    let fixture = CONSUMER.replace(
        "      version: \"^1.0.0\"\n",
        "      version: \"^1.0.0\"\n      filter:\n        key: value\n",
    );
    let resolved = ReferenceResolver::new(&store, context())
        .with_match_policy(MatchPolicy::Singular)
        .resolve(descriptor(&fixture))
        .unwrap();
    assert_eq!(
        resolved.descriptor.resources[0].properties.get("key"),
        Some(&serde_json::json!("value"))
    );
}
