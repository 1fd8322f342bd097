//! MTA deployment-descriptor resolution.
//!
//! A multi-target application (MTA) is a bundle of modules and resources
//! described by a deployment descriptor. Before the bundle can be deployed,
//! the descriptor's cross-references have to be resolved: configuration
//! references matched against previously published entries, placeholder
//! expressions substituted with the values they point at, and the set of
//! modules and resources that actually take part in the deployment computed.
//! This crate owns that resolution core; uploading archives, talking to the
//! platform, and orchestrating deployments belong to the surrounding layer.
//!
//! # Resolution Pipeline
//!
//! 1. A [`filter::FilterParser`] reads each resource's parameters and, for
//!    configuration references, produces a [`filter::ConfigurationFilter`].
//! 2. An [`entries::EntryMatcher`] evaluates the filter against the entry
//!    store, applying version, namespace, content, and visibility
//!    constraints under the descriptor's multiple-match policy.
//! 3. A [`resolver::ReferenceResolver`] merges matched content into the
//!    descriptor and substitutes every structural `~{...}` placeholder,
//!    collecting dynamic `{ds/...}` ones for deployment-time resolution.
//! 4. A [`subscription::SubscriptionFactory`] derives the durable
//!    subscription records that keep managed references up to date.
//! 5. The [`content`] calculators decide which modules and resources of the
//!    resolved descriptor are actually deployed.
//!
//! # Core Modules
//!
//! - [`core`] - Error types shared across the crate
//! - [`schema`] - Schema versions and the capability flags derived from them
//! - [`descriptor`] - The deployment-descriptor data model
//! - [`filter`] - Configuration-reference filter parsing
//! - [`entries`] - Configuration-entry store access and matching
//! - [`resolver`] - Reference resolution and placeholder substitution
//! - [`subscription`] - Configuration-subscription records and persistence
//! - [`content`] - Module and resource selection for deployment

// Core functionality modules
pub mod core;
pub mod descriptor;
pub mod schema;

// Resolution pipeline
pub mod entries;
pub mod filter;
pub mod resolver;

// Deployment outputs
pub mod content;
pub mod subscription;

pub use crate::core::{ResolveError, Result};
