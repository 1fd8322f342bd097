//! Deployment content selection.
//!
//! After a descriptor is resolved, the orchestration layer needs to know
//! which of its modules and resources actually take part in the deployment:
//! modules missing from the uploaded archive, non-service resources, and
//! entities outside a caller-supplied allow-list are filtered out. The
//! calculators here own those rules, and [`DeployedAfterValidator`] checks
//! declared ordering constraints against the target platform.

use std::collections::HashSet;

pub mod deployed_after;
pub mod modules;
pub mod resources;

pub use deployed_after::{DeployedAfterValidator, PlatformLookup};
pub use modules::ModulesContentCalculator;
pub use resources::ResourcesContentCalculator;

/// What the surrounding deployment operation knows about its inputs: which
/// module names the uploaded archive carries, which are already deployed, and
/// any caller-supplied selection restrictions.
#[derive(Debug, Default, Clone)]
pub struct DeploymentContext {
    /// Module names found in the uploaded archive
    pub archive_modules: HashSet<String>,
    /// Module names already deployed from a previous operation
    pub deployed_modules: HashSet<String>,
    /// When set, only these modules may be selected
    pub modules_allow_list: Option<HashSet<String>>,
    /// When set, only these resources may be selected
    pub resources_allow_list: Option<HashSet<String>>,
}

impl DeploymentContext {
    /// Create a context for an archive carrying the given module names.
    pub fn new(archive_modules: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            archive_modules: archive_modules.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Record the modules already deployed by a previous operation.
    #[must_use]
    pub fn with_deployed_modules(
        mut self,
        deployed: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.deployed_modules = deployed.into_iter().map(Into::into).collect();
        self
    }

    /// Restrict module selection to the given names.
    #[must_use]
    pub fn with_modules_allow_list(
        mut self,
        allowed: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.modules_allow_list = Some(allowed.into_iter().map(Into::into).collect());
        self
    }

    /// Restrict resource selection to the given names.
    #[must_use]
    pub fn with_resources_allow_list(
        mut self,
        allowed: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.resources_allow_list = Some(allowed.into_iter().map(Into::into).collect());
        self
    }
}
