//! MTA schema versions and the behavior they enable.
//!
//! The original system modeled every schema major/minor version as its own
//! resolver subclass. Here a single pipeline is parameterized by
//! [`SchemaCapabilities`], a small flag set derived from the descriptor's
//! declared schema version. Callers that need to deviate from the derived
//! defaults (for example to force a singular match policy on a schema 3
//! descriptor) set the relevant knob explicitly instead of subclassing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::ResolveError;

/// Schema major version at which resource activity flags, fan-out matching
/// and deployed-after validation become available.
const CAPABILITY_BASELINE_MAJOR: u32 = 3;

/// The declared `_schema-version` of a deployment descriptor.
///
/// Only the major and minor components carry meaning; a trailing patch
/// component (`"3.1.0"`) is accepted and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SchemaVersion {
    /// Major schema version
    pub major: u32,
    /// Minor schema version, zero when not declared
    pub minor: u32,
}

impl SchemaVersion {
    /// Create a schema version from explicit components.
    #[must_use]
    pub const fn new(major: u32, minor: u32) -> Self {
        Self {
            major,
            minor,
        }
    }
}

impl FromStr for SchemaVersion {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('.');
        let parse = |part: Option<&str>| -> Option<u32> { part.map(|p| p.parse().ok()).flatten() };

        let major = parse(parts.next()).ok_or_else(|| ResolveError::RequiredPropertyMissing {
            property: "_schema-version".to_string(),
        })?;
        let minor = match parts.next() {
            Some(part) => part.parse().map_err(|_| ResolveError::RequiredPropertyMissing {
                property: "_schema-version".to_string(),
            })?,
            None => 0,
        };
        Ok(Self {
            major,
            minor,
        })
    }
}

impl TryFrom<String> for SchemaVersion {
    type Error = ResolveError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SchemaVersion> for String {
    fn from(version: SchemaVersion) -> Self {
        version.to_string()
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Policy for a configuration filter that matches more than one entry.
///
/// The original system is inconsistent here: legacy resolvers throw, later
/// ones expand the declaring resource into indexed copies. The policy is an
/// explicit matcher configuration; [`SchemaCapabilities::default_match_policy`]
/// supplies the schema-derived default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPolicy {
    /// More than one match is an error.
    Singular,
    /// N matches expand the declaring resource into N indexed resources.
    FanOut,
}

/// The schema-version-gated behaviors of the resolution pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaCapabilities {
    /// Whether resources honor an explicit `active` flag. Below the baseline
    /// every resource is considered active.
    pub resource_activity_flags: bool,
    /// Whether a multi-entry filter match fans out into indexed resources
    /// instead of erroring.
    pub fan_out_matching: bool,
    /// Whether the `deployed-after` lists of selected modules are validated
    /// against the target platform.
    pub deployed_after_validation: bool,
}

impl SchemaCapabilities {
    /// Derive the capability set for a declared schema version.
    #[must_use]
    pub const fn for_version(version: SchemaVersion) -> Self {
        let baseline = version.major >= CAPABILITY_BASELINE_MAJOR;
        Self {
            resource_activity_flags: baseline,
            fan_out_matching: baseline,
            deployed_after_validation: baseline,
        }
    }

    /// The match policy implied by this capability set.
    #[must_use]
    pub const fn default_match_policy(&self) -> MatchPolicy {
        if self.fan_out_matching {
            MatchPolicy::FanOut
        } else {
            MatchPolicy::Singular
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_major_only() {
        let version: SchemaVersion = "3".parse().unwrap();
        assert_eq!(version, SchemaVersion::new(3, 0));
    }

    #[test]
    fn parses_major_minor() {
        let version: SchemaVersion = "2.1".parse().unwrap();
        assert_eq!(version, SchemaVersion::new(2, 1));
    }

    #[test]
    fn ignores_patch_component() {
        let version: SchemaVersion = "3.1.0".parse().unwrap();
        assert_eq!(version, SchemaVersion::new(3, 1));
    }

    #[test]
    fn rejects_garbage() {
        assert!("not-a-version".parse::<SchemaVersion>().is_err());
        assert!("".parse::<SchemaVersion>().is_err());
    }

    #[test]
    fn capabilities_below_baseline() {
        let caps = SchemaCapabilities::for_version(SchemaVersion::new(2, 1));
        assert!(!caps.resource_activity_flags);
        assert!(!caps.fan_out_matching);
        assert!(!caps.deployed_after_validation);
        assert_eq!(caps.default_match_policy(), MatchPolicy::Singular);
    }

    #[test]
    fn capabilities_at_baseline() {
        let caps = SchemaCapabilities::for_version(SchemaVersion::new(3, 0));
        assert!(caps.resource_activity_flags);
        assert!(caps.fan_out_matching);
        assert!(caps.deployed_after_validation);
        assert_eq!(caps.default_match_policy(), MatchPolicy::FanOut);
    }

    #[test]
    fn serde_round_trip() {
        let version: SchemaVersion = serde_yaml::from_str("\"3.1\"").unwrap();
        assert_eq!(version, SchemaVersion::new(3, 1));
        assert_eq!(serde_json::to_string(&version).unwrap(), "\"3.1\"");
    }
}
