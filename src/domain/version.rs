use crate::error::{CoordinatorError, Result};
use std::fmt;

/// Semantic version triple, totally ordered by (major, minor, patch)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Version {
            major,
            minor,
            patch,
        }
    }

    /// Parse `MAJOR.MINOR.PATCH`, tolerating a leading `v`/`V`.
    ///
    /// Pre-release and build metadata are rejected: only plain releases take
    /// part in version ordering.
    pub fn parse(text: &str) -> Result<Self> {
        let clean = text.trim().trim_start_matches('v').trim_start_matches('V');

        let parsed = semver::Version::parse(clean).map_err(|e| {
            CoordinatorError::version(format!(
                "Invalid version format: '{}' - expected X.Y.Z ({})",
                text, e
            ))
        })?;

        if !parsed.pre.is_empty() || !parsed.build.is_empty() {
            return Err(CoordinatorError::version(format!(
                "Pre-release or build metadata not supported: '{}'",
                text
            )));
        }

        Ok(Version::new(parsed.major, parsed.minor, parsed.patch))
    }

    /// Bump version according to bump type.
    ///
    /// Fails instead of wrapping when the bumped component is at `u64::MAX`.
    pub fn bump(&self, bump_type: VersionBump) -> Result<Self> {
        let next = |component: u64| {
            component.checked_add(1).ok_or_else(|| {
                CoordinatorError::version(format!(
                    "Cannot apply {} bump to {}: component overflow",
                    bump_type, self
                ))
            })
        };
        Ok(match bump_type {
            VersionBump::Major => Version::new(next(self.major)?, 0, 0),
            VersionBump::Minor => Version::new(self.major, next(self.minor)?, 0),
            VersionBump::Patch => Version::new(self.major, self.minor, next(self.patch)?),
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Version bump magnitude, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum VersionBump {
    Patch,
    Minor,
    Major,
}

impl fmt::Display for VersionBump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VersionBump::Patch => "patch",
            VersionBump::Minor => "minor",
            VersionBump::Major => "major",
        };
        f.write_str(name)
    }
}
