//! Semantic versions for availability checks.

use std::fmt;
use std::str::FromStr;

/// `major.minor.patch`, compared lexicographically.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const ZERO: Version = Version::new(0, 0, 0);

    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Version {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Error parsing a [`Version`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum VersionParseError {
    #[error("empty version string")]
    Empty,
    #[error("version has {0} components, at most 3 allowed")]
    TooManyComponents(usize),
    #[error("invalid version component `{0}`")]
    InvalidComponent(String),
}

impl FromStr for Version {
    type Err = VersionParseError;

    /// Parse `1`, `1.2` or `1.2.3`; missing components are zero.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(VersionParseError::Empty);
        }
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() > 3 {
            return Err(VersionParseError::TooManyComponents(parts.len()));
        }
        let mut components = [0u32; 3];
        for (slot, part) in components.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| VersionParseError::InvalidComponent((*part).to_owned()))?;
        }
        let [major, minor, patch] = components;
        Ok(Version::new(major, minor, patch))
    }
}
