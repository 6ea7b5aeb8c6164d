//! Module versions.
//!
//! `major.minor.micro` with an optional qualifier. The ordering is total:
//! numeric segments compare numerically, qualifiers compare lexically, and a
//! missing qualifier sorts before any present one.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A module version.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub micro: u32,
    pub qualifier: Option<String>,
}

impl Version {
    pub fn new(major: u32, minor: u32, micro: u32) -> Self {
        Self {
            major,
            minor,
            micro,
            qualifier: None,
        }
    }

    pub fn with_qualifier(mut self, qualifier: &str) -> Self {
        self.qualifier = Some(qualifier.to_string());
        self
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)?;
        if let Some(q) = &self.qualifier {
            write!(f, ".{}", q)?;
        }
        Ok(())
    }
}

/// Error parsing a version string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseVersionError {
    input: String,
}

impl fmt::Display for ParseVersionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid version string '{}'", self.input)
    }
}

impl std::error::Error for ParseVersionError {}

impl FromStr for Version {
    type Err = ParseVersionError;

    /// Parses `major[.minor[.micro[.qualifier]]]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseVersionError {
            input: s.to_string(),
        };
        let mut parts = s.splitn(4, '.');
        let major = parts.next().ok_or_else(err)?;
        let mut version = Version::new(major.parse().map_err(|_| err())?, 0, 0);
        if let Some(minor) = parts.next() {
            version.minor = minor.parse().map_err(|_| err())?;
        }
        if let Some(micro) = parts.next() {
            version.micro = micro.parse().map_err(|_| err())?;
        }
        if let Some(qualifier) = parts.next() {
            if qualifier.is_empty() {
                return Err(err());
            }
            version.qualifier = Some(qualifier.to_string());
        }
        Ok(version)
    }
}
