//! Plugin version values.
//!
//! A version is always three unsigned components rendered as
//! `major.minor.patch`. Ordering compares major, then minor, then patch.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Three-component plugin version.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Version {
            major,
            minor,
            patch,
        }
    }

    /// Parse a dotted `major.minor.patch` string.
    ///
    /// The text is split into at most three parts; anything after the second
    /// dot belongs to the patch component, so `1.2.3.4` is rejected.
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.splitn(3, '.').collect();
        if parts.len() < 3 {
            return Err(Error::invalid_version(s, "expected major.minor.patch"));
        }

        let mut components = [0u32; 3];
        for (slot, part) in components.iter_mut().zip(&parts) {
            *slot = parse_component(s, part)?;
        }

        Ok(Version::new(components[0], components[1], components[2]))
    }

    /// Whether this version is strictly older than `other`.
    pub fn less_than(&self, other: &Version) -> bool {
        self < other
    }
}

fn parse_component(input: &str, part: &str) -> Result<u32> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::invalid_version(
            input,
            format!("component {part:?} is not a base-10 integer"),
        ));
    }
    part.parse::<u32>().map_err(|e| {
        Error::invalid_version(input, format!("component {part:?} out of range: {e}"))
    })
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Version::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Version::parse(&s)
    }
}

impl From<Version> for String {
    fn from(v: Version) -> Self {
        v.to_string()
    }
}
