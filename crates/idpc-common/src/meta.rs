//! Plugin descriptors and the version-line protocol.
//!
//! Every plugin binary identifies itself with a single line:
//!
//! ```text
//! idpc-plugin-<key>-<type> version <major>.<minor>.<patch> (rev <revision>) [<os> <arch> <runtime>]
//! ```
//!
//! Host tooling runs `<plugin> version` and parses that line back with
//! [`parse_version_line`], so the shape is a wire contract.

use crate::error::Error;
use crate::version::Version;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Prefix shared by every plugin binary name, state file, and env variable.
pub const PLUGIN_PREFIX: &str = "idpc-plugin";

/// Revision reported when the build did not stamp one.
pub const UNTRACKED_REVISION: &str = "untracked";

/// Declared plugin type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginType {
    Checker,
    Metrics,
    Metadata,
}

impl PluginType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginType::Checker => "checker",
            PluginType::Metrics => "metrics",
            PluginType::Metadata => "metadata",
        }
    }
}

impl fmt::Display for PluginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PluginType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "checker" => Ok(PluginType::Checker),
            "metrics" => Ok(PluginType::Metrics),
            "metadata" => Ok(PluginType::Metadata),
            other => Err(Error::UnknownPluginType(other.to_string())),
        }
    }
}

/// Plugin identity record, built once per process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub key: String,
    #[serde(rename = "type")]
    pub kind: PluginType,
    pub version: Version,
    pub revision: String,
    pub os: String,
    pub arch: String,
    pub runtime_version: String,
}

impl Meta {
    /// Create a descriptor stamped with the current platform.
    pub fn new(key: impl Into<String>, kind: PluginType, version: Version) -> Self {
        Meta {
            key: key.into(),
            kind,
            version,
            revision: UNTRACKED_REVISION.to_string(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            runtime_version: runtime_version(),
        }
    }

    /// Set the build revision.
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = revision.into();
        self
    }

    /// Canonical invocation name: `idpc-plugin-<key>-<type>`.
    pub fn name(&self) -> String {
        format!("{}-{}-{}", PLUGIN_PREFIX, self.key, self.kind)
    }

    /// Canonical version line (see module docs).
    pub fn canonical_line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Meta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} version {} (rev {}) [{} {} {}]",
            self.name(),
            self.version,
            self.revision,
            self.os,
            self.arch,
            self.runtime_version
        )
    }
}

/// Compiler that built this binary, e.g. `rust1.80.0`.
pub fn runtime_version() -> String {
    env!("IDPC_RUSTC_VERSION").to_string()
}

static VERSION_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^\s*{}-(\w+)-(checker|metrics|metadata)\s+version\s+(\d{{1,3}}\.\d{{1,3}}\.\d{{1,3}})\s+\(rev\s+(\w+)\)\s+\[(\w+)\s+(\w+)\s+(.+)\]",
        regex::escape(PLUGIN_PREFIX)
    ))
    .expect("regex")
});

/// Parse the version line printed by a plugin binary.
///
/// Returns `None` for anything that does not match the canonical shape.
pub fn parse_version_line(s: &str) -> Option<Meta> {
    let caps = VERSION_LINE_RE.captures(s)?;
    let kind = caps[2].parse().ok()?;
    let version = Version::parse(&caps[3]).ok()?;
    Some(Meta {
        key: caps[1].to_string(),
        kind,
        version,
        revision: caps[4].to_string(),
        os: caps[5].to_string(),
        arch: caps[6].to_string(),
        runtime_version: caps[7].to_string(),
    })
}
