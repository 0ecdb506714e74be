//! Plugin capabilities: the data sources the runtime drives.
//!
//! A plugin declares one identity ([`Meta`]) and provides any subset of
//! three capabilities:
//!
//! - **Metrics**: raw values plus the graph definitions describing them.
//! - **Checker**: a single health check with status and message.
//! - **Metadata**: an arbitrary JSON object describing the host or service.
//!
//! Capabilities are attached once when the [`Plugin`] is built; the runtime
//! dispatches on the declared type and never probes for them again.

use crate::graph::GraphDefs;
use crate::values::ValueMap;
use idpc_common::{Meta, PluginType};
use std::fmt;
use thiserror::Error;

/// Failure reported by a plugin's own data source.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct CapabilityError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl CapabilityError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<std::io::Error> for CapabilityError {
    fn from(err: std::io::Error) -> Self {
        CapabilityError::with_source("I/O error", err)
    }
}

/// Produces raw metric values.
pub trait MetricsSource {
    /// Fetch the current raw values.
    fn fetch_metrics(&self) -> Result<ValueMap, CapabilityError>;

    /// Graphs and metrics reported by this plugin, keyed by graph id.
    fn graph_definition(&self) -> GraphDefs;
}

/// Health check outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Ok => "OK",
            CheckStatus::Warning => "WARNING",
            CheckStatus::Critical => "CRITICAL",
            CheckStatus::Unknown => "UNKNOWN",
        }
    }

    /// Lenient parse; anything unrecognised is `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "OK" => CheckStatus::Ok,
            "WARNING" | "WARN" => CheckStatus::Warning,
            "CRITICAL" | "CRIT" => CheckStatus::Critical,
            _ => CheckStatus::Unknown,
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one health check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub status: CheckStatus,
    pub message: String,
}

impl CheckResult {
    pub fn new(status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// Runs a health check.
pub trait Checker {
    fn check(&self) -> CheckResult;
}

/// Produces host or service metadata.
pub trait MetadataSource {
    fn fetch_metadata(&self) -> Result<ValueMap, CapabilityError>;
}

/// A plugin identity together with the capabilities it provides.
pub struct Plugin {
    meta: Meta,
    metrics: Option<Box<dyn MetricsSource>>,
    checker: Option<Box<dyn Checker>>,
    metadata: Option<Box<dyn MetadataSource>>,
}

impl Plugin {
    pub fn new(meta: Meta) -> Self {
        Self {
            meta,
            metrics: None,
            checker: None,
            metadata: None,
        }
    }

    pub fn with_metrics(mut self, source: impl MetricsSource + 'static) -> Self {
        self.metrics = Some(Box::new(source));
        self
    }

    pub fn with_checker(mut self, checker: impl Checker + 'static) -> Self {
        self.checker = Some(Box::new(checker));
        self
    }

    pub fn with_metadata(mut self, source: impl MetadataSource + 'static) -> Self {
        self.metadata = Some(Box::new(source));
        self
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn metrics(&self) -> Option<&dyn MetricsSource> {
        self.metrics.as_deref()
    }

    pub fn checker(&self) -> Option<&dyn Checker> {
        self.checker.as_deref()
    }

    pub fn metadata(&self) -> Option<&dyn MetadataSource> {
        self.metadata.as_deref()
    }

    /// Whether the capability matching `kind` is attached.
    pub fn provides(&self, kind: PluginType) -> bool {
        match kind {
            PluginType::Metrics => self.metrics.is_some(),
            PluginType::Checker => self.checker.is_some(),
            PluginType::Metadata => self.metadata.is_some(),
        }
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("meta", &self.meta)
            .field("metrics", &self.metrics.is_some())
            .field("checker", &self.checker.is_some())
            .field("metadata", &self.metadata.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idpc_common::Version;
    use std::error::Error as _;

    struct Healthy;

    impl Checker for Healthy {
        fn check(&self) -> CheckResult {
            CheckResult::new(CheckStatus::Ok, "all good")
        }
    }

    #[test]
    fn test_plugin_capabilities() {
        let meta = Meta::new("ping", PluginType::Checker, Version::new(1, 0, 0));
        let plugin = Plugin::new(meta).with_checker(Healthy);
        assert!(plugin.provides(PluginType::Checker));
        assert!(!plugin.provides(PluginType::Metrics));
        assert!(plugin.metrics().is_none());
        let result = plugin.checker().map(|c| c.check()).unwrap();
        assert_eq!(result.status, CheckStatus::Ok);
    }

    #[test]
    fn test_check_status_parse() {
        assert_eq!(CheckStatus::parse("ok"), CheckStatus::Ok);
        assert_eq!(CheckStatus::parse("Warning"), CheckStatus::Warning);
        assert_eq!(CheckStatus::parse("CRIT"), CheckStatus::Critical);
        assert_eq!(CheckStatus::parse("bogus"), CheckStatus::Unknown);
    }

    #[test]
    fn test_capability_error_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = CapabilityError::from(io);
        assert_eq!(err.to_string(), "I/O error");
        assert!(err.source().is_some());
        assert!(CapabilityError::new("boom").source().is_none());
    }
}
