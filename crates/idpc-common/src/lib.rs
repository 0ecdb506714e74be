//! IDPC plugin common types and errors.
//!
//! This crate provides the identity types shared by the plugin runtime and
//! the tooling that inspects plugin binaries:
//! - Dotted-decimal plugin versions
//! - Plugin descriptors and their canonical version line
//! - Parsing of version lines printed by plugin binaries
//! - Common error types

pub mod error;
pub mod meta;
pub mod version;

pub use error::{Error, Result};
pub use meta::{parse_version_line, Meta, PluginType, PLUGIN_PREFIX};
pub use version::Version;
