//! IDPC plugin runtime configuration.
//!
//! This crate provides:
//! - Environment variable naming derived from the plugin prefix
//! - A typed [`RuntimeConfig`] resolved once at startup
//! - Log format selection for the logging bootstrap

pub mod resolve;

pub use resolve::{
    default_work_dir, env_var_name, resolve_config, ConfigError, LogFormat, RuntimeConfig,
};

/// Suffix of the work-directory override variable.
pub const WORKDIR_SUFFIX: &str = "WORKDIR";

/// Suffix of the meta-mode trigger variable.
pub const META_SUFFIX: &str = "META";

/// Suffix of the debug logging variable.
pub const DEBUG_SUFFIX: &str = "DEBUG";

/// Suffix of the log format variable.
pub const LOG_FORMAT_SUFFIX: &str = "LOG_FORMAT";
