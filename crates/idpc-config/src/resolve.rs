//! Configuration resolution (env → defaults).
//!
//! The runtime never reads the environment itself; the binary resolves a
//! [`RuntimeConfig`] once and hands it to the harness.

use crate::{DEBUG_SUFFIX, LOG_FORMAT_SUFFIX, META_SUFFIX, WORKDIR_SUFFIX};
use idpc_common::PLUGIN_PREFIX;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Errors from configuration parsing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown log format {0:?} (expected \"text\" or \"json\")")]
    UnknownLogFormat(String),
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(ConfigError::UnknownLogFormat(s.to_string())),
        }
    }
}

/// Settings the plugin runtime needs for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Plugin prefix used for file and variable names.
    pub prefix: String,

    /// Directory holding state files.
    pub work_dir: PathBuf,

    /// Print the descriptor and graph definitions instead of values.
    pub meta_mode: bool,

    /// Enable debug logging.
    pub debug: bool,

    /// Log output format.
    pub log_format: LogFormat,

    /// Invocation arguments without the program name.
    pub args: Vec<String>,

    /// Explicit state file, replacing the computed cache path.
    pub state_file: Option<PathBuf>,

    /// Problems found while resolving, reported once logging is up.
    pub warnings: Vec<String>,
}

impl RuntimeConfig {
    /// Config with defaults and the given work directory.
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            prefix: PLUGIN_PREFIX.to_string(),
            work_dir: work_dir.into(),
            meta_mode: false,
            debug: false,
            log_format: LogFormat::Text,
            args: Vec::new(),
            state_file: None,
            warnings: Vec::new(),
        }
    }

    /// Resolve from the process environment.
    pub fn from_env(args: Vec<String>) -> Self {
        resolve_config(PLUGIN_PREFIX, args, |name| std::env::var(name).ok())
    }

    /// Set the invocation arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Switch to meta output mode.
    pub fn with_meta_mode(mut self, meta_mode: bool) -> Self {
        self.meta_mode = meta_mode;
        self
    }

    /// Use an explicit state file.
    pub fn with_state_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_file = Some(path.into());
        self
    }

    /// Name of the environment variable `<PREFIX>_<suffix>` for this config.
    pub fn env_var(&self, suffix: &str) -> String {
        env_var_name(&self.prefix, suffix)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new(default_work_dir())
    }
}

/// `idpc-plugin` + `WORKDIR` → `IDPC_PLUGIN_WORKDIR`.
pub fn env_var_name(prefix: &str, suffix: &str) -> String {
    format!("{}_{}", prefix.to_uppercase().replace('-', "_"), suffix)
}

/// Default state directory: the system temp dir.
pub fn default_work_dir() -> PathBuf {
    std::env::temp_dir()
}

/// Resolve a config for `prefix` using `lookup` to read variables.
///
/// Empty values count as unset.
pub fn resolve_config<F>(prefix: &str, args: Vec<String>, lookup: F) -> RuntimeConfig
where
    F: Fn(&str) -> Option<String>,
{
    let get = |suffix: &str| lookup(&env_var_name(prefix, suffix)).filter(|v| !v.is_empty());

    let mut warnings = Vec::new();
    let log_format = match get(LOG_FORMAT_SUFFIX).map(|v| v.parse::<LogFormat>()) {
        Some(Ok(format)) => format,
        Some(Err(e)) => {
            warnings.push(e.to_string());
            LogFormat::Text
        }
        None => LogFormat::Text,
    };

    RuntimeConfig {
        prefix: prefix.to_string(),
        work_dir: get(WORKDIR_SUFFIX)
            .map(PathBuf::from)
            .unwrap_or_else(default_work_dir),
        meta_mode: get(META_SUFFIX).is_some(),
        debug: get(DEBUG_SUFFIX).is_some(),
        log_format,
        args,
        state_file: None,
        warnings,
    }
}
