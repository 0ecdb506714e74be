//! Plugin runtime: drives a [`Plugin`] through one invocation.
//!
//! ```text
//! run() ──► mode?
//!             ├─ Meta   → version line + graph definitions JSON
//!             └─ Values → by declared type
//!                           ├─ metrics  → fetch, load state, emit lines, save state
//!                           ├─ checker  → check once, report status
//!                           └─ metadata → load state, fetch, print JSON, save if changed
//! ```
//!
//! Failures local to one metric (missing value, unusable rate) skip that
//! metric. Recently written state means another invocation just ran; the
//! metrics cycle then stops without output, while the metadata cycle still
//! prints but leaves the state file alone. Capability failures abort the
//! cycle before anything is printed.

use crate::capability::{CapabilityError, CheckStatus, Plugin};
use crate::exit_codes::ExitCode;
use crate::format::{emit_metric, expand_wildcard, PatternError};
use crate::graph::{has_wildcard, GraphDocument};
use crate::state::{StateError, StateStore};
use crate::values::ObservationSet;
use chrono::{DateTime, Utc};
use idpc_common::PluginType;
use idpc_config::RuntimeConfig;
use std::io::{self, Write};
use thiserror::Error;
use tracing::{debug, info};

/// Errors that abort a plugin run.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("{kind} capability failed: {source}")]
    Capability {
        kind: PluginType,
        #[source]
        source: CapabilityError,
    },

    #[error("plugin declares type {0} but provides no {0} capability")]
    CapabilityMissing(PluginType),

    #[error("graph definition error: {0}")]
    Pattern(#[from] PatternError),

    #[error("state file error: {0}")]
    State(#[from] StateError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RuntimeError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            RuntimeError::Capability { .. } => ExitCode::CapabilityError,
            RuntimeError::CapabilityMissing(_) | RuntimeError::Pattern(_) => ExitCode::ConfigError,
            RuntimeError::State(_) | RuntimeError::Io(_) => ExitCode::IoError,
            RuntimeError::Json(_) => ExitCode::InternalError,
        }
    }
}

/// Output mode for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Meta,
    Values,
}

/// How a successful run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Descriptor and graph definitions printed.
    MetaPrinted,
    /// Values or metadata printed.
    Emitted,
    /// State was written moments ago by another invocation; nothing printed.
    Skipped,
    /// Check ran and reported this status.
    Checked(CheckStatus),
}

impl Outcome {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Outcome::Checked(status) => ExitCode::from(*status),
            _ => ExitCode::Clean,
        }
    }
}

/// Runs one plugin invocation.
#[derive(Debug)]
pub struct Runtime {
    plugin: Plugin,
    config: RuntimeConfig,
    store: StateStore,
}

impl Runtime {
    pub fn new(plugin: Plugin, config: RuntimeConfig) -> Self {
        let store = match &config.state_file {
            Some(path) => StateStore::new(path),
            None => StateStore::for_plugin(&config.work_dir, plugin.meta(), &config.args),
        };
        Self {
            plugin,
            config,
            store,
        }
    }

    pub fn plugin(&self) -> &Plugin {
        &self.plugin
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Canonical version line of the plugin.
    pub fn version_line(&self) -> String {
        self.plugin.meta().canonical_line()
    }

    pub fn mode(&self) -> Mode {
        if self.config.meta_mode {
            Mode::Meta
        } else {
            Mode::Values
        }
    }

    /// Run at the current time.
    pub fn run<W: Write>(&self, out: &mut W) -> Result<Outcome, RuntimeError> {
        self.run_at(out, Utc::now())
    }

    /// Run as if invoked at `now`.
    pub fn run_at<W: Write>(&self, out: &mut W, now: DateTime<Utc>) -> Result<Outcome, RuntimeError> {
        match self.mode() {
            Mode::Meta => {
                self.output_meta(out)?;
                Ok(Outcome::MetaPrinted)
            }
            Mode::Values => self.output_values_at(out, now),
        }
    }

    /// Print the version line and, for metrics plugins, the graph document.
    pub fn output_meta<W: Write>(&self, out: &mut W) -> Result<(), RuntimeError> {
        let meta = self.plugin.meta();
        let mut text = meta.canonical_line();
        text.push('\n');
        if let Some(source) = self.plugin.metrics() {
            let doc = GraphDocument::for_plugin(&meta.key, &source.graph_definition());
            text.push_str(&serde_json::to_string(&doc)?);
        }
        writeln!(out, "{text}")?;
        out.flush()?;
        Ok(())
    }

    /// Produce values according to the declared plugin type.
    pub fn output_values_at<W: Write>(
        &self,
        out: &mut W,
        now: DateTime<Utc>,
    ) -> Result<Outcome, RuntimeError> {
        match self.plugin.meta().kind {
            PluginType::Metrics => self.output_metrics(out, now),
            PluginType::Checker => self.output_checker(out),
            PluginType::Metadata => self.output_metadata(out, now),
        }
    }

    fn output_metrics<W: Write>(
        &self,
        out: &mut W,
        now: DateTime<Utc>,
    ) -> Result<Outcome, RuntimeError> {
        let source = self
            .plugin
            .metrics()
            .ok_or(RuntimeError::CapabilityMissing(PluginType::Metrics))?;
        let values = source
            .fetch_metrics()
            .map_err(|source| RuntimeError::Capability {
                kind: PluginType::Metrics,
                source,
            })?;
        let mut current = ObservationSet::new(values, now);

        let previous = match self.store.load_guarded(now) {
            Ok(previous) => previous,
            Err(e) if e.is_stale_write() => {
                debug!(error = %e, "skipping output");
                return Ok(Outcome::Skipped);
            }
            Err(e) => {
                debug!(error = %e, "previous state ignored");
                ObservationSet::empty()
            }
        };

        let plugin_key = self.plugin.meta().key.as_str();
        let mut lines = Vec::new();
        for (key, graph) in &source.graph_definition() {
            for metric in &graph.metrics {
                if has_wildcard(key) || has_wildcard(&metric.name) {
                    let observed: Vec<String> = current.values.keys().cloned().collect();
                    for concrete in expand_wildcard(key, metric, &observed)? {
                        emit_metric(&mut lines, plugin_key, "", &concrete, &mut current, &previous)?;
                    }
                } else {
                    emit_metric(&mut lines, plugin_key, key, metric, &mut current, &previous)?;
                }
            }
        }

        out.write_all(&lines)?;
        out.flush()?;
        self.store.save(&current)?;
        Ok(Outcome::Emitted)
    }

    fn output_checker<W: Write>(&self, out: &mut W) -> Result<Outcome, RuntimeError> {
        let checker = self
            .plugin
            .checker()
            .ok_or(RuntimeError::CapabilityMissing(PluginType::Checker))?;
        let result = checker.check();
        info!(status = %result.status, message = %result.message, "check finished");
        if !result.message.is_empty() {
            writeln!(out, "{}", result.message)?;
            out.flush()?;
        }
        Ok(Outcome::Checked(result.status))
    }

    fn output_metadata<W: Write>(
        &self,
        out: &mut W,
        now: DateTime<Utc>,
    ) -> Result<Outcome, RuntimeError> {
        let source = self
            .plugin
            .metadata()
            .ok_or(RuntimeError::CapabilityMissing(PluginType::Metadata))?;

        let previous = match self.store.load_guarded(now) {
            Ok(previous) => Some(previous),
            Err(e) if e.is_stale_write() => {
                debug!(error = %e, "metadata will not be persisted");
                None
            }
            Err(e) => {
                debug!(error = %e, "previous state ignored");
                Some(ObservationSet::empty())
            }
        };

        let metadata = source
            .fetch_metadata()
            .map_err(|source| RuntimeError::Capability {
                kind: PluginType::Metadata,
                source,
            })?;

        serde_json::to_writer(&mut *out, &metadata)?;
        out.write_all(b"\n")?;
        out.flush()?;

        match previous {
            // State without an observation time has never been written.
            Some(previous) if !previous.is_timestamped() || previous.values != metadata => {
                self.store.save(&ObservationSet::new(metadata, now))?;
            }
            Some(_) => debug!("metadata unchanged"),
            None => {}
        }
        Ok(Outcome::Emitted)
    }
}
