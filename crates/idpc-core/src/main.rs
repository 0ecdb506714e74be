//! `idpc-plugin-json`: a plugin whose data comes from the command line.
//!
//! Serves as a reference for plugin authors and as a fixture for testing
//! the host agent against every plugin type.

use clap::{Parser, Subcommand};
use idpc_common::{Meta, PluginType, Version};
use idpc_config::RuntimeConfig;
use idpc_core::logging::init_logging;
use idpc_core::{
    CapabilityError, CheckResult, CheckStatus, Checker, ExitCode, GraphDefinition, GraphDefs,
    MetadataSource, MetricDefinition, MetricsSource, Plugin, Runtime, ValueMap,
};
use std::path::PathBuf;
use tracing::{debug, error};

/// Report a JSON payload as metrics or metadata, or a fixed check result.
#[derive(Parser, Debug)]
#[command(name = "idpc-plugin-json")]
struct Cli {
    /// Plugin key
    #[arg(long, default_value = "json")]
    name: String,

    /// Plugin type (metrics, metadata, checker)
    #[arg(long = "type", default_value = "metadata")]
    kind: PluginType,

    /// JSON object holding the metric values or metadata
    #[arg(long, default_value = "{}")]
    payload: String,

    /// Report every metric as a per-minute rate
    #[arg(long)]
    rate: bool,

    /// Check status (OK, WARNING, CRITICAL, UNKNOWN)
    #[arg(long, default_value = "OK")]
    status: String,

    /// Check message
    #[arg(long, default_value = "")]
    message: String,

    /// State file to use instead of the computed one
    #[arg(long, value_name = "PATH")]
    temp_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the version line and exit
    Version,
}

#[derive(Debug, Clone)]
struct JsonSource {
    payload: String,
    rate: bool,
}

impl JsonSource {
    fn values(&self) -> Result<ValueMap, CapabilityError> {
        serde_json::from_str(&self.payload)
            .map_err(|e| CapabilityError::with_source("payload is not a JSON object", e))
    }
}

impl MetricsSource for JsonSource {
    fn fetch_metrics(&self) -> Result<ValueMap, CapabilityError> {
        self.values()
    }

    fn graph_definition(&self) -> GraphDefs {
        let mut metric = MetricDefinition::new("*", "");
        if self.rate {
            metric = metric.with_rate();
        }
        let mut defs = GraphDefs::new();
        defs.insert(String::new(), GraphDefinition::new("", "", vec![metric]));
        defs
    }
}

impl MetadataSource for JsonSource {
    fn fetch_metadata(&self) -> Result<ValueMap, CapabilityError> {
        self.values()
    }
}

#[derive(Debug)]
struct FixedCheck(CheckResult);

impl Checker for FixedCheck {
    fn check(&self) -> CheckResult {
        self.0.clone()
    }
}

fn build_plugin(cli: &Cli) -> Result<Plugin, ExitCode> {
    let version: Version = env!("CARGO_PKG_VERSION").parse().map_err(|e| {
        error!(error = %e, "package version");
        ExitCode::InternalError
    })?;
    let meta = Meta::new(cli.name.clone(), cli.kind, version);
    let source = JsonSource {
        payload: cli.payload.clone(),
        rate: cli.rate,
    };

    let plugin = Plugin::new(meta);
    Ok(match cli.kind {
        PluginType::Metrics => plugin.with_metrics(source),
        PluginType::Metadata => plugin.with_metadata(source),
        PluginType::Checker => plugin.with_checker(FixedCheck(CheckResult::new(
            CheckStatus::parse(&cli.status),
            cli.message.clone(),
        ))),
    })
}

fn run(cli: Cli) -> ExitCode {
    let mut config = RuntimeConfig::from_env(std::env::args().skip(1).collect());
    if let Some(path) = &cli.temp_file {
        config = config.with_state_file(path);
    }
    init_logging(&config);

    let plugin = match build_plugin(&cli) {
        Ok(plugin) => plugin,
        Err(code) => return code,
    };
    let runtime = Runtime::new(plugin, config);

    if matches!(cli.command, Some(Commands::Version)) {
        println!("{}", runtime.version_line());
        return ExitCode::Clean;
    }

    debug!(state = %runtime.store().path().display(), mode = ?runtime.mode(), "running");
    let stdout = std::io::stdout();
    match runtime.run(&mut stdout.lock()) {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => {
            error!(error = %e, "plugin run failed");
            e.exit_code()
        }
    }
}

fn main() -> std::process::ExitCode {
    run(Cli::parse()).into()
}
