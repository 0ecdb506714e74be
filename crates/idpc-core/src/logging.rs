//! Logging bootstrap.
//!
//! Diagnostics go to stderr; stdout carries only protocol output. Plugins
//! stay quiet (errors only) unless the debug variable or `RUST_LOG` is set.

use idpc_config::{LogFormat, RuntimeConfig};
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Filter directive used when `RUST_LOG` is unset.
pub fn default_directive(debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        "error"
    }
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init_logging(config: &RuntimeConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config.debug)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let installed = match config.log_format {
        LogFormat::Json => builder.json().try_init().is_ok(),
        LogFormat::Text => builder.try_init().is_ok(),
    };

    if installed {
        for message in &config.warnings {
            warn!(%message, "configuration");
        }
    }
}
