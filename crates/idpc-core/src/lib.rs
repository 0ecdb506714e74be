//! IDPC plugin runtime.
//!
//! A plugin supplies its identity and data sources; this crate does the rest:
//! - Previous-observation state files with a one-second write guard
//! - Per-minute rates for counters, including wraparound handling
//! - Wildcard metric expansion against observed keys
//! - The tab-separated value protocol and the meta document
//! - Exit codes and logging bootstrap for plugin binaries

pub mod capability;
pub mod exit_codes;
pub mod format;
pub mod graph;
pub mod logging;
pub mod rate;
pub mod runtime;
pub mod state;
pub mod values;

pub use capability::{
    CapabilityError, CheckResult, CheckStatus, Checker, MetadataSource, MetricsSource, Plugin,
};
pub use exit_codes::ExitCode;
pub use format::{PatternError, Sample};
pub use graph::{
    graph_protocol_schema, units, GraphDefinition, GraphDefs, GraphDocument, MetricDefinition,
    ValueKind,
};
pub use rate::RateError;
pub use runtime::{Mode, Outcome, Runtime, RuntimeError};
pub use state::{StateError, StateStore};
pub use values::{ObservationSet, ValueMap};
