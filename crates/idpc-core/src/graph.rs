//! Graph and metric definitions declared by metrics plugins.
//!
//! Only `name`, `label`, and `stacked` travel to the host agent; the other
//! metric fields drive value computation and never leave the process.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metric units understood by the host agent.
pub mod units {
    pub const FLOAT: &str = "float";
    pub const INTEGER: &str = "integer";
    pub const PERCENTAGE: &str = "percentage";
    pub const BYTES: &str = "bytes";
    pub const BYTES_PER_SECOND: &str = "bytes/sec";
    pub const IOPS: &str = "iops";
}

/// Wildcard tokens allowed in graph keys and metric names.
pub const WILDCARD_TOKENS: [char; 2] = ['*', '#'];

/// Numeric representation used to parse and diff a metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Keep numbers as produced; rates and scaling use floating point.
    #[default]
    Auto,
    Uint32,
    Uint64,
}

/// One metric line of a graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MetricDefinition {
    pub name: String,
    pub label: String,
    /// Report the per-minute rate instead of the raw counter.
    #[serde(skip)]
    pub is_rate: bool,
    #[serde(skip)]
    pub value_kind: ValueKind,
    pub stacked: bool,
    /// Multiplier applied after rate computation; 0 disables scaling.
    #[serde(skip)]
    pub scale: f64,
    /// Look the value up as `<graphKey>.<name>`.
    #[serde(skip)]
    pub absolute_name: bool,
}

impl MetricDefinition {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn with_rate(mut self) -> Self {
        self.is_rate = true;
        self
    }

    pub fn with_kind(mut self, kind: ValueKind) -> Self {
        self.value_kind = kind;
        self
    }

    pub fn with_stacked(mut self) -> Self {
        self.stacked = true;
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_absolute_name(mut self) -> Self {
        self.absolute_name = true;
        self
    }
}

/// A graph: label, unit, and the metrics plotted on it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GraphDefinition {
    pub label: String,
    pub unit: String,
    pub metrics: Vec<MetricDefinition>,
}

impl GraphDefinition {
    pub fn new(
        label: impl Into<String>,
        unit: impl Into<String>,
        metrics: Vec<MetricDefinition>,
    ) -> Self {
        Self {
            label: label.into(),
            unit: unit.into(),
            metrics,
        }
    }
}

/// Graph id → definition.
pub type GraphDefs = BTreeMap<String, GraphDefinition>;

/// Document printed in meta mode after the version line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GraphDocument {
    pub graphs: GraphDefs,
}

impl GraphDocument {
    /// Build the host-facing document for plugin `plugin_key`.
    ///
    /// Graph ids become `<pluginKey>` (empty id) or `<pluginKey>.<id>`; empty
    /// labels default to the title-cased id or metric name.
    pub fn for_plugin(plugin_key: &str, defs: &GraphDefs) -> Self {
        let graphs = defs
            .iter()
            .map(|(key, graph)| {
                let id = if key.is_empty() {
                    plugin_key.to_string()
                } else {
                    format!("{plugin_key}.{key}")
                };
                let mut graph = graph.clone();
                if graph.label.is_empty() {
                    graph.label = title(&id);
                }
                for metric in &mut graph.metrics {
                    if metric.label.is_empty() {
                        metric.label = title(&metric.name);
                    }
                }
                (id, graph)
            })
            .collect();
        Self { graphs }
    }
}

/// JSON Schema of the graph-definition document.
pub fn graph_protocol_schema() -> schemars::Schema {
    schemars::schema_for!(GraphDocument)
}

/// Whether `s` contains a wildcard token.
pub fn has_wildcard(s: &str) -> bool {
    s.contains(&WILDCARD_TOKENS[..])
}

/// `memcached.cmd_get` → `Memcached Cmd Get`.
pub fn title(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        let c = if c == '.' || c == '_' { ' ' } else { c };
        if at_word_start {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = !c.is_alphanumeric();
    }
    out
}
