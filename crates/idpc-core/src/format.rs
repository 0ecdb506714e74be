//! Metric value resolution and the tab-separated value protocol.
//!
//! Each reported metric is one line:
//!
//! ```text
//! <key>\t<value>\t<unix seconds>\n
//! ```
//!
//! Integers print in base 10, floats with six fractional digits. NaN and
//! infinite values are dropped with a warning; the host agent rejects them.

use crate::graph::{MetricDefinition, ValueKind};
use crate::rate::{rate_f64, rate_u32, rate_u64};
use crate::values::{to_f64, to_u32, to_u64, ObservationSet};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::io::{self, Write};
use thiserror::Error;
use tracing::{debug, warn};

/// Character class substituted for each wildcard token.
const WILDCARD_CLASS: &str = "[-a-zA-Z0-9_]+";

/// A wildcard metric name that does not compile to a valid pattern.
#[derive(Debug, Error)]
#[error("invalid wildcard pattern {pattern:?}: {source}")]
pub struct PatternError {
    pub pattern: String,
    #[source]
    pub source: regex::Error,
}

/// A resolved metric value, ready to print.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    U32(u32),
    U64(u64),
    F64(f64),
}

impl Sample {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Sample::U32(v) => f64::from(v),
            Sample::U64(v) => v as f64,
            Sample::F64(v) => v,
        }
    }

    pub fn to_u32(&self) -> u32 {
        match *self {
            Sample::U32(v) => v,
            Sample::U64(v) => v as u32,
            Sample::F64(v) => v as u32,
        }
    }

    pub fn to_u64(&self) -> u64 {
        match *self {
            Sample::U32(v) => u64::from(v),
            Sample::U64(v) => v,
            Sample::F64(v) => v as u64,
        }
    }

    pub fn is_finite(&self) -> bool {
        match *self {
            Sample::F64(v) => v.is_finite(),
            _ => true,
        }
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sample::U32(v) => write!(f, "{v}"),
            Sample::U64(v) => write!(f, "{v}"),
            Sample::F64(v) => write!(f, "{v:.6}"),
        }
    }
}

/// Render one value line, or `None` when the value is not finite.
pub fn format_line(key: &str, sample: Sample, timestamp: DateTime<Utc>) -> Option<String> {
    if !sample.is_finite() {
        warn!(key, value = sample.as_f64(), "invalid value, not reported");
        return None;
    }
    Some(format!("{key}\t{sample}\t{}\n", timestamp.timestamp()))
}

/// Printed key: `<pluginKey>.<prefix>.<name>`, skipping an empty prefix.
pub fn metric_key(plugin_key: &str, prefix: &str, name: &str) -> String {
    let mut parts = vec![plugin_key];
    if !prefix.is_empty() {
        parts.push(prefix);
    }
    parts.push(name);
    parts.join(".")
}

/// Numbers keep their shape; text is parsed per `kind`, falling back to 0.
fn raw_sample(name: &str, kind: ValueKind, value: &Value) -> Option<Sample> {
    match value {
        Value::Number(n) => match n.as_u64() {
            Some(u) => Some(Sample::U64(u)),
            None => n.as_f64().map(Sample::F64),
        },
        Value::String(s) => {
            let parsed = match kind {
                ValueKind::Uint32 => s.parse::<u32>().map(Sample::U32).map_err(|e| e.to_string()),
                ValueKind::Uint64 => s.parse::<u64>().map(Sample::U64).map_err(|e| e.to_string()),
                ValueKind::Auto => s.parse::<f64>().map(Sample::F64).map_err(|e| e.to_string()),
            };
            Some(parsed.unwrap_or_else(|error| {
                warn!(metric = name, value = %s, %error, "parsing a value, using 0");
                match kind {
                    ValueKind::Uint32 => Sample::U32(0),
                    ValueKind::Uint64 => Sample::U64(0),
                    ValueKind::Auto => Sample::F64(0.0),
                }
            }))
        }
        Value::Null => None,
        other => {
            debug!(metric = name, value = %other, "not a scalar metric value");
            None
        }
    }
}

/// Resolve the value to report for `metric` this cycle.
///
/// Returns `None` when the metric is absent, has no previous observation
/// to diff against, or its rate cannot be computed. Computed rates are
/// recorded in `current` for the next cycle's reset heuristic.
pub fn resolve_metric_value(
    metric: &MetricDefinition,
    prefix: &str,
    current: &mut ObservationSet,
    previous: &ObservationSet,
) -> Option<Sample> {
    let name = if metric.absolute_name && !prefix.is_empty() {
        format!("{prefix}.{}", metric.name)
    } else {
        metric.name.clone()
    };

    let mut sample = raw_sample(&name, metric.value_kind, current.get(&name)?)?;

    if metric.is_rate {
        let Some(last) = previous.get(&name) else {
            debug!(metric = %name, "does not exist at last fetch");
            return None;
        };
        let last_rate = previous.last_diff(&name);
        let rate = match metric.value_kind {
            ValueKind::Uint32 => rate_u32(
                sample.to_u32(),
                current.timestamp,
                to_u32(last),
                previous.timestamp,
                last_rate,
            ),
            ValueKind::Uint64 => rate_u64(
                sample.to_u64(),
                current.timestamp,
                to_u64(last),
                previous.timestamp,
                last_rate,
            ),
            ValueKind::Auto => rate_f64(
                sample.as_f64(),
                current.timestamp,
                to_f64(last),
                previous.timestamp,
            ),
        };
        match rate {
            Ok(rate) => {
                current.set_last_diff(&name, rate);
                sample = Sample::F64(rate);
            }
            Err(error) => {
                debug!(metric = %name, %error, "rate skipped");
                return None;
            }
        }
    }

    if metric.scale != 0.0 {
        sample = match metric.value_kind {
            ValueKind::Uint32 => Sample::U32(sample.to_u32().wrapping_mul(metric.scale as u32)),
            ValueKind::Uint64 => Sample::U64(sample.to_u64().wrapping_mul(metric.scale as u64)),
            ValueKind::Auto => Sample::F64(sample.as_f64() * metric.scale),
        };
    }

    Some(sample)
}

/// Compile the matcher for a wildcard metric under graph `prefix`.
///
/// Dots are literal; `*` and `#` each match one or more of `[-a-zA-Z0-9_]`.
/// The match is anchored at the start of the key only.
pub fn wildcard_regex(prefix: &str, name: &str) -> Result<Regex, PatternError> {
    let raw = if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    };
    let mut pattern = String::from(r"\A");
    for c in raw.chars() {
        match c {
            '.' => pattern.push_str(r"\."),
            '*' | '#' => pattern.push_str(WILDCARD_CLASS),
            c => pattern.push(c),
        }
    }
    Regex::new(&pattern).map_err(|source| PatternError { pattern, source })
}

/// Concrete metrics for every observed key matching a wildcard definition.
///
/// Each result is `metric` renamed to the matched key; report them with an
/// empty prefix.
pub fn expand_wildcard<'a, I>(
    prefix: &str,
    metric: &MetricDefinition,
    observed_keys: I,
) -> Result<Vec<MetricDefinition>, PatternError>
where
    I: IntoIterator<Item = &'a String>,
{
    let re = wildcard_regex(prefix, &metric.name)?;
    Ok(observed_keys
        .into_iter()
        .filter(|key| re.is_match(key))
        .map(|key| MetricDefinition {
            name: key.clone(),
            ..metric.clone()
        })
        .collect())
}

/// Resolve `metric` and write its line to `out`.
pub fn emit_metric<W: Write>(
    out: &mut W,
    plugin_key: &str,
    prefix: &str,
    metric: &MetricDefinition,
    current: &mut ObservationSet,
    previous: &ObservationSet,
) -> io::Result<()> {
    let Some(sample) = resolve_metric_value(metric, prefix, current, previous) else {
        return Ok(());
    };
    let key = metric_key(plugin_key, prefix, &metric.name);
    if let Some(line) = format_line(&key, sample, current.timestamp) {
        out.write_all(line.as_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::ValueMap;
    use chrono::Duration;
    use serde_json::json;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn set(pairs: &[(&str, Value)], at: DateTime<Utc>) -> ObservationSet {
        let values: ValueMap = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        ObservationSet::new(values, at)
    }

    #[test]
    fn test_format_line_shapes() {
        assert_eq!(
            format_line("m.a", Sample::U64(42), t0()).unwrap(),
            "m.a\t42\t1700000000\n"
        );
        assert_eq!(
            format_line("m.b", Sample::F64(1.5), t0()).unwrap(),
            "m.b\t1.500000\t1700000000\n"
        );
        assert_eq!(
            format_line("m.c", Sample::U32(7), t0()).unwrap(),
            "m.c\t7\t1700000000\n"
        );
    }

    #[test]
    fn test_format_line_drops_non_finite() {
        assert!(format_line("m", Sample::F64(f64::NAN), t0()).is_none());
        assert!(format_line("m", Sample::F64(f64::INFINITY), t0()).is_none());
        assert!(format_line("m", Sample::F64(f64::NEG_INFINITY), t0()).is_none());
    }

    #[test]
    fn test_metric_key() {
        assert_eq!(metric_key("memcached", "cmd", "cmd_get"), "memcached.cmd.cmd_get");
        assert_eq!(metric_key("memcached", "", "cpu.user"), "memcached.cpu.user");
    }

    #[test]
    fn test_absent_metric_is_skipped() {
        let mut current = set(&[("a", json!(1))], t0());
        let previous = ObservationSet::empty();
        let metric = MetricDefinition::new("missing", "");
        assert!(resolve_metric_value(&metric, "", &mut current, &previous).is_none());

        let mut current = set(&[("a", Value::Null)], t0());
        let metric = MetricDefinition::new("a", "");
        assert!(resolve_metric_value(&metric, "", &mut current, &previous).is_none());
    }

    #[test]
    fn test_text_values_parse_per_kind() {
        let previous = ObservationSet::empty();
        let mut current = set(&[("n", json!("42")), ("bad", json!("x1"))], t0());

        let u32_metric = MetricDefinition::new("n", "").with_kind(ValueKind::Uint32);
        assert_eq!(
            resolve_metric_value(&u32_metric, "", &mut current, &previous),
            Some(Sample::U32(42))
        );
        let auto = MetricDefinition::new("n", "");
        assert_eq!(
            resolve_metric_value(&auto, "", &mut current, &previous),
            Some(Sample::F64(42.0))
        );
        let bad = MetricDefinition::new("bad", "").with_kind(ValueKind::Uint64);
        assert_eq!(
            resolve_metric_value(&bad, "", &mut current, &previous),
            Some(Sample::U64(0))
        );
    }

    #[test]
    fn test_absolute_name_uses_prefix() {
        let previous = ObservationSet::empty();
        let mut current = set(&[("cmd.get", json!(3)), ("get", json!(9))], t0());
        let metric = MetricDefinition::new("get", "").with_absolute_name();
        assert_eq!(
            resolve_metric_value(&metric, "cmd", &mut current, &previous),
            Some(Sample::U64(3))
        );
        let relative = MetricDefinition::new("get", "");
        assert_eq!(
            resolve_metric_value(&relative, "cmd", &mut current, &previous),
            Some(Sample::U64(9))
        );
    }

    #[test]
    fn test_rate_requires_previous_value() {
        let previous = set(&[("other", json!(1))], t0());
        let mut current = set(&[("cmd_get", json!(220))], t0() + Duration::seconds(60));
        let metric = MetricDefinition::new("cmd_get", "").with_rate();
        assert!(resolve_metric_value(&metric, "", &mut current, &previous).is_none());
    }

    #[test]
    fn test_rate_records_last_diff() {
        let previous = set(&[("cmd_get", json!(100))], t0());
        let mut current = set(&[("cmd_get", json!(220))], t0() + Duration::seconds(60));
        let metric = MetricDefinition::new("cmd_get", "")
            .with_rate()
            .with_kind(ValueKind::Uint64);
        assert_eq!(
            resolve_metric_value(&metric, "", &mut current, &previous),
            Some(Sample::F64(120.0))
        );
        assert_eq!(current.last_diff("cmd_get"), 120.0);
    }

    #[test]
    fn test_rate_failure_skips_metric() {
        let previous = set(&[("c", json!(500.0))], t0());
        let mut current = set(&[("c", json!(10.0))], t0() + Duration::seconds(60));
        let metric = MetricDefinition::new("c", "").with_rate();
        assert!(resolve_metric_value(&metric, "", &mut current, &previous).is_none());
        assert!(!current.contains_key(".last_diff.c"));
    }

    #[test]
    fn test_u32_rate_uses_previous_rate_for_wrap() {
        let mut previous = set(&[("c", json!(u32::MAX - 10))], t0());
        previous.set_last_diff("c", 100.0);
        let mut current = set(&[("c", json!(50))], t0() + Duration::seconds(60));
        let metric = MetricDefinition::new("c", "")
            .with_rate()
            .with_kind(ValueKind::Uint32);
        assert_eq!(
            resolve_metric_value(&metric, "", &mut current, &previous),
            Some(Sample::F64(61.0))
        );
    }

    #[test]
    fn test_scale_per_kind() {
        let previous = ObservationSet::empty();
        let mut current = set(&[("bytes", json!(10)), ("ratio", json!(0.5))], t0());

        let bits = MetricDefinition::new("bytes", "")
            .with_kind(ValueKind::Uint64)
            .with_scale(8.0);
        assert_eq!(
            resolve_metric_value(&bits, "", &mut current, &previous),
            Some(Sample::U64(80))
        );
        let percent = MetricDefinition::new("ratio", "").with_scale(100.0);
        assert_eq!(
            resolve_metric_value(&percent, "", &mut current, &previous),
            Some(Sample::F64(50.0))
        );
        let truncated = MetricDefinition::new("bytes", "")
            .with_kind(ValueKind::Uint32)
            .with_scale(0.5);
        assert_eq!(
            resolve_metric_value(&truncated, "", &mut current, &previous),
            Some(Sample::U32(0))
        );
    }

    #[test]
    fn test_expand_wildcard_matches_family() {
        let keys: Vec<String> = ["cpu.user", "cpu.system", "cpu.idle", "memory.used"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let metric = MetricDefinition::new("*", "").with_rate();
        let expanded = expand_wildcard("cpu", &metric, &keys).unwrap();
        let names: Vec<&str> = expanded.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["cpu.user", "cpu.system", "cpu.idle"]);
        assert!(expanded.iter().all(|m| m.is_rate));

        let whole = MetricDefinition::new("cpu.*", "");
        assert_eq!(expand_wildcard("", &whole, &keys).unwrap().len(), 3);
    }

    #[test]
    fn test_expand_wildcard_hash_token() {
        let keys: Vec<String> = ["interface.eth0.rx", "interface.eth1.rx", "interface.eth0.tx"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let metric = MetricDefinition::new("#.rx", "");
        let expanded = expand_wildcard("interface", &metric, &keys).unwrap();
        assert_eq!(expanded.len(), 2);
    }

    #[test]
    fn test_dots_are_literal() {
        let re = wildcard_regex("a", "b").unwrap();
        assert!(re.is_match("a.b"));
        assert!(!re.is_match("axb"));
    }

    #[test]
    fn test_malformed_pattern_is_error() {
        let metric = MetricDefinition::new("*(", "");
        let err = expand_wildcard("cpu", &metric, &Vec::new()).unwrap_err();
        assert!(err.pattern.starts_with(r"\Acpu"));
    }

    #[test]
    fn test_emit_metric_writes_line() {
        let previous = ObservationSet::empty();
        let mut current = set(&[("curr_connections", json!(12))], t0());
        let metric = MetricDefinition::new("curr_connections", "");
        let mut out = Vec::new();
        emit_metric(&mut out, "memcached", "connections", &metric, &mut current, &previous)
            .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "memcached.connections.curr_connections\t12\t1700000000\n"
        );
    }
}
