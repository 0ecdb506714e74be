//! State file management.
//!
//! Each plugin invocation leaves its observations behind in one JSON file so
//! the next invocation can compute rates. The file lives at
//!
//! ```text
//! <workdir>/idpc-plugin-<key>-<type>-<sha256(args joined by ' ')>
//! ```
//!
//! so plugins started with different flags (usually different metric sets)
//! never share state. The digest is SHA-256 and the prefix is
//! `idpc-plugin`, so state files left by mackerel-style plugins (SHA-1,
//! `mackerel-plugin-` prefix) are never picked up; the first run after a
//! migration simply starts without previous values. The document is a flat JSON object of values plus the
//! reserved `_lastTime` key holding the observation time in Unix seconds.

use crate::values::{ObservationSet, ValueMap, LAST_TIME_KEY};
use chrono::{DateTime, Utc};
use idpc_common::{Meta, PLUGIN_PREFIX};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Minimum age, in milliseconds, of stored state before it may be replaced.
pub const MIN_STATE_AGE_MS: i64 = 1_000;

/// Errors from state file operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("state file is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("state was recently updated ({age_ms}ms ago)")]
    StaleWrite { age_ms: i64 },
}

impl StateError {
    pub fn is_stale_write(&self) -> bool {
        matches!(self, StateError::StaleWrite { .. })
    }
}

/// File name identifying a plugin and its invocation arguments.
pub fn cache_key(meta: &Meta, args: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(args.join(" ").as_bytes());
    format!(
        "{}-{}-{}-{}",
        PLUGIN_PREFIX,
        meta.key,
        meta.kind,
        hex::encode(hasher.finalize())
    )
}

/// Reads and writes one plugin's state file.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Store backed by an explicit file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the conventional location for `meta` invoked with `args`.
    pub fn for_plugin(work_dir: &Path, meta: &Meta, args: &[String]) -> Self {
        Self::new(work_dir.join(cache_key(meta, args)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the previous observations.
    ///
    /// A missing file is not an error: it yields an empty set with the zero
    /// timestamp.
    pub fn load(&self) -> Result<ObservationSet, StateError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no previous state");
                return Ok(ObservationSet::empty());
            }
            Err(e) => return Err(e.into()),
        };

        let values: ValueMap = serde_json::from_str(&contents)?;
        Ok(from_document(values))
    }

    /// Load, refusing state written less than a second before `now`.
    pub fn load_guarded(&self, now: DateTime<Utc>) -> Result<ObservationSet, StateError> {
        let previous = self.load()?;
        let age_ms = now
            .signed_duration_since(previous.timestamp)
            .num_milliseconds();
        if age_ms < MIN_STATE_AGE_MS {
            return Err(StateError::StaleWrite { age_ms });
        }
        Ok(previous)
    }

    /// Replace the state file with `set`.
    pub fn save(&self, set: &ObservationSet) -> Result<(), StateError> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }

        let json = serde_json::to_vec(&to_document(set))?;

        // Write atomically
        let tmp_path = self.tmp_path();
        {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)?;
            file.write_all(&json)?;
            file.write_all(b"\n")?;
            file.flush()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        debug!(path = %self.path.display(), values = set.values.len(), "state saved");
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

fn from_document(mut values: ValueMap) -> ObservationSet {
    let timestamp = values
        .remove(LAST_TIME_KEY)
        .and_then(|v| match v {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            _ => None,
        })
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_default();
    ObservationSet::new(values, timestamp)
}

fn to_document(set: &ObservationSet) -> ValueMap {
    let mut doc = set.values.clone();
    doc.insert(
        LAST_TIME_KEY.to_string(),
        Value::from(set.timestamp.timestamp()),
    );
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use idpc_common::{PluginType, Version};
    use serde_json::json;
    use tempfile::TempDir;

    fn test_store() -> (StateStore, TempDir) {
        let dir = TempDir::new().expect("tempdir");
        let store = StateStore::new(dir.path().join("state"));
        (store, dir)
    }

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn sample_meta() -> Meta {
        Meta::new("memcached", PluginType::Metrics, Version::new(1, 0, 0))
    }

    #[test]
    fn test_cache_key_shape() {
        let key = cache_key(&sample_meta(), &["-host".into(), "db1".into()]);
        let prefix = "idpc-plugin-memcached-metrics-";
        assert!(key.starts_with(prefix));
        let digest = &key[prefix.len()..];
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_cache_key_digest_is_sha256_of_joined_args() {
        let key = cache_key(&sample_meta(), &["-host".into(), "db1".into()]);
        assert_eq!(
            key,
            "idpc-plugin-memcached-metrics-\
             97a53e99c10164fc577de4763654aee1e7ade675873e0be83a3a033e012b9b50"
        );
        let bare = cache_key(&sample_meta(), &[]);
        assert!(bare.ends_with("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"));
    }

    #[test]
    fn test_cache_key_depends_on_args() {
        let meta = sample_meta();
        let a = cache_key(&meta, &["-port".into(), "11211".into()]);
        let b = cache_key(&meta, &["-port".into(), "11212".into()]);
        assert_ne!(a, b);
        assert_eq!(a, cache_key(&meta, &["-port".into(), "11211".into()]));
    }

    #[test]
    fn test_for_plugin_joins_work_dir() {
        let store = StateStore::for_plugin(Path::new("/var/tmp"), &sample_meta(), &[]);
        assert!(store.path().starts_with("/var/tmp"));
    }

    #[test]
    fn test_load_missing_is_empty() {
        let (store, _dir) = test_store();
        let set = store.load().expect("load");
        assert!(set.is_empty());
        assert_eq!(set.timestamp.timestamp(), 0);
    }

    #[test]
    fn test_save_then_load() {
        let (store, _dir) = test_store();
        let mut values = ValueMap::new();
        values.insert("cmd_get".into(), json!(100));
        values.insert("rusage_user".into(), json!(1.25));
        values.insert("version".into(), json!("1.6.9"));
        let set = ObservationSet::new(values, t0());

        store.save(&set).expect("save");
        let loaded = store.load().expect("load");
        assert_eq!(loaded, set);
        assert!(!loaded.contains_key(LAST_TIME_KEY));
    }

    #[test]
    fn test_file_carries_last_time() {
        let (store, _dir) = test_store();
        store
            .save(&ObservationSet::new(ValueMap::new(), t0()))
            .expect("save");
        let raw: Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["_lastTime"], json!(1_700_000_000i64));
        assert!(!store.tmp_path().exists());
    }

    #[test]
    fn test_float_last_time_is_accepted() {
        let (store, _dir) = test_store();
        fs::write(store.path(), r#"{"a": 1, "_lastTime": 1700000000.0}"#).unwrap();
        let loaded = store.load().expect("load");
        assert_eq!(loaded.timestamp, t0());
        assert_eq!(loaded.values.len(), 1);
    }

    #[test]
    fn test_corrupt_file_is_decode_error() {
        let (store, _dir) = test_store();
        fs::write(store.path(), "not json").unwrap();
        assert!(matches!(store.load(), Err(StateError::Decode(_))));
    }

    #[test]
    fn test_guard_rejects_recent_state() {
        let (store, _dir) = test_store();
        store
            .save(&ObservationSet::new(ValueMap::new(), t0()))
            .expect("save");

        let err = store
            .load_guarded(t0() + Duration::milliseconds(500))
            .unwrap_err();
        assert!(err.is_stale_write());

        let ok = store.load_guarded(t0() + Duration::milliseconds(1_500));
        assert!(ok.is_ok());
    }

    #[test]
    fn test_guard_passes_without_state() {
        let (store, _dir) = test_store();
        assert!(store.load_guarded(t0()).is_ok());
    }

    #[test]
    fn test_save_creates_work_dir() {
        let dir = TempDir::new().expect("tempdir");
        let store = StateStore::new(dir.path().join("nested").join("state"));
        store.save(&ObservationSet::empty()).expect("save");
        assert!(store.path().exists());
    }
}
