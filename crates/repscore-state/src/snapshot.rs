//! JSON snapshot file for durable reputation state.
//!
//! Layout (one top-level key per provider):
//!
//! ```json
//! {
//!   "SERVER#data_server_2": {
//!     "METADATA": { "score": 0.95, "last_update": "...", "interaction_count": 4 },
//!     "LOGS": [ { ...telemetry... } ]
//!   }
//! }
//! ```
//!
//! `last_update` may be RFC 3339 or epoch seconds. An entry whose metadata
//! or log list cannot be read is skipped with a warning; the rest of the
//! file still loads.
//!
//! Writes go to a temp file in the same directory and are renamed into place,
//! so a crash mid-save never leaves a truncated snapshot behind.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::warn;

use crate::storage_traits::{ProviderId, ReputationRecord, StorageResult};

const KEY_PREFIX: &str = "SERVER#";

/// Persisted metadata for one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedRecord {
    pub score: f64,
    #[serde(with = "crate::timestamp")]
    pub last_update: DateTime<Utc>,
    #[serde(default)]
    pub interaction_count: u64,
}

impl PersistedRecord {
    pub fn into_record(self, provider_id: ProviderId) -> ReputationRecord {
        ReputationRecord {
            provider_id,
            score: self.score,
            last_updated_at: self.last_update,
            interaction_count: self.interaction_count,
        }
    }
}

impl From<&ReputationRecord> for PersistedRecord {
    fn from(r: &ReputationRecord) -> Self {
        Self {
            score: r.score,
            last_update: r.last_updated_at,
            interaction_count: r.interaction_count,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SnapshotEntry {
    #[serde(rename = "METADATA", default, skip_serializing_if = "Option::is_none")]
    metadata: Option<PersistedRecord>,
    #[serde(rename = "LOGS", default, skip_serializing_if = "Vec::is_empty")]
    logs: Vec<serde_json::Value>,
}

impl SnapshotEntry {
    /// Read one entry field by field, dropping the parts that do not parse.
    fn parse(key: &str, value: serde_json::Value) -> Self {
        let serde_json::Value::Object(mut fields) = value else {
            warn!(key = %key, "snapshot entry is not an object; ignored");
            return Self::default();
        };
        let metadata = fields.remove("METADATA").and_then(|raw| {
            serde_json::from_value::<PersistedRecord>(raw)
                .map_err(|e| warn!(key = %key, error = %e, "unreadable snapshot metadata ignored"))
                .ok()
        });
        let logs = match fields.remove("LOGS") {
            None => Vec::new(),
            Some(serde_json::Value::Array(logs)) => logs,
            Some(_) => {
                warn!(key = %key, "snapshot log list is not an array; ignored");
                Vec::new()
            }
        };
        Self { metadata, logs }
    }
}

/// In-memory image of the snapshot file, saved explicitly with [`save`].
///
/// [`save`]: JsonSnapshotFile::save
#[derive(Debug)]
pub struct JsonSnapshotFile {
    path: PathBuf,
    entries: BTreeMap<String, SnapshotEntry>,
}

impl JsonSnapshotFile {
    /// Load the snapshot at `path`, or start empty if the file does not exist.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(&raw)?;
                raw.into_iter()
                    .map(|(key, value)| {
                        let entry = SnapshotEntry::parse(&key, value);
                        (key, entry)
                    })
                    .collect()
            }
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persisted metadata for a provider, if any.
    pub fn record(&self, provider_id: &ProviderId) -> Option<PersistedRecord> {
        self.entries
            .get(&key(provider_id))
            .and_then(|e| e.metadata.clone())
    }

    /// Every provider with persisted metadata, ordered by id.
    pub fn records(&self) -> Vec<ReputationRecord> {
        self.entries
            .iter()
            .filter_map(|(k, e)| {
                let id = k.strip_prefix(KEY_PREFIX)?;
                e.metadata
                    .clone()
                    .map(|m| m.into_record(ProviderId::new(id)))
            })
            .collect()
    }

    /// Recent telemetry entries for a provider, oldest first.
    pub fn logs(&self, provider_id: &ProviderId) -> &[serde_json::Value] {
        self.entries
            .get(&key(provider_id))
            .map(|e| e.logs.as_slice())
            .unwrap_or(&[])
    }

    /// Store `record` unless a record with more interactions is already
    /// present. Commits can reach the persister out of order.
    pub fn upsert_record(&mut self, record: &ReputationRecord) -> bool {
        let entry = self.entries.entry(key(&record.provider_id)).or_default();
        if let Some(existing) = &entry.metadata {
            if existing.interaction_count > record.interaction_count {
                return false;
            }
        }
        entry.metadata = Some(PersistedRecord::from(record));
        true
    }

    /// Append a telemetry entry, keeping only the newest `capacity` entries.
    pub fn append_log(
        &mut self,
        provider_id: &ProviderId,
        entry: serde_json::Value,
        capacity: usize,
    ) {
        let logs = &mut self.entries.entry(key(provider_id)).or_default().logs;
        logs.push(entry);
        if logs.len() > capacity {
            let excess = logs.len() - capacity;
            logs.drain(..excess);
        }
    }

    /// Atomically write the snapshot to disk.
    pub fn save(&self) -> StorageResult<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let body = serde_json::to_vec_pretty(&self.entries)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&body)?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

fn key(provider_id: &ProviderId) -> String {
    format!("{KEY_PREFIX}{}", provider_id.0)
}
