//! Persisted, capped ledger of past compressions.
//!
//! Entries are kept newest-first under a single key of the local store and
//! the whole sequence is re-serialised on every mutation.

use crate::error::{ErrorContext, Result};
use crate::storage::{LocalStore, HISTORY_KEY};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

pub const MAX_COMPRESSIONS: usize = 5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    #[default]
    Success,
    Failed,
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryStatus::Success => write!(f, "success"),
            EntryStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(default)]
    pub file_id: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub original_size: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub compressed_size: u64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub ratio: f64,
    #[serde(default)]
    pub compression_method: String,
    #[serde(default)]
    pub compressed_filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    pub timestamp: String,
    #[serde(default)]
    pub status: EntryStatus,
    #[serde(default)]
    pub message: String,
}

pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Persisted numbers may have been stringified; unparsable values read as zero
fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    let n = lenient_f64(deserializer)?;
    Ok(if n.is_finite() && n > 0.0 { n.round() as u64 } else { 0 })
}

/// Decode the persisted blob; anything unreadable is dropped rather than reported
pub fn parse_history(raw: Option<&str>) -> Vec<HistoryEntry> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    let values: Vec<serde_json::Value> = match serde_json::from_str(raw) {
        Ok(values) => values,
        Err(e) => {
            warn!(error = %e, "Compression history is malformed, treating as empty");
            return Vec::new();
        }
    };
    values
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<HistoryEntry>(value) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(error = %e, "Skipping unreadable history record");
                None
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct HistoryStore {
    store: Arc<LocalStore>,
}

impl HistoryStore {
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self { store }
    }

    /// Entries newest-first
    pub fn all(&self) -> Vec<HistoryEntry> {
        parse_history(self.store.get_item(HISTORY_KEY).as_deref())
    }

    /// Prepend an entry and drop the oldest beyond `MAX_COMPRESSIONS`.
    ///
    /// Returns the entry as stored; its timestamp is nudged forward when it
    /// would collide with one already present.
    pub fn append(&self, entry: HistoryEntry) -> Result<HistoryEntry> {
        self.store
            .update_item(HISTORY_KEY, move |raw| {
                let mut history = parse_history(raw);
                let mut entry = entry;
                entry.timestamp = unique_timestamp(&history, entry.timestamp);
                history.insert(0, entry.clone());
                history.truncate(MAX_COMPRESSIONS);
                (Some(serialize(&history)), entry)
            })
            .context("Failed to save compression history")
    }

    /// Remove the entries whose timestamp equals `timestamp`, returning how many went
    pub fn remove_by_timestamp(&self, timestamp: &str) -> Result<usize> {
        self.store
            .update_item(HISTORY_KEY, |raw| {
                let mut history = parse_history(raw);
                let before = history.len();
                history.retain(|entry| entry.timestamp != timestamp);
                let removed = before - history.len();
                (Some(serialize(&history)), removed)
            })
            .context("Failed to update compression history")
    }

    pub fn clear(&self) -> Result<()> {
        self.store
            .remove_item(HISTORY_KEY)
            .context("Failed to clear compression history")
    }
}

fn serialize(history: &[HistoryEntry]) -> String {
    // Vec of plain structs cannot fail to serialise
    serde_json::to_string(history).unwrap_or_else(|_| "[]".to_string())
}

fn unique_timestamp(history: &[HistoryEntry], timestamp: String) -> String {
    if !history.iter().any(|e| e.timestamp == timestamp) {
        return timestamp;
    }
    let Ok(mut instant) = DateTime::parse_from_rfc3339(&timestamp).map(|t| t.with_timezone(&Utc))
    else {
        let mut n = 1;
        loop {
            let candidate = format!("{}#{}", timestamp, n);
            if !history.iter().any(|e| e.timestamp == candidate) {
                return candidate;
            }
            n += 1;
        }
    };
    loop {
        instant += Duration::milliseconds(1);
        let candidate = instant.to_rfc3339_opts(SecondsFormat::Millis, true);
        if !history.iter().any(|e| e.timestamp == candidate) {
            return candidate;
        }
    }
}
