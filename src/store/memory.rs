//! In-process key-value store.
//!
//! Backs the CLI and the tests. State can be persisted to a JSON snapshot
//! file so the command line tool sees the same data across invocations.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{glob_match, KeyValueStore};
use crate::clock::{Clock, SystemClock};
use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredValue {
    value: String,
    /// Epoch seconds after which the key reads as missing
    #[serde(default)]
    expire_at: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreState {
    #[serde(default)]
    strings: HashMap<String, StoredValue>,
    /// Sorted sets, each kept ordered by (score, member)
    #[serde(default)]
    sorted_sets: HashMap<String, Vec<(String, f64)>>,
}

/// Thread-safe in-memory store with Redis-like string and sorted-set operations.
#[derive(Debug)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    /// Create an empty store using the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store that evaluates key expiry against `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            clock,
        }
    }

    /// Load a store from a JSON snapshot. A missing file yields an empty store.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let store = Self::new();

        if path.exists() {
            info!(path = %path.display(), "Loading store snapshot");
            let contents = std::fs::read_to_string(path)?;
            *store.state.write() = serde_json::from_str(&contents)?;
        } else {
            debug!(path = %path.display(), "No store snapshot, starting empty");
        }

        Ok(store)
    }

    /// Write the current state to a JSON snapshot.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = serde_json::to_string_pretty(&*self.state.read())?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Store a value that disappears once `expire_at` has passed.
    pub fn set_with_expiry(&self, key: &str, value: &str, expire_at: f64) {
        self.state.write().strings.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expire_at: Some(expire_at),
            },
        );
    }

    /// Number of live string keys.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.state
            .read()
            .strings
            .values()
            .filter(|v| is_live(v, now))
            .count()
    }

    /// Whether the store holds no live string keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn is_live(value: &StoredValue, now: f64) -> bool {
    value.expire_at.map_or(true, |at| at > now)
}

/// Resolve a Redis-style inclusive rank range against a set of `len` members.
fn rank_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

    if len == 0 || start > stop || start >= len {
        None
    } else {
        Some((start as usize, stop as usize))
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = self.clock.now();
        Ok(self
            .state
            .read()
            .strings
            .get(key)
            .filter(|v| is_live(v, now))
            .map(|v| v.value.clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.state.write().strings.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expire_at: None,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut state = self.state.write();
        let removed_string = state.strings.remove(key).is_some();
        let removed_set = state.sorted_sets.remove(key).is_some();
        Ok(removed_string || removed_set)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let now = self.clock.now();
        let state = self.state.read();

        let mut keys: Vec<String> = state
            .strings
            .iter()
            .filter(|(_, v)| is_live(v, now))
            .map(|(k, _)| k)
            .chain(state.sorted_sets.keys())
            .filter(|k| glob_match(pattern, k))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn zadd(&self, set: &str, member: &str, score: f64) -> Result<()> {
        let mut state = self.state.write();
        let members = state.sorted_sets.entry(set.to_string()).or_default();

        members.retain(|(m, _)| m != member);
        let pos = members
            .iter()
            .position(|(m, s)| *s > score || (*s == score && m.as_str() > member))
            .unwrap_or(members.len());
        members.insert(pos, (member.to_string(), score));
        Ok(())
    }

    async fn zrange(&self, set: &str, start: isize, stop: isize) -> Result<Vec<String>> {
        let state = self.state.read();
        let Some(members) = state.sorted_sets.get(set) else {
            return Ok(Vec::new());
        };

        Ok(match rank_range(members.len(), start, stop) {
            Some((from, to)) => members[from..=to].iter().map(|(m, _)| m.clone()).collect(),
            None => Vec::new(),
        })
    }

    async fn zremrangebyscore(&self, set: &str, min: f64, max: f64) -> Result<usize> {
        let mut state = self.state.write();
        let Some(members) = state.sorted_sets.get_mut(set) else {
            return Ok(0);
        };

        let before = members.len();
        members.retain(|(_, score)| *score < min || *score > max);
        let removed = before - members.len();

        if members.is_empty() {
            state.sorted_sets.remove(set);
        }

        Ok(removed)
    }
}
