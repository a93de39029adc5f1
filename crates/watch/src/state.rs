// ABOUTME: Seen-state store: per-site sets of dedup keys, loaded permissively and saved atomically.
// ABOUTME: Keys are only ever added; a key once recorded is never reported as new again.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::error::StateError;

#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    seen: BTreeMap<String, BTreeSet<String>>,
}

/// Mapping from site id to the keys already recorded for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenState {
    seen: BTreeMap<String, BTreeSet<String>>,
    dirty: bool,
}

impl SeenState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads state from `path`. A missing or unreadable file yields empty
    /// state. A flat JSON list (the oldest format) is assigned to
    /// `legacy_site`.
    pub fn load(path: &Path, legacy_site: &str) -> Self {
        let Ok(data) = fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str::<Value>(&data) {
            Ok(value) => Self::from_value(value, legacy_site),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "seen-state unreadable, starting empty");
                Self::default()
            }
        }
    }

    /// Interprets any of the historical state layouts.
    pub fn from_value(value: Value, legacy_site: &str) -> Self {
        let mut seen: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        match value {
            Value::Array(keys) => {
                let keys: BTreeSet<String> = keys
                    .into_iter()
                    .filter_map(|k| k.as_str().map(str::to_string))
                    .collect();
                if !keys.is_empty() {
                    seen.insert(legacy_site.to_string(), keys);
                }
            }
            Value::Object(mut map) => {
                let sites = match map.remove("seen") {
                    Some(Value::Object(inner)) => inner,
                    Some(_) => serde_json::Map::new(),
                    None => map,
                };
                for (site, entry) in sites {
                    let keys: BTreeSet<String> = match entry {
                        Value::Array(list) => list
                            .into_iter()
                            .filter_map(|k| k.as_str().map(str::to_string))
                            .collect(),
                        // Intermediate layout: {site: {key: {title, url, first_seen}}}
                        Value::Object(obj) => obj.into_iter().map(|(k, _)| k).collect(),
                        _ => continue,
                    };
                    seen.insert(site, keys);
                }
            }
            _ => {}
        }
        Self { seen, dirty: false }
    }

    /// Writes `{"seen": {...}}` through a temp file in the same directory.
    pub fn save(&self, path: &Path) -> Result<(), StateError> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => Path::new(".").to_path_buf(),
        };
        fs::create_dir_all(&dir)?;

        let file = StateFile {
            seen: self.seen.clone(),
        };
        let data = serde_json::to_string_pretty(&file)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(data.as_bytes())?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(path)?;
        Ok(())
    }

    /// True when the site has no recorded keys (absent or empty).
    pub fn is_empty_for(&self, site: &str) -> bool {
        self.seen.get(site).map(|s| s.is_empty()).unwrap_or(true)
    }

    pub fn contains(&self, site: &str, key: &str) -> bool {
        self.seen.get(site).map(|s| s.contains(key)).unwrap_or(false)
    }

    pub fn get(&self, site: &str) -> Option<&BTreeSet<String>> {
        self.seen.get(site)
    }

    /// Records `key`; returns true if it was not already present.
    pub fn insert(&mut self, site: &str, key: &str) -> bool {
        let added = self
            .seen
            .entry(site.to_string())
            .or_default()
            .insert(key.to_string());
        if added {
            self.dirty = true;
        }
        added
    }

    /// Records every key; returns how many were new.
    pub fn commit_all<'a, I>(&mut self, site: &str, keys: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        keys.into_iter().filter(|k| self.insert(site, k)).count()
    }

    pub fn total_keys(&self) -> usize {
        self.seen.values().map(BTreeSet::len).sum()
    }

    /// True once anything was inserted since load.
    pub fn dirty(&self) -> bool {
        self.dirty
    }
}
