use std::collections::{BTreeMap, BTreeSet};

/// Point-in-time read of one category's settings for one project.
///
/// Values are opaque strings; the engine never interprets them. Keys that
/// the backend could not fetch are flagged in `missing` (the partial-read
/// case): the snapshot is still usable, but those keys were not observed
/// and must not be diffed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsSnapshot {
    values: BTreeMap<String, String>,
    missing: BTreeSet<String>,
}

impl SettingsSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn mark_missing(&mut self, key: impl Into<String>) {
        self.missing.insert(key.into());
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Keys in lexicographic order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn is_missing(&self, key: &str) -> bool {
        self.missing.contains(key)
    }

    pub fn is_partial(&self) -> bool {
        !self.missing.is_empty()
    }

    pub fn missing(&self) -> impl Iterator<Item = &str> {
        self.missing.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SettingsSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut snap = Self::new();
        for (k, v) in iter {
            snap.insert(k, v);
        }
        snap
    }
}
