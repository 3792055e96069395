//! In-memory [`SettingsStore`] used by tests and local development.
//! Supports scripted failures so error paths stay testable without a
//! live backend.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use confmig_protocol::Category;

use crate::snapshot::SettingsSnapshot;
use crate::store::{ReadError, SettingsStore, WriteError};

type Slot = (String, Category);

#[derive(Default)]
struct Inner {
    settings: HashMap<Slot, BTreeMap<String, String>>,
    missing: HashMap<Slot, BTreeSet<String>>,
    read_errors: HashMap<Slot, ReadError>,
    write_errors: HashMap<Slot, WriteError>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(project_id: &str, category: Category) -> Slot {
        (project_id.to_string(), category)
    }

    pub fn seed<'a, I>(&self, project_id: &str, category: Category, pairs: I)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        let map = inner
            .settings
            .entry(Self::slot(project_id, category))
            .or_default();
        for (k, v) in pairs {
            map.insert(k.to_string(), v.to_string());
        }
    }

    pub fn set(&self, project_id: &str, category: Category, key: &str, value: &str) {
        self.seed(project_id, category, [(key, value)]);
    }

    pub fn remove(&self, project_id: &str, category: Category, key: &str) {
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        if let Some(map) = inner.settings.get_mut(&Self::slot(project_id, category)) {
            map.remove(key);
        }
    }

    pub fn value(&self, project_id: &str, category: Category, key: &str) -> Option<String> {
        let inner = self.inner.lock().expect("memory store lock poisoned");
        inner
            .settings
            .get(&Self::slot(project_id, category))
            .and_then(|map| map.get(key).cloned())
    }

    /// Make subsequent reads of the slot fail with `err`.
    pub fn fail_reads(&self, project_id: &str, category: Category, err: ReadError) {
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        inner.read_errors.insert(Self::slot(project_id, category), err);
    }

    /// Make subsequent writes to the slot fail with `err`.
    pub fn fail_writes(&self, project_id: &str, category: Category, err: WriteError) {
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        inner
            .write_errors
            .insert(Self::slot(project_id, category), err);
    }

    /// Flag a key as unfetchable, producing partial-read snapshots.
    pub fn mark_missing(&self, project_id: &str, category: Category, key: &str) {
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        inner
            .missing
            .entry(Self::slot(project_id, category))
            .or_default()
            .insert(key.to_string());
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn read(
        &self,
        project_id: &str,
        category: Category,
    ) -> Result<SettingsSnapshot, ReadError> {
        let inner = self.inner.lock().expect("memory store lock poisoned");
        let slot = Self::slot(project_id, category);
        if let Some(err) = inner.read_errors.get(&slot) {
            return Err(err.clone());
        }
        let mut snapshot = SettingsSnapshot::new();
        let missing = inner.missing.get(&slot);
        if let Some(map) = inner.settings.get(&slot) {
            for (k, v) in map {
                if missing.is_some_and(|m| m.contains(k)) {
                    continue;
                }
                snapshot.insert(k, v);
            }
        }
        if let Some(missing) = missing {
            for key in missing {
                snapshot.mark_missing(key);
            }
        }
        Ok(snapshot)
    }

    async fn write(
        &self,
        project_id: &str,
        category: Category,
        key: &str,
        value: Option<&str>,
    ) -> Result<(), WriteError> {
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        let slot = Self::slot(project_id, category);
        if let Some(err) = inner.write_errors.get(&slot) {
            return Err(err.clone());
        }
        let map = inner.settings.entry(slot).or_default();
        match value {
            Some(v) => {
                map.insert(key.to_string(), v.to_string());
            }
            None => {
                map.remove(key);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_reflect_seeded_values_and_missing_flags() {
        let store = MemoryStore::new();
        store.seed("p1", Category::Auth, [("a", "1"), ("b", "2")]);
        store.mark_missing("p1", Category::Auth, "b");

        let snap = store.read("p1", Category::Auth).await.unwrap();
        assert_eq!(snap.value("a"), Some("1"));
        assert_eq!(snap.value("b"), None);
        assert!(snap.is_missing("b"));
        assert!(snap.is_partial());
    }

    #[tokio::test]
    async fn writes_clear_keys_when_value_is_none() {
        let store = MemoryStore::new();
        store.seed("p1", Category::Storage, [("bucket", "old")]);
        store
            .write("p1", Category::Storage, "bucket", None)
            .await
            .unwrap();
        assert_eq!(store.value("p1", Category::Storage, "bucket"), None);
    }

    #[tokio::test]
    async fn scripted_failures_surface_as_errors() {
        let store = MemoryStore::new();
        store.fail_reads(
            "p1",
            Category::Postgres,
            ReadError::UnreachableBackend("scripted".into()),
        );
        let err = store.read("p1", Category::Postgres).await.unwrap_err();
        assert!(matches!(err, ReadError::UnreachableBackend(_)));
    }
}
