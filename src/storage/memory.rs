//! In-process store. One mutex guards collections and one guards records;
//! each lock is held only for a single operation.

use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use super::{ensure_id, id_key, Document, Expect, Filter, StorageAdapter};
use crate::errors::{Result, SnapError};

#[derive(Default)]
struct Collection {
    docs: BTreeMap<String, Document>,
    indexes: BTreeSet<String>,
}

#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Collection>>,
    records: Mutex<HashMap<String, u64>>,
}

fn poisoned<T>(_: T) -> SnapError {
    SnapError::storage("memory store lock poisoned")
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn collections(&self) -> Result<MutexGuard<'_, HashMap<String, Collection>>> {
        self.collections.lock().map_err(poisoned)
    }

    fn records(&self) -> Result<MutexGuard<'_, HashMap<String, u64>>> {
        self.records.lock().map_err(poisoned)
    }
}

impl StorageAdapter for MemoryStore {
    fn create_collection(&self, name: &str) -> Result<()> {
        self.collections()?.entry(name.to_string()).or_default();
        Ok(())
    }

    fn drop_collection(&self, name: &str) -> Result<bool> {
        Ok(self.collections()?.remove(name).is_some())
    }

    fn collection_exists(&self, name: &str) -> Result<bool> {
        Ok(self.collections()?.contains_key(name))
    }

    fn list_collections(&self, prefix: &str) -> Result<Vec<String>> {
        let g = self.collections()?;
        let mut out: Vec<String> = g.keys().filter(|n| n.starts_with(prefix)).cloned().collect();
        out.sort();
        Ok(out)
    }

    fn atomic_increment(&self, key: &str) -> Result<u64> {
        let mut g = self.records()?;
        let v = g.entry(key.to_string()).or_insert(0);
        *v += 1;
        Ok(*v)
    }

    fn compare_and_set(&self, key: &str, expect: Expect, new_value: u64) -> Result<bool> {
        let mut g = self.records()?;
        if !expect.holds(g.get(key).copied()) {
            return Ok(false);
        }
        g.insert(key.to_string(), new_value);
        Ok(true)
    }

    fn read(&self, key: &str) -> Result<Option<u64>> {
        Ok(self.records()?.get(key).copied())
    }

    fn write(&self, collection: &str, mut doc: Document) -> Result<Value> {
        let id = ensure_id(&mut doc);
        let mut g = self.collections()?;
        g.entry(collection.to_string())
            .or_default()
            .docs
            .insert(id_key(&id), doc);
        Ok(id)
    }

    fn query(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>> {
        let g = self.collections()?;
        Ok(match g.get(collection) {
            Some(c) => c
                .docs
                .values()
                .filter(|d| filter.matches(d))
                .cloned()
                .collect(),
            None => Vec::new(),
        })
    }

    fn delete(&self, collection: &str, filter: &Filter) -> Result<usize> {
        let mut g = self.collections()?;
        let c = match g.get_mut(collection) {
            Some(c) => c,
            None => return Ok(0),
        };
        let before = c.docs.len();
        c.docs.retain(|_, d| !filter.matches(d));
        Ok(before - c.docs.len())
    }

    fn create_index(&self, collection: &str, field: &str) -> Result<()> {
        let mut g = self.collections()?;
        g.entry(collection.to_string())
            .or_default()
            .indexes
            .insert(field.to_string());
        Ok(())
    }

    fn indexes(&self, collection: &str) -> Result<Vec<String>> {
        let g = self.collections()?;
        Ok(g.get(collection)
            .map(|c| c.indexes.iter().cloned().collect())
            .unwrap_or_default())
    }
}
