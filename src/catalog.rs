//! Generation catalog: one record per (family, generation) in the reserved
//! `<ns>.$catalog` collection.
//!
//! Формат записи (JSON):
//! {"_id":"snap.daily.g3","family":"daily","generation":3,"state":"committed",
//!  "collections":["snap.daily.g3","snap.daily.g3.by_region"],
//!  "started_unix_ms":..., "finished_unix_ms":..., "error":null}
//!
//! The catalog is the durable "committed" marker the registry checks before
//! publishing, and the tracked list of allocated ids the retention collector
//! merges with the storage listing.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::errors::{Result, SnapError};
use crate::naming::NameResolver;
use crate::storage::{Document, Filter, StorageAdapter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationState {
    Building,
    Committed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub family: String,
    pub generation: u64,
    pub state: GenerationState,
    #[serde(default)]
    pub collections: Vec<String>,
    pub started_unix_ms: u64,
    #[serde(default)]
    pub finished_unix_ms: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct Catalog {
    store: Arc<dyn StorageAdapter>,
    names: NameResolver,
}

impl Catalog {
    pub fn new(store: Arc<dyn StorageAdapter>, names: NameResolver) -> Self {
        Self { store, names }
    }

    fn collection(&self) -> String {
        self.names.catalog_collection()
    }

    fn put(&self, rec: &GenerationRecord) -> Result<()> {
        let doc = match serde_json::to_value(rec)? {
            Value::Object(m) => m,
            _ => return Err(SnapError::corrupted("catalog record", "not an object")),
        };
        self.store.write(&self.collection(), doc)?;
        Ok(())
    }

    pub fn mark_building(&self, family: &str, generation: u64) -> Result<GenerationRecord> {
        let rec = GenerationRecord {
            id: self.names.generation_prefix(family, generation)?,
            family: family.to_string(),
            generation,
            state: GenerationState::Building,
            collections: Vec::new(),
            started_unix_ms: now_unix_ms(),
            finished_unix_ms: None,
            error: None,
        };
        self.put(&rec)?;
        Ok(rec)
    }

    /// Building -> committed. Returns None, writing nothing, when the record
    /// is gone or no longer `building` (reclaimed by retention mid-build).
    pub fn mark_committed(
        &self,
        family: &str,
        generation: u64,
        collections: Vec<String>,
    ) -> Result<Option<GenerationRecord>> {
        let mut rec = match self.get(family, generation)? {
            Some(r) if r.state == GenerationState::Building => r,
            _ => return Ok(None),
        };
        rec.state = GenerationState::Committed;
        rec.collections = collections;
        rec.finished_unix_ms = Some(now_unix_ms());
        rec.error = None;
        self.put(&rec)?;
        Ok(Some(rec))
    }

    pub fn mark_failed(
        &self,
        family: &str,
        generation: u64,
        collections: Vec<String>,
        error: &str,
    ) -> Result<GenerationRecord> {
        let mut rec = self.get_or_new(family, generation)?;
        rec.state = GenerationState::Failed;
        rec.collections = collections;
        rec.finished_unix_ms = Some(now_unix_ms());
        rec.error = Some(error.to_string());
        self.put(&rec)?;
        Ok(rec)
    }

    pub fn get(&self, family: &str, generation: u64) -> Result<Option<GenerationRecord>> {
        let id = self.names.generation_prefix(family, generation)?;
        let docs = self.store.query(&self.collection(), &Filter::by_id(id))?;
        match docs.into_iter().next() {
            Some(doc) => Ok(Some(decode(doc)?)),
            None => Ok(None),
        }
    }

    /// Records of `family`, ordered by generation.
    pub fn list(&self, family: &str) -> Result<Vec<GenerationRecord>> {
        let docs = self
            .store
            .query(&self.collection(), &Filter::eq("family", family))?;
        let mut out = docs.into_iter().map(decode).collect::<Result<Vec<_>>>()?;
        out.sort_by_key(|r| r.generation);
        Ok(out)
    }

    /// Distinct family names with at least one record.
    pub fn families(&self) -> Result<BTreeSet<String>> {
        let docs = self.store.query(&self.collection(), &Filter::all())?;
        let mut out = BTreeSet::new();
        for d in docs {
            if let Some(Value::String(f)) = d.get("family") {
                out.insert(f.clone());
            }
        }
        Ok(out)
    }

    pub fn remove(&self, family: &str, generation: u64) -> Result<bool> {
        let id = self.names.generation_prefix(family, generation)?;
        Ok(self.store.delete(&self.collection(), &Filter::by_id(id))? > 0)
    }

    fn get_or_new(&self, family: &str, generation: u64) -> Result<GenerationRecord> {
        match self.get(family, generation)? {
            Some(r) => Ok(r),
            None => Ok(GenerationRecord {
                id: self.names.generation_prefix(family, generation)?,
                family: family.to_string(),
                generation,
                state: GenerationState::Building,
                collections: Vec::new(),
                started_unix_ms: now_unix_ms(),
                finished_unix_ms: None,
                error: None,
            }),
        }
    }
}

fn decode(doc: Document) -> Result<GenerationRecord> {
    serde_json::from_value(Value::Object(doc))
        .map_err(|e| SnapError::corrupted("catalog record", e.to_string()))
}

pub(crate) fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn lifecycle_transitions() {
        let cat = Catalog::new(Arc::new(MemoryStore::new()), NameResolver::default());
        cat.mark_building("f", 1).unwrap();
        assert_eq!(cat.get("f", 1).unwrap().unwrap().state, GenerationState::Building);

        let rec = cat
            .mark_committed("f", 1, vec!["snap.f.g1".to_string()])
            .unwrap()
            .expect("building record commits");
        assert_eq!(rec.state, GenerationState::Committed);
        assert!(rec.finished_unix_ms.is_some());
        // only building -> committed
        assert!(cat.mark_committed("f", 1, Vec::new()).unwrap().is_none());
        assert!(cat.mark_committed("f", 9, Vec::new()).unwrap().is_none());
        assert!(cat.get("f", 9).unwrap().is_none());

        cat.mark_building("f", 2).unwrap();
        cat.mark_failed("f", 2, Vec::new(), "boom").unwrap();
        cat.mark_building("g", 1).unwrap();

        let list = cat.list("f").unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].error.as_deref(), Some("boom"));
        assert_eq!(cat.families().unwrap().into_iter().collect::<Vec<_>>(), vec!["f", "g"]);

        assert!(cat.remove("f", 2).unwrap());
        assert!(!cat.remove("f", 2).unwrap());
        assert!(cat.get("f", 2).unwrap().is_none());
    }
}
