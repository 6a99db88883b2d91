//! Snapshot handle: read-only view bound by value to one generation.
//!
//! Once resolved, the generation never changes, even if a newer one is
//! published while the handle is in use. No write operation is exposed.

use std::sync::Arc;

use crate::errors::Result;
use crate::naming::NameResolver;
use crate::storage::{Document, Filter, StorageAdapter};

#[derive(Clone)]
pub struct SnapshotHandle {
    store: Arc<dyn StorageAdapter>,
    names: NameResolver,
    family: String,
    generation: u64,
}

impl std::fmt::Debug for SnapshotHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotHandle")
            .field("family", &self.family)
            .field("generation", &self.generation)
            .finish()
    }
}

impl SnapshotHandle {
    pub(crate) fn new(
        store: Arc<dyn StorageAdapter>,
        names: NameResolver,
        family: &str,
        generation: u64,
    ) -> Self {
        Self {
            store,
            names,
            family: family.to_string(),
            generation,
        }
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Named subcollection of this generation.
    pub fn subcollection(&self, name: &str) -> Result<ReadCollection> {
        self.bind(Some(name))
    }

    /// The default (unnamed) subcollection.
    pub fn default_collection(&self) -> Result<ReadCollection> {
        self.bind(None)
    }

    /// Names of the named subcollections present on storage, sorted.
    pub fn subcollections(&self) -> Result<Vec<String>> {
        let prefix = self
            .names
            .generation_prefix(&self.family, self.generation)?;
        let mut out = Vec::new();
        for name in self.store.list_collections(&prefix)? {
            if let Some(p) = self.names.parse(&name) {
                if p.family == self.family && p.generation == self.generation {
                    if let Some(sub) = p.subname {
                        out.push(sub);
                    }
                }
            }
        }
        Ok(out)
    }

    fn bind(&self, subname: Option<&str>) -> Result<ReadCollection> {
        let name = self
            .names
            .physical_name(&self.family, self.generation, subname)?;
        Ok(ReadCollection {
            store: self.store.clone(),
            name,
        })
    }
}

/// Queryable, read-only subcollection of one generation.
#[derive(Clone)]
pub struct ReadCollection {
    store: Arc<dyn StorageAdapter>,
    name: String,
}

impl ReadCollection {
    pub fn physical_name(&self) -> &str {
        &self.name
    }

    pub fn exists(&self) -> Result<bool> {
        self.store.collection_exists(&self.name)
    }

    pub fn find(&self, filter: &Filter) -> Result<Vec<Document>> {
        self.store.query(&self.name, filter)
    }

    pub fn find_one(&self, filter: &Filter) -> Result<Option<Document>> {
        Ok(self.find(filter)?.into_iter().next())
    }

    pub fn all(&self) -> Result<Vec<Document>> {
        self.find(&Filter::all())
    }

    pub fn count(&self, filter: &Filter) -> Result<usize> {
        Ok(self.find(filter)?.len())
    }

    pub fn indexes(&self) -> Result<Vec<String>> {
        self.store.indexes(&self.name)
    }
}
