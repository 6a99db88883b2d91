//! Build coordinator: runs a caller-supplied hook against one freshly
//! allocated generation.
//!
//! The hook receives a `BuildContext` that can only open subcollections of
//! its own (family, generation); physical names always come from the
//! `NameResolver`. On failure the coordinator does not clean up: the
//! generation is left orphaned for the retention collector.

use anyhow::anyhow;
use log::{debug, warn};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::errors::{Result, SnapError};
use crate::metrics::{record_build_committed, record_build_failed, record_document_written};
use crate::naming::NameResolver;
use crate::storage::{Document, StorageAdapter};

/// The population logic of a snapshot family.
///
/// Implemented for closures `Fn(&mut BuildContext) -> anyhow::Result<()>`.
pub trait Builder: Send + Sync {
    fn run(&self, ctx: &mut BuildContext) -> anyhow::Result<()>;
}

impl<F> Builder for F
where
    F: Fn(&mut BuildContext) -> anyhow::Result<()> + Send + Sync,
{
    fn run(&self, ctx: &mut BuildContext) -> anyhow::Result<()> {
        self(ctx)
    }
}

/// Write capability scoped to one (family, generation).
pub struct BuildContext {
    store: Arc<dyn StorageAdapter>,
    names: NameResolver,
    family: String,
    generation: u64,
    // subname (None = default) -> physical name
    opened: BTreeMap<Option<String>, String>,
}

impl BuildContext {
    fn new(
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
            opened: BTreeMap::new(),
        }
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Open (creating if needed) the named subcollection of this generation.
    pub fn collection(&mut self, name: &str) -> Result<WriteCollection> {
        self.open(Some(name))
    }

    /// Open the default (unnamed) subcollection of this generation.
    pub fn default_collection(&mut self) -> Result<WriteCollection> {
        self.open(None)
    }

    /// Insert into the default subcollection.
    pub fn insert(&mut self, doc: Document) -> Result<Value> {
        self.default_collection()?.insert(doc)
    }

    /// Same as `insert`: writes are upserts by `_id`.
    pub fn upsert(&mut self, doc: Document) -> Result<Value> {
        self.insert(doc)
    }

    pub fn insert_many<I>(&mut self, docs: I) -> Result<usize>
    where
        I: IntoIterator<Item = Document>,
    {
        self.default_collection()?.insert_many(docs)
    }

    /// Declare an index on the default subcollection.
    pub fn create_index(&mut self, field: &str) -> Result<()> {
        self.default_collection()?.create_index(field)
    }

    /// Named subcollections opened so far, sorted.
    pub fn subcollections(&self) -> Vec<String> {
        self.opened.keys().filter_map(|k| k.clone()).collect()
    }

    /// Physical names opened so far, default subcollection first.
    pub fn physical_names(&self) -> Vec<String> {
        self.opened.values().cloned().collect()
    }

    fn open(&mut self, subname: Option<&str>) -> Result<WriteCollection> {
        let key = subname.map(str::to_string);
        let name = match self.opened.get(&key) {
            Some(n) => n.clone(),
            None => {
                let n = self
                    .names
                    .physical_name(&self.family, self.generation, subname)?;
                self.store.create_collection(&n)?;
                debug!("build: family='{}' gen={} opened {}", self.family, self.generation, n);
                self.opened.insert(key.clone(), n.clone());
                n
            }
        };
        Ok(WriteCollection {
            store: self.store.clone(),
            name,
            subname: key,
        })
    }
}

/// Writable subcollection handle handed out by a `BuildContext`.
#[derive(Clone)]
pub struct WriteCollection {
    store: Arc<dyn StorageAdapter>,
    name: String,
    subname: Option<String>,
}

impl WriteCollection {
    pub fn physical_name(&self) -> &str {
        &self.name
    }

    pub fn subname(&self) -> Option<&str> {
        self.subname.as_deref()
    }

    /// Upsert by `_id` (generated when missing).
    pub fn insert(&self, doc: Document) -> Result<Value> {
        let id = self.store.write(&self.name, doc)?;
        record_document_written();
        Ok(id)
    }

    pub fn upsert(&self, doc: Document) -> Result<Value> {
        self.insert(doc)
    }

    /// Insert a JSON value; it must be an object.
    pub fn insert_json(&self, value: Value) -> Result<Value> {
        match value {
            Value::Object(doc) => self.insert(doc),
            other => Err(SnapError::invalid(format!(
                "document must be a JSON object, got {}",
                other
            ))),
        }
    }

    pub fn insert_many<I>(&self, docs: I) -> Result<usize>
    where
        I: IntoIterator<Item = Document>,
    {
        let mut n = 0usize;
        for d in docs {
            self.insert(d)?;
            n += 1;
        }
        Ok(n)
    }

    pub fn create_index(&self, field: &str) -> Result<()> {
        self.store.create_index(&self.name, field)
    }
}

/// A generation whose hook returned successfully. Not yet visible to readers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    pub family: String,
    pub generation: u64,
    pub collections: Vec<String>,
}

#[derive(Clone)]
pub struct BuildCoordinator {
    store: Arc<dyn StorageAdapter>,
    names: NameResolver,
    catalog: Catalog,
}

impl BuildCoordinator {
    pub fn new(store: Arc<dyn StorageAdapter>, names: NameResolver, catalog: Catalog) -> Self {
        Self {
            store,
            names,
            catalog,
        }
    }

    /// Run `hook` for (family, generation). Hook failures become `BuildFailed`;
    /// the generation's collections are left in place.
    pub fn run_build(&self, family: &str, generation: u64, hook: &dyn Builder) -> Result<Committed> {
        self.catalog.mark_building(family, generation)?;

        let mut ctx = BuildContext::new(self.store.clone(), self.names.clone(), family, generation);
        // default subcollection always exists, even if the hook never writes to it
        ctx.default_collection()?;

        if let Err(err) = hook.run(&mut ctx) {
            return Err(self.fail(family, generation, &ctx, err));
        }

        let collections = ctx.physical_names();
        if self
            .catalog
            .mark_committed(family, generation, collections.clone())?
            .is_none()
        {
            // retention reclaimed the generation while the hook was writing
            let err = anyhow!("generation was reclaimed by retention during the build");
            return Err(self.fail(family, generation, &ctx, err));
        }
        record_build_committed();
        debug!(
            "build: family='{}' gen={} committed ({} collection(s))",
            family,
            generation,
            collections.len()
        );
        Ok(Committed {
            family: family.to_string(),
            generation,
            collections,
        })
    }

    fn fail(&self, family: &str, generation: u64, ctx: &BuildContext, err: anyhow::Error) -> SnapError {
        record_build_failed();
        warn!(
            "build: family='{}' gen={} failed: {:#}",
            family, generation, err
        );
        let msg = format!("{:#}", err);
        if let Err(e) = self
            .catalog
            .mark_failed(family, generation, ctx.physical_names(), &msg)
        {
            // запись не обязательна: retention всё равно уберёт поколение
            warn!("build: cannot mark gen={} failed: {}", generation, e);
        }
        SnapError::build_failed(family, generation, err)
    }
}
