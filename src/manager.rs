//! Snapshots facade: the caller-facing surface.
//!
//! `create` = sequence → build → publish → collect. Readers call `latest` /
//! `open` at any time; neither waits for a build in progress. The facade is
//! cheap to clone and safe to share across threads.

use log::{info, warn};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::build::{BuildContext, BuildCoordinator, Builder, Committed};
use crate::catalog::{Catalog, GenerationRecord, GenerationState};
use crate::config::{SnapConfig, SnapshotsBuilder};
use crate::errors::{Result, SnapError};
use crate::handle::SnapshotHandle;
use crate::naming::NameResolver;
use crate::registry::{PublicationRegistry, PublishOutcome};
use crate::retention::{RetentionCollector, RetentionReport};
use crate::sequencer::GenerationSequencer;
use crate::storage::StorageAdapter;

/// Outcome of one `create` call.
#[derive(Debug, Clone)]
pub struct CreateReport {
    pub family: String,
    pub generation: u64,
    pub outcome: PublishOutcome,
    pub collections: Vec<String>,
    /// None when retention did not run or failed (failures are logged, never fatal).
    pub retention: Option<RetentionReport>,
}

/// Summary of one family for status/inspection.
#[derive(Debug, Clone, Serialize)]
pub struct FamilyStatus {
    pub family: String,
    pub current: Option<u64>,
    pub last_allocated: u64,
    pub retention: usize,
    pub generations: Vec<GenerationRecord>,
}

struct Inner {
    store: Arc<dyn StorageAdapter>,
    cfg: SnapConfig,
    names: NameResolver,
    sequencer: GenerationSequencer,
    catalog: Catalog,
    coordinator: BuildCoordinator,
    registry: PublicationRegistry,
    collector: RetentionCollector,
}

#[derive(Clone)]
pub struct Snapshots {
    inner: Arc<Inner>,
}

impl Snapshots {
    pub fn new(store: Arc<dyn StorageAdapter>, cfg: SnapConfig) -> Result<Self> {
        let names = NameResolver::new(&cfg.namespace)?;
        let catalog = Catalog::new(store.clone(), names.clone());
        let sequencer = GenerationSequencer::new(store.clone(), names.clone());
        let coordinator = BuildCoordinator::new(store.clone(), names.clone(), catalog.clone());
        let registry = PublicationRegistry::new(store.clone(), names.clone(), catalog.clone());
        let collector = RetentionCollector::new(
            store.clone(),
            names.clone(),
            catalog.clone(),
            registry.clone(),
        );
        Ok(Self {
            inner: Arc::new(Inner {
                store,
                cfg,
                names,
                sequencer,
                catalog,
                coordinator,
                registry,
                collector,
            }),
        })
    }

    pub fn builder() -> SnapshotsBuilder {
        SnapshotsBuilder::new()
    }

    pub fn config(&self) -> &SnapConfig {
        &self.inner.cfg
    }

    pub fn names(&self) -> &NameResolver {
        &self.inner.names
    }

    pub fn store(&self) -> Arc<dyn StorageAdapter> {
        self.inner.store.clone()
    }

    /// Build a new generation of `family` and publish it.
    ///
    /// Sequencing, build and publish failures abort the call. Losing the
    /// publish race is reported as `PublishOutcome::Superseded`. Retention
    /// runs after a successful publish and never fails the call.
    pub fn create(&self, family: &str, builder: &dyn Builder) -> Result<CreateReport> {
        let committed = self.build(family, builder)?;
        let generation = committed.generation;
        let outcome = self.publish(family, generation)?;

        let mut retention = None;
        if outcome.is_published() && self.inner.cfg.collect_on_publish {
            match self.collect(family) {
                Ok(r) => retention = Some(r),
                Err(e) => warn!(
                    "create: family='{}' retention after gen={} failed (ignored): {}",
                    family, generation, e
                ),
            }
        }

        Ok(CreateReport {
            family: family.to_string(),
            generation,
            outcome,
            collections: committed.collections,
            retention,
        })
    }

    /// `create` with a closure hook.
    pub fn create_with<F>(&self, family: &str, hook: F) -> Result<CreateReport>
    where
        F: Fn(&mut BuildContext) -> anyhow::Result<()> + Send + Sync,
    {
        self.create(family, &hook)
    }

    /// Run `create` on a background thread.
    pub fn spawn_create<B>(&self, family: &str, builder: B) -> Result<JoinHandle<Result<CreateReport>>>
    where
        B: Builder + 'static,
    {
        let this = self.clone();
        let family = family.to_string();
        let handle = std::thread::Builder::new()
            .name(format!("snapgen-build-{}", family))
            .spawn(move || this.create(&family, &builder))?;
        Ok(handle)
    }

    /// Allocate a generation and run the build, without publishing it.
    pub fn build(&self, family: &str, builder: &dyn Builder) -> Result<Committed> {
        let generation = self.inner.sequencer.next(family)?;
        info!("create: family='{}' building generation {}", family, generation);
        self.inner.coordinator.run_build(family, generation, builder)
    }

    /// Compare-and-advance the family pointer to a committed generation.
    pub fn publish(&self, family: &str, generation: u64) -> Result<PublishOutcome> {
        self.inner.registry.publish(family, generation)
    }

    pub fn current(&self, family: &str) -> Result<Option<u64>> {
        self.inner.registry.current(family)
    }

    /// Handle bound to the currently published generation.
    pub fn latest(&self, family: &str) -> Result<SnapshotHandle> {
        self.open_at(family, None)
    }

    /// Handle pinned to a specific generation, when still retained.
    pub fn open(&self, family: &str, generation: u64) -> Result<SnapshotHandle> {
        self.open_at(family, Some(generation))
    }

    /// `generation = None` resolves to the published generation.
    pub fn open_at(&self, family: &str, generation: Option<u64>) -> Result<SnapshotHandle> {
        let generation = match generation {
            Some(g) => {
                self.ensure_available(family, g)?;
                g
            }
            None => self
                .current(family)?
                .ok_or_else(|| SnapError::NoPublishedSnapshot {
                    family: family.to_string(),
                })?,
        };
        Ok(SnapshotHandle::new(
            self.inner.store.clone(),
            self.inner.names.clone(),
            family,
            generation,
        ))
    }

    /// A pinned generation is readable only while committed and complete:
    /// every collection it recorded at commit time must still exist.
    fn ensure_available(&self, family: &str, generation: u64) -> Result<()> {
        let unavailable = || SnapError::GenerationNotAvailable {
            family: family.to_string(),
            generation,
        };
        let rec = match self.inner.catalog.get(family, generation)? {
            Some(rec) if rec.state == GenerationState::Committed => rec,
            _ => return Err(unavailable()),
        };
        let default_name = self
            .inner
            .names
            .physical_name(family, generation, None)?;
        if !self.inner.store.collection_exists(&default_name)? {
            return Err(unavailable());
        }
        for name in &rec.collections {
            if !self.inner.store.collection_exists(name)? {
                return Err(unavailable());
            }
        }
        Ok(())
    }

    /// One retention pass for `family` with its configured window.
    pub fn collect(&self, family: &str) -> Result<RetentionReport> {
        let keep = self.inner.cfg.retention_for(family);
        self.inner.collector.collect(family, keep)
    }

    /// Retention pass over every known family (orphan cleanup).
    /// A family whose pass fails is logged and skipped.
    pub fn sweep(&self) -> Result<Vec<RetentionReport>> {
        let mut out = Vec::new();
        for family in self.families()? {
            match self.collect(&family) {
                Ok(r) => out.push(r),
                Err(e) => warn!("sweep: family='{}' skipped: {}", family, e),
            }
        }
        Ok(out)
    }

    /// Families known to the catalog or present on storage, sorted.
    pub fn families(&self) -> Result<Vec<String>> {
        let mut set: BTreeSet<String> = self.inner.catalog.families()?;
        let prefix = self.inner.names.namespace_prefix();
        for name in self.inner.store.list_collections(&prefix)? {
            if let Some(p) = self.inner.names.parse(&name) {
                set.insert(p.family);
            }
        }
        Ok(set.into_iter().collect())
    }

    pub fn status(&self, family: &str) -> Result<FamilyStatus> {
        Ok(FamilyStatus {
            family: family.to_string(),
            current: self.current(family)?,
            last_allocated: self.inner.sequencer.peek(family)?,
            retention: self.inner.cfg.retention_for(family),
            generations: self.inner.catalog.list(family)?,
        })
    }
}
