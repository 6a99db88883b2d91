//! Generation sequencer: strictly increasing ids per family.
//!
//! Ids come from the store's atomic increment on a durable counter record
//! (never client-side max+1), so concurrent callers and restarts cannot
//! observe a reused id.

use log::debug;
use std::sync::Arc;

use crate::errors::Result;
use crate::metrics::record_generation_allocated;
use crate::naming::NameResolver;
use crate::storage::StorageAdapter;

#[derive(Clone)]
pub struct GenerationSequencer {
    store: Arc<dyn StorageAdapter>,
    names: NameResolver,
}

impl GenerationSequencer {
    pub fn new(store: Arc<dyn StorageAdapter>, names: NameResolver) -> Self {
        Self { store, names }
    }

    /// Allocate the next generation id (≥ 1). A store failure allocates nothing.
    pub fn next(&self, family: &str) -> Result<u64> {
        let key = self.names.counter_key(family)?;
        let generation = self.store.atomic_increment(&key)?;
        record_generation_allocated();
        debug!("sequencer: family='{}' allocated generation {}", family, generation);
        Ok(generation)
    }

    /// Last allocated id (0 = none yet). Does not allocate.
    pub fn peek(&self, family: &str) -> Result<u64> {
        let key = self.names.counter_key(family)?;
        Ok(self.store.read(&key)?.unwrap_or(0))
    }
}
