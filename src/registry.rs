//! Publication registry: one pointer record per family holding the
//! reader-visible generation.
//!
//! The pointer only moves forward. `publish` is a single conditional update
//! (`Expect::Below(generation)`) on the pointer record, relying on the
//! store's per-record atomicity; there is no external lock.

use log::{info, warn};
use std::sync::Arc;

use crate::catalog::{Catalog, GenerationState};
use crate::errors::{Result, SnapError};
use crate::metrics::{record_publish, record_publish_superseded};
use crate::naming::NameResolver;
use crate::storage::{Expect, StorageAdapter};

/// Result of a publish attempt. `Superseded` is a normal outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Published(u64),
    /// A generation ≥ the candidate is already published.
    Superseded { current: u64 },
}

impl PublishOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, PublishOutcome::Published(_))
    }
}

#[derive(Clone)]
pub struct PublicationRegistry {
    store: Arc<dyn StorageAdapter>,
    names: NameResolver,
    catalog: Catalog,
}

impl PublicationRegistry {
    pub fn new(store: Arc<dyn StorageAdapter>, names: NameResolver, catalog: Catalog) -> Self {
        Self {
            store,
            names,
            catalog,
        }
    }

    /// Compare-and-advance the family pointer to `generation`.
    /// Only committed generations may be published.
    pub fn publish(&self, family: &str, generation: u64) -> Result<PublishOutcome> {
        let key = self.names.pointer_key(family)?;
        match self.catalog.get(family, generation)? {
            Some(rec) if rec.state == GenerationState::Committed => {}
            _ => {
                return Err(SnapError::NotCommitted {
                    family: family.to_string(),
                    generation,
                })
            }
        }

        if self
            .store
            .compare_and_set(&key, Expect::Below(generation), generation)?
        {
            record_publish();
            info!("publish: family='{}' now at generation {}", family, generation);
            return Ok(PublishOutcome::Published(generation));
        }

        // CAS проиграл: текущее значение уже ≥ generation
        let current = self.store.read(&key)?.unwrap_or(0);
        record_publish_superseded();
        warn!(
            "publish: family='{}' generation {} superseded by {}",
            family, generation, current
        );
        Ok(PublishOutcome::Superseded { current })
    }

    /// Currently published generation; None before the first publish.
    pub fn current(&self, family: &str) -> Result<Option<u64>> {
        let key = self.names.pointer_key(family)?;
        self.store.read(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::storage::MemoryStore;

    fn registry() -> (PublicationRegistry, Catalog) {
        let store = Arc::new(MemoryStore::new());
        let names = NameResolver::default();
        let catalog = Catalog::new(store.clone(), names.clone());
        (PublicationRegistry::new(store, names, catalog.clone()), catalog)
    }

    #[test]
    fn pointer_only_moves_forward() {
        let (reg, cat) = registry();
        for g in 1..=3 {
            cat.mark_building("f", g).unwrap();
            cat.mark_committed("f", g, Vec::new()).unwrap();
        }
        assert_eq!(reg.current("f").unwrap(), None);
        assert_eq!(reg.publish("f", 2).unwrap(), PublishOutcome::Published(2));
        assert_eq!(
            reg.publish("f", 1).unwrap(),
            PublishOutcome::Superseded { current: 2 }
        );
        // retry of the same publish is also superseded, not an error
        assert_eq!(
            reg.publish("f", 2).unwrap(),
            PublishOutcome::Superseded { current: 2 }
        );
        assert_eq!(reg.current("f").unwrap(), Some(2));
        assert!(reg.publish("f", 3).unwrap().is_published());
        assert_eq!(reg.current("f").unwrap(), Some(3));
    }

    #[test]
    fn uncommitted_generations_are_refused() {
        let (reg, cat) = registry();
        assert_eq!(reg.publish("f", 1).unwrap_err().kind(), ErrorKind::NotCommitted);
        cat.mark_building("f", 1).unwrap();
        assert_eq!(reg.publish("f", 1).unwrap_err().kind(), ErrorKind::NotCommitted);
        cat.mark_failed("f", 1, Vec::new(), "x").unwrap();
        assert_eq!(reg.publish("f", 1).unwrap_err().kind(), ErrorKind::NotCommitted);
        assert_eq!(reg.current("f").unwrap(), None);
    }
}
