//! Retention collector: drops generations outside the retention window.
//!
//! Retain set for a family with published generation `c` and window `K`:
//!   {g | g ≥ max(0, c − (K − 1))} ∪ {c}
//! minus orphans that can never become visible:
//! - generations recorded as `failed`, at any id;
//! - generations below `c` with no catalog record.
//!
//! A `building` generation is only reclaimed once it falls below the floor;
//! its build then fails at commit time (`Catalog::mark_committed` refuses a
//! vanished record), so a partly dropped generation never becomes readable.
//! `c` itself is excluded from the drop set before any drop is attempted.
//! Individual drop failures are logged and reported, never fatal: the
//! generation simply stays on storage until the next pass.

use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::catalog::{Catalog, GenerationState};
use crate::errors::{Result, SnapError};
use crate::metrics::{record_generation_dropped, record_retention_failure, record_retention_run};
use crate::naming::NameResolver;
use crate::registry::PublicationRegistry;
use crate::storage::StorageAdapter;

/// One collection (or catalog record) that could not be removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionFailure {
    pub generation: u64,
    pub target: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionReport {
    pub family: String,
    pub current: Option<u64>,
    pub floor: u64,
    pub retained: Vec<u64>,
    pub dropped: Vec<u64>,
    pub failures: Vec<RetentionFailure>,
}

impl RetentionReport {
    /// `RetentionPartialFailure`: some drops failed and will be retried.
    pub fn is_partial_failure(&self) -> bool {
        !self.failures.is_empty()
    }
}

#[derive(Default)]
struct Observed {
    collections: BTreeSet<String>,
    state: Option<GenerationState>,
}

#[derive(Clone)]
pub struct RetentionCollector {
    store: Arc<dyn StorageAdapter>,
    names: NameResolver,
    catalog: Catalog,
    registry: PublicationRegistry,
}

impl RetentionCollector {
    pub fn new(
        store: Arc<dyn StorageAdapter>,
        names: NameResolver,
        catalog: Catalog,
        registry: PublicationRegistry,
    ) -> Self {
        Self {
            store,
            names,
            catalog,
            registry,
        }
    }

    /// Run one collection pass for `family` with window `keep` (K ≥ 1).
    pub fn collect(&self, family: &str, keep: usize) -> Result<RetentionReport> {
        if keep == 0 {
            return Err(SnapError::invalid("retention window must be ≥ 1"));
        }
        record_retention_run();

        // pointer first: anything published later is > current and thus retained
        let current = self.registry.current(family)?;
        let observed = self.observe(family)?;

        let floor = current
            .map(|c| c.saturating_sub(keep as u64 - 1))
            .unwrap_or(0);
        let mut report = RetentionReport {
            family: family.to_string(),
            current,
            floor,
            ..Default::default()
        };

        for (generation, obs) in observed {
            if !is_droppable(generation, obs.state, current, floor) {
                report.retained.push(generation);
                continue;
            }
            if self.drop_generation(family, generation, &obs, &mut report.failures) {
                report.dropped.push(generation);
            } else {
                report.retained.push(generation);
            }
        }

        if report.dropped.is_empty() && report.failures.is_empty() {
            debug!(
                "retention: family='{}' nothing to drop (current={:?}, floor={})",
                family, current, floor
            );
        } else {
            info!(
                "retention: family='{}' current={:?} floor={} dropped={:?} failures={}",
                family,
                current,
                floor,
                report.dropped,
                report.failures.len()
            );
        }
        Ok(report)
    }

    /// Generations of `family` seen on storage or in the catalog.
    fn observe(&self, family: &str) -> Result<BTreeMap<u64, Observed>> {
        let mut out: BTreeMap<u64, Observed> = BTreeMap::new();

        let prefix = self.names.family_prefix(family)?;
        for name in self.store.list_collections(&prefix)? {
            match self.names.parse(&name) {
                Some(p) if p.family == family => {
                    out.entry(p.generation).or_default().collections.insert(name);
                }
                _ => {}
            }
        }

        for rec in self.catalog.list(family)? {
            let obs = out.entry(rec.generation).or_default();
            obs.state = Some(rec.state);
            obs.collections.extend(rec.collections);
        }
        Ok(out)
    }

    /// Drop all collections of one generation, then its catalog record.
    /// Returns true when nothing of it is left.
    fn drop_generation(
        &self,
        family: &str,
        generation: u64,
        obs: &Observed,
        failures: &mut Vec<RetentionFailure>,
    ) -> bool {
        let mut ok = true;
        let mut dropped = 0usize;
        for name in &obs.collections {
            match self.store.drop_collection(name) {
                Ok(_) => dropped += 1,
                Err(e) => {
                    ok = false;
                    record_retention_failure();
                    warn!(
                        "retention: family='{}' gen={} drop {} failed (will retry): {}",
                        family, generation, name, e
                    );
                    failures.push(RetentionFailure {
                        generation,
                        target: name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        if !ok {
            return false;
        }
        if obs.state.is_some() {
            if let Err(e) = self.catalog.remove(family, generation) {
                record_retention_failure();
                warn!(
                    "retention: family='{}' gen={} catalog cleanup failed (will retry): {}",
                    family, generation, e
                );
                failures.push(RetentionFailure {
                    generation,
                    target: self.names.catalog_collection(),
                    error: e.to_string(),
                });
                return false;
            }
        }
        record_generation_dropped(dropped);
        debug!(
            "retention: family='{}' gen={} dropped ({} collection(s))",
            family, generation, dropped
        );
        true
    }
}

/// Drop decision for one generation. The published generation is never droppable.
pub(crate) fn is_droppable(
    generation: u64,
    state: Option<GenerationState>,
    current: Option<u64>,
    floor: u64,
) -> bool {
    if current == Some(generation) {
        return false;
    }
    if state == Some(GenerationState::Failed) {
        return true;
    }
    let c = match current {
        Some(c) => c,
        None => return false,
    };
    if generation < floor {
        return true;
    }
    generation < c && state.is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use GenerationState::*;

    #[test]
    fn published_generation_is_never_droppable() {
        for state in [None, Some(Building), Some(Committed), Some(Failed)] {
            for g in 1..20u64 {
                assert!(!is_droppable(g, state, Some(g), g));
                assert!(!is_droppable(g, state, Some(g), g + 5));
            }
        }
    }

    #[test]
    fn window_and_orphans() {
        // current = 5, K = 2 -> floor = 4
        assert!(is_droppable(3, Some(Committed), Some(5), 4));
        assert!(is_droppable(3, Some(Building), Some(5), 4));
        assert!(!is_droppable(4, Some(Committed), Some(5), 4));
        // still building inside the window: its hook may be writing right now
        assert!(!is_droppable(4, Some(Building), Some(5), 4));
        assert!(is_droppable(4, None, Some(5), 4));
        assert!(!is_droppable(6, Some(Building), Some(5), 4));
        assert!(!is_droppable(6, None, Some(5), 4));
        assert!(is_droppable(6, Some(Failed), Some(5), 4));
    }

    #[test]
    fn nothing_published_only_failed_go() {
        assert!(!is_droppable(1, Some(Committed), None, 0));
        assert!(!is_droppable(1, Some(Building), None, 0));
        assert!(is_droppable(1, Some(Failed), None, 0));
    }
}
