//! Centralized configuration and builder for snapgen.
//!
//! Goals:
//! - Single place to collect tunables instead of scattering env lookups.
//! - `SnapConfig::from_env()` reads the SNAPGEN_* variables below.
//! - `SnapshotsBuilder` collects overrides and opens a `Snapshots` facade over
//!   an explicitly injected store (no global connection state).
//!
//! Env:
//! - SNAPGEN_NAMESPACE            physical-name namespace (default "snap")
//! - SNAPGEN_RETENTION            default window K (default 2, min 1)
//! - SNAPGEN_RETENTION_<family>   per-family K (family name taken verbatim)
//! - SNAPGEN_FSYNC                fsync files of FsStore before rename (default false)
//! - SNAPGEN_COLLECT_ON_PUBLISH   run retention after each publish (default true)

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::consts::{DEFAULT_NAMESPACE, DEFAULT_RETENTION};
use crate::errors::Result;
use crate::manager::Snapshots;
use crate::storage::StorageAdapter;

const RETENTION_OVERRIDE_PREFIX: &str = "SNAPGEN_RETENTION_";

fn parse_bool(v: &str) -> bool {
    let s = v.trim().to_ascii_lowercase();
    s == "1" || s == "true" || s == "yes" || s == "on"
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapConfig {
    /// Namespace prefix of every physical collection name.
    /// Env: SNAPGEN_NAMESPACE (default "snap")
    pub namespace: String,

    /// Default retention window K (number of most recent generations kept).
    /// Env: SNAPGEN_RETENTION (default 2)
    pub retention: usize,

    /// Per-family K overrides.
    /// Env: SNAPGEN_RETENTION_<family>
    pub retention_overrides: BTreeMap<String, usize>,

    /// Env: SNAPGEN_FSYNC (default false)
    pub fsync: bool,

    /// Env: SNAPGEN_COLLECT_ON_PUBLISH (default true)
    pub collect_on_publish: bool,
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            retention: DEFAULT_RETENTION,
            retention_overrides: BTreeMap::new(),
            fsync: false,
            collect_on_publish: true,
        }
    }
}

impl SnapConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("SNAPGEN_NAMESPACE") {
            let s = v.trim();
            if !s.is_empty() {
                cfg.namespace = s.to_string();
            }
        }

        if let Ok(v) = std::env::var("SNAPGEN_RETENTION") {
            if let Ok(n) = v.trim().parse::<usize>() {
                cfg.retention = n.max(1);
            }
        }

        for (k, v) in std::env::vars() {
            if let Some(family) = k.strip_prefix(RETENTION_OVERRIDE_PREFIX) {
                if family.is_empty() {
                    continue;
                }
                if let Ok(n) = v.trim().parse::<usize>() {
                    cfg.retention_overrides.insert(family.to_string(), n.max(1));
                }
            }
        }

        if let Ok(v) = std::env::var("SNAPGEN_FSYNC") {
            cfg.fsync = parse_bool(&v);
        }

        if let Ok(v) = std::env::var("SNAPGEN_COLLECT_ON_PUBLISH") {
            cfg.collect_on_publish = parse_bool(&v);
        }

        cfg
    }

    /// Effective window K for `family` (never below 1).
    pub fn retention_for(&self, family: &str) -> usize {
        self.retention_overrides
            .get(family)
            .copied()
            .unwrap_or(self.retention)
            .max(1)
    }

    pub fn with_namespace<S: Into<String>>(mut self, ns: S) -> Self {
        self.namespace = ns.into();
        self
    }

    pub fn with_retention(mut self, k: usize) -> Self {
        self.retention = k.max(1);
        self
    }

    pub fn with_family_retention<S: Into<String>>(mut self, family: S, k: usize) -> Self {
        self.retention_overrides.insert(family.into(), k.max(1));
        self
    }

    pub fn with_fsync(mut self, on: bool) -> Self {
        self.fsync = on;
        self
    }

    pub fn with_collect_on_publish(mut self, on: bool) -> Self {
        self.collect_on_publish = on;
        self
    }
}

impl fmt::Display for SnapConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let overrides: Vec<String> = self
            .retention_overrides
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        write!(
            f,
            "SnapConfig {{ \
             namespace: {}, \
             retention: {}, \
             retention_overrides: [{}], \
             fsync: {}, \
             collect_on_publish: {} \
             }}",
            self.namespace,
            self.retention,
            overrides.join(", "),
            self.fsync,
            self.collect_on_publish,
        )
    }
}

/// Fluent builder producing a configured `Snapshots` facade.
#[derive(Clone, Debug)]
pub struct SnapshotsBuilder {
    cfg: SnapConfig,
}

impl Default for SnapshotsBuilder {
    fn default() -> Self {
        // Start from env, then allow overrides.
        Self {
            cfg: SnapConfig::from_env(),
        }
    }
}

impl SnapshotsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a clean default (without reading env).
    pub fn from_default() -> Self {
        Self {
            cfg: SnapConfig::default(),
        }
    }

    pub fn namespace<S: Into<String>>(mut self, ns: S) -> Self {
        self.cfg.namespace = ns.into();
        self
    }

    pub fn retention(mut self, k: usize) -> Self {
        self.cfg.retention = k.max(1);
        self
    }

    pub fn family_retention<S: Into<String>>(mut self, family: S, k: usize) -> Self {
        self.cfg.retention_overrides.insert(family.into(), k.max(1));
        self
    }

    pub fn collect_on_publish(mut self, on: bool) -> Self {
        self.cfg.collect_on_publish = on;
        self
    }

    pub fn config(&self) -> &SnapConfig {
        &self.cfg
    }

    pub fn build(self) -> SnapConfig {
        self.cfg
    }

    /// Open the facade over `store`.
    pub fn open(self, store: Arc<dyn StorageAdapter>) -> Result<Snapshots> {
        Snapshots::new(store, self.cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retention_overrides_and_floor() {
        let cfg = SnapConfig::default()
            .with_retention(0)
            .with_family_retention("hourly", 5);
        assert_eq!(cfg.retention, 1);
        assert_eq!(cfg.retention_for("hourly"), 5);
        assert_eq!(cfg.retention_for("daily"), 1);
    }

    #[test]
    fn display_mentions_every_field() {
        let cfg = SnapConfig::default().with_family_retention("a", 3);
        let s = cfg.to_string();
        assert!(s.contains("namespace: snap"));
        assert!(s.contains("retention: 2"));
        assert!(s.contains("a=3"));
        assert!(s.contains("collect_on_publish: true"));
    }

    #[test]
    fn builder_from_default_ignores_env() {
        let cfg = SnapshotsBuilder::from_default()
            .namespace("views")
            .retention(4)
            .collect_on_publish(false)
            .build();
        assert_eq!(cfg.namespace, "views");
        assert_eq!(cfg.retention, 4);
        assert!(!cfg.collect_on_publish);
    }
}
