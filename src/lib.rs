//! snapgen: generation-based snapshot publication and retention over a
//! shared document store.
//!
//! Readers always see one fully built generation of a view; rebuilds write
//! into fresh, not-yet-published generations, publication is a forward-only
//! compare-and-advance, and old generations are reclaimed by a retention pass.

// Базовые модули
pub mod consts;
pub mod errors;
pub mod config;
pub mod metrics;
pub mod lock;

// Storage adapter (trait + MemoryStore + FsStore)
pub mod storage;

// Ядро: naming -> sequencer -> catalog -> build -> registry -> retention -> handle
pub mod naming;
pub mod sequencer;
pub mod catalog;
pub mod build;
pub mod registry;
pub mod retention;
pub mod handle;
pub mod manager;

// Удобные реэкспорты
pub use build::{BuildContext, Builder, Committed, WriteCollection};
pub use catalog::{GenerationRecord, GenerationState};
pub use config::{SnapConfig, SnapshotsBuilder};
pub use errors::{ErrorKind, Result, SnapError};
pub use handle::{ReadCollection, SnapshotHandle};
pub use manager::{CreateReport, FamilyStatus, Snapshots};
pub use naming::{NameResolver, PhysicalName};
pub use registry::PublishOutcome;
pub use retention::{RetentionFailure, RetentionReport};
pub use storage::{Document, Expect, Filter, FsStore, MemoryStore, StorageAdapter};
