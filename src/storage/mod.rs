//! Storage adapter: named collections of schemaless JSON documents plus
//! durable integer records (counters, pointers).
//!
//! Состав:
//! - `StorageAdapter`: the contract the snapshot core consumes.
//! - `MemoryStore`: in-process implementation (tests, single-process embedders).
//! - `FsStore`: durable directory-backed implementation with cross-process
//!   atomicity through an advisory file lock.
//!
//! Атомарность: every record operation (`atomic_increment`, `compare_and_set`)
//! is atomic on its own; the core never needs a multi-record transaction.

use serde_json::{Map, Value};

use crate::consts::ID_FIELD;
use crate::errors::Result;

mod fs;
mod memory;

pub use fs::FsStore;
pub use memory::MemoryStore;

/// A schemaless record. Documents are addressed by their `_id` field.
pub type Document = Map<String, Value>;

/// Condition of a single-record conditional update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// The record must not exist yet.
    Missing,
    /// The record must hold exactly this value.
    Equal(u64),
    /// The record must be absent or hold a value strictly below this one.
    Below(u64),
}

impl Expect {
    pub fn holds(&self, current: Option<u64>) -> bool {
        match (*self, current) {
            (Expect::Missing, None) => true,
            (Expect::Missing, Some(_)) => false,
            (Expect::Equal(v), Some(c)) => c == v,
            (Expect::Equal(_), None) => false,
            (Expect::Below(_), None) => true,
            (Expect::Below(v), Some(c)) => c < v,
        }
    }
}

/// Field-equality filter over top-level document fields.
/// An empty filter matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    eq: Vec<(String, Value)>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::default().and_eq(field, value)
    }

    pub fn by_id(id: impl Into<Value>) -> Self {
        Self::eq(ID_FIELD, id)
    }

    pub fn and_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.eq.push((field.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.eq.is_empty()
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.eq
            .iter()
            .all(|(field, want)| doc.get(field).map(|v| v == want).unwrap_or(false))
    }
}

/// The store contract consumed by the snapshot core.
///
/// Implementations must make each method atomic with respect to the single
/// collection/record it touches, across every client sharing the store.
pub trait StorageAdapter: Send + Sync {
    /// Create a collection; creating an existing one is a no-op.
    fn create_collection(&self, name: &str) -> Result<()>;

    /// Drop a collection with all its documents. Returns false if it did not exist.
    fn drop_collection(&self, name: &str) -> Result<bool>;

    fn collection_exists(&self, name: &str) -> Result<bool>;

    /// Names of all collections starting with `prefix`, sorted.
    fn list_collections(&self, prefix: &str) -> Result<Vec<String>>;

    /// Atomically increment the counter `key` (absent = 0) and return the new value.
    fn atomic_increment(&self, key: &str) -> Result<u64>;

    /// Atomically set `key` to `new_value` iff `expect` holds. Returns whether it was set.
    fn compare_and_set(&self, key: &str, expect: Expect, new_value: u64) -> Result<bool>;

    /// Read a counter/pointer record.
    fn read(&self, key: &str) -> Result<Option<u64>>;

    /// Upsert a document by its `_id` (assigned if missing). Returns the `_id`.
    /// Writing into a missing collection creates it.
    fn write(&self, collection: &str, doc: Document) -> Result<Value>;

    /// All documents of `collection` matching `filter`, ordered by the canonical JSON of `_id`.
    /// A missing collection yields an empty result.
    fn query(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>>;

    /// Delete matching documents; returns how many were removed.
    fn delete(&self, collection: &str, filter: &Filter) -> Result<usize>;

    /// Declare a secondary index on `field`. Declaring it twice is a no-op.
    fn create_index(&self, collection: &str, field: &str) -> Result<()>;

    /// Declared index fields of `collection`.
    fn indexes(&self, collection: &str) -> Result<Vec<String>>;
}

/// Ensure `doc` carries an `_id`; generate a random one otherwise.
pub(crate) fn ensure_id(doc: &mut Document) -> Value {
    if let Some(id) = doc.get(ID_FIELD) {
        if !id.is_null() {
            return id.clone();
        }
    }
    let id = Value::String(generate_doc_id());
    doc.insert(ID_FIELD.to_string(), id.clone());
    id
}

/// Stable textual key of an `_id` value: its canonical JSON form, so `42`
/// and `"42"` stay distinct documents.
pub(crate) fn id_key(id: &Value) -> String {
    id.to_string()
}

/// Случайный id документа (hex, 24 символа).
pub fn generate_doc_id() -> String {
    use rand::RngCore;
    let mut buf = [0u8; 12];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    let mut out = String::with_capacity(24);
    for b in buf {
        out.push_str(&format!("{:02x}", b));
    }
    out
}
