//! Общие константы (namespace, record files, catalog, defaults).

// -------- Namespace / naming --------
pub const DEFAULT_NAMESPACE: &str = "snap";
/// Separator between name components. Never produced by escaping.
pub const NAME_SEP: char = '.';
/// Generation component marker: `<ns>.<family>.g<N>`.
pub const GEN_MARKER: char = 'g';
/// Reserved catalog component. `$` is always escaped inside family names.
pub const CATALOG_COMPONENT: &str = "$catalog";

// -------- Record keys (counters / pointers) --------
pub const COUNTER_KEY_PREFIX: &str = "seq";
pub const POINTER_KEY_PREFIX: &str = "pub";

// -------- Retention --------
pub const DEFAULT_RETENTION: usize = 2;

// -------- FsStore layout --------
pub const LOCK_FILE: &str = "LOCK";
pub const COLLECTIONS_DIR: &str = "collections";
pub const RECORDS_DIR: &str = "records";
pub const INDEXES_FILE: &str = ".indexes.json";
/// Prefix of a dropped collection directory awaiting removal.
pub const TRASH_PREFIX: &str = ".trash-";
pub const DOC_EXT: &str = "json";
pub const RECORD_EXT: &str = "rec";

// Record file: [magic8][value u64 LE][crc32 u32 LE] = 20 bytes
pub const RECORD_MAGIC: &[u8; 8] = b"SGREC1\0\0";
pub const RECORD_SIZE: usize = 20;

// -------- Documents --------
pub const ID_FIELD: &str = "_id";
