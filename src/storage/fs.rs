//! Durable directory-backed store.
//!
//! Layout:
//!   <root>/LOCK                                   advisory lock (records, index metadata)
//!   <root>/collections/<enc name>/<sha256(id)>.json   one document per file
//!   <root>/collections/<enc name>/.indexes.json       declared index fields
//!   <root>/records/<enc key>.rec                  counter/pointer records
//!
//! Record file (20 байт): [magic8="SGREC1\0\0"][value u64 LE][crc32 u32 LE of first 16 bytes].
//!
//! Все записи выполняются через tmp+rename, так что читатель видит либо старый,
//! либо новый файл целиком. Drop of a collection renames its directory to a
//! hidden `.trash-<id>` name first, then removes it: readers never list a
//! half-deleted collection. Trash left behind by a failed removal is purged
//! on `open` and before every later drop.

use anyhow::{anyhow, Context};
use log::warn;
use byteorder::{ByteOrder, LittleEndian};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};

use super::{ensure_id, generate_doc_id, id_key, Document, Expect, Filter, StorageAdapter};
use crate::consts::{
    COLLECTIONS_DIR, DOC_EXT, INDEXES_FILE, RECORDS_DIR, RECORD_EXT, RECORD_MAGIC, RECORD_SIZE,
    TRASH_PREFIX,
};
use crate::errors::{Result, SnapError};
use crate::lock::{acquire_exclusive_lock, acquire_shared_lock};

pub struct FsStore {
    root: PathBuf,
    collections: PathBuf,
    records: PathBuf,
    fsync: bool,
}

impl FsStore {
    /// Open or create a store rooted at `root`.
    pub fn open(root: &Path) -> Result<Self> {
        Self::open_with_fsync(root, false)
    }

    /// Open with explicit durability: `fsync=true` syncs every file before rename.
    pub fn open_with_fsync(root: &Path, fsync: bool) -> Result<Self> {
        let collections = root.join(COLLECTIONS_DIR);
        let records = root.join(RECORDS_DIR);
        for d in [root, collections.as_path(), records.as_path()] {
            fs::create_dir_all(d)
                .with_context(|| format!("create {}", d.display()))
                .map_err(SnapError::storage_from)?;
        }
        let store = Self {
            root: root.to_path_buf(),
            collections,
            records,
            fsync,
        };
        store.purge_trash();
        Ok(store)
    }

    /// Best-effort removal of trash directories left by earlier drops.
    /// Returns how many were removed.
    pub fn purge_trash(&self) -> usize {
        let rd = match fs::read_dir(&self.collections) {
            Ok(rd) => rd,
            Err(e) => {
                warn!("fs store: cannot list {}: {}", self.collections.display(), e);
                return 0;
            }
        };
        let mut removed = 0usize;
        for entry in rd.flatten() {
            let name = entry.file_name();
            if !name.to_string_lossy().starts_with(TRASH_PREFIX) {
                continue;
            }
            match fs::remove_dir_all(entry.path()) {
                Ok(()) => removed += 1,
                // другой клиент уже дочистил
                Err(e) if e.kind() == IoErrorKind::NotFound => {}
                Err(e) => warn!(
                    "fs store: trash {} not removed (will retry): {}",
                    entry.path().display(),
                    e
                ),
            }
        }
        removed
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_dir(&self, name: &str) -> PathBuf {
        self.collections.join(encode_component(name))
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.records
            .join(format!("{}.{}", encode_component(key), RECORD_EXT))
    }

    fn doc_path(&self, collection: &str, id: &Value) -> PathBuf {
        self.collection_dir(collection)
            .join(format!("{}.{}", sha256_hex(id_key(id).as_bytes()), DOC_EXT))
    }

    /// Atomically replace `path` with `bytes` (tmp+rename in the same directory).
    fn replace_file(&self, path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
        let dir = path
            .parent()
            .ok_or_else(|| anyhow!("no parent dir for {}", path.display()))?;
        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow!("bad file name {}", path.display()))?;
        // уникальное имя tmp: параллельные писатели одного документа не мешают друг другу
        let tmp = dir.join(format!(".{}.tmp-{}", file_name, generate_doc_id()));
        {
            let mut f = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp)
                .with_context(|| format!("open {}", tmp.display()))?;
            f.write_all(bytes)
                .with_context(|| format!("write {}", tmp.display()))?;
            if self.fsync {
                f.sync_all()?;
            }
        }
        fs::rename(&tmp, path)
            .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
        Ok(())
    }

    fn read_record_file(&self, key: &str) -> Result<Option<u64>> {
        let path = self.record_path(key);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        decode_record(&bytes)
            .map(Some)
            .map_err(|msg| SnapError::corrupted(format!("record '{}'", key), msg))
    }

    fn write_record_file(&self, key: &str, value: u64) -> Result<()> {
        let path = self.record_path(key);
        self.replace_file(&path, &encode_record(value))
            .map_err(SnapError::storage_from)
    }

    fn read_indexes(&self, collection: &str) -> anyhow::Result<Vec<String>> {
        let path = self.collection_dir(collection).join(INDEXES_FILE);
        match fs::read(&path) {
            Ok(b) => serde_json::from_slice(&b).with_context(|| format!("parse {}", path.display())),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
        }
    }

    fn read_doc_file(&self, path: &Path) -> Result<Option<Document>> {
        let bytes = match fs::read(path) {
            Ok(b) => b,
            // удалён параллельно (drop/delete), просто пропускаем
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let doc: Document = serde_json::from_slice(&bytes).map_err(|e| {
            SnapError::corrupted(format!("document {}", path.display()), e.to_string())
        })?;
        Ok(Some(doc))
    }

    /// Documents of a collection directory (missing directory = empty).
    fn scan_docs(&self, collection: &str) -> Result<Vec<(PathBuf, Document)>> {
        let dir = self.collection_dir(collection);
        let rd = match fs::read_dir(&dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut out = Vec::new();
        for entry in rd {
            let entry = match entry {
                Ok(e) => e,
                Err(e) if e.kind() == IoErrorKind::NotFound => break,
                Err(e) => return Err(e.into()),
            };
            let path = entry.path();
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') || !name.ends_with(DOC_EXT) {
                continue;
            }
            if let Some(doc) = self.read_doc_file(&path)? {
                out.push((path, doc));
            }
        }
        Ok(out)
    }
}

impl StorageAdapter for FsStore {
    fn create_collection(&self, name: &str) -> Result<()> {
        let dir = self.collection_dir(name);
        fs::create_dir_all(&dir)
            .with_context(|| format!("create collection dir {}", dir.display()))
            .map_err(SnapError::storage_from)
    }

    fn drop_collection(&self, name: &str) -> Result<bool> {
        self.purge_trash();
        let dir = self.collection_dir(name);
        let trash = self
            .collections
            .join(format!("{}{}", TRASH_PREFIX, generate_doc_id()));
        match fs::rename(&dir, &trash) {
            Ok(()) => {}
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        }
        // коллекция уже не видна; хвост в trash доберёт purge_trash
        if let Err(e) = fs::remove_dir_all(&trash) {
            warn!(
                "fs store: drop {}: trash {} left for purge: {}",
                name,
                trash.display(),
                e
            );
        }
        Ok(true)
    }

    fn collection_exists(&self, name: &str) -> Result<bool> {
        Ok(self.collection_dir(name).is_dir())
    }

    fn list_collections(&self, prefix: &str) -> Result<Vec<String>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.collections)? {
            let entry = entry?;
            let raw = entry.file_name();
            let raw = raw.to_string_lossy();
            if raw.starts_with('.') {
                continue;
            }
            if let Some(name) = decode_component(&raw) {
                if name.starts_with(prefix) {
                    out.push(name);
                }
            }
        }
        out.sort();
        Ok(out)
    }

    fn atomic_increment(&self, key: &str) -> Result<u64> {
        let _lk = acquire_exclusive_lock(&self.root).map_err(SnapError::storage_from)?;
        let next = self.read_record_file(key)?.unwrap_or(0) + 1;
        self.write_record_file(key, next)?;
        Ok(next)
    }

    fn compare_and_set(&self, key: &str, expect: Expect, new_value: u64) -> Result<bool> {
        let _lk = acquire_exclusive_lock(&self.root).map_err(SnapError::storage_from)?;
        if !expect.holds(self.read_record_file(key)?) {
            return Ok(false);
        }
        self.write_record_file(key, new_value)?;
        Ok(true)
    }

    fn read(&self, key: &str) -> Result<Option<u64>> {
        // rename атомарен, но shared-lock даёт согласованность с read-modify-write
        let _lk = acquire_shared_lock(&self.root).map_err(SnapError::storage_from)?;
        self.read_record_file(key)
    }

    fn write(&self, collection: &str, mut doc: Document) -> Result<Value> {
        let id = ensure_id(&mut doc);
        self.create_collection(collection)?;
        let path = self.doc_path(collection, &id);
        let bytes = serde_json::to_vec(&doc)?;
        if let Err(e) = self.replace_file(&path, &bytes) {
            if self.collection_dir(collection).is_dir() {
                return Err(SnapError::storage_from(e));
            }
            // коллекцию удалили между create и rename: пересоздаём, как MemoryStore
            self.create_collection(collection)?;
            self.replace_file(&path, &bytes)
                .map_err(SnapError::storage_from)?;
        }
        Ok(id)
    }

    fn query(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>> {
        let mut out: Vec<(String, Document)> = self
            .scan_docs(collection)?
            .into_iter()
            .filter(|(_, d)| filter.matches(d))
            .map(|(_, d)| {
                let k = d.get(crate::consts::ID_FIELD).map(id_key).unwrap_or_default();
                (k, d)
            })
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out.into_iter().map(|(_, d)| d).collect())
    }

    fn delete(&self, collection: &str, filter: &Filter) -> Result<usize> {
        let mut removed = 0usize;
        for (path, doc) in self.scan_docs(collection)? {
            if !filter.matches(&doc) {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == IoErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(removed)
    }

    fn create_index(&self, collection: &str, field: &str) -> Result<()> {
        self.create_collection(collection)?;
        let _lk = acquire_exclusive_lock(&self.root).map_err(SnapError::storage_from)?;
        let mut fields = self
            .read_indexes(collection)
            .map_err(SnapError::storage_from)?;
        if fields.iter().any(|f| f == field) {
            return Ok(());
        }
        fields.push(field.to_string());
        fields.sort();
        let path = self.collection_dir(collection).join(INDEXES_FILE);
        let bytes = serde_json::to_vec_pretty(&fields)?;
        self.replace_file(&path, &bytes)
            .map_err(SnapError::storage_from)
    }

    fn indexes(&self, collection: &str) -> Result<Vec<String>> {
        self.read_indexes(collection)
            .map_err(SnapError::storage_from)
    }
}

// ----------------- helpers -----------------

fn encode_record(value: u64) -> [u8; RECORD_SIZE] {
    let mut buf = [0u8; RECORD_SIZE];
    buf[..8].copy_from_slice(RECORD_MAGIC);
    LittleEndian::write_u64(&mut buf[8..16], value);
    let crc = crc32fast::hash(&buf[..16]);
    LittleEndian::write_u32(&mut buf[16..20], crc);
    buf
}

fn decode_record(buf: &[u8]) -> std::result::Result<u64, String> {
    if buf.len() != RECORD_SIZE {
        return Err(format!("bad record size {} (expected {})", buf.len(), RECORD_SIZE));
    }
    if &buf[..8] != RECORD_MAGIC {
        return Err("bad record magic".to_string());
    }
    let stored = LittleEndian::read_u32(&buf[16..20]);
    let actual = crc32fast::hash(&buf[..16]);
    if stored != actual {
        return Err(format!("crc mismatch: stored={:08x} actual={:08x}", stored, actual));
    }
    Ok(LittleEndian::read_u64(&buf[8..16]))
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut s = String::with_capacity(64);
    for b in digest.iter() {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

/// File-name-safe, reversible encoding: bytes outside `[A-Za-z0-9_.$-]` become `%XX`.
/// A leading '.' is escaped too (hidden names are reserved for tmp/trash files).
fn encode_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for (i, b) in s.bytes().enumerate() {
        let plain = b.is_ascii_alphanumeric()
            || b == b'_'
            || b == b'-'
            || b == b'$'
            || (b == b'.' && i > 0);
        if plain {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

fn decode_component(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = s.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
