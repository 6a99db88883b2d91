// tests/fs_store.rs
//
// Запуск:
//   cargo test --test fs_store -- --nocapture
//
// FsStore как общий бэкенд:
// - counter/pointer/catalog переживают переоткрытие;
// - битая запись pointer -> Corrupted, а не "ничего не опубликовано";
// - два независимых клиента на одном корне получают разные id;
// - drop коллекции идемпотентен.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use serde_json::json;

use snapgen::consts::RECORDS_DIR;
use snapgen::{
    BuildContext, ErrorKind, Expect, Filter, FsStore, SnapConfig, Snapshots, StorageAdapter,
};

fn unique_root(prefix: &str) -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("snapgen-{prefix}-{pid}-{t}-{n}"))
}

fn open(root: &Path) -> Result<(Arc<FsStore>, Snapshots)> {
    open_with(root, SnapConfig::default())
}

fn open_with(root: &Path, cfg: SnapConfig) -> Result<(Arc<FsStore>, Snapshots)> {
    let store = Arc::new(FsStore::open_with_fsync(root, cfg.fsync)?);
    let snaps = Snapshots::new(store.clone(), cfg)?;
    Ok((store, snaps))
}

fn rows(ctx: &mut BuildContext) -> Result<()> {
    let g = ctx.generation();
    let c = ctx.default_collection()?;
    c.create_index("region")?;
    c.insert_json(json!({"_id": "eu", "region": "eu", "gen": g}))?;
    c.insert_json(json!({"_id": "us", "region": "us", "gen": g}))?;
    Ok(())
}

#[test]
fn state_survives_reopen() -> Result<()> {
    let root = unique_root("reopen");
    {
        let (_store, snaps) = open(&root)?;
        snaps.create("daily", &rows)?;
        snaps.create("daily", &rows)?;
    }

    let (store, snaps) = open(&root)?;
    assert_eq!(snaps.current("daily")?, Some(2));
    let h = snaps.latest("daily")?;
    let c = h.default_collection()?;
    assert_eq!(c.indexes()?, vec!["region".to_string()]);
    let eu = c.find_one(&Filter::eq("region", "eu"))?.expect("eu row");
    assert_eq!(eu["gen"], json!(2));

    let r = snaps.create("daily", &rows)?;
    assert_eq!(r.generation, 3);
    // K=2: g1 собран retention после публикации g3
    let names = store.list_collections("snap.daily.")?;
    assert_eq!(names, vec!["snap.daily.g2", "snap.daily.g3"]);

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn corrupted_pointer_is_reported() -> Result<()> {
    let root = unique_root("corrupt");
    let (_store, snaps) = open(&root)?;
    snaps.create("daily", &rows)?;

    let mut hit = 0;
    for entry in fs::read_dir(root.join(RECORDS_DIR))? {
        let path = entry?.path();
        let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("");
        if name.starts_with("pub") {
            fs::write(&path, b"garbage")?;
            hit += 1;
        }
    }
    assert_eq!(hit, 1);

    let err = snaps.latest("daily").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Corrupted);
    assert!(!err.is_transient());

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn independent_clients_share_one_sequence() -> Result<()> {
    let root = unique_root("clients");
    let clients = 4;
    let per_client = 4;

    let mut handles = Vec::new();
    for _ in 0..clients {
        let root = root.clone();
        handles.push(thread::spawn(move || -> Result<Vec<u64>> {
            // каждый поток - отдельный клиент со своим FsStore;
            // окно шире числа сборок, retention идёт параллельно сборкам
            let cfg = SnapConfig::default().with_retention(32);
            let (_store, snaps) = open_with(&root, cfg)?;
            let mut out = Vec::new();
            for _ in 0..per_client {
                out.push(snaps.create("daily", &rows)?.generation);
            }
            Ok(out)
        }));
    }
    let mut all = Vec::new();
    for h in handles {
        all.extend(h.join().expect("client panicked")?);
    }
    all.sort_unstable();
    let total = (clients * per_client) as u64;
    assert_eq!(all, (1..=total).collect::<Vec<_>>());

    let (_store, snaps) = open(&root)?;
    assert_eq!(snaps.current("daily")?, Some(total));
    for g in 1..=total {
        let h = snaps.open("daily", g)?;
        assert_eq!(h.default_collection()?.count(&Filter::all())?, 2);
    }

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn records_and_collections_primitives() -> Result<()> {
    let root = unique_root("prims");
    let store = FsStore::open(&root)?;

    assert_eq!(store.read("pub:x")?, None);
    assert!(store.compare_and_set("pub:x", Expect::Below(3), 3)?);
    assert!(!store.compare_and_set("pub:x", Expect::Below(2), 2)?);
    assert!(store.compare_and_set("pub:x", Expect::Equal(3), 5)?);
    assert_eq!(store.read("pub:x")?, Some(5));

    store.create_collection("a.b")?;
    store.write("a.b", json!({"_id": 1, "v": "one"}).as_object().cloned().unwrap())?;
    assert!(store.collection_exists("a.b")?);
    assert!(store.drop_collection("a.b")?);
    assert!(!store.drop_collection("a.b")?);
    assert!(store.query("a.b", &Filter::all())?.is_empty());

    let _ = fs::remove_dir_all(&root);
    Ok(())
}
