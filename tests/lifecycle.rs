// tests/lifecycle.rs
//
// Запуск:
//   cargo test --test lifecycle -- --nocapture
//
// Сценарий create -> publish -> collect на MemoryStore:
// - latest до первой публикации -> NoPublishedSnapshot;
// - K=2: после g1, g2, g3 на storage остаются только g2 и g3;
// - handle привязан к поколению по значению;
// - упавший build не двигает pointer и оставляет сироту для retention.

use std::sync::Arc;

use anyhow::{bail, Result};
use serde_json::{json, Value};

use snapgen::{
    BuildContext, ErrorKind, Filter, GenerationState, MemoryStore, PublishOutcome, SnapConfig,
    Snapshots, StorageAdapter,
};

fn snapshots() -> Result<(Arc<MemoryStore>, Snapshots)> {
    let store = Arc::new(MemoryStore::new());
    let snaps = Snapshots::new(store.clone(), SnapConfig::default())?;
    Ok((store, snaps))
}

fn obj(v: Value) -> snapgen::Document {
    v.as_object().cloned().expect("object literal")
}

/// Build hook writing `total` into the default subcollection and one row per region.
fn totals(total: i64) -> impl Fn(&mut BuildContext) -> Result<()> + Send + Sync {
    move |ctx: &mut BuildContext| {
        ctx.insert(obj(json!({"_id": "all", "total": total})))?;
        let regions = ctx.collection("by_region")?;
        regions.insert(obj(json!({"_id": "eu", "total": total / 2})))?;
        regions.insert(obj(json!({"_id": "us", "total": total - total / 2})))?;
        Ok(())
    }
}

#[test]
fn latest_before_first_publish_fails() -> Result<()> {
    let (_store, snaps) = snapshots()?;
    let err = snaps.latest("daily").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoPublishedSnapshot);
    assert_eq!(snaps.current("daily")?, None);
    Ok(())
}

#[test]
fn first_publish_resolves_generation_one() -> Result<()> {
    let (_store, snaps) = snapshots()?;
    let report = snaps.create("daily", &totals(10))?;
    assert_eq!(report.generation, 1);
    assert_eq!(report.outcome, PublishOutcome::Published(1));

    let h = snaps.latest("daily")?;
    assert_eq!(h.generation(), 1);
    let all = h.default_collection()?.find_one(&Filter::by_id("all"))?.expect("row");
    assert_eq!(all["total"], json!(10));
    assert_eq!(h.subcollections()?, vec!["by_region".to_string()]);
    assert_eq!(h.subcollection("by_region")?.count(&Filter::all())?, 2);
    Ok(())
}

#[test]
fn default_retention_keeps_two_most_recent() -> Result<()> {
    let (store, snaps) = snapshots()?;
    for (i, total) in [10, 20, 30].into_iter().enumerate() {
        let r = snaps.create("daily", &totals(total))?;
        assert_eq!(r.generation, i as u64 + 1);
        assert!(r.outcome.is_published());
    }

    let names = store.list_collections("snap.daily.")?;
    assert_eq!(
        names,
        vec![
            "snap.daily.g2",
            "snap.daily.g2.by_region",
            "snap.daily.g3",
            "snap.daily.g3.by_region",
        ]
    );
    let st = snaps.status("daily")?;
    assert_eq!(st.current, Some(3));
    assert_eq!(st.last_allocated, 3);
    let gens: Vec<u64> = st.generations.iter().map(|g| g.generation).collect();
    assert_eq!(gens, vec![2, 3]);
    Ok(())
}

#[test]
fn handle_is_bound_by_value() -> Result<()> {
    let (_store, snaps) = snapshots()?;
    snaps.create("daily", &totals(1))?;
    let pinned = snaps.latest("daily")?;

    snaps.create("daily", &totals(2))?;
    assert_eq!(pinned.generation(), 1);
    let row = pinned.default_collection()?.find_one(&Filter::by_id("all"))?.expect("row");
    assert_eq!(row["total"], json!(1));

    assert_eq!(snaps.latest("daily")?.generation(), 2);
    Ok(())
}

#[test]
fn failed_build_leaves_pointer_and_is_reclaimed() -> Result<()> {
    let (store, snaps) = snapshots()?;
    snaps.create("daily", &totals(5))?;

    let err = snaps
        .create_with("daily", |ctx| {
            ctx.insert(obj(json!({"_id": "partial"})))?;
            bail!("source table locked")
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BuildFailed);
    assert_eq!(snaps.current("daily")?, Some(1));
    // the coordinator does not clean up
    assert!(store.collection_exists("snap.daily.g2")?);
    let st = snaps.status("daily")?;
    assert_eq!(st.generations[1].state, GenerationState::Failed);

    let report = snaps.collect("daily")?;
    assert_eq!(report.dropped, vec![2]);
    assert!(!store.collection_exists("snap.daily.g2")?);
    assert_eq!(snaps.latest("daily")?.generation(), 1);

    // retry после сбоя получает новый id
    let r = snaps.create("daily", &totals(6))?;
    assert_eq!(r.generation, 3);
    Ok(())
}

#[test]
fn pinned_open_of_collected_generation_is_unavailable() -> Result<()> {
    let (_store, snaps) = snapshots()?;
    for t in 1..=3 {
        snaps.create("daily", &totals(t))?;
    }
    assert_eq!(snaps.open("daily", 2)?.generation(), 2);
    assert_eq!(
        snaps.open("daily", 1).unwrap_err().kind(),
        ErrorKind::GenerationNotAvailable
    );
    assert_eq!(
        snaps.open("daily", 9).unwrap_err().kind(),
        ErrorKind::GenerationNotAvailable
    );
    Ok(())
}

#[test]
fn build_hook_indexes_are_visible_to_readers() -> Result<()> {
    let (_store, snaps) = snapshots()?;
    snaps.create_with("events", |ctx| {
        let c = ctx.default_collection()?;
        c.create_index("kind")?;
        c.insert_json(json!({"kind": "click"}))?;
        c.insert_json(json!({"kind": "view"}))?;
        c.insert_json(json!({"kind": "click"}))?;
        Ok(())
    })?;
    let c = snaps.latest("events")?.default_collection()?;
    assert_eq!(c.indexes()?, vec!["kind".to_string()]);
    assert_eq!(c.count(&Filter::eq("kind", "click"))?, 2);
    Ok(())
}

#[test]
fn families_are_independent() -> Result<()> {
    let (_store, snaps) = snapshots()?;
    snaps.create("a", &totals(1))?;
    snaps.create("a", &totals(2))?;
    snaps.create("b", &totals(3))?;
    assert_eq!(snaps.current("a")?, Some(2));
    assert_eq!(snaps.current("b")?, Some(1));
    assert_eq!(snaps.families()?, vec!["a".to_string(), "b".to_string()]);
    Ok(())
}

#[test]
fn empty_family_name_is_invalid() -> Result<()> {
    let (_store, snaps) = snapshots()?;
    assert_eq!(
        snaps.create("", &totals(1)).unwrap_err().kind(),
        ErrorKind::InvalidArgument
    );
    Ok(())
}
