use anyhow::Result;
use std::path::PathBuf;

use crate::util::{open_snapshots, parse_filter};

pub fn exec_latest(path: PathBuf, family: String, json: bool) -> Result<()> {
    let snaps = open_snapshots(&path, None)?;
    let h = snaps.latest(&family)?;
    let subs = h.subcollections()?;
    if json {
        let v = serde_json::json!({
            "family": h.family(),
            "generation": h.generation(),
            "default": h.default_collection()?.physical_name(),
            "subcollections": subs,
        });
        println!("{}", serde_json::to_string(&v)?);
        return Ok(());
    }
    println!("latest: family={} generation={}", h.family(), h.generation());
    println!("  default       = {}", h.default_collection()?.physical_name());
    for s in subs {
        println!("  sub {:10} = {}", s, h.subcollection(&s)?.physical_name());
    }
    Ok(())
}

/// JSONL: один документ на строку.
pub fn exec_query(
    path: PathBuf,
    family: String,
    generation: Option<u64>,
    sub: Option<String>,
    filter: Vec<String>,
) -> Result<()> {
    let snaps = open_snapshots(&path, None)?;
    let h = snaps.open_at(&family, generation)?;
    let coll = match sub.as_deref() {
        Some(name) => h.subcollection(name)?,
        None => h.default_collection()?,
    };
    let f = parse_filter(&filter)?;
    for doc in coll.find(&f)? {
        println!("{}", serde_json::to_string(&doc)?);
    }
    Ok(())
}
