use anyhow::Result;
use std::path::PathBuf;

use crate::util::{open_snapshots, print_report, report_json};

pub fn exec_collect(path: PathBuf, family: String, keep: Option<usize>, json: bool) -> Result<()> {
    let snaps = open_snapshots(&path, keep.map(|k| (family.as_str(), k)))?;
    let r = snaps.collect(&family)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report_json(&r))?);
    } else {
        print_report(&r);
    }
    Ok(())
}

pub fn exec_sweep(path: PathBuf, json: bool) -> Result<()> {
    let snaps = open_snapshots(&path, None)?;
    let reports = snaps.sweep()?;
    if json {
        let v: Vec<_> = reports.iter().map(report_json).collect();
        println!("{}", serde_json::to_string_pretty(&v)?);
        return Ok(());
    }
    if reports.is_empty() {
        println!("(no families)");
    }
    for r in &reports {
        print_report(r);
    }
    Ok(())
}
