use anyhow::Result;
use std::path::PathBuf;

use snapgen::metrics;

use crate::util::open_snapshots;

pub fn exec(path: PathBuf, family: String, json: bool) -> Result<()> {
    let snaps = open_snapshots(&path, None)?;
    let st = snaps.status(&family)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&st)?);
        return Ok(());
    }

    println!("Family {}", st.family);
    println!(
        "  current        = {}",
        st.current.map(|c| c.to_string()).unwrap_or_else(|| "(none)".to_string())
    );
    println!("  last_allocated = {}", st.last_allocated);
    println!("  retention (K)  = {}", st.retention);
    println!("Generations: {}", st.generations.len());
    for g in &st.generations {
        let marker = if Some(g.generation) == st.current { "*" } else { " " };
        println!(
            " {} g{:<6} {:?}  collections={}{}",
            marker,
            g.generation,
            g.state,
            g.collections.len(),
            g.error.as_deref().map(|e| format!("  error={}", e)).unwrap_or_default()
        );
    }

    let m = metrics::snapshot();
    println!(
        "Metrics (this process): allocated={} committed={} failed={}",
        m.generations_allocated, m.builds_committed, m.builds_failed
    );
    Ok(())
}

pub fn exec_families(path: PathBuf, json: bool) -> Result<()> {
    let snaps = open_snapshots(&path, None)?;
    let fams = snaps.families()?;
    if json {
        println!("{}", serde_json::to_string(&fams)?);
        return Ok(());
    }
    if fams.is_empty() {
        println!("(no families)");
        return Ok(());
    }
    for f in fams {
        println!("{f}");
    }
    Ok(())
}
