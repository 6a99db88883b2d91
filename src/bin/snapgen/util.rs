use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use snapgen::{Document, Filter, FsStore, RetentionReport, SnapConfig, Snapshots};

/// Open the facade over an FsStore at `path` (config from SNAPGEN_* env).
pub fn open_snapshots(path: &Path, family_keep: Option<(&str, usize)>) -> Result<Snapshots> {
    let mut cfg = SnapConfig::from_env();
    if let Some((family, k)) = family_keep {
        cfg = cfg.with_family_retention(family, k);
    }
    let store = FsStore::open_with_fsync(path, cfg.fsync)
        .with_context(|| format!("open store at {}", path.display()))?;
    let snaps = Snapshots::new(Arc::new(store), cfg)?;
    Ok(snaps)
}

/// Documents from a file: JSON array of objects, a single object, or JSONL.
pub fn read_documents(p: &Path) -> Result<Vec<Document>> {
    let text = std::fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?;
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        if let Ok(v) = serde_json::from_str::<Value>(&text) {
            return into_documents(v).with_context(|| format!("documents in {}", p.display()));
        }
    }
    // JSONL
    let mut out = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let v: Value = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: invalid JSON", p.display(), i + 1))?;
        out.extend(into_documents(v).with_context(|| format!("{}:{}", p.display(), i + 1))?);
    }
    Ok(out)
}

fn into_documents(v: Value) -> Result<Vec<Document>> {
    match v {
        Value::Object(m) => Ok(vec![m]),
        Value::Array(items) => items
            .into_iter()
            .map(|it| match it {
                Value::Object(m) => Ok(m),
                other => Err(anyhow!("expected JSON object, got {}", other)),
            })
            .collect(),
        other => Err(anyhow!("expected JSON object or array, got {}", other)),
    }
}

/// NAME=FILE
pub fn parse_sub_arg(arg: &str) -> Result<(String, PathBuf)> {
    let (name, file) = arg
        .split_once('=')
        .ok_or_else(|| anyhow!("expected NAME=FILE, got '{}'", arg))?;
    if name.trim().is_empty() || file.trim().is_empty() {
        return Err(anyhow!("expected NAME=FILE, got '{}'", arg));
    }
    Ok((name.trim().to_string(), PathBuf::from(file.trim())))
}

/// FIELD=VALUE list -> Filter. VALUE is parsed as JSON, falling back to a string.
pub fn parse_filter(args: &[String]) -> Result<Filter> {
    let mut f = Filter::all();
    for a in args {
        let (field, raw) = a
            .split_once('=')
            .ok_or_else(|| anyhow!("expected FIELD=VALUE, got '{}'", a))?;
        let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        f = f.and_eq(field, value);
    }
    Ok(f)
}

pub fn print_report(r: &RetentionReport) {
    println!(
        "retention: family={} current={} floor={} dropped={:?} retained={:?}",
        r.family,
        r.current.map(|c| c.to_string()).unwrap_or_else(|| "(none)".to_string()),
        r.floor,
        r.dropped,
        r.retained
    );
    for f in &r.failures {
        println!("  ! gen {} {}: {}", f.generation, f.target, f.error);
    }
}

pub fn report_json(r: &RetentionReport) -> Value {
    serde_json::json!({
        "family": r.family,
        "current": r.current,
        "floor": r.floor,
        "dropped": r.dropped,
        "retained": r.retained,
        "failures": r.failures.iter().map(|f| serde_json::json!({
            "generation": f.generation,
            "target": f.target,
            "error": f.error,
        })).collect::<Vec<_>>(),
    })
}
