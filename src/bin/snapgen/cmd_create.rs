use anyhow::{Context, Result};
use std::path::PathBuf;

use snapgen::{BuildContext, Document, PublishOutcome};

use crate::util::{open_snapshots, parse_sub_arg, print_report, read_documents, report_json};

/// Build hook из JSON-файлов: документы читаются заранее, до выделения поколения,
/// so a malformed file never allocates a generation.
pub fn exec(
    path: PathBuf,
    family: String,
    docs: Vec<PathBuf>,
    sub: Vec<String>,
    index: Vec<String>,
    keep: Option<usize>,
    json: bool,
) -> Result<()> {
    let mut default_docs: Vec<Document> = Vec::new();
    for p in &docs {
        default_docs.extend(read_documents(p)?);
    }
    let mut named: Vec<(String, Vec<Document>)> = Vec::new();
    for s in &sub {
        let (name, file) = parse_sub_arg(s)?;
        named.push((name, read_documents(&file)?));
    }

    let snaps = open_snapshots(&path, keep.map(|k| (family.as_str(), k)))?;
    let report = snaps
        .create_with(&family, |ctx: &mut BuildContext| {
            let main = ctx.default_collection()?;
            for field in &index {
                main.create_index(field)?;
            }
            main.insert_many(default_docs.iter().cloned())?;
            for (name, items) in &named {
                let c = ctx.collection(name)?;
                c.insert_many(items.iter().cloned())?;
            }
            Ok(())
        })
        .with_context(|| format!("create family '{}'", family))?;

    if json {
        let v = serde_json::json!({
            "family": report.family,
            "generation": report.generation,
            "published": report.outcome.is_published(),
            "collections": report.collections,
            "retention": report.retention.as_ref().map(report_json),
        });
        println!("{}", serde_json::to_string_pretty(&v)?);
        return Ok(());
    }

    match report.outcome {
        PublishOutcome::Published(g) => println!("create: family={} published generation {}", family, g),
        PublishOutcome::Superseded { current } => println!(
            "create: family={} generation {} committed but superseded by {}",
            family, report.generation, current
        ),
    }
    for c in &report.collections {
        println!("  - {}", c);
    }
    if let Some(r) = &report.retention {
        print_report(r);
    }
    Ok(())
}
