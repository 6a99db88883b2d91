use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI для snapgen поверх каталога FsStore
#[derive(Parser, Debug)]
#[command(name = "snapgen", version, about = "snapgen CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Initialize a store directory (idempotent)
    Init {
        #[arg(long)]
        path: PathBuf,
    },
    /// Build, publish and collect a new generation from JSON files
    ///
    /// Файлы: JSON-массив объектов, один объект или JSONL.
    ///   snapgen create --path ./store --family daily --docs totals.json \
    ///       --sub by_region=regions.jsonl --index region
    Create {
        #[arg(long)]
        path: PathBuf,
        #[arg(long)]
        family: String,
        /// Documents for the default subcollection
        #[arg(long)]
        docs: Vec<PathBuf>,
        /// Named subcollection as NAME=FILE (repeatable)
        #[arg(long)]
        sub: Vec<String>,
        /// Index field on the default subcollection (repeatable)
        #[arg(long)]
        index: Vec<String>,
        /// Override retention window K for this family
        #[arg(long)]
        keep: Option<usize>,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Show the published generation of a family
    Latest {
        #[arg(long)]
        path: PathBuf,
        #[arg(long)]
        family: String,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print documents (JSONL) of the published or a pinned generation
    Query {
        #[arg(long)]
        path: PathBuf,
        #[arg(long)]
        family: String,
        /// Pin a retained generation instead of the published one
        #[arg(long)]
        generation: Option<u64>,
        /// Named subcollection (default subcollection if omitted)
        #[arg(long)]
        sub: Option<String>,
        /// Equality filter FIELD=VALUE (VALUE parsed as JSON, else string; repeatable)
        #[arg(long = "where")]
        filter: Vec<String>,
    },
    /// Pointer, last allocated id and catalog records of a family
    Status {
        #[arg(long)]
        path: PathBuf,
        #[arg(long)]
        family: String,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// List known families
    Families {
        #[arg(long)]
        path: PathBuf,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Run one retention pass for a family
    Collect {
        #[arg(long)]
        path: PathBuf,
        #[arg(long)]
        family: String,
        #[arg(long)]
        keep: Option<usize>,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Retention pass over every family (orphans of failed builds included)
    Sweep {
        #[arg(long)]
        path: PathBuf,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
