use anyhow::Result;
use env_logger::{Builder, Env};

mod cli;
mod util;
mod cmd_init;
mod cmd_create;
mod cmd_read;
mod cmd_status;
mod cmd_retention;

fn init_logger() {
    // Уровень берём из RUST_LOG, иначе дефолт info.
    // Пример: RUST_LOG=debug snapgen ...
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    if let Err(e) = run() {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = cli::Cli::parse();
    match cli.cmd {
        cli::Cmd::Init { path } => cmd_init::exec(path),

        cli::Cmd::Create { path, family, docs, sub, index, keep, json } =>
            cmd_create::exec(path, family, docs, sub, index, keep, json),

        cli::Cmd::Latest { path, family, json } =>
            cmd_read::exec_latest(path, family, json),

        cli::Cmd::Query { path, family, generation, sub, filter } =>
            cmd_read::exec_query(path, family, generation, sub, filter),

        cli::Cmd::Status { path, family, json } =>
            cmd_status::exec(path, family, json),

        cli::Cmd::Families { path, json } =>
            cmd_status::exec_families(path, json),

        cli::Cmd::Collect { path, family, keep, json } =>
            cmd_retention::exec_collect(path, family, keep, json),

        cli::Cmd::Sweep { path, json } =>
            cmd_retention::exec_sweep(path, json),
    }
}
