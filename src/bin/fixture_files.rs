//! Materialize or dump the data files declared in a fixture sheet.
//!
//! Usage:
//!   fixture_files write <DIR> <RESOURCE> <KIND> [GROUP-ID] [--config FILE.toml]
//!   fixture_files dump  <DIR> <RESOURCE> <KIND> [GROUP-ID] [--config FILE.toml]
//!
//! `<RESOURCE>` names `<DIR>/<RESOURCE>.tsv`; `<KIND>` is a file marker such as
//! `SETUP_FIXED`, `EXPECTED_VARIABLE` or `MESSAGE`. Set `RUST_LOG=debug` for details.

use anyhow::{anyhow, bail, Context};
use log::info;
use recordlayout::dump::records_to_dump;
use recordlayout::{DataKind, Settings, TestDataParser, TextSheetSource};
use std::sync::Arc;

const USAGE: &str = "usage: fixture_files <write|dump> <DIR> <RESOURCE> <KIND> [GROUP-ID] [--config FILE.toml]";

#[derive(Clone, Copy, PartialEq, Eq)]
enum Command {
    Write,
    Dump,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut raw_args: Vec<String> = std::env::args().skip(1).collect();
    let config_path: Option<String> = match raw_args.iter().position(|a| a == "--config") {
        Some(pos) => {
            raw_args.remove(pos);
            if pos >= raw_args.len() {
                bail!("--config requires a file\n{}", USAGE);
            }
            Some(raw_args.remove(pos))
        }
        None => None,
    };
    let mut args = raw_args.into_iter();
    let command = match args.next().as_deref() {
        Some("write") => Command::Write,
        Some("dump") => Command::Dump,
        _ => bail!(USAGE),
    };
    let directory = args.next().ok_or_else(|| anyhow!(USAGE))?;
    let resource = args.next().ok_or_else(|| anyhow!(USAGE))?;
    let kind_name = args.next().ok_or_else(|| anyhow!(USAGE))?;
    let group_id = args.next().unwrap_or_default();

    let kind = DataKind::from_name(&kind_name)
        .filter(|k| k.is_file())
        .ok_or_else(|| anyhow!("unknown file kind [{}]", kind_name))?;
    let settings = match &config_path {
        Some(path) => Settings::from_file(path)?,
        None => Settings::default(),
    };

    let mut parser = TestDataParser::new(TextSheetSource, Arc::new(settings));
    let files = parser.parse(&directory, &resource, kind, &group_id)?;
    if files.is_empty() {
        bail!(
            "no {} data found. directory=[{}] resource=[{}] id=[{}]",
            kind,
            directory,
            resource,
            group_id
        );
    }

    for file in &files {
        match command {
            Command::Write => {
                file.write().with_context(|| format!("writing {}", file.path()))?;
                let rows: usize = file.fragments().iter().map(|f| f.number_of_records()).sum();
                info!("wrote {} ({} records)", file.path(), rows);
            }
            Command::Dump => {
                let records = file.read().with_context(|| format!("reading {}", file.path()))?;
                println!("# {}", file.path());
                if !records.is_empty() {
                    println!("{}", records_to_dump(&records));
                }
            }
        }
    }
    Ok(())
}
