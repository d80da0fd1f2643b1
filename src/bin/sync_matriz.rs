// Copy the matrix tab into the parquet mirror, upserting by PEP.
//
// usage: sync_matriz [--truncate] [--list-tabs]

use anyhow::{bail, Result};
use matriz::{
    config::Config,
    mirror::{MatrixMirror, UpsertStats},
    process::{normalize_rows, NormalizedRecord},
    sheets::{GoogleSheetsClient, SheetSource},
};
use reqwest::Client;
use std::env;
use tokio::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Default)]
struct Args {
    truncate: bool,
    list_tabs: bool,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut out = Args::default();
    for arg in args {
        match arg.as_str() {
            "--truncate" => out.truncate = true,
            "--list-tabs" => out.list_tabs = true,
            other => bail!("unknown argument {:?} (expected --truncate or --list-tabs)", other),
        }
    }
    Ok(out)
}

/// Truncate first when asked, then upsert whatever records there are.
fn apply_to_mirror(
    mirror: &MatrixMirror,
    records: &[NormalizedRecord],
    truncate: bool,
) -> Result<UpsertStats> {
    if truncate {
        mirror.truncate()?;
        info!(path = %mirror.path().display(), "mirror truncated");
    }
    if records.is_empty() {
        warn!(path = %mirror.path().display(), "no records with a PEP; nothing to upsert");
        return Ok(UpsertStats::default());
    }
    mirror.upsert(records)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args(env::args().skip(1))?;
    let cfg = Config::load()?;
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let start = Instant::now();
    let client = GoogleSheetsClient::new(Client::new(), &cfg)?;

    if args.list_tabs {
        for title in client.list_tabs().await? {
            println!("{}", title);
        }
        return Ok(());
    }

    let rows = client.fetch_rows(&cfg.matrix_tab).await?;
    let records = normalize_rows(&rows);
    let mirror = MatrixMirror::open(&cfg.mirror_path)?;
    let stats = apply_to_mirror(&mirror, &records, args.truncate)?;

    info!(
        tab = %cfg.matrix_tab,
        created = stats.created,
        updated = stats.updated,
        skipped = rows.len() - records.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "sync complete"
    );
    println!("created={} updated={}", stats.created, stats.updated);
    Ok(())
}
