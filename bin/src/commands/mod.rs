//! CLI command implementations.

pub(crate) mod aggregates;
pub(crate) mod bulk;
pub(crate) mod daily;
pub(crate) mod fetch;
pub(crate) mod import;
pub(crate) mod init;

use anyhow::{Context, Result};
use daybook_lib::prelude::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use crate::display;

/// Assets fetched by `daily` when none are given.
pub(crate) const DEFAULT_ASSETS: [&str; 3] = ["bitcoin", "ethereum", "cardano"];

/// Fetch attempts allowed per minute unless overridden.
pub(crate) const DEFAULT_RATE_LIMIT: usize = 30;

/// Resolves the database path: flag, then `DAYBOOK_DB`, then the platform
/// data directory.
pub(crate) fn resolve_db_path(flag: Option<PathBuf>) -> PathBuf {
    if let Some(path) = flag {
        return path;
    }
    if let Ok(path) = std::env::var("DAYBOOK_DB") {
        return PathBuf::from(path);
    }
    directories::ProjectDirs::from("", "", "daybook").map_or_else(
        || PathBuf::from("daybook.db"),
        |dirs| dirs.data_dir().join("daybook.db"),
    )
}

/// Opens the store, resolving the database path.
pub(crate) async fn open_store(db: Option<PathBuf>) -> Result<Store> {
    let path = resolve_db_path(db);
    Store::open(&path)
        .await
        .with_context(|| format!("Failed to open database at {}", path.display()))
}

/// Assembles an engine over the production client and a fresh limiter.
pub(crate) fn build_engine(
    store: Store,
    api_key: Option<String>,
    overwrite: bool,
    concurrency: Option<usize>,
    rate_limit: usize,
) -> Result<Engine> {
    let mut client_config = ClientConfig::default();
    if api_key.is_some() {
        client_config.api_key = api_key;
    }
    let client = CoinGeckoClient::new(client_config).context("Failed to create HTTP client")?;
    let limiter = Arc::new(RateLimiter::new(rate_limit, Duration::from_secs(60)));

    let mut config = EngineConfig {
        overwrite,
        ..Default::default()
    };
    if let Some(n) = concurrency {
        config.concurrency = n.max(1);
    }

    Ok(Engine::new(Arc::new(client), store, limiter, config))
}

/// Runs a unit set with Ctrl-C cancellation and a progress bar, renders the
/// report, and maps it to the process exit status (nonzero on any failure).
pub(crate) async fn run_units(
    engine: &Engine,
    units: Vec<FetchUnit>,
    quiet: bool,
    message: String,
) -> ExitCode {
    let cancel = CancelFlag::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let progress = if quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(units.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} units ({percent}%) {msg}",
                )
                .expect("Invalid progress template")
                .progress_chars("=>-"),
        );
        pb.set_message(message);
        pb
    };

    let report = engine.run_each(units, &cancel, |_| progress.inc(1)).await;
    progress.finish_and_clear();

    display::render_report(&report);
    if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Parses a YYYY-MM-DD date argument.
pub(crate) fn parse_date(value: &str) -> Result<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Invalid date: {value}"))
}
