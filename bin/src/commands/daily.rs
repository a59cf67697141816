//! Daily acquisition command, meant to be invoked once a day by an
//! external scheduler.

use anyhow::{Context, Result};
use chrono::Utc;
use daybook_lib::prelude::*;
use std::path::PathBuf;
use std::process::ExitCode;

use super::{DEFAULT_ASSETS, build_engine, open_store, run_units};

/// Fetch yesterday's record for the configured assets.
pub(crate) async fn daily(
    assets: &[String],
    overwrite: bool,
    rate_limit: usize,
    quiet: bool,
    db: Option<PathBuf>,
    api_key: Option<String>,
) -> Result<ExitCode> {
    let assets: Vec<String> = if assets.is_empty() {
        DEFAULT_ASSETS.iter().map(ToString::to_string).collect()
    } else {
        assets.to_vec()
    };

    let yesterday = Utc::now()
        .date_naive()
        .pred_opt()
        .context("Date arithmetic underflow")?;
    let units = FetchUnit::expand(&assets, DateRange::single_day(yesterday))?;

    let store = open_store(db).await?;
    let engine = build_engine(store, api_key, overwrite, None, rate_limit)?;

    let message = format!("daily {yesterday}");
    Ok(run_units(&engine, units, quiet, message).await)
}
