//! Bulk date-range acquisition command.

use anyhow::Result;
use daybook_lib::prelude::*;
use std::path::PathBuf;
use std::process::ExitCode;

use super::{build_engine, open_store, parse_date, run_units};

/// Fetch and store a date range for one or more assets.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn bulk(
    assets: &[String],
    start_str: &str,
    end_str: &str,
    concurrency: Option<usize>,
    overwrite: bool,
    rate_limit: usize,
    quiet: bool,
    db: Option<PathBuf>,
    api_key: Option<String>,
) -> Result<ExitCode> {
    let start = parse_date(start_str)?;
    let end = parse_date(end_str)?;
    let range = DateRange::new(start, end)?;
    let units = FetchUnit::expand(assets, range)?;

    let store = open_store(db).await?;
    let engine = build_engine(store, api_key, overwrite, concurrency, rate_limit)?;

    let message = format!("{} {range}", assets.join(","));
    Ok(run_units(&engine, units, quiet, message).await)
}
