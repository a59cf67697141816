//! Monthly aggregate inspection command.

use anyhow::Result;
use daybook_lib::prelude::*;
use std::path::PathBuf;
use std::process::ExitCode;

use super::open_store;
use crate::display;

/// Show stored monthly min/max aggregates for an asset.
pub(crate) async fn aggregates(
    asset: &str,
    year: Option<i32>,
    month: Option<u32>,
    json: bool,
    db: Option<PathBuf>,
) -> Result<ExitCode> {
    validate_asset_id(asset)?;
    let store = open_store(db).await?;

    let rows = store.monthly_aggregates(asset, year, month).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(ExitCode::SUCCESS);
    }

    if rows.is_empty() {
        println!("No aggregates stored for {asset}");
    } else {
        display::render_aggregates(&rows);
    }

    // Averages stay a read-time query over history rather than a stored
    // column; surface one when the command pins down a single month.
    if let (Some(year), Some(month)) = (year, month) {
        let bucket = MonthKey { year, month };
        if let Some(average) = store.monthly_average(asset, bucket).await? {
            println!("Average for {bucket}: {average:.4}");
        }
    }

    Ok(ExitCode::SUCCESS)
}
