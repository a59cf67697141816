//! Single-date fetch command.

use anyhow::Result;
use daybook_lib::prelude::*;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use super::{build_engine, open_store, parse_date, run_units};

/// Fetch one asset for one date and store it.
pub(crate) async fn fetch(
    asset: &str,
    date_str: &str,
    overwrite: bool,
    dump: Option<PathBuf>,
    db: Option<PathBuf>,
    api_key: Option<String>,
) -> Result<ExitCode> {
    let date = parse_date(date_str)?;
    let unit = FetchUnit::new(asset, date)?;

    let store = open_store(db).await?;
    let engine = build_engine(store.clone(), api_key, overwrite, Some(1), super::DEFAULT_RATE_LIMIT)?;

    let code = run_units(&engine, vec![unit], true, String::new()).await;

    if let Some(dir) = dump {
        if let Some(record) = store.history_record(asset, date).await? {
            let path = write_payload(&dir, &record)?;
            println!("Payload written to: {}", path.display());
        }
    }

    Ok(code)
}

/// Writes a record's raw payload to `<dir>/<asset>/<asset>_<date>.json`.
fn write_payload(dir: &Path, record: &HistoryRecord) -> Result<PathBuf> {
    let asset_dir = dir.join(&record.asset_id);
    std::fs::create_dir_all(&asset_dir)?;

    let path = asset_dir.join(format!("{}_{}.json", record.asset_id, record.date));
    std::fs::write(&path, serde_json::to_string_pretty(&record.payload)?)?;
    Ok(path)
}
