//! Import previously dumped payload files into the store.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use daybook_lib::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::warn;

use super::open_store;

/// Walks `<dir>/<asset>/<asset>_<date>.json` files and upserts each one
/// through the same idempotent path as a fetched record.
pub(crate) async fn import(dir: &Path, overwrite: bool, db: Option<PathBuf>) -> Result<ExitCode> {
    let store = open_store(db).await?;

    let mut imported = 0usize;
    let mut present = 0usize;
    let mut failed = 0usize;
    let mut total = 0usize;

    for asset_entry in std::fs::read_dir(dir)
        .with_context(|| format!("Cannot read import directory {}", dir.display()))?
    {
        let asset_entry = asset_entry?;
        if !asset_entry.file_type()?.is_dir() {
            continue;
        }
        let asset_id = asset_entry.file_name().to_string_lossy().into_owned();
        if validate_asset_id(&asset_id).is_err() {
            warn!(dir = %asset_entry.path().display(), "skipping non-asset directory");
            continue;
        }

        for file_entry in std::fs::read_dir(asset_entry.path())? {
            let path = file_entry?.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            total += 1;
            match import_file(&store, &asset_id, &path, overwrite).await {
                Ok(UpsertOutcome::Inserted) => imported += 1,
                Ok(UpsertOutcome::AlreadyPresent) => present += 1,
                Err(err) => {
                    warn!(file = %path.display(), error = %err, "import failed");
                    println!("  failed {}: {err}", path.display());
                    failed += 1;
                }
            }
        }
    }

    println!(
        "Imported: {imported}  Already present: {present}  Failed: {failed}  (of {total} files)"
    );
    Ok(if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Imports one payload file, taking the date from the file name.
async fn import_file(
    store: &Store,
    asset_id: &str,
    path: &Path,
    overwrite: bool,
) -> Result<UpsertOutcome> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .context("Unreadable file name")?;
    let date_str = stem
        .rsplit('_')
        .next()
        .context("No date in file name")?;
    let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .with_context(|| format!("Invalid date in file name: {date_str}"))?;

    let payload: Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    let record = HistoryRecord::new(
        asset_id.to_string(),
        date,
        DailyQuote::from_payload(payload),
    );

    Ok(store.store_record(&record, overwrite).await?)
}
