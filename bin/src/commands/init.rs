//! Database initialization command.

use anyhow::{Context, Result};
use daybook_lib::prelude::*;
use std::path::PathBuf;
use std::process::ExitCode;

use super::resolve_db_path;

/// Create the database and apply the schema.
pub(crate) async fn init(db: Option<PathBuf>) -> Result<ExitCode> {
    let path = resolve_db_path(db);
    let store = Store::open(&path)
        .await
        .with_context(|| format!("Failed to initialize database at {}", path.display()))?;
    store.close().await;

    println!("Database initialized at: {}", path.display());
    Ok(ExitCode::SUCCESS)
}
