//! Pooled SQLite store for history rows and monthly aggregates.

use chrono::{DateTime, NaiveDate, Utc};
use daybook_types::{HistoryRecord, MonthKey, MonthlyAggregate};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous};
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Schema applied idempotently on open.
const SCHEMA: &str = include_str!("schema.sql");

/// Errors from the durable store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored payload document could not be decoded.
    #[error("Payload decode error: {0}")]
    Payload(#[from] serde_json::Error),

    /// The database directory could not be created.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Returns true if the store itself is gone (pool closed, file system
    /// failure) rather than a single statement having failed.
    ///
    /// Callers treat unavailability as fatal to the whole run; already
    /// committed rows remain valid.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        match self {
            Self::Database(e) => matches!(
                e,
                sqlx::Error::PoolClosed
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::Io(_)
                    | sqlx::Error::Configuration(_)
            ),
            Self::Io(_) => true,
            Self::Payload(_) => false,
        }
    }
}

/// Outcome of an idempotent history upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The row was written (first insert, or replacement under overwrite).
    Inserted,
    /// A row for the key already existed and was left untouched.
    AlreadyPresent,
}

/// Pooled SQLite handle over the `history` and `monthly_aggregate` tables.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Opens (creating if missing) the database at `path` and applies the
    /// schema.
    ///
    /// WAL journaling and a busy timeout let concurrent workers share the
    /// file; every write below goes through a transaction or a single
    /// conflict-handling statement.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema
    /// cannot be applied.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30))
            .foreign_keys(true);

        let pool = SqlitePool::connect_with(options).await?;
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;

        debug!(path = %path.display(), "store opened");
        Ok(Self { pool })
    }

    /// Closes the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Persists one unit's record: history upsert plus aggregate refresh in
    /// a single transaction.
    ///
    /// This is the all-or-nothing persistence step of a fetch: either the
    /// history row and its bucket's aggregate both commit, or neither does.
    /// When the key already exists (and `overwrite` is false) nothing
    /// changes and the bucket is not touched.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails; nothing is left behind.
    pub async fn store_record(
        &self,
        record: &HistoryRecord,
        overwrite: bool,
    ) -> Result<UpsertOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let outcome = upsert_history_on(&mut *tx, record, overwrite).await?;
        if outcome == UpsertOutcome::Inserted {
            refresh_aggregate_on(&mut *tx, &record.asset_id, record.month_key(), Utc::now())
                .await?;
        }

        tx.commit().await?;
        Ok(outcome)
    }

    /// Idempotently upserts a history row without touching aggregates.
    ///
    /// Two concurrent upserts for the same (asset_id, date) resolve to
    /// exactly one stored row; the loser observes [`UpsertOutcome::AlreadyPresent`].
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn upsert_history(
        &self,
        record: &HistoryRecord,
        overwrite: bool,
    ) -> Result<UpsertOutcome, StoreError> {
        let mut conn = self.pool.acquire().await?;
        upsert_history_on(&mut conn, record, overwrite).await
    }

    /// Recomputes the (asset, year, month) aggregate from the full current
    /// set of history rows in the bucket and upserts the aggregate row.
    ///
    /// Runs the read and the write inside one transaction, so two refreshes
    /// of the same bucket serialize and the last commit reflects every row
    /// present at that point. Returns `None` (and writes nothing) when the
    /// bucket holds no non-null prices.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails.
    pub async fn refresh_monthly_aggregate(
        &self,
        asset_id: &str,
        bucket: MonthKey,
    ) -> Result<Option<MonthlyAggregate>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let aggregate = refresh_aggregate_on(&mut *tx, asset_id, bucket, Utc::now()).await?;
        tx.commit().await?;
        Ok(aggregate)
    }

    /// Fetches one history row, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the payload is undecodable.
    pub async fn history_record(
        &self,
        asset_id: &str,
        date: NaiveDate,
    ) -> Result<Option<HistoryRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT asset_id, date, price, payload, stored_at \
             FROM history WHERE asset_id = ?1 AND date = ?2",
        )
        .bind(asset_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            Ok(HistoryRecord {
                asset_id: r.get("asset_id"),
                date: r.get("date"),
                price: r.get("price"),
                payload: serde_json::from_str(r.get::<&str, _>("payload"))?,
                stored_at: r.get("stored_at"),
            })
        })
        .transpose()
    }

    /// Returns the total number of history rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn history_count(&self) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM history")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("n") as u64)
    }

    /// Lists an asset's monthly aggregates, optionally filtered by year
    /// and month, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn monthly_aggregates(
        &self,
        asset_id: &str,
        year: Option<i32>,
        month: Option<u32>,
    ) -> Result<Vec<MonthlyAggregate>, StoreError> {
        let mut sql = String::from(
            "SELECT asset_id, year, month, min_price, max_price, updated_at \
             FROM monthly_aggregate WHERE asset_id = ?1",
        );
        if year.is_some() {
            sql.push_str(" AND year = ?2");
        }
        if month.is_some() {
            sql.push_str(if year.is_some() {
                " AND month = ?3"
            } else {
                " AND month = ?2"
            });
        }
        sql.push_str(" ORDER BY year DESC, month DESC");

        let mut query = sqlx::query(&sql).bind(asset_id);
        if let Some(y) = year {
            query = query.bind(y);
        }
        if let Some(m) = month {
            query = query.bind(m);
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(aggregate_from_row).collect())
    }

    /// Computes an asset's average price for one month directly over
    /// `history`.
    ///
    /// Averages are a read-time query, not a materialized column; only
    /// min/max are maintained incrementally.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn monthly_average(
        &self,
        asset_id: &str,
        bucket: MonthKey,
    ) -> Result<Option<f64>, StoreError> {
        let row = sqlx::query(
            "SELECT AVG(price) AS avg_price FROM history \
             WHERE asset_id = ?1 AND date >= ?2 AND date < ?3 AND price IS NOT NULL",
        )
        .bind(asset_id)
        .bind(bucket.first_day())
        .bind(bucket.next_month_first_day())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("avg_price"))
    }
}

/// Upserts a history row on an open connection or transaction.
async fn upsert_history_on(
    conn: &mut SqliteConnection,
    record: &HistoryRecord,
    overwrite: bool,
) -> Result<UpsertOutcome, StoreError> {
    let payload = record.payload.to_string();
    let sql = if overwrite {
        "INSERT INTO history (asset_id, date, price, payload, stored_at) \
         VALUES (?1, ?2, ?3, ?4, ?5) \
         ON CONFLICT(asset_id, date) DO UPDATE SET \
             price = excluded.price, \
             payload = excluded.payload, \
             stored_at = excluded.stored_at"
    } else {
        "INSERT INTO history (asset_id, date, price, payload, stored_at) \
         VALUES (?1, ?2, ?3, ?4, ?5) \
         ON CONFLICT(asset_id, date) DO NOTHING"
    };

    let result = sqlx::query(sql)
        .bind(&record.asset_id)
        .bind(record.date)
        .bind(record.price)
        .bind(&payload)
        .bind(record.stored_at)
        .execute(conn)
        .await?;

    if result.rows_affected() == 1 {
        Ok(UpsertOutcome::Inserted)
    } else {
        Ok(UpsertOutcome::AlreadyPresent)
    }
}

/// Recomputes and upserts one bucket's aggregate on an open transaction.
async fn refresh_aggregate_on(
    conn: &mut SqliteConnection,
    asset_id: &str,
    bucket: MonthKey,
    now: DateTime<Utc>,
) -> Result<Option<MonthlyAggregate>, StoreError> {
    // Full recompute over the bucket, not an incremental min/max against
    // the triggering record: out-of-order backfills must converge too.
    let row = sqlx::query(
        "SELECT MIN(price) AS min_price, MAX(price) AS max_price FROM history \
         WHERE asset_id = ?1 AND date >= ?2 AND date < ?3 AND price IS NOT NULL",
    )
    .bind(asset_id)
    .bind(bucket.first_day())
    .bind(bucket.next_month_first_day())
    .fetch_one(&mut *conn)
    .await?;

    let (min_price, max_price): (Option<f64>, Option<f64>) =
        (row.get("min_price"), row.get("max_price"));
    let (Some(min_price), Some(max_price)) = (min_price, max_price) else {
        // No priced rows in the bucket: leave the aggregate table untouched
        return Ok(None);
    };

    sqlx::query(
        "INSERT INTO monthly_aggregate (asset_id, year, month, min_price, max_price, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
         ON CONFLICT(asset_id, year, month) DO UPDATE SET \
             min_price = excluded.min_price, \
             max_price = excluded.max_price, \
             updated_at = excluded.updated_at",
    )
    .bind(asset_id)
    .bind(bucket.year)
    .bind(bucket.month)
    .bind(min_price)
    .bind(max_price)
    .bind(now)
    .execute(conn)
    .await?;

    Ok(Some(MonthlyAggregate {
        asset_id: asset_id.to_string(),
        year: bucket.year,
        month: bucket.month,
        min_price,
        max_price,
        updated_at: now,
    }))
}

/// Maps a `monthly_aggregate` row.
fn aggregate_from_row(row: &sqlx::sqlite::SqliteRow) -> MonthlyAggregate {
    MonthlyAggregate {
        asset_id: row.get("asset_id"),
        year: row.get::<i64, _>("year") as i32,
        month: row.get::<i64, _>("month") as u32,
        min_price: row.get("min_price"),
        max_price: row.get("max_price"),
        updated_at: row.get("updated_at"),
    }
}
