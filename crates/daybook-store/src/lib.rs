//! SQLite storage and derived aggregates for the daybook price history
//! acquirer.
//!
//! This crate owns the durable side of the pipeline:
//!
//! - [`Store`] - Pooled SQLite handle over the `history` and
//!   `monthly_aggregate` tables
//! - [`Store::store_record`] - One unit's all-or-nothing persistence step:
//!   conditional history insert plus aggregate refresh in one transaction
//! - [`UpsertOutcome`] - Whether an upsert stored a row or found one present
//!
//! Uniqueness of (asset_id, date) and (asset_id, year, month) is enforced
//! by the database, not by application-level read-then-write: concurrent
//! writers racing on the same key resolve through `ON CONFLICT` clauses.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod store;

pub use store::{Store, StoreError, UpsertOutcome};
