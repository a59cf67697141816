//! Error types for daybook.

use chrono::NaiveDate;
use thiserror::Error;

/// Error for invalid date ranges.
///
/// An invalid range fails a run immediately, before any fetch is issued.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DateRangeError {
    /// Start date is after end date.
    #[error("Invalid date range: {start} > {end}")]
    InvalidRange {
        /// The start date.
        start: NaiveDate,
        /// The end date.
        end: NaiveDate,
    },
}
