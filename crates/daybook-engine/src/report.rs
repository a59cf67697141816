//! Run reporting.

use chrono::{DateTime, Utc};
use daybook_types::FetchUnit;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Classification of a terminal per-unit failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Retries exhausted against the remote quota.
    RateLimited,
    /// Retries exhausted against transient remote failures.
    Transient,
    /// The remote rejected the unit; retrying cannot fix it.
    Permanent,
    /// The fetched record could not be persisted.
    Storage,
    /// The durable store became unavailable; the run aborted.
    StorageUnavailable,
}

/// A terminal per-unit failure: what went wrong and how many attempts it
/// took to give up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitFailure {
    /// Failure classification.
    pub kind: FailureKind,
    /// Human-readable reason (the last error observed).
    pub reason: String,
    /// Total fetch attempts made for the unit.
    pub attempts: u32,
}

/// The terminal outcome of one unit. Produced exactly once per dispatched
/// unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum FetchOutcome {
    /// The record was fetched and durably stored.
    Stored,
    /// A record for the key already existed; nothing changed.
    AlreadyPresent,
    /// The unit failed terminally.
    Failed(UnitFailure),
}

/// One unit paired with its terminal outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitResult {
    /// The unit of work.
    pub unit: FetchUnit,
    /// Its terminal outcome.
    pub outcome: FetchOutcome,
}

/// Summary of one acquisition run.
///
/// A report is a normal value, never an error: a non-empty failure list is
/// a representable result. It is the only object the engine surfaces to
/// callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Identifier of this run (for log correlation).
    pub run_id: Uuid,
    /// How many units the run was asked to process.
    pub planned: usize,
    /// One entry per dispatched unit.
    pub results: Vec<UnitResult>,
    /// True if the run was cancelled before dispatching every unit.
    pub cancelled: bool,
    /// Set when the run aborted because the store became unavailable.
    pub fatal: Option<String>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Number of units stored.
    #[must_use]
    pub fn stored(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome == FetchOutcome::Stored)
            .count()
    }

    /// Number of units whose record already existed.
    #[must_use]
    pub fn already_present(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome == FetchOutcome::AlreadyPresent)
            .count()
    }

    /// Number of units that failed terminally.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failures().count()
    }

    /// Number of planned units never dispatched (cancelled or aborted
    /// runs only).
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.planned - self.results.len()
    }

    /// Iterates over the failed units and their failures.
    pub fn failures(&self) -> impl Iterator<Item = (&FetchUnit, &UnitFailure)> {
        self.results.iter().filter_map(|r| match &r.outcome {
            FetchOutcome::Failed(failure) => Some((&r.unit, failure)),
            _ => None,
        })
    }

    /// Returns true if any unit failed or the run aborted.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.fatal.is_some() || self.failed() > 0
    }
}
