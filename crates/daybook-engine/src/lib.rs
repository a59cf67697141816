//! Bulk acquisition engine for the daybook price history acquirer.
//!
//! This crate ties the outbound and durable sides together:
//!
//! - [`Engine`] - Dispatches (asset, date) units to a bounded set of
//!   concurrent workers and collects one terminal outcome per unit
//! - [`RetryPolicy`] - Exponential backoff with jitter for transient
//!   failures
//! - [`RunReport`] - The run's sole result object: per-unit outcomes,
//!   counts, failure reasons
//! - [`CancelFlag`] - Cooperative cancellation of an in-flight run
//!
//! One failing unit never aborts the run; every unit reaches a terminal
//! [`FetchOutcome`] unless the run is cancelled first. Running the same
//! unit set at any concurrency (1 included) converges on the same durable
//! state.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod cancel;
mod engine;
mod report;
mod retry;

pub use cancel::CancelFlag;
pub use engine::{Engine, EngineConfig};
pub use report::{FailureKind, FetchOutcome, RunReport, UnitFailure, UnitResult};
pub use retry::RetryPolicy;
