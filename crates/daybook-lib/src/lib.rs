//! Library facade for the daybook price history acquirer.
//!
//! This is a facade crate that re-exports functionality from the daybook
//! workspace crates for convenient access.
//!
//! # Quick Start
//!
//! ```ignore
//! use daybook_lib::prelude::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Arc::new(CoinGeckoClient::with_defaults()?);
//!     let store = Store::open("daybook.db").await?;
//!     let limiter = Arc::new(RateLimiter::new(30, Duration::from_secs(60)));
//!     let engine = Engine::new(client, store, limiter, EngineConfig::default());
//!
//!     let range = DateRange::new(
//!         chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
//!         chrono::NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
//!     )?;
//!     let units = FetchUnit::expand(&["bitcoin".to_string()], range)?;
//!
//!     let report = engine.run(units, &CancelFlag::new()).await;
//!     println!("stored {} of {}", report.stored(), report.planned);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use daybook_types::*;

// Re-export fetch functionality
#[cfg(feature = "fetch")]
pub use daybook_fetch::{ClientConfig, ClientError, CoinGeckoClient, PriceSource, RateLimiter};

// Re-export storage
#[cfg(feature = "store")]
pub use daybook_store::{Store, StoreError, UpsertOutcome};

// Re-export the engine
#[cfg(feature = "engine")]
pub use daybook_engine::{
    CancelFlag, Engine, EngineConfig, FailureKind, FetchOutcome, RetryPolicy, RunReport,
    UnitFailure, UnitResult,
};

/// Prelude module for convenient imports.
///
/// ```
/// use daybook_lib::prelude::*;
/// ```
pub mod prelude {
    pub use daybook_types::{
        AssetIdError, DailyQuote, DateRange, DateRangeError, FetchUnit, HistoryRecord, MonthKey,
        MonthlyAggregate, validate_asset_id,
    };

    #[cfg(feature = "fetch")]
    pub use daybook_fetch::{ClientConfig, ClientError, CoinGeckoClient, PriceSource, RateLimiter};

    #[cfg(feature = "store")]
    pub use daybook_store::{Store, StoreError, UpsertOutcome};

    #[cfg(feature = "engine")]
    pub use daybook_engine::{
        CancelFlag, Engine, EngineConfig, FetchOutcome, RetryPolicy, RunReport,
    };
}
