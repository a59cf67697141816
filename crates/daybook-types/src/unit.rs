//! Units of acquisition work.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{AssetIdError, DateRange, validate_asset_id};

/// One (asset, date) unit of acquisition work.
///
/// Units within a run are pairwise distinct; a unit identifies exactly one
/// fetch-and-persist operation and is immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchUnit {
    /// The asset identifier.
    pub asset_id: String,
    /// The calendar date to fetch.
    pub date: NaiveDate,
}

impl FetchUnit {
    /// Creates a unit, validating the asset id.
    ///
    /// # Errors
    ///
    /// Returns an error if the asset id is malformed.
    pub fn new(asset_id: impl Into<String>, date: NaiveDate) -> Result<Self, AssetIdError> {
        let asset_id = asset_id.into();
        validate_asset_id(&asset_id)?;
        Ok(Self { asset_id, date })
    }

    /// Expands a set of assets over a date range into an ordered,
    /// duplicate-free unit list (assets in the given order, days ascending
    /// within each asset).
    ///
    /// # Errors
    ///
    /// Returns an error if any asset id is malformed.
    pub fn expand(assets: &[String], range: DateRange) -> Result<Vec<Self>, AssetIdError> {
        for asset in assets {
            validate_asset_id(asset)?;
        }
        let mut units = Vec::with_capacity(assets.len() * range.total_days());
        for asset in assets {
            for date in range.days() {
                units.push(Self {
                    asset_id: asset.clone(),
                    date,
                });
            }
        }
        Ok(units)
    }
}

impl std::fmt::Display for FetchUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} @ {}", self.asset_id, self.date)
    }
}
