//! Durable record representations.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A parsed remote record for one (asset, date): the extracted daily price
/// plus the raw payload document it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyQuote {
    /// Closing price in USD, if the payload carried one.
    pub price: Option<f64>,
    /// The full remote payload, kept opaque.
    pub payload: Value,
}

impl DailyQuote {
    /// Creates a quote from a raw payload document, extracting the USD
    /// price from `market_data.current_price.usd` when present.
    #[must_use]
    pub fn from_payload(payload: Value) -> Self {
        let price = payload
            .pointer("/market_data/current_price/usd")
            .and_then(Value::as_f64);
        Self { price, payload }
    }
}

/// A durable per-day history row.
///
/// At most one record exists per (asset_id, date); the store enforces this
/// as its primary uniqueness constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// The asset identifier.
    pub asset_id: String,
    /// The calendar date this record describes.
    pub date: NaiveDate,
    /// Daily price in USD (null when the payload had none).
    pub price: Option<f64>,
    /// The raw remote payload.
    pub payload: Value,
    /// When this record was written.
    pub stored_at: DateTime<Utc>,
}

impl HistoryRecord {
    /// Creates a record for an (asset, date) from a parsed quote,
    /// stamped with the current time.
    #[must_use]
    pub fn new(asset_id: String, date: NaiveDate, quote: DailyQuote) -> Self {
        Self {
            asset_id,
            date,
            price: quote.price,
            payload: quote.payload,
            stored_at: Utc::now(),
        }
    }

    /// Returns the (year, month) bucket this record falls into.
    #[must_use]
    pub fn month_key(&self) -> MonthKey {
        MonthKey::from_date(self.date)
    }
}

/// An (asset-independent) year/month bucket key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonthKey {
    /// Calendar year.
    pub year: i32,
    /// Calendar month (1-12).
    pub month: u32,
}

impl MonthKey {
    /// Creates a month key from a date.
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Returns the first day of this month.
    ///
    /// # Panics
    ///
    /// Panics if the key does not hold a valid month (1-12).
    #[must_use]
    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).expect("valid month key")
    }

    /// Returns the first day of the following month.
    ///
    /// Used as the exclusive upper bound when selecting a month's records.
    ///
    /// # Panics
    ///
    /// Panics if the key does not hold a valid month (1-12).
    #[must_use]
    pub fn next_month_first_day(&self) -> NaiveDate {
        let (year, month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        NaiveDate::from_ymd_opt(year, month, 1).expect("valid month key")
    }
}

impl std::fmt::Display for MonthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// The derived per-month min/max price summary for one asset.
///
/// Derived, not authoritative: its values always equal the min/max over
/// the non-null prices of all history rows in the same bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyAggregate {
    /// The asset identifier.
    pub asset_id: String,
    /// Calendar year.
    pub year: i32,
    /// Calendar month (1-12).
    pub month: u32,
    /// Minimum daily price observed in the month.
    pub min_price: f64,
    /// Maximum daily price observed in the month.
    pub max_price: f64,
    /// When this row was last recomputed.
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_quote_from_payload() {
        let payload = json!({
            "id": "bitcoin",
            "market_data": { "current_price": { "usd": 42000.5, "eur": 39000.0 } }
        });
        let quote = DailyQuote::from_payload(payload);
        assert_eq!(quote.price, Some(42000.5));
    }

    #[test]
    fn test_quote_from_payload_without_price() {
        let quote = DailyQuote::from_payload(json!({ "id": "bitcoin" }));
        assert_eq!(quote.price, None);
    }

    #[test]
    fn test_record_month_key() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let record = HistoryRecord::new(
            "bitcoin".to_string(),
            date,
            DailyQuote::from_payload(json!({})),
        );
        assert_eq!(record.month_key(), MonthKey { year: 2024, month: 3 });
    }

    #[test]
    fn test_month_key_bounds() {
        let key = MonthKey { year: 2024, month: 2 };
        assert_eq!(key.first_day(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(
            key.next_month_first_day(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );

        let december = MonthKey { year: 2024, month: 12 };
        assert_eq!(
            december.next_month_first_day(),
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
        );
    }

    #[test]
    fn test_month_key_display() {
        let key = MonthKey { year: 2024, month: 3 };
        assert_eq!(key.to_string(), "2024-03");
    }
}
