//! HTTP client and rate limiting for the daybook price history acquirer.
//!
//! This crate provides the outbound side of the acquisition pipeline:
//!
//! - [`PriceSource`] - The seam the engine fetches through
//! - [`CoinGeckoClient`] - Production client for the CoinGecko history API
//! - [`ClientError`] - Transient/permanent classification of fetch failures
//! - [`RateLimiter`] - Shared sliding-window throttle for fetch attempts
//!
//! The client performs no retries of its own: it classifies each failure
//! and leaves the retry discipline to the caller, which must re-acquire
//! the shared [`RateLimiter`] before every attempt.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod rate_limit;

pub use client::{ClientConfig, ClientError, CoinGeckoClient, PriceSource};
pub use rate_limit::RateLimiter;
