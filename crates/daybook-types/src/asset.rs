//! Asset identifier validation.

use thiserror::Error;

/// Error for malformed asset identifiers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetIdError {
    /// Asset id was empty.
    #[error("Asset id is empty")]
    Empty,

    /// Asset id contained characters outside the allowed slug alphabet.
    #[error("Invalid asset id: {id:?} (expected lowercase letters, digits, and '-')")]
    InvalidChars {
        /// The rejected id.
        id: String,
    },
}

/// Validates an asset identifier.
///
/// Asset ids follow the remote API's slug shape: non-empty, lowercase
/// ASCII letters, digits, and hyphens (e.g. `bitcoin`, `usd-coin`).
///
/// # Errors
///
/// Returns an error if the id is empty or contains other characters.
pub fn validate_asset_id(id: &str) -> Result<(), AssetIdError> {
    if id.is_empty() {
        return Err(AssetIdError::Empty);
    }
    if !id
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return Err(AssetIdError::InvalidChars { id: id.to_string() });
    }
    Ok(())
}
