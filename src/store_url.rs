//! Extraction of store identifiers from storefront URLs.
//!
//! Only the identifier substring is checked; scheme and host are not
//! validated, so any string carrying the pattern is accepted.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AppError, Result};

static PACKAGE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"id=([^&]+)").expect("Failed to compile package id pattern"));

static ITUNES_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/id(\d+)").expect("Failed to compile iTunes id pattern"));

/// Package name from a Google Play URL, e.g. `details?id=com.chase.sig.android`.
pub fn extract_package_id(url: &str) -> Result<String> {
    PACKAGE_ID
        .captures(url)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| AppError::InvalidUrl("Invalid Google Play Store URL".to_string()))
}

/// Numeric track id from an App Store URL, e.g. `/app/chase-mobile/id298867247`.
pub fn extract_itunes_id(url: &str) -> Result<String> {
    ITUNES_ID
        .captures(url)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| AppError::InvalidUrl("Invalid App Store URL".to_string()))
}
