//! Opaque checkpoint tokens.
//!
//! A token is standard base64 over `"<version>:<timestamp>"`. Version 2 (the
//! only one issued) carries fractional epoch seconds; version 1 carries whole
//! epoch seconds and is still accepted from clients that kept an old token.
//!
//! Sync tokens and cursor tokens share this encoding; only the comparison the
//! fetcher applies to them differs.

use base64::prelude::{Engine as _, BASE64_STANDARD};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Version written by [`encode`].
pub const CURRENT_VERSION: u8 = 2;

const NANOS_PER_SEC: i128 = 1_000_000_000;
const FRACTION_DIGITS: usize = 9;

/// Reasons a token cannot be turned back into a timestamp.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is empty")]
    Empty,
    #[error("token is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("token payload is not valid UTF-8")]
    Utf8,
    #[error("token payload has no version prefix")]
    MissingVersion,
    #[error("unsupported token version `{0}`")]
    UnsupportedVersion(String),
    #[error("invalid token timestamp `{0}`")]
    InvalidTimestamp(String),
}

/// Encode a timestamp as a version-2 token.
///
/// Sub-microsecond precision is dropped.
pub fn encode(timestamp: DateTime<Utc>) -> String {
    BASE64_STANDARD.encode(format!("{CURRENT_VERSION}:{}", fractional_seconds(timestamp)))
}

/// Decode a token of any supported version.
///
/// ASCII whitespace anywhere in the token is ignored, since older issuers
/// wrapped the base64 text across lines.
pub fn decode(token: &str) -> Result<DateTime<Utc>, TokenError> {
    let compact: String = token
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    if compact.is_empty() {
        return Err(TokenError::Empty);
    }

    let bytes = BASE64_STANDARD.decode(compact.as_bytes())?;
    let payload = String::from_utf8(bytes).map_err(|_| TokenError::Utf8)?;
    let (version, timestamp) = payload
        .rsplit_once(':')
        .ok_or(TokenError::MissingVersion)?;

    match version {
        "1" => parse_whole_seconds(timestamp),
        "2" => parse_fractional_seconds(timestamp),
        other => Err(TokenError::UnsupportedVersion(other.to_string())),
    }
}

fn fractional_seconds(timestamp: DateTime<Utc>) -> String {
    let secs = timestamp.timestamp();
    let micros = timestamp.timestamp_subsec_micros();
    if secs < 0 && micros > 0 {
        // chrono floors negative instants, e.g. -0.25s is (-1, 750000us)
        format!("-{}.{:06}", -(secs + 1), 1_000_000 - micros)
    } else {
        format!("{secs}.{micros:06}")
    }
}

fn parse_whole_seconds(raw: &str) -> Result<DateTime<Utc>, TokenError> {
    let secs: i64 = raw
        .parse()
        .map_err(|_| TokenError::InvalidTimestamp(raw.to_string()))?;
    DateTime::from_timestamp(secs, 0).ok_or_else(|| TokenError::InvalidTimestamp(raw.to_string()))
}

fn parse_fractional_seconds(raw: &str) -> Result<DateTime<Utc>, TokenError> {
    let invalid = || TokenError::InvalidTimestamp(raw.to_string());

    let (negative, unsigned) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let secs: i128 = whole.parse().map_err(|_| invalid())?;
    let mut digits: String = fraction.chars().take(FRACTION_DIGITS).collect();
    while digits.len() < FRACTION_DIGITS {
        digits.push('0');
    }
    let nanos: i128 = digits.parse().map_err(|_| invalid())?;

    let mut total = secs
        .checked_mul(NANOS_PER_SEC)
        .and_then(|value| value.checked_add(nanos))
        .ok_or_else(invalid)?;
    if negative {
        total = -total;
    }

    let secs = i64::try_from(total.div_euclid(NANOS_PER_SEC)).map_err(|_| invalid())?;
    let nanos = u32::try_from(total.rem_euclid(NANOS_PER_SEC)).map_err(|_| invalid())?;
    DateTime::from_timestamp(secs, nanos).ok_or_else(invalid)
}
