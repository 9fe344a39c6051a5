//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for record identities and
//! last-modified timestamps. Each newtype ensures data validity at
//! construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// BackendId
// ============================================================================

/// Marker that prefixes every locally-minted identity.
pub const PROVISIONAL_PREFIX: &str = "local_";

/// Globally unique, immutable identity of a synchronized record
///
/// Either issued by the backend or minted locally with the
/// [`PROVISIONAL_PREFIX`] marker. A provisional id is never renamed: it
/// becomes the permanent row id on first successful remote creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BackendId(String);

impl BackendId {
    /// Create a new BackendId
    ///
    /// # Errors
    /// Returns error if the id is empty or contains whitespace
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.is_empty() || id.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidBackendId(id));
        }
        Ok(Self(id))
    }

    /// Builds a provisional id `local_<epoch-millis>_<suffix>`
    ///
    /// Whitespace in `suffix` is dropped so the result is always valid.
    #[must_use]
    pub fn provisional(at: Timestamp, suffix: &str) -> Self {
        let suffix: String = suffix.chars().filter(|c| !c.is_whitespace()).collect();
        Self(format!("{PROVISIONAL_PREFIX}{}_{}", at.as_millis(), suffix))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this id was minted locally rather than issued by the backend
    #[must_use]
    pub fn is_provisional(&self) -> bool {
        self.0.starts_with(PROVISIONAL_PREFIX)
    }
}

impl Display for BackendId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BackendId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for BackendId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BackendId> for String {
    fn from(id: BackendId) -> Self {
        id.0
    }
}

// ============================================================================
// Timestamp
// ============================================================================

/// Last-modified instant used for last-write-wins comparison
///
/// Comparison happens at millisecond precision, matching what the stored
/// ISO-8601 strings carry. Parsing is explicit: [`Timestamp::parse`] rejects
/// unknown formats, while [`Timestamp::parse_or_epoch`] maps missing or
/// malformed input onto the Unix epoch so that such records always lose a
/// comparison against any real modification time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

/// Naive layouts accepted in addition to RFC 3339; interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

impl Timestamp {
    /// The Unix epoch, used as the fallback for missing timestamps
    #[must_use]
    pub fn epoch() -> Self {
        Self(DateTime::<Utc>::default())
    }

    /// The current wall-clock time, truncated to milliseconds
    #[must_use]
    pub fn now() -> Self {
        Self::from_millis(Utc::now().timestamp_millis())
    }

    /// Builds a timestamp from epoch milliseconds; out-of-range values map to the epoch
    #[must_use]
    pub fn from_millis(millis: i64) -> Self {
        Utc.timestamp_millis_opt(millis)
            .single()
            .map(Self)
            .unwrap_or_else(Self::epoch)
    }

    /// Parses an ISO-8601 timestamp
    ///
    /// Accepted layouts:
    /// - RFC 3339 with any offset (`2024-06-02T00:00:00Z`, `...+03:00`)
    /// - PostgreSQL text output (`2024-06-02 00:00:00.123+00`)
    /// - naive date-time with `T` or space separator (assumed UTC)
    /// - bare date (`2024-06-02`, midnight UTC)
    ///
    /// # Errors
    /// Returns [`DomainError::InvalidTimestamp`] if no layout matches
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(DomainError::InvalidTimestamp(s.to_string()));
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(Self::from_datetime(dt.with_timezone(&Utc)));
        }
        if let Ok(dt) = DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f%#z") {
            return Ok(Self::from_datetime(dt.with_timezone(&Utc)));
        }
        for format in NAIVE_FORMATS {
            if let Ok(ndt) = NaiveDateTime::parse_from_str(trimmed, format) {
                return Ok(Self::from_datetime(ndt.and_utc()));
            }
        }
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            if let Some(ndt) = date.and_hms_opt(0, 0, 0) {
                return Ok(Self::from_datetime(ndt.and_utc()));
            }
        }

        Err(DomainError::InvalidTimestamp(s.to_string()))
    }

    /// Parses an optional timestamp, falling back to the epoch
    #[must_use]
    pub fn parse_or_epoch(s: Option<&str>) -> Self {
        s.and_then(|raw| Self::parse(raw).ok())
            .unwrap_or_else(Self::epoch)
    }

    /// Milliseconds since the Unix epoch
    #[must_use]
    pub fn as_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    /// Returns true if this is the epoch fallback value
    #[must_use]
    pub fn is_epoch(&self) -> bool {
        self.as_millis() == 0
    }

    /// Inner chrono value
    #[must_use]
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Formats as `YYYY-MM-DDTHH:MM:SS.mmmZ`
    #[must_use]
    pub fn to_iso_string(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self::from_millis(dt.timestamp_millis())
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::epoch()
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_iso_string())
    }
}

impl FromStr for Timestamp {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::from_datetime(dt)
    }
}
