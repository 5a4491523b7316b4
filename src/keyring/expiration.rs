// Key expiration derived from a self-signature

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Expiration of a key as far as its self-signature tells.
///
/// `Unknown` means no key lifetime was found. It is not the same as "never
/// expires"; stores persist it as the epoch-zero instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "at", rename_all = "snake_case")]
pub enum Expiration {
    Known(DateTime<Utc>),
    Unknown,
}

impl Expiration {
    /// Expiration of a key created at `creation` with an optional lifetime
    pub fn from_lifetime(creation: DateTime<Utc>, lifetime: Option<Duration>) -> Self {
        let Some(lifetime) = lifetime else {
            return Expiration::Unknown;
        };

        // Key lifetimes are 32-bit second counts, so whole seconds are exact
        let Ok(secs) = i64::try_from(lifetime.as_secs()) else {
            return Expiration::Unknown;
        };

        chrono::Duration::try_seconds(secs)
            .and_then(|delta| creation.checked_add_signed(delta))
            .map_or(Expiration::Unknown, Expiration::Known)
    }

    /// Interpret an instant read from a store; epoch zero reads as `Unknown`
    pub fn from_stored(instant: DateTime<Utc>) -> Self {
        if instant.timestamp() == 0 {
            Expiration::Unknown
        } else {
            Expiration::Known(instant)
        }
    }

    /// The instant a store should persist
    pub fn to_stored(&self) -> DateTime<Utc> {
        match self {
            Expiration::Known(at) => *at,
            Expiration::Unknown => DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    /// Whole seconds since the Unix epoch, `0` when unknown
    pub fn unix_seconds(&self) -> i64 {
        self.to_stored().timestamp()
    }

    /// Equal at whole-second granularity
    pub fn same_second(&self, other: &Expiration) -> bool {
        self.unix_seconds() == other.unix_seconds()
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Expiration::Known(_))
    }

    /// Build from Unix seconds, `0` meaning unknown
    pub fn from_unix_seconds(secs: i64) -> Option<Self> {
        Utc.timestamp_opt(secs, 0).single().map(Self::from_stored)
    }
}

impl fmt::Display for Expiration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expiration::Known(at) => write!(f, "{} ({})", at.format("%Y-%m-%d %H:%M:%S UTC"), at.timestamp()),
            Expiration::Unknown => f.write_str("unknown (0)"),
        }
    }
}
