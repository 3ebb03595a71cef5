//! Timestamp precision for line-protocol points.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::DataError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    #[default]
    Nanosecond,
    Microsecond,
    Millisecond,
    Second,
}

impl Precision {
    /// Render `t` as an integer timestamp at this precision.
    pub fn timestamp(&self, t: &DateTime<Utc>) -> i64 {
        match self {
            // Outside the i64 nanosecond range (~1677..2262) fall back to micros * 1000.
            Precision::Nanosecond => t
                .timestamp_nanos_opt()
                .unwrap_or_else(|| t.timestamp_micros().saturating_mul(1_000)),
            Precision::Microsecond => t.timestamp_micros(),
            Precision::Millisecond => t.timestamp_millis(),
            Precision::Second => t.timestamp(),
        }
    }

    /// Smallest step that changes [`Precision::timestamp`].
    pub fn unit(&self) -> TimeDelta {
        match self {
            Precision::Nanosecond => TimeDelta::nanoseconds(1),
            Precision::Microsecond => TimeDelta::microseconds(1),
            Precision::Millisecond => TimeDelta::milliseconds(1),
            Precision::Second => TimeDelta::seconds(1),
        }
    }

    /// Value of the `precision` query parameter, `None` for the server default.
    pub fn query_param(&self) -> Option<&'static str> {
        match self {
            Precision::Nanosecond => None,
            Precision::Microsecond => Some("u"),
            Precision::Millisecond => Some("ms"),
            Precision::Second => Some("s"),
        }
    }
}

impl FromStr for Precision {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "n" | "ns" => Ok(Precision::Nanosecond),
            "u" | "us" => Ok(Precision::Microsecond),
            "ms" => Ok(Precision::Millisecond),
            "s" => Ok(Precision::Second),
            other => Err(DataError::InvalidPrecision(other.to_string())),
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Precision::Nanosecond => "ns",
            Precision::Microsecond => "us",
            Precision::Millisecond => "ms",
            Precision::Second => "s",
        };
        f.write_str(s)
    }
}
