//! `HH:MM` clock-time parsing and serde helpers
//!
//! Schedule documents express every time of day (and every template offset)
//! as an `HH:MM` string. These helpers parse that format strictly and
//! round-trip `chrono::NaiveTime` values through it.

use chrono::NaiveTime;
use thiserror::Error;

/// Error type for invalid `HH:MM` strings
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TimeError {
    #[error("time '{0}' is not in HH:MM format")]
    InvalidFormat(String),

    #[error("time '{0}' is out of range")]
    OutOfRange(String),
}

/// Parse a strict `HH:MM` string into a `NaiveTime`.
pub fn parse_hhmm(s: &str) -> Result<NaiveTime, TimeError> {
    let (hh, mm) = s
        .split_once(':')
        .ok_or_else(|| TimeError::InvalidFormat(s.to_string()))?;

    let hours: u32 = hh
        .parse()
        .map_err(|_| TimeError::InvalidFormat(s.to_string()))?;
    let minutes: u32 = mm
        .parse()
        .map_err(|_| TimeError::InvalidFormat(s.to_string()))?;

    NaiveTime::from_hms_opt(hours, minutes, 0).ok_or_else(|| TimeError::OutOfRange(s.to_string()))
}

/// Format a `NaiveTime` as `HH:MM`, discarding seconds.
pub fn format_hhmm(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Serde adapter serializing a `NaiveTime` as an `HH:MM` string.
pub mod hhmm {
    use super::{format_hhmm, parse_hhmm};
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_hhmm(*time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_hhmm(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for `Option<NaiveTime>` fields using `HH:MM` strings.
pub mod hhmm_opt {
    use super::{format_hhmm, parse_hhmm};
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        time: &Option<NaiveTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match time {
            Some(time) => serializer.serialize_some(&format_hhmm(*time)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveTime>, D::Error> {
        let s: Option<String> = Option::deserialize(deserializer)?;
        s.map(|s| parse_hhmm(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
