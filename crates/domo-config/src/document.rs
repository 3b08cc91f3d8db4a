//! Schedule document model
//!
//! A schedule document holds a map of named days and a map of named
//! templates. Days carry a selection predicate (`when`), an override list
//! (`replaces`), a default location scope and an ordered entry list.
//! Template entries reuse the same entry shape, with times read as offsets
//! from an anchor instead of absolute times of day.

use chrono::{NaiveDate, NaiveTime, Weekday};
use domo_core::time::hhmm;
use domo_core::Action;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// The whole schedule document. Loaded once and swapped atomically on
/// reload; never mutated in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleDocument {
    /// Named day definitions, in declaration order.
    #[serde(default)]
    pub day: IndexMap<String, DaySpec>,

    /// Named reusable schedule fragments with relative times.
    #[serde(default)]
    pub template: IndexMap<String, TemplateSpec>,
}

/// A named, conditionally selected bundle of schedule entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DaySpec {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,

    /// Selection predicate; absent means the day always matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<WhenSpec>,

    /// Days this one supersedes when both are selected for a date.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replaces: Vec<String>,

    /// Default location scope for the day's entries.
    #[serde(default)]
    pub locations: HashSet<String>,

    #[serde(default)]
    pub schedule: Vec<ScheduleEntry>,
}

/// Selection predicate for a day. Both clauses must hold when present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WhenSpec {
    /// Weekday names ("monday", "tue", ...); empty means no weekday clause.
    #[serde(default, with = "weekday_names", skip_serializing_if = "Vec::is_empty")]
    pub days_of_week: Vec<Weekday>,

    /// Date or date-range literals; empty means no date clause.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dates: Vec<DateSpan>,
}

/// A single date or an inclusive date range.
///
/// Parses from `"YYYY-MM-DD"` or `"YYYY-MM-DD to YYYY-MM-DD"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DateSpan {
    pub first: NaiveDate,
    pub last: NaiveDate,
}

impl DateSpan {
    /// Whether `date` falls inside the span (inclusive on both ends).
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.first <= date && date <= self.last
    }
}

/// Error raised for malformed date literals in `when.dates`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateSpanError(String);

impl fmt::Display for DateSpanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid date literal '{}': expected YYYY-MM-DD or 'YYYY-MM-DD to YYYY-MM-DD'", self.0)
    }
}

impl std::error::Error for DateSpanError {}

impl TryFrom<String> for DateSpan {
    type Error = DateSpanError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let parse = |s: &str| {
            s.trim()
                .parse::<NaiveDate>()
                .map_err(|_| DateSpanError(value.clone()))
        };

        match value.split_once(" to ") {
            Some((first, last)) => Ok(Self {
                first: parse(first)?,
                last: parse(last)?,
            }),
            None => {
                let date = parse(&value)?;
                Ok(Self { first: date, last: date })
            }
        }
    }
}

impl From<DateSpan> for String {
    fn from(span: DateSpan) -> Self {
        if span.first == span.last {
            span.first.to_string()
        } else {
            format!("{} to {}", span.first, span.last)
        }
    }
}

/// One time-tagged entry in a day or template schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// Time of day, or offset from the anchor inside a template.
    #[serde(with = "hhmm")]
    pub time: NaiveTime,

    /// Narrow the inherited location scope to this set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<HashSet<String>>,

    /// Locations removed from the scope for this entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations_exclude: Option<HashSet<String>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,

    /// Template to expand at this entry's time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    /// Marks this entry as the end of a timer window; the previous entry's
    /// time is the start anchor. A bare `timer:` key is a marker with the
    /// default name.
    #[serde(
        default,
        deserialize_with = "timer_marker",
        skip_serializing_if = "Option::is_none"
    )]
    pub timer: Option<TimerMarker>,
}

/// Payload of an entry's `timer` marker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerMarker {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A reusable schedule fragment whose times are offsets from an anchor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateSpec {
    #[serde(default)]
    pub schedule: Vec<ScheduleEntry>,
}

/// `timer:` with a null body still marks the entry as a timer end.
fn timer_marker<'de, D>(deserializer: D) -> Result<Option<TimerMarker>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let marker: Option<TimerMarker> = Option::deserialize(deserializer)?;
    Ok(Some(marker.unwrap_or_default()))
}

/// Serde adapter reading weekday lists as lowercase names.
mod weekday_names {
    use chrono::Weekday;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(days: &[Weekday], serializer: S) -> Result<S::Ok, S::Error> {
        let names: Vec<String> = days
            .iter()
            .map(|day| {
                match day {
                    Weekday::Mon => "monday",
                    Weekday::Tue => "tuesday",
                    Weekday::Wed => "wednesday",
                    Weekday::Thu => "thursday",
                    Weekday::Fri => "friday",
                    Weekday::Sat => "saturday",
                    Weekday::Sun => "sunday",
                }
                .to_string()
            })
            .collect();
        names.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Weekday>, D::Error> {
        let names: Vec<String> = Vec::deserialize(deserializer)?;
        names
            .into_iter()
            .map(|name| {
                Weekday::from_str(&name).map_err(|_| {
                    serde::de::Error::custom(format!("unknown weekday name '{}'", name))
                })
            })
            .collect()
    }
}
