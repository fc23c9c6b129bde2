//! Schedule predicate
//!
//! A five-field cron-like pattern: minute, hour, day of month, month and day
//! of week. Each field is `*`, a single non-negative integer, or a comma
//! separated list of integers. Ranges (`-`) and steps (`/`) are rejected.
//! Day of week counts from Sunday as 0.

use chrono::{DateTime, Datelike, Timelike, Utc};
use std::fmt;
use std::str::FromStr;

/// Errors raised while parsing a schedule
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("expected 5 fields, found {0}")]
    FieldCount(usize),

    #[error("unsupported syntax in {field} field: {value}")]
    UnsupportedSyntax { field: &'static str, value: String },

    #[error("invalid number in {field} field: {value}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("{field} value {value} is outside {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Field {
    Any,
    Values(Vec<u32>),
}

impl Field {
    fn matches(&self, value: u32) -> bool {
        match self {
            Field::Any => true,
            Field::Values(values) => values.contains(&value),
        }
    }
}

struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
}

const FIELDS: [FieldSpec; 5] = [
    FieldSpec { name: "minute", min: 0, max: 59 },
    FieldSpec { name: "hour", min: 0, max: 23 },
    FieldSpec { name: "day of month", min: 1, max: 31 },
    FieldSpec { name: "month", min: 1, max: 12 },
    FieldSpec { name: "day of week", min: 0, max: 6 },
];

/// A parsed schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronPattern {
    source: String,
    fields: Vec<Field>,
}

impl CronPattern {
    pub fn parse(pattern: &str) -> Result<Self, ScheduleError> {
        let parts: Vec<&str> = pattern.split_whitespace().collect();
        if parts.len() != FIELDS.len() {
            return Err(ScheduleError::FieldCount(parts.len()));
        }

        let fields = parts
            .iter()
            .zip(FIELDS.iter())
            .map(|(part, spec)| parse_field(part, spec))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            source: parts.join(" "),
            fields,
        })
    }

    /// Whether every field matches the corresponding component of `at` (UTC)
    pub fn matches(&self, at: DateTime<Utc>) -> bool {
        let components = [
            at.minute(),
            at.hour(),
            at.day(),
            at.month(),
            at.weekday().num_days_from_sunday(),
        ];

        self.fields
            .iter()
            .zip(components)
            .all(|(field, value)| field.matches(value))
    }
}

impl FromStr for CronPattern {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CronPattern::parse(s)
    }
}

impl fmt::Display for CronPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Parse `pattern` and test it against `at`
pub fn is_due(pattern: &str, at: DateTime<Utc>) -> Result<bool, ScheduleError> {
    Ok(CronPattern::parse(pattern)?.matches(at))
}

fn parse_field(part: &str, spec: &FieldSpec) -> Result<Field, ScheduleError> {
    if part == "*" {
        return Ok(Field::Any);
    }

    if part.contains('-') || part.contains('/') || part.contains('*') {
        return Err(ScheduleError::UnsupportedSyntax {
            field: spec.name,
            value: part.to_string(),
        });
    }

    let mut values = Vec::new();
    for item in part.split(',') {
        let value: u32 = item.parse().map_err(|_| ScheduleError::InvalidNumber {
            field: spec.name,
            value: item.to_string(),
        })?;

        if value < spec.min || value > spec.max {
            return Err(ScheduleError::OutOfRange {
                field: spec.name,
                value,
                min: spec.min,
                max: spec.max,
            });
        }
        values.push(value);
    }

    Ok(Field::Values(values))
}
