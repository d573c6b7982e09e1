//! Next-fire computation for standard cron schedules.
//!
//! Nomad periodic jobs use the classic 5-field grammar:
//!
//! ```text
//! ┌───────────── minute (0-59)
//! │ ┌───────────── hour (0-23)
//! │ │ ┌───────────── day of month (1-31)
//! │ │ │ ┌───────────── month (1-12 or JAN-DEC)
//! │ │ │ │ ┌───────────── day of week (0-7 or SUN-SAT, 0 and 7 = Sunday)
//! │ │ │ │ │
//! * * * * *
//! ```
//!
//! plus the `@yearly`, `@annually`, `@monthly`, `@weekly`, `@daily`,
//! `@midnight` and `@hourly` aliases. The `cron` crate does the actual
//! evaluation; it expects a leading seconds field and numbers weekdays from
//! 1 (Sunday), so expressions are rewritten before being handed over.
//!
//! When both day-of-month and day-of-week are restricted a time matches if
//! either of them does, as in every Unix cron. A stepped star such as `*/2`
//! counts as restricted.
//!
//! Local times skipped by a DST transition do not fire on that day.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, TimeZone};
use chrono_tz::Tz;
use cron::Schedule;
use thiserror::Error;

const WEEKDAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

#[derive(Debug, Clone, Error, PartialEq)]
#[error("invalid schedule {expression:?}: {reason}")]
pub struct InvalidScheduleError {
    pub expression: String,
    pub reason: String,
}

impl InvalidScheduleError {
    fn new(expression: &str, reason: impl Into<String>) -> Self {
        Self {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
#[error("unknown time zone {name:?}")]
pub struct InvalidTimeZoneError {
    pub name: String,
}

/// Resolves an IANA zone name. Blank names mean UTC.
pub fn parse_time_zone(name: &str) -> Result<Tz, InvalidTimeZoneError> {
    let name = name.trim();
    if name.is_empty() {
        return Ok(Tz::UTC);
    }
    Tz::from_str(name).map_err(|_| InvalidTimeZoneError {
        name: name.to_string(),
    })
}

/// A parsed cron expression.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    // One schedule normally; two when day-of-month and day-of-week are OR-ed.
    branches: Vec<Schedule>,
}

impl CronSchedule {
    pub fn parse(expression: &str) -> Result<Self, InvalidScheduleError> {
        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err(InvalidScheduleError::new(expression, "empty expression"));
        }

        let expanded = expand_alias(trimmed)
            .ok_or_else(|| InvalidScheduleError::new(expression, format!("unknown alias {}", trimmed)))?;

        let fields: Vec<&str> = expanded.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(InvalidScheduleError::new(
                expression,
                format!("expected 5 fields, got {}", fields.len()),
            ));
        }

        let (minute, hour, dom, month, dow) = (fields[0], fields[1], fields[2], fields[3], fields[4]);
        let dom = if dom == "?" { "*" } else { dom };
        let weekdays = expand_weekdays(dow).map_err(|reason| InvalidScheduleError::new(expression, reason))?;

        let dom_restricted = !is_wildcard(dom);
        let dow_restricted = !is_wildcard(dow);

        let sources = if dom_restricted && dow_restricted {
            vec![
                format!("0 {} {} {} {} *", minute, hour, dom, month),
                format!("0 {} {} * {} {}", minute, hour, month, weekdays),
            ]
        } else {
            vec![format!("0 {} {} {} {} {}", minute, hour, dom, month, weekdays)]
        };

        let branches = sources
            .iter()
            .map(|source| Schedule::from_str(source))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| InvalidScheduleError::new(expression, e.to_string()))?;

        Ok(Self {
            expression: expression.to_string(),
            branches,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First fire time strictly after `after`, in `after`'s time zone.
    pub fn next_after<Z: TimeZone>(&self, after: &DateTime<Z>) -> Option<DateTime<Z>> {
        self.branches
            .iter()
            .filter_map(|schedule| schedule.after(after).next())
            .min()
    }
}

/// Parses `expression` and returns its next occurrence strictly after `after`.
///
/// A schedule that can never fire (e.g. `0 0 30 2 *`) is reported as invalid.
pub fn next_occurrence<Z: TimeZone>(
    expression: &str,
    after: &DateTime<Z>,
) -> Result<DateTime<Z>, InvalidScheduleError> {
    let schedule = CronSchedule::parse(expression)?;
    schedule
        .next_after(after)
        .ok_or_else(|| InvalidScheduleError::new(expression, "schedule has no upcoming occurrence"))
}

// `*/2` is a restriction; only a bare star (or a step of 1) leaves the field open.
fn is_wildcard(field: &str) -> bool {
    field.split(',').any(|part| matches!(part, "*" | "?" | "*/1" | "?/1"))
}

fn expand_alias(expression: &str) -> Option<String> {
    if !expression.starts_with('@') {
        return Some(expression.to_string());
    }
    let expanded = match expression.to_ascii_lowercase().as_str() {
        "@yearly" | "@annually" => "0 0 1 1 *",
        "@monthly" => "0 0 1 * *",
        "@weekly" => "0 0 * * 0",
        "@daily" | "@midnight" => "0 0 * * *",
        "@hourly" => "0 * * * *",
        _ => return None,
    };
    Some(expanded.to_string())
}

fn weekday_value(token: &str) -> Result<u32, String> {
    if let Ok(value) = token.parse::<u32>() {
        if value > 7 {
            return Err(format!("weekday {} out of range (0-7)", value));
        }
        return Ok(value);
    }
    WEEKDAY_NAMES
        .iter()
        .position(|name| name.eq_ignore_ascii_case(token))
        .map(|idx| idx as u32)
        .ok_or_else(|| format!("invalid weekday {:?}", token))
}

/// Rewrites a 0-7 weekday field as an explicit list of names (or `*`).
fn expand_weekdays(field: &str) -> Result<String, String> {
    let mut days = BTreeSet::new();

    for part in field.split(',') {
        if part.is_empty() {
            return Err(format!("empty item in weekday field {:?}", field));
        }

        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| format!("invalid step {:?} in weekday field", step))?;
                if step == 0 {
                    return Err("step cannot be 0 in weekday field".to_string());
                }
                (range, Some(step))
            }
            None => (part, None),
        };

        let (start, end) = if range == "*" || range == "?" {
            (0, 6)
        } else if let Some((lo, hi)) = range.split_once('-') {
            (weekday_value(lo)?, weekday_value(hi)?)
        } else {
            let value = weekday_value(range)?;
            // "3/2" means "from Wednesday, every second day"
            if step.is_some() {
                (value, 6)
            } else {
                (value, value)
            }
        };

        if start > end {
            return Err(format!("invalid weekday range {}", range));
        }

        let step = step.unwrap_or(1) as usize;
        days.extend((start..=end).step_by(step).map(|d| d % 7));
    }

    if days.len() == 7 && field.starts_with('*') {
        return Ok("*".to_string());
    }
    Ok(days
        .iter()
        .map(|&d| WEEKDAY_NAMES[d as usize])
        .collect::<Vec<_>>()
        .join(","))
}
