//! Timestamp normalization for scraped news items.
//!
//! Upstream pages mix machine-readable timestamps embedded in attributes with
//! human-readable relative strings in two locales. Everything funnels through
//! [`normalize`], which maps any text onto a UTC instant and never fails: text
//! that matches no rule comes back as the caller's reference instant.
//!
//! # Rules
//!
//! Rules are tried in order and the first one that produces an instant wins:
//!
//! | Order | Input shape | Example |
//! |-------|-------------|---------|
//! | 1 | ISO date prefix | `2024-01-02T10:00:00Z`, `2024-01-02` |
//! | 2 | Millisecond epoch | `1704189600000` |
//! | 3 | Relative (English) | `3 hours ago`, `an hour ago` |
//! | 3 | Relative (Chinese) | `3小时前`, `2个月前` |
//! | 4 | Anything else | falls back to the reference instant |

use chrono::{DateTime, Duration, Months, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

/// Canonical instant used throughout the crate.
pub type Instant = DateTime<Utc>;

static ISO_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}").unwrap());

static EPOCH_MILLIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").unwrap());

static RELATIVE_EN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\d+|an?)\s*(seconds?|secs?|minutes?|mins?|hours?|hrs?|days?|weeks?|months?|years?)\s+ago$")
        .unwrap()
});

static RELATIVE_ZH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\s*个?\s*(秒钟|秒|分钟|小时|天|周|星期|月|年)\s*前$").unwrap());

/// Naive date-time layouts accepted after RFC 3339 fails. Values are read as UTC.
const NAIVE_LAYOUTS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Offset-bearing layouts that RFC 3339 rejects (`+0000`, space separator).
const OFFSET_LAYOUTS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Calendar granularity of a relative expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl TimeUnit {
    fn from_english(word: &str) -> Option<Self> {
        let word = word.to_ascii_lowercase();
        let stem = word.trim_end_matches('s');
        match stem {
            "second" | "sec" => Some(Self::Second),
            "minute" | "min" => Some(Self::Minute),
            "hour" | "hr" => Some(Self::Hour),
            "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            "year" => Some(Self::Year),
            _ => None,
        }
    }

    fn from_chinese(word: &str) -> Option<Self> {
        match word {
            "秒" | "秒钟" => Some(Self::Second),
            "分钟" => Some(Self::Minute),
            "小时" => Some(Self::Hour),
            "天" => Some(Self::Day),
            "周" | "星期" => Some(Self::Week),
            "月" => Some(Self::Month),
            "年" => Some(Self::Year),
            _ => None,
        }
    }

    /// Shift `reference` backwards by `amount` units.
    ///
    /// Months and years use calendar arithmetic, so the day of month is
    /// clamped (`2024-03-31` minus one month is `2024-02-29`).
    fn subtract(self, reference: Instant, amount: u32) -> Option<Instant> {
        let amount_i64 = i64::from(amount);
        match self {
            Self::Second => reference.checked_sub_signed(Duration::try_seconds(amount_i64)?),
            Self::Minute => reference.checked_sub_signed(Duration::try_minutes(amount_i64)?),
            Self::Hour => reference.checked_sub_signed(Duration::try_hours(amount_i64)?),
            Self::Day => reference.checked_sub_signed(Duration::try_days(amount_i64)?),
            Self::Week => reference.checked_sub_signed(Duration::try_weeks(amount_i64)?),
            Self::Month => reference.checked_sub_months(Months::new(amount)),
            Self::Year => reference.checked_sub_months(Months::new(amount.checked_mul(12)?)),
        }
    }
}

/// Which rule produced a normalized instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOrigin {
    Absolute,
    Epoch,
    Relative,
    /// Nothing matched; the reference instant was returned.
    Fallback,
}

/// Normalize `text` into an instant, falling back to `reference`.
///
/// Also reports which rule matched so callers can surface a warning when the
/// fallback was used.
pub fn normalize(text: &str, reference: Instant) -> (Instant, TimeOrigin) {
    let text = text.trim();

    if ISO_PREFIX.is_match(text) {
        if let Some(instant) = parse_absolute(text) {
            return (instant, TimeOrigin::Absolute);
        }
    }

    if EPOCH_MILLIS.is_match(text) {
        if let Some(instant) = text
            .parse::<i64>()
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
        {
            return (instant, TimeOrigin::Epoch);
        }
    }

    if let Some(instant) = parse_relative(text, reference) {
        return (instant, TimeOrigin::Relative);
    }

    (reference, TimeOrigin::Fallback)
}

fn parse_absolute(text: &str) -> Option<Instant> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for layout in OFFSET_LAYOUTS {
        if let Ok(dt) = DateTime::parse_from_str(text, layout) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for layout in NAIVE_LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, layout) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn parse_relative(text: &str, reference: Instant) -> Option<Instant> {
    let (amount, unit) = if let Some(caps) = RELATIVE_EN.captures(text) {
        let amount = match caps[1].to_ascii_lowercase().as_str() {
            "a" | "an" => 1,
            digits => digits.parse::<u32>().ok()?,
        };
        (amount, TimeUnit::from_english(&caps[2])?)
    } else if let Some(caps) = RELATIVE_ZH.captures(text) {
        (caps[1].parse::<u32>().ok()?, TimeUnit::from_chinese(&caps[2])?)
    } else {
        return None;
    };
    unit.subtract(reference, amount)
}
