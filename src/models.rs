//! Data models for scraped news items and the queries that produce them.
//!
//! This module defines the structures that flow out of a pipeline run:
//! - [`NewsItem`]: one normalized news entry for a coin
//! - [`DateRange`]: the inclusive window results are filtered to
//! - [`ExtractionStats`]: counters describing what the extraction dropped
//!
//! Items serialize with camelCase keys so the JSON output matches the field
//! names the presentation layer already consumes.

use crate::temporal::Instant;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// A single news entry extracted from a listing page.
///
/// `title` and `source` are guaranteed non-empty after trimming; items that
/// fail that check never leave the extractor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    /// Upper-cased coin slug taken from the request URL (e.g. `BITCOIN`).
    pub coin: String,
    /// The headline.
    pub title: String,
    /// Publisher name, or the configured sentinel when the page had none.
    pub source: String,
    /// Teaser text; empty when the page had none.
    pub description: String,
    /// Publication instant in UTC.
    pub published_at: Instant,
}

/// Inclusive date window, normalized to whole UTC days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct DateRange {
    pub start: Instant,
    pub end: Instant,
}

impl DateRange {
    /// Build a range covering `start_day` 00:00:00.000 through `end_day`
    /// 23:59:59.999.
    ///
    /// The days are not reordered; a range whose start is after its end
    /// simply matches nothing.
    pub fn from_days(start_day: NaiveDate, end_day: NaiveDate) -> Self {
        let end_of_day =
            NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
        Self {
            start: start_day.and_time(NaiveTime::MIN).and_utc(),
            end: end_day.and_time(end_of_day).and_utc(),
        }
    }

    /// Whether `instant` falls inside the range, bounds included.
    pub fn contains(&self, instant: Instant) -> bool {
        instant >= self.start && instant <= self.end
    }

    /// Keep the items inside the range, preserving their relative order.
    pub fn filter(&self, items: Vec<NewsItem>) -> Vec<NewsItem> {
        items
            .into_iter()
            .filter(|item| self.contains(item.published_at))
            .collect()
    }

    /// The calendar day the range starts on, used to name export files.
    pub fn start_day(&self) -> NaiveDate {
        self.start.date_naive()
    }
}

/// Counters describing one extraction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionStats {
    /// Name of the container pattern that matched.
    pub container_pattern: Option<&'static str>,
    /// Name of the item pattern that matched, if any did.
    pub item_pattern: Option<&'static str>,
    /// Candidate item nodes found inside the container.
    pub nodes_seen: usize,
    /// Nodes that did not yield a valid item (no title or empty source).
    pub dropped: usize,
    /// Valid items removed as duplicates.
    pub duplicates: usize,
    /// Items whose time text matched no rule and defaulted to the reference.
    pub time_fallbacks: usize,
    /// Valid items excluded by the date range.
    pub filtered_out: usize,
}
