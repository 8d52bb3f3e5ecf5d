//! Field-level extraction for a single news item node.
//!
//! Each field has its own ordered table of (selector, reader) pairs. A pattern
//! only counts as matched when its reader yields non-empty text, so an empty
//! `<h3>` falls through to the next title pattern instead of producing an
//! empty headline.

use crate::models::NewsItem;
use crate::temporal::{self, Instant, TimeOrigin};
use crate::utils::{collapse_whitespace, element_text};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Selector};
use tracing::{debug, warn};

/// Attributes carrying machine-readable timestamps, in preference order.
const TIME_ATTRIBUTES: &[&str] = &["datetime", "data-timestamp", "data-time"];

/// Source sentinel used by [`ItemExtractor`] when a node names no source.
pub const UNKNOWN_SOURCE: &str = "Unknown";

type Reader = fn(ElementRef<'_>) -> Option<String>;

struct FieldPattern {
    selector: Selector,
    read: Reader,
}

impl FieldPattern {
    fn new(css: &str, read: Reader) -> Self {
        Self {
            selector: Selector::parse(css).unwrap(),
            read,
        }
    }
}

static TITLE_PATTERNS: Lazy<Vec<FieldPattern>> = Lazy::new(|| {
    vec![
        FieldPattern::new("h3", read_text),
        FieldPattern::new("h2", read_text),
        FieldPattern::new("h4", read_text),
        FieldPattern::new(r#"[class*="title"]"#, read_text),
        FieldPattern::new("a", read_text),
    ]
});

static TIME_PATTERNS: Lazy<Vec<FieldPattern>> = Lazy::new(|| {
    vec![
        FieldPattern::new("time", read_time),
        FieldPattern::new("[datetime], [data-timestamp], [data-time]", read_time),
        FieldPattern::new(r#"[class*="time"], [class*="date"]"#, read_time),
    ]
});

static SOURCE_PATTERNS: Lazy<Vec<FieldPattern>> = Lazy::new(|| {
    vec![
        FieldPattern::new(".source", read_text),
        FieldPattern::new(r#"[class*="source"]"#, read_text),
        FieldPattern::new(r#"[class*="publisher"]"#, read_text),
        FieldPattern::new(r#"[class*="author"]"#, read_text),
    ]
});

static DESCRIPTION_PATTERNS: Lazy<Vec<FieldPattern>> = Lazy::new(|| {
    vec![
        FieldPattern::new(".description", read_text),
        FieldPattern::new(r#"[class*="description"]"#, read_text),
        FieldPattern::new(r#"[class*="summary"]"#, read_text),
        FieldPattern::new("p", read_text),
    ]
});

fn read_text(element: ElementRef<'_>) -> Option<String> {
    let text = element_text(element);
    (!text.is_empty()).then_some(text)
}

/// Prefer a machine-readable attribute over the element's visible text.
fn read_time(element: ElementRef<'_>) -> Option<String> {
    TIME_ATTRIBUTES
        .iter()
        .filter_map(|attr| element.value().attr(attr))
        .map(collapse_whitespace)
        .find(|value| !value.is_empty())
        .or_else(|| read_text(element))
}

/// Run a field cascade: every element matched by a pattern is tried in
/// document order before moving on to the next pattern.
fn first_match(node: ElementRef<'_>, patterns: &[FieldPattern]) -> Option<String> {
    patterns.iter().find_map(|pattern| {
        node.select(&pattern.selector)
            .find_map(|element| (pattern.read)(element))
    })
}

/// Outcome of extracting one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub item: NewsItem,
    /// Which time rule produced `item.published_at`.
    pub time_origin: TimeOrigin,
}

/// Turns item nodes into [`NewsItem`]s for one coin.
#[derive(Debug, Clone)]
pub struct ItemExtractor {
    coin: String,
    unknown_source: String,
    reference: Instant,
}

impl ItemExtractor {
    /// Create an extractor. `reference` anchors relative timestamps and is
    /// the fallback for unparseable ones.
    pub fn new(coin: impl Into<String>, reference: Instant) -> Self {
        Self {
            coin: coin.into(),
            unknown_source: UNKNOWN_SOURCE.to_string(),
            reference,
        }
    }

    /// Override the sentinel used when a node names no source.
    pub fn with_unknown_source(mut self, unknown_source: impl Into<String>) -> Self {
        self.unknown_source = unknown_source.into();
        self
    }

    /// Extract one item, or `None` when the node has no usable title or ends
    /// up with an empty source.
    pub fn extract(&self, node: ElementRef<'_>) -> Option<Extracted> {
        let Some(title) = first_match(node, &TITLE_PATTERNS) else {
            debug!(tag = node.value().name(), "Item node has no title; dropping");
            return None;
        };

        let raw_time = first_match(node, &TIME_PATTERNS).unwrap_or_default();
        let (published_at, time_origin) =
            temporal::normalize(&raw_time, self.reference);
        if time_origin == TimeOrigin::Fallback {
            warn!(%title, raw_time = %raw_time, "Unrecognized timestamp; using reference time");
        }

        let source = first_match(node, &SOURCE_PATTERNS)
            .unwrap_or_else(|| self.unknown_source.clone());
        let description = first_match(node, &DESCRIPTION_PATTERNS).unwrap_or_default();

        let item = NewsItem {
            coin: self.coin.clone(),
            title: title.trim().to_string(),
            source: source.trim().to_string(),
            description,
            published_at,
        };

        if item.title.is_empty() || item.source.is_empty() {
            debug!(title = %item.title, "Item failed validation; dropping");
            return None;
        }

        Some(Extracted { item, time_origin })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use scraper::Html;

    fn reference() -> Instant {
        Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0).unwrap()
    }

    fn extract_first(html: &str, extractor: &ItemExtractor) -> Option<Extracted> {
        let doc = Html::parse_fragment(html);
        let selector = Selector::parse("article, li, div.node").unwrap();
        let node = doc.select(&selector).next().unwrap();
        extractor.extract(node)
    }

    #[test]
    fn test_proxy_markup_item() {
        let extractor = ItemExtractor::new("BITCOIN", reference());
        let extracted = extract_first(
            r#"<article>
                 <h3>  BTC   hits new high </h3>
                 <div class="meta">
                   <time datetime="2024-01-02T10:00:00Z">2024/1/2 18:00:00</time>
                   <span class="source">CoinDesk</span>
                 </div>
                 <div class="description">Bitcoin rallied.</div>
               </article>"#,
            &extractor,
        )
        .unwrap();

        assert_eq!(extracted.item.title, "BTC hits new high");
        assert_eq!(extracted.item.source, "CoinDesk");
        assert_eq!(extracted.item.description, "Bitcoin rallied.");
        assert_eq!(extracted.item.coin, "BITCOIN");
        assert_eq!(
            extracted.item.published_at,
            Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap()
        );
        assert_eq!(extracted.time_origin, TimeOrigin::Absolute);
    }

    #[test]
    fn test_defaults_for_missing_source_and_description() {
        let extractor = ItemExtractor::new("BTC", reference());
        let extracted = extract_first(
            r#"<article><h3>BTC hits new high</h3><time datetime="2024-01-02T10:00:00Z"></time></article>"#,
            &extractor,
        )
        .unwrap();
        assert_eq!(extracted.item.source, "Unknown");
        assert_eq!(extracted.item.description, "");
    }

    #[test]
    fn test_missing_title_drops_item() {
        let extractor = ItemExtractor::new("BTC", reference());
        assert!(extract_first(r#"<article><h3>   </h3><span class="source">X</span></article>"#, &extractor).is_none());
        assert!(extract_first(r#"<article><p>no heading here</p></article>"#, &extractor).is_none());
    }

    #[test]
    fn test_empty_title_falls_through_to_next_pattern() {
        let extractor = ItemExtractor::new("BTC", reference());
        let extracted = extract_first(
            r#"<article><h3></h3><h2>Fallback headline</h2></article>"#,
            &extractor,
        )
        .unwrap();
        assert_eq!(extracted.item.title, "Fallback headline");
    }

    #[test]
    fn test_blank_sentinel_drops_sourceless_item() {
        let extractor = ItemExtractor::new("BTC", reference()).with_unknown_source("  ");
        assert!(extract_first(r#"<article><h3>Headline</h3></article>"#, &extractor).is_none());
    }

    #[test]
    fn test_relative_time_text() {
        let extractor = ItemExtractor::new("BTC", reference());
        let extracted = extract_first(
            r#"<li><a href="/n/1">ETH upgrade ships</a><span class="time-ago">3 hours ago</span><span class="publisher-name">The Block</span></li>"#,
            &extractor,
        )
        .unwrap();
        assert_eq!(extracted.item.title, "ETH upgrade ships");
        assert_eq!(extracted.item.source, "The Block");
        assert_eq!(extracted.item.published_at, reference() - chrono::Duration::hours(3));
        assert_eq!(extracted.time_origin, TimeOrigin::Relative);
    }

    #[test]
    fn test_data_timestamp_attribute_preferred_over_text() {
        let extractor = ItemExtractor::new("BTC", reference());
        let extracted = extract_first(
            r#"<div class="node"><h4>Headline</h4><span class="date" data-timestamp="1704189600000">yesterday</span></div>"#,
            &extractor,
        )
        .unwrap();
        assert_eq!(
            extracted.item.published_at,
            Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap()
        );
        assert_eq!(extracted.time_origin, TimeOrigin::Epoch);
    }

    #[test]
    fn test_unparseable_time_uses_reference() {
        let extractor = ItemExtractor::new("BTC", reference());
        let extracted = extract_first(
            r#"<article><h3>Headline</h3><time>sometime last week</time></article>"#,
            &extractor,
        )
        .unwrap();
        assert_eq!(extracted.item.published_at, reference());
        assert_eq!(extracted.time_origin, TimeOrigin::Fallback);
    }
}
