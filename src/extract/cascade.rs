//! Ordered structural patterns for finding the news listing in a page.
//!
//! The listing markup changes between site deployments, so instead of one
//! selector there is a small table of named patterns per level. Tables are
//! evaluated strictly in order and the first pattern with a match wins; results
//! from different patterns are never merged.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// A named CSS selector in a cascade table.
///
/// `requires`, when set, is a descendant selector every candidate must
/// contain; candidates without it are not counted as matches.
#[derive(Debug)]
pub struct Pattern {
    pub name: &'static str,
    pub selector: Selector,
    pub requires: Option<Selector>,
}

impl Pattern {
    fn new(name: &'static str, css: &str) -> Self {
        Self {
            name,
            selector: Selector::parse(css).unwrap(),
            requires: None,
        }
    }

    fn requiring(mut self, css: &str) -> Self {
        self.requires = Some(Selector::parse(css).unwrap());
        self
    }

    fn accepts(&self, candidate: ElementRef<'_>) -> bool {
        self.requires
            .as_ref()
            .is_none_or(|required| candidate.select(required).next().is_some())
    }
}

/// Markers of a news entry, as opposed to a navigation or footer link.
const NEWS_ENTRY_MARKERS: &str = r#"h2, h3, h4, time, [datetime], [data-timestamp], [data-time], [class*="time"], [class*="date"]"#;

/// Container patterns, most specific first.
pub static CONTAINER_PATTERNS: Lazy<Vec<Pattern>> = Lazy::new(|| {
    vec![
        Pattern::new(
            "news_module",
            r#"[data-module|="news"], [data-testid|="news"], section#news, section.news, #news"#,
        ),
        Pattern::new(
            "news_class",
            r#"[class*="news-container"], [class*="news-list"], [class*="newsList"], [class*="news-feed"], [class*="news_list"]"#,
        ),
        Pattern::new("landmark", r#"main, [role="main"], #content"#),
    ]
});

/// Item patterns, scoped to the selected container.
pub static ITEM_PATTERNS: Lazy<Vec<Pattern>> = Lazy::new(|| {
    vec![
        Pattern::new("article", "article"),
        Pattern::new(
            "news_item_class",
            r#"[class*="news-item"], [class*="newsItem"], [class*="news-card"], [class*="news_item"]"#,
        ),
        Pattern::new("list_item", "li").requiring(NEWS_ENTRY_MARKERS),
    ]
});

/// The container chosen for a document and the pattern that found it.
#[derive(Debug, Clone, Copy)]
pub struct Located<'a> {
    pub pattern: &'static str,
    pub element: ElementRef<'a>,
}

/// Find the element holding the news listing.
///
/// `None` means the page shape is unrecognized, which callers must keep
/// distinct from a recognized page that happens to list no news.
pub fn locate_container(document: &Html) -> Option<Located<'_>> {
    locate_container_with(document, &CONTAINER_PATTERNS)
}

fn locate_container_with<'a>(document: &'a Html, patterns: &[Pattern]) -> Option<Located<'a>> {
    patterns.iter().find_map(|pattern| {
        let element = document.select(&pattern.selector).next()?;
        debug!(pattern = pattern.name, "Container pattern matched");
        Some(Located {
            pattern: pattern.name,
            element,
        })
    })
}

/// Find the item nodes inside `container`, in document order.
///
/// Returns the matching pattern name alongside the nodes, or `None` with an
/// empty list when no item pattern matched.
pub fn locate_items(container: ElementRef<'_>) -> (Option<&'static str>, Vec<ElementRef<'_>>) {
    for pattern in ITEM_PATTERNS.iter() {
        let nodes: Vec<ElementRef<'_>> = container
            .select(&pattern.selector)
            .filter(|node| pattern.accepts(*node))
            .collect();
        if !nodes.is_empty() {
            debug!(pattern = pattern.name, count = nodes.len(), "Item pattern matched");
            return (Some(pattern.name), nodes);
        }
    }
    (None, Vec::new())
}
