//! The end-to-end news pipeline for one coin page.
//!
//! # Stages
//!
//! ```text
//! Idle -> Requesting -> Parsing -> Extracting -> Filtering -> Done
//!             |            |
//!             v            v
//!          Failed       Failed (no news section)
//! ```
//!
//! A run is sequential; the only suspension points are the network attempt
//! and the backoff sleep inside [`RetryRetrieve`]. The pipeline holds no
//! state between runs and talks to the outside world only through its return
//! value and a [`Progress`] observer.

use crate::error::{FailureKind, PipelineError};
use crate::extract::{CONTAINER_PATTERNS, ItemExtractor, locate_container, locate_items};
use crate::extract::item::UNKNOWN_SOURCE;
use crate::models::{DateRange, ExtractionStats, NewsItem};
use crate::retrieval::{RetrievalResult, Retrieve, RetryRetrieve, Sleep, TokioSleep};
use crate::target::CoinPage;
use crate::temporal::{Instant, TimeOrigin};
use chrono::Utc;
use itertools::Itertools;
use scraper::Html;
use serde::Serialize;
use std::cell::Cell;
use tracing::{debug, info, instrument, warn};

/// Pipeline stage, reported through [`Progress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    Requesting,
    Parsing,
    Extracting,
    Filtering,
    Done,
    Failed,
}

/// A progress checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub stage: Stage,
    /// Completion percentage; never decreases within one run.
    pub percent: u8,
    pub message: String,
}

/// Observer for progress checkpoints. The pipeline never reads anything back.
pub trait Progress {
    fn report(&self, event: &ProgressEvent);
}

/// Clamps percentages so observers only ever see them grow.
struct Checkpoints<'a, P: ?Sized> {
    observer: &'a P,
    last: Cell<u8>,
}

impl<'a, P: Progress + ?Sized> Checkpoints<'a, P> {
    fn new(observer: &'a P) -> Self {
        Self {
            observer,
            last: Cell::new(0),
        }
    }

    fn emit(&self, stage: Stage, percent: u8, message: impl Into<String>) {
        let percent = percent.max(self.last.get()).min(100);
        self.last.set(percent);
        self.observer.report(&ProgressEvent {
            stage,
            percent,
            message: message.into(),
        });
    }
}

/// Terminal `Done` state of a run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub coin: String,
    /// Canonical page URL the run was made for.
    pub url: String,
    pub range: DateRange,
    /// Items in page order.
    pub items: Vec<NewsItem>,
    pub stats: ExtractionStats,
}

impl PipelineReport {
    /// Whether the run finished without any item to show.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Human-readable summary of the outcome.
    pub fn message(&self) -> String {
        if !self.is_empty() {
            format!("Found {} news item(s) for {}", self.items.len(), self.coin)
        } else if self.stats.nodes_seen == 0 {
            format!("The news section for {} lists no items", self.coin)
        } else {
            format!("No news for {} matched the selected date range", self.coin)
        }
    }
}

/// Drives one request through retrieval, extraction and filtering.
#[derive(Debug)]
pub struct Pipeline<R, S = TokioSleep> {
    retriever: RetryRetrieve<R, S>,
    unknown_source: String,
    clock: fn() -> Instant,
}

impl<R: Retrieve, S: Sleep> Pipeline<R, S> {
    pub fn new(retriever: RetryRetrieve<R, S>) -> Self {
        Self {
            retriever,
            unknown_source: UNKNOWN_SOURCE.to_string(),
            clock: Utc::now,
        }
    }

    /// Source name used for items whose markup names none.
    pub fn with_unknown_source(mut self, unknown_source: impl Into<String>) -> Self {
        self.unknown_source = unknown_source.into();
        self
    }

    /// Clock used as the reference for relative timestamps.
    pub fn with_clock(mut self, clock: fn() -> Instant) -> Self {
        self.clock = clock;
        self
    }

    /// Run the pipeline for `url`, keeping items published within `range`.
    ///
    /// An empty [`PipelineReport`] is a successful outcome; an unrecognized
    /// page is [`PipelineError::NoNewsSection`].
    #[instrument(level = "info", skip_all, fields(%url))]
    pub async fn run<P: Progress + ?Sized>(
        &self,
        url: &str,
        range: &DateRange,
        progress: &P,
    ) -> Result<PipelineReport, PipelineError> {
        let checkpoints = Checkpoints::new(progress);
        checkpoints.emit(Stage::Idle, 0, "Preparing request");

        let outcome = self.run_stages(url, range, &checkpoints).await;
        match &outcome {
            Ok(report) => {
                info!(
                    coin = %report.coin,
                    items = report.items.len(),
                    stats = ?report.stats,
                    "Pipeline done"
                );
                checkpoints.emit(Stage::Done, 100, report.message());
            }
            Err(e) => {
                warn!(error = %e, "Pipeline failed");
                checkpoints.emit(Stage::Failed, 100, e.user_message());
            }
        }
        outcome
    }

    async fn run_stages<P: Progress + ?Sized>(
        &self,
        url: &str,
        range: &DateRange,
        checkpoints: &Checkpoints<'_, P>,
    ) -> Result<PipelineReport, PipelineError> {
        let page = CoinPage::parse(url)?;
        info!(canonical = %page.url(), slug = page.slug(), "Canonicalized request URL");

        checkpoints.emit(Stage::Requesting, 30, "Fetching news");
        let retrieved = self.retriever.retrieve(&page).await;
        let payload = match retrieved.result {
            RetrievalResult::Success { payload } => payload,
            RetrievalResult::Failure {
                kind: FailureKind::MalformedUpstream,
                message,
            } => return Err(PipelineError::MalformedUpstream(message)),
            RetrievalResult::Failure { kind, message } => {
                return Err(PipelineError::RetrievalFailed {
                    kind,
                    attempts: retrieved.attempts,
                    message,
                });
            }
        };

        checkpoints.emit(Stage::Parsing, 60, "Parsing page");
        let (items, mut stats) = self.extract(&page, &payload, checkpoints)?;

        checkpoints.emit(Stage::Filtering, 90, "Filtering by date");
        let before = items.len();
        let items = range.filter(items);
        stats.filtered_out = before - items.len();

        Ok(PipelineReport {
            coin: page.coin(),
            url: page.url().to_string(),
            range: *range,
            items,
            stats,
        })
    }

    /// Parse `payload` and turn its listing into validated, de-duplicated
    /// items. Bad nodes are dropped and counted, never escalated.
    fn extract<P: Progress + ?Sized>(
        &self,
        page: &CoinPage,
        payload: &str,
        checkpoints: &Checkpoints<'_, P>,
    ) -> Result<(Vec<NewsItem>, ExtractionStats), PipelineError> {
        let document = Html::parse_document(payload);
        let container = locate_container(&document).ok_or(PipelineError::NoNewsSection {
            patterns_tried: CONTAINER_PATTERNS.len(),
        })?;

        let (item_pattern, nodes) = locate_items(container.element);
        let mut stats = ExtractionStats {
            container_pattern: Some(container.pattern),
            item_pattern,
            nodes_seen: nodes.len(),
            ..ExtractionStats::default()
        };
        debug!(
            container = container.pattern,
            item_pattern = ?item_pattern,
            nodes = nodes.len(),
            "Located listing"
        );
        checkpoints.emit(Stage::Extracting, 75, "Extracting items");

        let extractor =
            ItemExtractor::new(page.coin(), (self.clock)()).with_unknown_source(&self.unknown_source);
        let mut items = Vec::with_capacity(nodes.len());
        for node in nodes {
            match extractor.extract(node) {
                Some(extracted) => {
                    if extracted.time_origin == TimeOrigin::Fallback {
                        stats.time_fallbacks += 1;
                    }
                    items.push(extracted.item);
                }
                None => stats.dropped += 1,
            }
        }

        let valid = items.len();
        let items: Vec<NewsItem> = items
            .into_iter()
            .unique_by(|item| (item.title.clone(), item.source.clone(), item.published_at))
            .collect();
        stats.duplicates = valid - items.len();

        Ok((items, stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::testing::{RecordingSleep, ScriptedRetriever};
    use chrono::{NaiveDate, TimeZone};
    use std::cell::RefCell;
    use std::time::Duration;

    const URL: &str = "https://coinmarketcap.com/currencies/bitcoin/news/";

    fn fixed_now() -> Instant {
        Utc.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap()
    }

    fn day_range(y: i32, m: u32, d: u32) -> DateRange {
        let day = NaiveDate::from_ymd_opt(y, m, d).unwrap();
        DateRange::from_days(day, day)
    }

    fn pipeline(script: Vec<RetrievalResult>) -> (Pipeline<ScriptedRetriever, RecordingSleep>, RecordingSleep) {
        let sleeper = RecordingSleep::default();
        let retry = RetryRetrieve::with_sleeper(ScriptedRetriever::new(script), sleeper.clone());
        (Pipeline::new(retry).with_clock(fixed_now), sleeper)
    }

    struct NoProgress;

    impl Progress for NoProgress {
        fn report(&self, _event: &ProgressEvent) {}
    }

    #[derive(Default)]
    struct Collect(RefCell<Vec<ProgressEvent>>);

    impl Progress for Collect {
        fn report(&self, event: &ProgressEvent) {
            self.0.borrow_mut().push(event.clone());
        }
    }

    #[tokio::test]
    async fn test_second_container_pattern_scenario() {
        let html = r#"<html><body>
            <div class="news-container">
              <article>
                <h3>BTC hits new high</h3>
                <time datetime="2024-01-02T10:00:00Z"></time>
              </article>
            </div>
          </body></html>"#;
        let (pipeline, _) = pipeline(vec![RetrievalResult::success(html)]);

        let report = pipeline.run(URL, &day_range(2024, 1, 2), &NoProgress).await.unwrap();

        assert_eq!(report.stats.container_pattern, Some("news_class"));
        assert_eq!(
            report.items,
            vec![NewsItem {
                coin: "BITCOIN".to_string(),
                title: "BTC hits new high".to_string(),
                source: "Unknown".to_string(),
                description: String::new(),
                published_at: Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap(),
            }]
        );
        assert_eq!(report.url, "https://coinmarketcap.com/currencies/bitcoin");
    }

    #[tokio::test]
    async fn test_retries_503_then_succeeds() {
        let unavailable = RetrievalResult::failure(FailureKind::HttpStatus(503), "Service Unavailable");
        let html = r#"<div class="news-list"><article><h3>Recovered</h3><time datetime="2024-01-02T09:00:00Z"></time></article></div>"#;
        let (pipeline, sleeper) = pipeline(vec![
            unavailable.clone(),
            unavailable,
            RetrievalResult::success(html),
        ]);

        let report = pipeline.run(URL, &day_range(2024, 1, 2), &NoProgress).await.unwrap();

        assert_eq!(report.items.len(), 1);
        assert_eq!(report.items[0].title, "Recovered");
        let total: Duration = sleeper.slept.borrow().iter().sum();
        assert!(total >= Duration::from_secs(6));
    }

    #[tokio::test]
    async fn test_all_timeouts_fail_without_items() {
        let (pipeline, _) = pipeline(vec![RetrievalResult::failure(FailureKind::Timeout, "timed out")]);
        let progress = Collect::default();

        let err = pipeline.run(URL, &day_range(2024, 1, 2), &progress).await.unwrap_err();

        assert!(matches!(
            err,
            PipelineError::RetrievalFailed {
                kind: FailureKind::Timeout,
                attempts: 3,
                ..
            }
        ));
        let events = progress.0.borrow();
        assert_eq!(events.last().unwrap().stage, Stage::Failed);
        assert!(events.iter().all(|e| e.stage != Stage::Done));
    }

    #[tokio::test]
    async fn test_no_news_section_differs_from_empty_listing() {
        let (unrecognized, _) = pipeline(vec![RetrievalResult::success("<div><p>price chart</p></div>")]);
        let err = unrecognized
            .run(URL, &day_range(2024, 1, 2), &NoProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoNewsSection { patterns_tried: 3 }));

        let (empty, _) = pipeline(vec![RetrievalResult::success(r#"<div class="news-container"></div>"#)]);
        let report = empty.run(URL, &day_range(2024, 1, 2), &NoProgress).await.unwrap();
        assert!(report.is_empty());
        assert_eq!(report.stats.nodes_seen, 0);
        assert!(report.message().contains("lists no items"));
    }

    #[tokio::test]
    async fn test_navigation_only_landmark_is_empty_done() {
        let html = r#"<main><ul><li><a href="/">Home</a></li><li><a href="/coins/">Cryptocurrencies</a></li></ul></main>"#;
        let (pipeline, _) = pipeline(vec![RetrievalResult::success(html)]);

        let report = pipeline.run(URL, &day_range(2024, 1, 2), &NoProgress).await.unwrap();

        assert!(report.is_empty());
        assert_eq!(report.stats.container_pattern, Some("landmark"));
        assert_eq!(report.stats.item_pattern, None);
        assert_eq!(report.stats.nodes_seen, 0);
    }

    #[tokio::test]
    async fn test_invalid_url_never_requests() {
        let (pipeline, _) = pipeline(vec![RetrievalResult::success("<main></main>")]);
        let err = pipeline
            .run("https://coinmarketcap.com/", &day_range(2024, 1, 2), &NoProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
        assert_eq!(pipeline.retriever_calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_upstream_surfaces_immediately() {
        let (pipeline, sleeper) = pipeline(vec![RetrievalResult::failure(
            FailureKind::MalformedUpstream,
            "data.items is not an array",
        )]);
        let err = pipeline.run(URL, &day_range(2024, 1, 2), &NoProgress).await.unwrap_err();
        assert!(matches!(err, PipelineError::MalformedUpstream(_)));
        assert_eq!(pipeline.retriever_calls(), 1);
        assert!(sleeper.slept.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_filters_drops_and_dedupes() {
        let html = r#"<section id="news">
            <article><h3>Kept</h3><time datetime="2024-01-02T08:00:00Z"></time><span class="source">A</span></article>
            <article><h3>   </h3><time datetime="2024-01-02T08:00:00Z"></time></article>
            <article><h3>Kept</h3><time datetime="2024-01-02T08:00:00Z"></time><span class="source">A</span></article>
            <article><h3>Old</h3><time datetime="2023-12-30T08:00:00Z"></time></article>
            <article><h3>Relative</h3><span class="time">2 hours ago</span></article>
            <article><h3>Mystery time</h3><time>whenever</time></article>
          </section>"#;
        let (pipeline, _) = pipeline(vec![RetrievalResult::success(html)]);

        let report = pipeline.run(URL, &day_range(2024, 1, 2), &NoProgress).await.unwrap();

        let titles: Vec<_> = report.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Kept", "Relative", "Mystery time"]);
        assert_eq!(report.items[1].published_at, fixed_now() - chrono::Duration::hours(2));
        assert_eq!(report.items[2].published_at, fixed_now());
        assert!(report.items.iter().all(|i| !i.title.trim().is_empty()));

        assert_eq!(report.stats.container_pattern, Some("news_module"));
        assert_eq!(report.stats.nodes_seen, 6);
        assert_eq!(report.stats.dropped, 1);
        assert_eq!(report.stats.duplicates, 1);
        assert_eq!(report.stats.filtered_out, 1);
        assert_eq!(report.stats.time_fallbacks, 1);
    }

    #[tokio::test]
    async fn test_everything_filtered_is_empty_success() {
        let html = r#"<div class="news-container"><article><h3>Old</h3><time datetime="2023-01-01T00:00:00Z"></time></article></div>"#;
        let (pipeline, _) = pipeline(vec![RetrievalResult::success(html)]);
        let report = pipeline.run(URL, &day_range(2024, 1, 2), &NoProgress).await.unwrap();
        assert!(report.is_empty());
        assert!(report.message().contains("date range"));
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_ends_done() {
        let html = r#"<div class="news-container"><article><h3>A</h3><time datetime="2024-01-02T01:00:00Z"></time></article></div>"#;
        let (pipeline, _) = pipeline(vec![RetrievalResult::success(html)]);
        let progress = Collect::default();

        pipeline.run(URL, &day_range(2024, 1, 2), &progress).await.unwrap();

        let events = progress.0.borrow();
        let stages: Vec<_> = events.iter().map(|e| e.stage).collect();
        assert_eq!(
            stages,
            vec![
                Stage::Idle,
                Stage::Requesting,
                Stage::Parsing,
                Stage::Extracting,
                Stage::Filtering,
                Stage::Done
            ]
        );
        assert!(events.windows(2).all(|w| w[0].percent <= w[1].percent));
        assert_eq!(events.last().unwrap().percent, 100);
    }

    impl<S: Sleep> Pipeline<ScriptedRetriever, S> {
        fn retriever_calls(&self) -> u32 {
            self.retriever.inner().calls.get()
        }
    }
}
