//! Canonical form of a coin news request.
//!
//! Users paste whatever URL their browser shows: with or without a trailing
//! slash, on the coin overview or on its `news/` tab, sometimes without a
//! scheme. [`CoinPage::parse`] reduces all of these to one canonical page URL:
//!
//! ```text
//! https://coinmarketcap.com/currencies/bitcoin/news/?tab=x  ->  https://coinmarketcap.com/currencies/bitcoin
//! coinmarketcap.com/currencies/bitcoin/                     ->  https://coinmarketcap.com/currencies/bitcoin
//! ```
//!
//! Trailing slashes and one trailing `news` segment are stripped, anything
//! after the slug is cut, and query and fragment are dropped. Routes that need the news tab append it themselves
//! via [`CoinPage::news_url`].

use crate::error::PipelineError;
use url::Url;

/// A validated, canonical coin page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinPage {
    url: Url,
    slug: String,
}

impl CoinPage {
    /// Canonicalize `input` and extract the coin slug.
    ///
    /// # Errors
    ///
    /// [`PipelineError::InvalidInput`] when the input is empty, not an
    /// http(s) URL, or has no segment after `currencies`.
    pub fn parse(input: &str) -> Result<Self, PipelineError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(PipelineError::InvalidInput("URL is empty".to_string()));
        }

        let mut url = match Url::parse(input) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("https://{input}"))
                .map_err(|e| PipelineError::InvalidInput(format!("{input}: {e}")))?,
            Err(e) => return Err(PipelineError::InvalidInput(format!("{input}: {e}"))),
        };
        if !matches!(url.scheme(), "http" | "https") {
            return Err(PipelineError::InvalidInput(format!(
                "unsupported scheme {:?}",
                url.scheme()
            )));
        }

        let mut segments: Vec<String> = url
            .path_segments()
            .map(|segs| segs.map(str::to_string).collect())
            .unwrap_or_default();
        while segments.last().is_some_and(|s| s.is_empty()) {
            segments.pop();
        }
        if segments.last().is_some_and(|s| s == "news") {
            segments.pop();
        }
        while segments.last().is_some_and(|s| s.is_empty()) {
            segments.pop();
        }

        let slug_at = segments
            .iter()
            .position(|s| s == "currencies")
            .map(|i| i + 1)
            .filter(|&i| segments.get(i).is_some_and(|s| !s.is_empty()))
            .ok_or_else(|| {
                PipelineError::InvalidInput(format!("no /currencies/<slug>/ segment in {input}"))
            })?;
        // Sub-pages such as `markets/` canonicalize to the coin page itself.
        segments.truncate(slug_at + 1);
        let slug = segments[slug_at].clone();

        url.set_path(&format!("/{}", segments.join("/")));
        url.set_query(None);
        url.set_fragment(None);

        Ok(Self { url, slug })
    }

    /// Canonical page URL, without trailing slash.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Path segment following `currencies`, as it appears in the URL.
    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// Display name of the coin: the slug upper-cased.
    pub fn coin(&self) -> String {
        self.slug.to_uppercase()
    }

    /// The page's news tab (`<canonical>/news/`).
    pub fn news_url(&self) -> Url {
        let mut url = self.url.clone();
        url.set_path(&format!("{}/news/", self.url.path()));
        url
    }
}
