//! reqwest-backed retrieval with browser-like request headers.
//!
//! # Routes
//!
//! | Route | Request | Payload handed to extraction |
//! |-------|---------|------------------------------|
//! | [`Route::Direct`] | `GET <page>/news/` | response HTML |
//! | [`Route::Proxy`] | `GET <endpoint>?url=<page>` | the `html` field of the JSON body |
//! | [`Route::Api`] | `GET <endpoint>?coins=<slug>&page=1&size=100` | `data.items` rendered as markup |
//!
//! Every response is classified into a [`RetrievalResult`]; nothing here
//! retries. Classification is done by [`interpret`], which is independent of
//! the network so it can be tested directly.

use super::{RetrievalResult, Retrieve, render};
use crate::error::FailureKind;
use crate::target::CoinPage;
use crate::utils::truncate_for_log;
use chrono::Utc;
use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, HeaderMap, HeaderName, HeaderValue, ORIGIN, REFERER,
};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Browser user agent sent upstream unless configured otherwise.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const SITE_ORIGIN: &str = "https://coinmarketcap.com";

/// Page size requested from the news API.
const API_PAGE_SIZE: u32 = 100;

/// How a coin page is fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Fetch the coin's news tab directly.
    Direct,
    /// Go through a cross-origin proxy endpoint (`/api/proxy`).
    Proxy { endpoint: Url },
    /// Query the upstream JSON news API and render the items.
    Api { endpoint: Url },
}

/// Which kind of body a route expects; drives [`interpret`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Html,
    ProxyJson,
    ApiJson,
}

impl Route {
    fn body_kind(&self) -> BodyKind {
        match self {
            Self::Direct => BodyKind::Html,
            Self::Proxy { .. } => BodyKind::ProxyJson,
            Self::Api { .. } => BodyKind::ApiJson,
        }
    }

    /// The URL actually requested for `page`.
    pub fn request_url(&self, page: &CoinPage) -> Url {
        match self {
            Self::Direct => page.news_url(),
            Self::Proxy { endpoint } => {
                let param = format!("url={}", urlencoding::encode(page.url().as_str()));
                let query = match endpoint.query() {
                    Some(existing) if !existing.is_empty() => format!("{existing}&{param}"),
                    _ => param,
                };
                let mut url = endpoint.clone();
                url.set_query(Some(&query));
                url
            }
            Self::Api { endpoint } => {
                let mut url = endpoint.clone();
                url.query_pairs_mut()
                    .append_pair("coins", page.slug())
                    .append_pair("page", "1")
                    .append_pair("size", &API_PAGE_SIZE.to_string());
                url
            }
        }
    }
}

/// Success body of the proxy endpoint.
#[derive(Debug, Deserialize)]
struct ProxyBody {
    html: Option<String>,
}

/// Error body of the proxy endpoint.
#[derive(Debug, Deserialize)]
struct ProxyError {
    error: String,
}

/// Classify a response into a [`RetrievalResult`].
pub fn interpret(kind: BodyKind, status: u16, body: &str) -> RetrievalResult {
    if !(200..300).contains(&status) {
        let message = serde_json::from_str::<ProxyError>(body)
            .map(|e| e.error)
            .unwrap_or_else(|_| truncate_for_log(body.trim(), 200));
        return RetrievalResult::failure(FailureKind::HttpStatus(status), message);
    }
    if body.trim().is_empty() {
        return RetrievalResult::failure(FailureKind::EmptyBody, "upstream returned an empty body");
    }

    match kind {
        BodyKind::Html => RetrievalResult::success(body),
        BodyKind::ProxyJson => match serde_json::from_str::<ProxyBody>(body) {
            Ok(ProxyBody { html: Some(html) }) if !html.trim().is_empty() => {
                RetrievalResult::success(html)
            }
            Ok(ProxyBody { html: Some(_) }) => {
                RetrievalResult::failure(FailureKind::EmptyBody, "proxy returned empty html")
            }
            Ok(ProxyBody { html: None }) => {
                RetrievalResult::failure(FailureKind::MalformedUpstream, "proxy response has no html field")
            }
            Err(e) => RetrievalResult::failure(
                FailureKind::MalformedUpstream,
                format!("proxy response is not valid JSON: {e}"),
            ),
        },
        BodyKind::ApiJson => match render::api_items(body) {
            Ok(items) => {
                debug!(count = items.len(), "Rendering API items");
                RetrievalResult::success(render::render_items(&items))
            }
            Err(message) => RetrievalResult::failure(FailureKind::MalformedUpstream, message),
        },
    }
}

/// Retrieval over HTTP using one [`Route`].
#[derive(Debug, Clone)]
pub struct HttpRetriever {
    client: reqwest::Client,
    route: Route,
}

impl HttpRetriever {
    /// Build a retriever whose every attempt is bounded by `timeout`.
    pub fn new(route: Route, timeout: Duration, user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client, route })
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    fn headers(&self, page: &CoinPage) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        match self.route {
            Route::Direct => {
                headers.insert(
                    ACCEPT,
                    HeaderValue::from_static("text/html,application/xhtml+xml;q=0.9,*/*;q=0.8"),
                );
                headers.insert(REFERER, HeaderValue::from_static("https://coinmarketcap.com/"));
            }
            Route::Proxy { .. } => {
                headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
            }
            Route::Api { .. } => {
                headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
                headers.insert(ORIGIN, HeaderValue::from_static(SITE_ORIGIN));
                if let Ok(referer) = HeaderValue::from_str(page.news_url().as_str()) {
                    headers.insert(REFERER, referer);
                }
                if let Ok(id) = HeaderValue::from_str(&Utc::now().timestamp_millis().to_string()) {
                    headers.insert(HeaderName::from_static("x-request-id"), id);
                }
            }
        }
        headers
    }
}

impl Retrieve for HttpRetriever {
    #[instrument(level = "info", skip_all, fields(slug = %page.slug()))]
    async fn retrieve(&self, page: &CoinPage) -> RetrievalResult {
        let url = self.route.request_url(page);
        let t0 = Instant::now();
        info!(%url, "Sending request");

        let response = match self
            .client
            .get(url.clone())
            .headers(self.headers(page))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return classify_transport_error(&e),
        };

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return classify_transport_error(&e),
        };

        info!(
            status,
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Received response"
        );
        debug!(preview = %truncate_for_log(&body, 300), "Response body");

        interpret(self.route.body_kind(), status, &body)
    }
}

fn classify_transport_error(e: &reqwest::Error) -> RetrievalResult {
    let kind = if e.is_timeout() {
        FailureKind::Timeout
    } else {
        FailureKind::Network
    };
    warn!(error = %e, %kind, "Request failed");
    RetrievalResult::failure(kind, e.to_string())
}
