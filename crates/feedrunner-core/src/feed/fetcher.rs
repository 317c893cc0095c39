use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, USER_AGENT};
use reqwest::{Client, StatusCode};
use url::Url;

use super::extract::extract_content;
use super::models::{Feed, NewArticle};
use super::parser::parse_feed;
use crate::config::AppConfig;
use crate::{Error, Result};

const MAX_FEED_BYTES: usize = 5 * 1024 * 1024;

const FETCH_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36";

/// Outcome of a URL validation probe
#[derive(Debug)]
pub struct FeedProbe {
    pub title: Option<String>,
    pub description: Option<String>,
    pub entry_count: usize,
}

/// Fetches feed documents and entry pages over HTTP
pub struct FeedFetcher {
    client: Client,
    max_articles: usize,
    max_retries: u32,
    initial_backoff_ms: u64,
    extract_entry_pages: bool,
}

impl FeedFetcher {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.fetch.request_timeout_secs))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .default_headers(Self::build_headers())
            .build()
            .map_err(Error::Http)?;

        Ok(Self {
            client,
            max_articles: config.fetch.max_articles_per_feed,
            max_retries: config.fetch.max_retries.max(1),
            initial_backoff_ms: config.fetch.initial_backoff_ms,
            extract_entry_pages: config.fetch.extract_entry_pages,
        })
    }

    fn build_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "application/rss+xml, application/atom+xml, application/xml;q=0.9, \
                 text/xml;q=0.9, text/html;q=0.8, */*;q=0.7",
            ),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.9"),
        );
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(USER_AGENT, HeaderValue::from_static(FETCH_USER_AGENT));
        headers
    }

    /// Whether a response status warrants a retry
    fn is_retryable(status: StatusCode) -> bool {
        matches!(
            status,
            StatusCode::TOO_MANY_REQUESTS
                | StatusCode::INTERNAL_SERVER_ERROR
                | StatusCode::BAD_GATEWAY
                | StatusCode::SERVICE_UNAVAILABLE
                | StatusCode::GATEWAY_TIMEOUT
        )
    }

    /// GET a URL with bounded retry and exponential backoff for transient
    /// failures (429/5xx and transport errors).
    async fn get_with_retry(&self, url: &str) -> Result<(StatusCode, Bytes)> {
        let mut last_error = None;
        let mut delay_ms = self.initial_backoff_ms;

        for attempt in 0..self.max_retries {
            tracing::debug!("Fetch attempt {} for {}", attempt + 1, url);

            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();

                    if Self::is_retryable(status) {
                        tracing::warn!(
                            "Received {} for {}, retrying after {}ms",
                            status,
                            url,
                            delay_ms
                        );
                        last_error =
                            Some(Error::FeedParse(format!("HTTP {} for URL: {}", status, url)));
                    } else {
                        match response.bytes().await {
                            Ok(bytes) => return Ok((status, bytes)),
                            Err(e) => {
                                tracing::warn!("Failed to read response body from {}: {}", url, e);
                                last_error = Some(Error::Http(e));
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("Request failed for {} (attempt {}): {}", url, attempt + 1, e);
                    last_error = Some(Error::Http(e));
                }
            }

            if attempt < self.max_retries - 1 {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                delay_ms *= 2;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::FeedParse(format!(
                "Failed to fetch URL after {} retries: {}",
                self.max_retries, url
            ))
        }))
    }

    /// Fetch a feed's raw document
    async fn fetch_document(&self, url: &str) -> Result<Bytes> {
        Url::parse(url)?;

        let (status, content) = self.get_with_retry(url).await?;

        if !status.is_success() {
            return Err(Error::FeedParse(format!("HTTP {} for URL: {}", status, url)));
        }

        if content.len() > MAX_FEED_BYTES {
            return Err(Error::FeedParse(format!(
                "Feed too large ({} bytes) for URL: {}",
                content.len(),
                url
            )));
        }

        Ok(content)
    }

    /// Best-effort full-text extraction from an entry's target page.
    /// Any failure is isolated to this entry.
    async fn fetch_entry_content(&self, link: &str) -> Option<String> {
        match self.client.get(link).send().await {
            Ok(response) => match response.error_for_status() {
                Ok(response) => match response.text().await {
                    Ok(html) => extract_content(&html),
                    Err(e) => {
                        tracing::warn!("Failed to read article page {}: {}", link, e);
                        None
                    }
                },
                Err(e) => {
                    tracing::warn!("Article page {} returned error status: {}", link, e);
                    None
                }
            },
            Err(e) => {
                tracing::warn!("Failed to fetch article page {}: {}", link, e);
                None
            }
        }
    }

    /// Fetch and parse one feed into candidate articles. Entries that carry
    /// neither a guid nor a link are skipped; per-entry page failures fall
    /// back to the entry's own summary.
    pub async fn fetch_feed(&self, feed: &Feed) -> Result<Vec<NewArticle>> {
        tracing::info!("Fetching feed: {} ({})", feed.name, feed.url);

        let content = self.fetch_document(&feed.url).await?;
        let parsed = parse_feed(&content)?;

        let mut articles = Vec::new();

        for entry in parsed.entries.into_iter().take(self.max_articles) {
            if !entry.has_identity() {
                tracing::warn!("Skipping entry without guid or link in {}", feed.url);
                continue;
            }

            let link = entry.link.clone().unwrap_or_default();

            let content = if self.extract_entry_pages && !link.is_empty() {
                match self.fetch_entry_content(&link).await {
                    Some(text) => Some(text),
                    None => entry.content.clone().or_else(|| entry.summary.clone()),
                }
            } else {
                entry.content.clone().or_else(|| entry.summary.clone())
            };

            articles.push(NewArticle {
                feed_id: feed.id,
                title: entry.title,
                link,
                description: entry.summary,
                content,
                published: entry.published,
                guid: entry.guid,
                author: entry.author,
                category: Some(feed.category.clone()),
            });
        }

        Ok(articles)
    }

    /// Probe a URL: fetch and parse it without storing anything
    pub async fn validate_feed_url(&self, url: &str) -> Result<FeedProbe> {
        let content = self.fetch_document(url).await?;
        let parsed = parse_feed(&content)?;

        if parsed.entries.is_empty() {
            return Err(Error::FeedParse(format!("Feed contains no entries: {}", url)));
        }

        Ok(FeedProbe {
            title: parsed.title,
            description: parsed.description,
            entry_count: parsed.entries.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        assert!(FeedFetcher::is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(FeedFetcher::is_retryable(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(FeedFetcher::is_retryable(StatusCode::BAD_GATEWAY));
        assert!(FeedFetcher::is_retryable(StatusCode::SERVICE_UNAVAILABLE));
        assert!(FeedFetcher::is_retryable(StatusCode::GATEWAY_TIMEOUT));

        assert!(!FeedFetcher::is_retryable(StatusCode::OK));
        assert!(!FeedFetcher::is_retryable(StatusCode::NOT_FOUND));
        assert!(!FeedFetcher::is_retryable(StatusCode::FORBIDDEN));
    }

    #[test]
    fn test_headers_announce_feed_formats() {
        let headers = FeedFetcher::build_headers();
        let accept = headers.get(ACCEPT).unwrap().to_str().unwrap();
        assert!(accept.contains("application/rss+xml"));
        assert!(accept.contains("application/atom+xml"));
        assert!(headers.get(USER_AGENT).is_some());
    }

    #[tokio::test]
    async fn test_invalid_url_rejected() {
        let fetcher = FeedFetcher::new(&AppConfig::default()).unwrap();
        let result = fetcher.fetch_document("not a url").await;
        assert!(matches!(result, Err(Error::UrlParse(_))));
    }
}
