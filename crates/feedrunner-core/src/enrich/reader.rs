use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;

use super::ContentReader;
use crate::config::AppConfig;
use crate::{Error, Result};

/// Client for a Jina-style reader API: the target URL is appended to the
/// API base and the response body is the extracted page text.
pub struct ReaderClient {
    client: Client,
    base_url: String,
    max_retries: u32,
}

impl ReaderClient {
    /// A missing token is a configuration error at construction time.
    pub fn new(config: &AppConfig) -> Result<Self> {
        let token = config
            .reader
            .token
            .as_ref()
            .ok_or_else(|| Error::Config("Reader API token is not configured".to_string()))?;

        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| Error::Config("Reader API token contains invalid characters".to_string()))?;
        headers.insert(AUTHORIZATION, bearer);

        let client = Client::builder()
            .timeout(Duration::from_secs(config.reader.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(Error::Http)?;

        Ok(Self {
            client,
            base_url: config.reader.base_url.trim_end_matches('/').to_string(),
            max_retries: config.reader.max_retries.max(1),
        })
    }

    fn api_url(&self, target_url: &str) -> String {
        format!("{}/{}", self.base_url, target_url)
    }
}

#[async_trait::async_trait]
impl ContentReader for ReaderClient {
    /// Fetch extracted content with bounded retries and exponential backoff.
    /// Exhausting retries is a definitive failure.
    async fn read(&self, url: &str) -> Result<String> {
        let api_url = self.api_url(url);
        let mut last_error = None;

        for attempt in 1..=self.max_retries {
            match self.client.get(&api_url).send().await {
                Ok(response) => match response.error_for_status() {
                    Ok(response) => match response.text().await {
                        Ok(text) => return Ok(text),
                        Err(e) => last_error = Some(e.to_string()),
                    },
                    Err(e) => last_error = Some(e.to_string()),
                },
                Err(e) => last_error = Some(e.to_string()),
            }

            if attempt < self.max_retries {
                let delay = Duration::from_secs(2u64.pow(attempt));
                tracing::warn!(
                    "Reader request for {} failed (attempt {}), retrying in {:?}",
                    url,
                    attempt,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
        }

        Err(Error::Reader(format!(
            "Failed to read {} after {} attempts: {}",
            url,
            self.max_retries,
            last_error.unwrap_or_else(|| "unknown error".to_string())
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_token() -> AppConfig {
        let mut config = AppConfig::default();
        config.reader.token = Some("test-token".to_string());
        config
    }

    #[test]
    fn test_missing_token_fails_construction() {
        let result = ReaderClient::new(&AppConfig::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_api_url_prefixes_target() {
        let client = ReaderClient::new(&config_with_token()).unwrap();
        assert_eq!(
            client.api_url("https://example.com/post"),
            "https://r.jina.ai/https://example.com/post"
        );
    }
}
