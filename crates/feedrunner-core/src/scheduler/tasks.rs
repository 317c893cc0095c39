use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use super::enrich_queue::EnrichQueue;
use crate::feed::{Feed, FeedFetcher};
use crate::storage::{ArticleRepository, Database, FeedRepository};
use crate::{Error, Result};

/// How many error messages a sweep report keeps for the job record
const MAX_REPORTED_ERRORS: usize = 5;

/// Result of fetching and storing one feed
#[derive(Debug, Default)]
pub struct FeedFetchOutcome {
    /// Number of articles that were actually new
    pub new_articles: u32,
    /// Ids of the newly stored articles, in feed order
    pub new_ids: Vec<Uuid>,
}

/// Aggregate result of a due-feed sweep
#[derive(Debug, Default)]
pub struct SweepReport {
    pub total_feeds: u32,
    pub successful_feeds: u32,
    pub failed_feeds: u32,
    pub new_articles: u32,
    pub errors: Vec<String>,
}

impl SweepReport {
    /// Condensed error text for the job record, capped at the first few
    /// messages; None when the sweep was clean.
    pub fn error_summary(&self) -> Option<String> {
        if self.errors.is_empty() {
            return None;
        }
        let mut summary = self
            .errors
            .iter()
            .take(MAX_REPORTED_ERRORS)
            .cloned()
            .collect::<Vec<_>>()
            .join("; ");
        if self.errors.len() > MAX_REPORTED_ERRORS {
            summary.push_str(&format!(" (+{} more)", self.errors.len() - MAX_REPORTED_ERRORS));
        }
        Some(summary)
    }
}

/// Fetch one feed and store its new articles. The feed's fetch-status
/// fields are updated exactly once per attempt; a fetch failure is
/// recorded on the feed and then propagated.
pub async fn fetch_and_store_feed(
    db: &Database,
    fetcher: &FeedFetcher,
    feed: &Feed,
) -> Result<FeedFetchOutcome> {
    let feeds = FeedRepository::new(db);
    let articles = ArticleRepository::new(db);
    let attempt_time = Utc::now();

    let candidates = match fetcher.fetch_feed(feed).await {
        Ok(candidates) => candidates,
        Err(e) => {
            feeds
                .update_fetch_status(feed.id, attempt_time, Some(&e.to_string()))
                .await?;
            return Err(e);
        }
    };

    let mut outcome = FeedFetchOutcome::default();
    for candidate in &candidates {
        let (article, created) = articles.create_if_absent(candidate).await?;
        if created {
            outcome.new_articles += 1;
            outcome.new_ids.push(article.id);
        }
    }

    feeds.update_fetch_status(feed.id, attempt_time, None).await?;

    info!(
        "Fetched {}: {} entries, {} new",
        feed.name,
        candidates.len(),
        outcome.new_articles
    );
    Ok(outcome)
}

/// Sweep all due feeds. Per-feed failures are recorded in the report and
/// never stop the sweep; new article ids are handed to the enrichment
/// queue when one is attached.
pub async fn fetch_due_feeds(
    db: &Database,
    fetcher: &FeedFetcher,
    queue: Option<&EnrichQueue>,
) -> Result<SweepReport> {
    let due = FeedRepository::new(db).list_due(Utc::now()).await?;

    let mut report = SweepReport {
        total_feeds: due.len() as u32,
        ..Default::default()
    };

    for feed in &due {
        match fetch_and_store_feed(db, fetcher, feed).await {
            Ok(outcome) => {
                report.successful_feeds += 1;
                report.new_articles += outcome.new_articles;
                if let Some(queue) = queue {
                    for id in outcome.new_ids {
                        queue.push(id);
                    }
                }
            }
            Err(e) => {
                warn!("Fetch failed for feed {}: {}", feed.name, e);
                report.failed_feeds += 1;
                report.errors.push(format!("{}: {}", feed.name, e));
            }
        }
    }

    info!(
        "Sweep complete: {}/{} feeds ok, {} new articles",
        report.successful_feeds, report.total_feeds, report.new_articles
    );
    Ok(report)
}

/// Fetch one feed immediately, outside the due sweep
pub async fn fetch_single_feed(
    db: &Database,
    fetcher: &FeedFetcher,
    feed_id: Uuid,
) -> Result<FeedFetchOutcome> {
    let feed = FeedRepository::new(db)
        .find_by_id(feed_id)
        .await?
        .ok_or_else(|| Error::FeedNotFound(feed_id.to_string()))?;

    fetch_and_store_feed(db, fetcher, &feed).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::feed::NewFeed;

    fn local_fetcher() -> FeedFetcher {
        let mut config = AppConfig::default();
        config.fetch.max_retries = 1;
        config.fetch.initial_backoff_ms = 1;
        config.fetch.request_timeout_secs = 2;
        FeedFetcher::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_sweep_with_no_due_feeds_is_empty() {
        let db = Database::new_in_memory().await.unwrap();
        let report = fetch_due_feeds(&db, &local_fetcher(), None).await.unwrap();

        assert_eq!(report.total_feeds, 0);
        assert_eq!(report.new_articles, 0);
        assert!(report.error_summary().is_none());
    }

    #[tokio::test]
    async fn test_fetch_single_unknown_feed() {
        let db = Database::new_in_memory().await.unwrap();
        let result = fetch_single_feed(&db, &local_fetcher(), Uuid::new_v4()).await;
        assert!(matches!(result, Err(Error::FeedNotFound(_))));
    }

    #[tokio::test]
    async fn test_fetch_failure_recorded_on_feed() {
        let db = Database::new_in_memory().await.unwrap();
        let feeds = FeedRepository::new(&db);
        // Nothing listens on this port; the connection is refused locally
        let feed = feeds
            .create(&NewFeed {
                name: "Dead".to_string(),
                url: "http://127.0.0.1:1/feed.xml".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let report = fetch_due_feeds(&db, &local_fetcher(), None).await.unwrap();
        assert_eq!(report.total_feeds, 1);
        assert_eq!(report.failed_feeds, 1);
        assert!(report.error_summary().unwrap().contains("Dead"));

        let feed = feeds.find_by_id(feed.id).await.unwrap().unwrap();
        assert_eq!(feed.error_count, 1);
        assert!(feed.last_error.is_some());
        assert!(feed.last_fetched.is_some());
    }

    #[test]
    fn test_error_summary_caps_messages() {
        let report = SweepReport {
            total_feeds: 7,
            failed_feeds: 7,
            errors: (1..=7).map(|i| format!("feed{}: boom", i)).collect(),
            ..Default::default()
        };

        let summary = report.error_summary().unwrap();
        assert!(summary.contains("feed5"));
        assert!(!summary.contains("feed6: boom"));
        assert!(summary.ends_with("(+2 more)"));
    }
}
