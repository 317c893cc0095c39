use std::sync::Arc;

use uuid::Uuid;

use super::{ContentReader, SummaryProvider};
use crate::storage::{ArticleRepository, Database};
use crate::{Error, Result};

/// Outcome of an enrichment batch
#[derive(Debug, Default, Clone, Copy)]
pub struct EnrichReport {
    pub succeeded: u32,
    pub failed: u32,
}

/// Fills in crawled content for stored articles: fetches the article page
/// through the reader service and optionally attaches an LLM summary.
pub struct ContentEnricher {
    db: Database,
    reader: Arc<dyn ContentReader>,
    summarizer: Option<Arc<dyn SummaryProvider>>,
}

impl ContentEnricher {
    pub fn new(
        db: Database,
        reader: Arc<dyn ContentReader>,
        summarizer: Option<Arc<dyn SummaryProvider>>,
    ) -> Self {
        Self {
            db,
            reader,
            summarizer,
        }
    }

    /// Enrich one article. Returns `Ok(true)` when the article ends up
    /// crawled (including the already-crawled no-op), `Ok(false)` when the
    /// reader definitively failed; storage errors propagate.
    pub async fn enrich(&self, article_id: Uuid) -> Result<bool> {
        let articles = ArticleRepository::new(&self.db);
        let article = articles
            .find_by_id(article_id)
            .await?
            .ok_or_else(|| Error::ArticleNotFound(article_id.to_string()))?;

        if article.is_crawled {
            tracing::debug!("Article {} already crawled, skipping", article_id);
            return Ok(true);
        }

        if article.link.is_empty() {
            tracing::warn!("Article {} has no link to crawl", article_id);
            return Ok(false);
        }

        let content = match self.reader.read(&article.link).await {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("Failed to crawl article {}: {}", article_id, e);
                return Ok(false);
            }
        };

        let summary = match &self.summarizer {
            Some(summarizer) => match summarizer.summarize(&content).await {
                Ok(summary) => Some(summary),
                // A broken prompt configuration aborts the operation;
                // anything else is a per-article soft failure.
                Err(e @ Error::Config(_)) => return Err(e),
                Err(e) => {
                    tracing::warn!("Summarization failed for article {}: {}", article_id, e);
                    None
                }
            },
            None => None,
        };

        articles
            .update_crawled(article_id, &content, &content, None, summary.as_deref())
            .await?;

        tracing::info!("Enriched article {} ({})", article_id, article.link);
        Ok(true)
    }

    /// Enrich a set of articles sequentially. One failure never stops the
    /// rest of the batch.
    pub async fn enrich_batch(&self, ids: &[Uuid]) -> EnrichReport {
        let mut report = EnrichReport::default();

        for &id in ids {
            match self.enrich(id).await {
                Ok(true) => report.succeeded += 1,
                Ok(false) => report.failed += 1,
                Err(e) => {
                    tracing::error!("Enrichment error for article {}: {}", id, e);
                    report.failed += 1;
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::feed::{NewArticle, NewFeed};
    use crate::storage::FeedRepository;

    struct FixedReader {
        calls: AtomicU32,
        response: Result<&'static str>,
    }

    impl FixedReader {
        fn ok(text: &'static str) -> Self {
            Self {
                calls: AtomicU32::new(0),
                response: Ok(text),
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicU32::new(0),
                response: Err(Error::Reader("exhausted retries".to_string())),
            }
        }
    }

    #[async_trait::async_trait]
    impl ContentReader for FixedReader {
        async fn read(&self, _url: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.response {
                Ok(text) => Ok(text.to_string()),
                Err(Error::Reader(msg)) => Err(Error::Reader(msg.clone())),
                Err(_) => unreachable!(),
            }
        }
    }

    struct FailingSummarizer;

    #[async_trait::async_trait]
    impl SummaryProvider for FailingSummarizer {
        async fn summarize(&self, _content: &str) -> Result<String> {
            Err(Error::Summarize("model unavailable".to_string()))
        }
    }

    struct FixedSummarizer(&'static str);

    #[async_trait::async_trait]
    impl SummaryProvider for FixedSummarizer {
        async fn summarize(&self, _content: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    async fn seed_article(db: &Database) -> Uuid {
        let feed = FeedRepository::new(db)
            .create(&NewFeed {
                name: "Test".to_string(),
                url: "https://example.com/rss".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let (article, created) = ArticleRepository::new(db)
            .create_if_absent(&NewArticle {
                feed_id: feed.id,
                title: "Post".to_string(),
                link: "https://example.com/post".to_string(),
                description: None,
                content: None,
                published: None,
                guid: Some("guid-1".to_string()),
                author: None,
                category: None,
            })
            .await
            .unwrap();
        assert!(created);
        article.id
    }

    #[tokio::test]
    async fn test_enrich_persists_content_and_flag() {
        let db = Database::new_in_memory().await.unwrap();
        let id = seed_article(&db).await;

        let enricher = ContentEnricher::new(db.clone(), Arc::new(FixedReader::ok("full text")), None);
        assert!(enricher.enrich(id).await.unwrap());

        let article = ArticleRepository::new(&db).find_by_id(id).await.unwrap().unwrap();
        assert!(article.is_crawled);
        assert_eq!(article.crawled_content.as_deref(), Some("full text"));
    }

    #[tokio::test]
    async fn test_already_crawled_skips_reader() {
        let db = Database::new_in_memory().await.unwrap();
        let id = seed_article(&db).await;
        ArticleRepository::new(&db)
            .update_crawled(id, "existing", "existing", None, None)
            .await
            .unwrap();

        let reader = Arc::new(FixedReader::ok("new text"));
        let enricher = ContentEnricher::new(db.clone(), reader.clone(), None);
        assert!(enricher.enrich(id).await.unwrap());

        assert_eq!(reader.calls.load(Ordering::SeqCst), 0);
        let article = ArticleRepository::new(&db).find_by_id(id).await.unwrap().unwrap();
        assert_eq!(article.crawled_content.as_deref(), Some("existing"));
    }

    #[tokio::test]
    async fn test_reader_failure_leaves_article_untouched() {
        let db = Database::new_in_memory().await.unwrap();
        let id = seed_article(&db).await;

        let enricher = ContentEnricher::new(db.clone(), Arc::new(FixedReader::failing()), None);
        assert!(!enricher.enrich(id).await.unwrap());

        let article = ArticleRepository::new(&db).find_by_id(id).await.unwrap().unwrap();
        assert!(!article.is_crawled);
        assert!(article.crawled_content.is_none());
        assert!(article.crawled_html.is_none());
    }

    #[tokio::test]
    async fn test_summarization_failure_is_non_fatal() {
        let db = Database::new_in_memory().await.unwrap();
        let id = seed_article(&db).await;

        let enricher = ContentEnricher::new(
            db.clone(),
            Arc::new(FixedReader::ok("full text")),
            Some(Arc::new(FailingSummarizer)),
        );
        assert!(enricher.enrich(id).await.unwrap());

        let article = ArticleRepository::new(&db).find_by_id(id).await.unwrap().unwrap();
        assert!(article.is_crawled);
        assert_eq!(article.crawled_content.as_deref(), Some("full text"));
    }

    #[tokio::test]
    async fn test_summary_replaces_content() {
        let db = Database::new_in_memory().await.unwrap();
        let id = seed_article(&db).await;

        let enricher = ContentEnricher::new(
            db.clone(),
            Arc::new(FixedReader::ok("full text")),
            Some(Arc::new(FixedSummarizer("a short summary"))),
        );
        assert!(enricher.enrich(id).await.unwrap());

        let article = ArticleRepository::new(&db).find_by_id(id).await.unwrap().unwrap();
        assert_eq!(article.content.as_deref(), Some("a short summary"));
    }

    #[tokio::test]
    async fn test_batch_isolates_failures() {
        let db = Database::new_in_memory().await.unwrap();
        let id = seed_article(&db).await;
        let missing = Uuid::new_v4();

        let enricher = ContentEnricher::new(db.clone(), Arc::new(FixedReader::ok("text")), None);
        let report = enricher.enrich_batch(&[id, missing]).await;

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
    }
}
