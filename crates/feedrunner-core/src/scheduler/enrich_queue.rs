//! Bounded hand-off between the fetch path and the enrichment worker.
//!
//! Fetch tasks push newly stored article ids without waiting; a single
//! worker drains the queue with a fixed spacing delay between launches.
//! When the queue is full the id is dropped and logged rather than
//! blocking the fetch path.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::enrich::ContentEnricher;

/// Sending half of the enrichment queue
#[derive(Clone)]
pub struct EnrichQueue {
    tx: mpsc::Sender<Uuid>,
}

impl EnrichQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Uuid>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queue an article for enrichment. Returns false when the queue is
    /// full or the worker is gone; the article stays uncrawled and can be
    /// picked up by a later manual pass.
    pub fn push(&self, article_id: Uuid) -> bool {
        match self.tx.try_send(article_id) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Enrichment queue full, dropping article {}", article_id);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Enrichment worker stopped, dropping article {}", article_id);
                false
            }
        }
    }
}

/// Spawn the worker that drains the queue until shutdown
pub fn spawn_worker(
    mut rx: mpsc::Receiver<Uuid>,
    enricher: Arc<ContentEnricher>,
    spacing: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Enrichment worker started (spacing {:?})", spacing);

        loop {
            let article_id = tokio::select! {
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                next = rx.recv() => match next {
                    Some(id) => id,
                    None => break,
                },
            };

            match enricher.enrich(article_id).await {
                Ok(true) => debug!("Enriched article {}", article_id),
                Ok(false) => warn!("Enrichment gave up on article {}", article_id),
                Err(e) => warn!("Enrichment error for article {}: {}", article_id, e),
            }

            // Pace launches; bail out early if shutdown arrives mid-wait
            tokio::select! {
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = tokio::time::sleep(spacing) => {}
            }
        }

        info!("Enrichment worker stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::ContentReader;
    use crate::feed::{NewArticle, NewFeed};
    use crate::storage::{ArticleRepository, Database, FeedRepository};
    use crate::Result;

    struct StaticReader;

    #[async_trait::async_trait]
    impl ContentReader for StaticReader {
        async fn read(&self, _url: &str) -> Result<String> {
            Ok("page text".to_string())
        }
    }

    #[test]
    fn test_full_queue_drops() {
        let (queue, _rx) = EnrichQueue::new(2);
        assert!(queue.push(Uuid::new_v4()));
        assert!(queue.push(Uuid::new_v4()));
        assert!(!queue.push(Uuid::new_v4()));
    }

    #[test]
    fn test_closed_queue_drops() {
        let (queue, rx) = EnrichQueue::new(2);
        drop(rx);
        assert!(!queue.push(Uuid::new_v4()));
    }

    #[tokio::test]
    async fn test_worker_drains_queue() {
        let db = Database::new_in_memory().await.unwrap();
        let feed = FeedRepository::new(&db)
            .create(&NewFeed {
                name: "Test".to_string(),
                url: "https://example.com/rss".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let (article, _) = ArticleRepository::new(&db)
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

        let enricher = Arc::new(ContentEnricher::new(db.clone(), Arc::new(StaticReader), None));
        let (queue, rx) = EnrichQueue::new(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = spawn_worker(rx, enricher, Duration::ZERO, shutdown_rx);

        assert!(queue.push(article.id));

        // Give the worker a moment to process
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let stored = ArticleRepository::new(&db)
                .find_by_id(article.id)
                .await
                .unwrap()
                .unwrap();
            if stored.is_crawled {
                break;
            }
        }

        let stored = ArticleRepository::new(&db)
            .find_by_id(article.id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.is_crawled);
        assert_eq!(stored.crawled_content.as_deref(), Some("page text"));

        shutdown_tx.send(true).unwrap();
        worker.await.unwrap();
    }
}
