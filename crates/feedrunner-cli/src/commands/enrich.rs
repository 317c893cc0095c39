use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use feedrunner_core::enrich::{ContentEnricher, ReaderClient, Summarizer, SummaryProvider};
use feedrunner_core::storage::{ArticleRepository, Database};
use feedrunner_core::AppConfig;

/// Crawl full content for uncrawled articles, oldest batch first
pub async fn run(db: &Database, config: &Arc<AppConfig>, limit: Option<u32>) -> Result<()> {
    let reader = Arc::new(ReaderClient::new(config)?);

    let summarizer: Option<Arc<dyn SummaryProvider>> = if config.summarize.enabled {
        match Summarizer::new(config) {
            Ok(s) => {
                info!("Summarization enabled (model: {})", config.summarize.model);
                Some(Arc::new(s))
            }
            Err(e) => {
                warn!("Summarizer unavailable: {}", e);
                None
            }
        }
    } else {
        None
    };

    let enricher = ContentEnricher::new(db.clone(), reader, summarizer);

    let limit = limit.unwrap_or(config.scheduler.uncrawled_batch_limit);
    let articles = ArticleRepository::new(db).list_uncrawled(limit).await?;

    if articles.is_empty() {
        println!("Nothing to enrich.");
        return Ok(());
    }

    println!("Enriching {} article(s)...", articles.len());
    let ids: Vec<_> = articles.iter().map(|a| a.id).collect();
    let report = enricher.enrich_batch(&ids).await;

    println!("Done: {} enriched, {} failed", report.succeeded, report.failed);
    Ok(())
}
