use anyhow::{anyhow, Result};
use std::sync::Arc;

use feedrunner_core::feed::FeedFetcher;
use feedrunner_core::scheduler::{fetch_due_feeds, fetch_single_feed};
use feedrunner_core::storage::{Database, FeedRepository};
use feedrunner_core::AppConfig;

/// Run an immediate fetch: the whole due sweep, or one named feed
pub async fn run(db: &Database, config: &Arc<AppConfig>, feed_name: Option<&str>) -> Result<()> {
    let fetcher = FeedFetcher::new(config)?;

    match feed_name {
        Some(name) => {
            let feeds = FeedRepository::new(db);
            let feed = feeds
                .list_all()
                .await?
                .into_iter()
                .find(|f| f.name == name)
                .ok_or_else(|| anyhow!("No feed named '{}'", name))?;

            let outcome = fetch_single_feed(db, &fetcher, feed.id).await?;
            println!("Fetched '{}': {} new article(s)", name, outcome.new_articles);
        }
        None => {
            let report = fetch_due_feeds(db, &fetcher, None).await?;
            println!(
                "Swept {} due feed(s): {} ok, {} failed, {} new article(s)",
                report.total_feeds,
                report.successful_feeds,
                report.failed_feeds,
                report.new_articles
            );
            for error in &report.errors {
                println!("  error: {}", error);
            }
        }
    }

    Ok(())
}
