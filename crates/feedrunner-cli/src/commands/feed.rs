use anyhow::{anyhow, Result};
use std::sync::Arc;

use feedrunner_core::feed::{FeedFetcher, NewFeed};
use feedrunner_core::storage::{ArticleRepository, Database, FeedRepository};
use feedrunner_core::AppConfig;

/// Probe a feed URL and report what it contains without storing it
pub async fn validate(config: &Arc<AppConfig>, url: &str) -> Result<()> {
    let fetcher = FeedFetcher::new(config)?;
    let probe = fetcher.validate_feed_url(url).await?;

    println!("Valid feed: {}", url);
    println!("  Title:       {}", probe.title.as_deref().unwrap_or("(none)"));
    println!("  Description: {}", probe.description.as_deref().unwrap_or("(none)"));
    println!("  Entries:     {}", probe.entry_count);

    Ok(())
}

/// Validate the URL, then store the feed
pub async fn add(
    db: &Database,
    config: &Arc<AppConfig>,
    url: &str,
    name: Option<&str>,
    category: &str,
    interval: i64,
) -> Result<()> {
    let fetcher = FeedFetcher::new(config)?;
    let probe = fetcher.validate_feed_url(url).await?;

    let name = match name {
        Some(name) => name.to_string(),
        None => probe
            .title
            .clone()
            .ok_or_else(|| anyhow!("Feed has no title; pass one with --name"))?,
    };

    let feed = FeedRepository::new(db)
        .create(&NewFeed {
            name,
            url: url.to_string(),
            category: category.to_string(),
            active: true,
            fetch_interval: interval,
        })
        .await?;

    println!(
        "Added feed '{}' ({} entries, every {}s)",
        feed.name, probe.entry_count, feed.fetch_interval
    );
    Ok(())
}

/// List all feeds with their fetch state
pub async fn list(db: &Database) -> Result<()> {
    let feeds = FeedRepository::new(db).list_all().await?;

    if feeds.is_empty() {
        println!("No feeds.");
        return Ok(());
    }

    println!("{} feed(s):", feeds.len());
    for feed in feeds {
        let status = if feed.active { "active" } else { "inactive" };
        let fetched = feed
            .last_fetched
            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "never".to_string());

        println!(
            "  {} [{}] {} — every {}s, last fetched {}",
            feed.name, feed.category, status, feed.fetch_interval, fetched
        );
        if let Some(error) = &feed.last_error {
            println!("    last error ({} consecutive): {}", feed.error_count, error);
        }
    }

    Ok(())
}

/// Remove a feed; its articles go with it
pub async fn remove(db: &Database, name: &str) -> Result<()> {
    let feeds = FeedRepository::new(db);
    let feed = feeds
        .list_all()
        .await?
        .into_iter()
        .find(|f| f.name == name)
        .ok_or_else(|| anyhow!("No feed named '{}'", name))?;

    let article_count = ArticleRepository::new(db).list_by_feed(feed.id, u32::MAX).await?.len();
    feeds.delete(feed.id).await?;

    println!("Removed feed '{}' and {} article(s)", name, article_count);
    Ok(())
}
