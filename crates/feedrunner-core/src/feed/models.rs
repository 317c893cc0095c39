use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A syndication source polled periodically for new entries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub category: String,
    pub active: bool,
    /// Minimum seconds between fetches
    pub fetch_interval: i64,
    pub last_fetched: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub error_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data required to create a new feed
#[derive(Debug, Clone)]
pub struct NewFeed {
    pub name: String,
    pub url: String,
    pub category: String,
    pub active: bool,
    pub fetch_interval: i64,
}

impl Default for NewFeed {
    fn default() -> Self {
        Self {
            name: String::new(),
            url: String::new(),
            category: "General".to_string(),
            active: true,
            fetch_interval: 3600,
        }
    }
}

/// Partial update for a feed; None fields are left unchanged
#[derive(Debug, Clone, Default)]
pub struct FeedPatch {
    pub name: Option<String>,
    pub url: Option<String>,
    pub category: Option<String>,
    pub active: Option<bool>,
    pub fetch_interval: Option<i64>,
}

impl Feed {
    /// An active feed is due when it was never fetched or its interval elapsed
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if !self.active {
            return false;
        }
        match self.last_fetched {
            None => true,
            Some(last) => (now - last).num_seconds() >= self.fetch_interval,
        }
    }

    pub fn has_error(&self) -> bool {
        self.last_error.is_some()
    }
}

/// An article stored from a feed entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: Uuid,
    pub feed_id: Uuid,
    pub title: String,
    pub link: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub guid: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    pub crawled_content: Option<String>,
    pub crawled_html: Option<String>,
    pub crawled_title: Option<String>,
    pub is_crawled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data required to store a new article
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub feed_id: Uuid,
    pub title: String,
    pub link: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub guid: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
}

impl NewArticle {
    /// Dedup key: GUID when present, else the entry link, scoped per feed
    pub fn dedup_key(&self) -> &str {
        match self.guid.as_deref() {
            Some(guid) if !guid.is_empty() => guid,
            _ => &self.link,
        }
    }
}

/// A named cron-scheduled task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub name: String,
    /// Cron expression (5-field crontab form)
    pub schedule: String,
    pub active: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub run_count: i64,
    pub error_count: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data required to create a new job
#[derive(Debug, Clone)]
pub struct NewJob {
    pub name: String,
    pub schedule: String,
    pub active: bool,
}

/// Partial update for a job; None fields are left unchanged
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub name: Option<String>,
    pub schedule: Option<String>,
    pub active: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn feed_with(active: bool, last_fetched: Option<DateTime<Utc>>) -> Feed {
        let now = Utc::now();
        Feed {
            id: Uuid::new_v4(),
            name: "test".to_string(),
            url: "https://example.com/rss".to_string(),
            category: "General".to_string(),
            active,
            fetch_interval: 3600,
            last_fetched,
            last_error: None,
            error_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_never_fetched_feed_is_due() {
        let now = Utc::now();
        assert!(feed_with(true, None).is_due(now));
    }

    #[test]
    fn test_inactive_feed_never_due() {
        let now = Utc::now();
        assert!(!feed_with(false, None).is_due(now));
        assert!(!feed_with(false, Some(now - Duration::seconds(7200))).is_due(now));
    }

    #[test]
    fn test_interval_elapsed() {
        let now = Utc::now();
        assert!(feed_with(true, Some(now - Duration::seconds(7200))).is_due(now));
        assert!(!feed_with(true, Some(now - Duration::seconds(1800))).is_due(now));
    }

    #[test]
    fn test_dedup_key_prefers_guid() {
        let article = NewArticle {
            feed_id: Uuid::new_v4(),
            title: "t".to_string(),
            link: "https://example.com/a".to_string(),
            description: None,
            content: None,
            published: None,
            guid: Some("abc".to_string()),
            author: None,
            category: None,
        };
        assert_eq!(article.dedup_key(), "abc");

        let no_guid = NewArticle {
            guid: None,
            ..article.clone()
        };
        assert_eq!(no_guid.dedup_key(), "https://example.com/a");

        let empty_guid = NewArticle {
            guid: Some(String::new()),
            ..article
        };
        assert_eq!(empty_guid.dedup_key(), "https://example.com/a");
    }
}
