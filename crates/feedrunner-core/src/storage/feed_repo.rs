use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::retry::execute_with_retry;
use super::Database;
use crate::feed::{Feed, FeedPatch, NewFeed};
use crate::{Error, Result};

/// Repository for feed CRUD operations
pub struct FeedRepository<'a> {
    db: &'a Database,
}

#[derive(FromRow)]
struct FeedRow {
    id: String,
    name: String,
    url: String,
    category: String,
    active: i32,
    fetch_interval: i64,
    last_fetched: Option<DateTime<Utc>>,
    last_error: Option<String>,
    error_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<FeedRow> for Feed {
    fn from(row: FeedRow) -> Self {
        Feed {
            id: Uuid::parse_str(&row.id).unwrap_or_default(),
            name: row.name,
            url: row.url,
            category: row.category,
            active: row.active != 0,
            fetch_interval: row.fetch_interval,
            last_fetched: row.last_fetched,
            last_error: row.last_error,
            error_count: row.error_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const FEED_COLUMNS: &str = "id, name, url, category, active, fetch_interval, \
                            last_fetched, last_error, error_count, created_at, updated_at";

impl<'a> FeedRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Create a new feed; a URL collision is reported as AlreadyExists
    pub async fn create(&self, new_feed: &NewFeed) -> Result<Feed> {
        if self.find_by_url(&new_feed.url).await?.is_some() {
            return Err(Error::AlreadyExists(format!("Feed '{}'", new_feed.url)));
        }

        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO feeds (id, name, url, category, active, fetch_interval, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&new_feed.name)
        .bind(&new_feed.url)
        .bind(&new_feed.category)
        .bind(new_feed.active as i32)
        .bind(new_feed.fetch_interval)
        .bind(now)
        .bind(now)
        .execute(self.db.pool())
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| Error::FeedNotFound(id.to_string()))
    }

    /// Find a feed by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Feed>> {
        let row: Option<FeedRow> =
            sqlx::query_as(&format!("SELECT {} FROM feeds WHERE id = ?", FEED_COLUMNS))
                .bind(id.to_string())
                .fetch_optional(self.db.pool())
                .await?;

        Ok(row.map(Feed::from))
    }

    /// Find a feed by URL
    pub async fn find_by_url(&self, url: &str) -> Result<Option<Feed>> {
        let row: Option<FeedRow> =
            sqlx::query_as(&format!("SELECT {} FROM feeds WHERE url = ?", FEED_COLUMNS))
                .bind(url)
                .fetch_optional(self.db.pool())
                .await?;

        Ok(row.map(Feed::from))
    }

    /// Get all feeds
    pub async fn list_all(&self) -> Result<Vec<Feed>> {
        let rows: Vec<FeedRow> =
            sqlx::query_as(&format!("SELECT {} FROM feeds ORDER BY name ASC", FEED_COLUMNS))
                .fetch_all(self.db.pool())
                .await?;

        Ok(rows.into_iter().map(Feed::from).collect())
    }

    /// Get all active feeds
    pub async fn list_active(&self) -> Result<Vec<Feed>> {
        let rows: Vec<FeedRow> = sqlx::query_as(&format!(
            "SELECT {} FROM feeds WHERE active = 1 ORDER BY name ASC",
            FEED_COLUMNS
        ))
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Feed::from).collect())
    }

    /// Get active feeds whose fetch interval has elapsed (or never fetched)
    pub async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<Feed>> {
        let active = self.list_active().await?;
        Ok(active.into_iter().filter(|f| f.is_due(now)).collect())
    }

    /// Record the outcome of a fetch attempt, exactly once per attempt.
    /// Success clears the error fields; failure stores the error text and
    /// increments the consecutive error count.
    pub async fn update_fetch_status(
        &self,
        id: Uuid,
        last_fetched: DateTime<Utc>,
        error: Option<&str>,
    ) -> Result<()> {
        let now = Utc::now();
        let id_str = id.to_string();

        execute_with_retry(|| async {
            match error {
                Some(message) => {
                    sqlx::query(
                        r#"
                        UPDATE feeds
                        SET last_fetched = ?,
                            last_error = ?,
                            error_count = error_count + 1,
                            updated_at = ?
                        WHERE id = ?
                        "#,
                    )
                    .bind(last_fetched)
                    .bind(message)
                    .bind(now)
                    .bind(&id_str)
                    .execute(self.db.pool())
                    .await?;
                }
                None => {
                    sqlx::query(
                        r#"
                        UPDATE feeds
                        SET last_fetched = ?,
                            last_error = NULL,
                            error_count = 0,
                            updated_at = ?
                        WHERE id = ?
                        "#,
                    )
                    .bind(last_fetched)
                    .bind(now)
                    .bind(&id_str)
                    .execute(self.db.pool())
                    .await?;
                }
            }
            Ok(())
        })
        .await?;

        Ok(())
    }

    /// Apply a partial update to a feed
    pub async fn update(&self, id: Uuid, patch: &FeedPatch) -> Result<Feed> {
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE feeds
            SET name = COALESCE(?, name),
                url = COALESCE(?, url),
                category = COALESCE(?, category),
                active = COALESCE(?, active),
                fetch_interval = COALESCE(?, fetch_interval),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&patch.name)
        .bind(&patch.url)
        .bind(&patch.category)
        .bind(patch.active.map(|a| a as i32))
        .bind(patch.fetch_interval)
        .bind(now)
        .bind(id.to_string())
        .execute(self.db.pool())
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| Error::FeedNotFound(id.to_string()))
    }

    /// Delete a feed and all its articles
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM feeds WHERE id = ?")
            .bind(id.to_string())
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Get total feed count
    pub async fn count(&self) -> Result<u32> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM feeds")
            .fetch_one(self.db.pool())
            .await?;

        Ok(count.0 as u32)
    }
}
