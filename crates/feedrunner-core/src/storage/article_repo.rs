use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::retry::execute_with_retry;
use super::Database;
use crate::feed::{Article, NewArticle};
use crate::{Error, Result};

/// Repository for article storage and enrichment updates
pub struct ArticleRepository<'a> {
    db: &'a Database,
}

#[derive(FromRow)]
struct ArticleRow {
    id: String,
    feed_id: String,
    title: String,
    link: String,
    description: Option<String>,
    content: Option<String>,
    published: Option<DateTime<Utc>>,
    guid: Option<String>,
    author: Option<String>,
    category: Option<String>,
    crawled_content: Option<String>,
    crawled_html: Option<String>,
    crawled_title: Option<String>,
    is_crawled: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Self {
        Article {
            id: Uuid::parse_str(&row.id).unwrap_or_default(),
            feed_id: Uuid::parse_str(&row.feed_id).unwrap_or_default(),
            title: row.title,
            link: row.link,
            description: row.description,
            content: row.content,
            published: row.published,
            guid: row.guid,
            author: row.author,
            category: row.category,
            crawled_content: row.crawled_content,
            crawled_html: row.crawled_html,
            crawled_title: row.crawled_title,
            is_crawled: row.is_crawled != 0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const ARTICLE_COLUMNS: &str = "id, feed_id, title, link, description, content, published, \
                               guid, author, category, crawled_content, crawled_html, \
                               crawled_title, is_crawled, created_at, updated_at";

impl<'a> ArticleRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Store an article unless its dedup key already exists for the feed.
    /// Returns the stored (or pre-existing) article and whether it was created.
    pub async fn create_if_absent(&self, new_article: &NewArticle) -> Result<(Article, bool)> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let dedup_key = new_article.dedup_key().to_string();

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO articles
            (id, feed_id, dedup_key, title, link, description, content, published,
             guid, author, category, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(new_article.feed_id.to_string())
        .bind(&dedup_key)
        .bind(&new_article.title)
        .bind(&new_article.link)
        .bind(&new_article.description)
        .bind(&new_article.content)
        .bind(new_article.published)
        .bind(&new_article.guid)
        .bind(&new_article.author)
        .bind(&new_article.category)
        .bind(now)
        .bind(now)
        .execute(self.db.pool())
        .await?;

        let created = result.rows_affected() > 0;

        let article = self
            .find_by_dedup_key(new_article.feed_id, &dedup_key)
            .await?
            .ok_or_else(|| Error::ArticleNotFound(dedup_key))?;

        Ok((article, created))
    }

    /// Find an article by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Article>> {
        let row: Option<ArticleRow> = sqlx::query_as(&format!(
            "SELECT {} FROM articles WHERE id = ?",
            ARTICLE_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(Article::from))
    }

    /// Find an article by its per-feed dedup key
    pub async fn find_by_dedup_key(&self, feed_id: Uuid, dedup_key: &str) -> Result<Option<Article>> {
        let row: Option<ArticleRow> = sqlx::query_as(&format!(
            "SELECT {} FROM articles WHERE feed_id = ? AND dedup_key = ?",
            ARTICLE_COLUMNS
        ))
        .bind(feed_id.to_string())
        .bind(dedup_key)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(Article::from))
    }

    /// Get articles for a feed, newest first
    pub async fn list_by_feed(&self, feed_id: Uuid, limit: u32) -> Result<Vec<Article>> {
        let rows: Vec<ArticleRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM articles
            WHERE feed_id = ?
            ORDER BY published DESC, created_at DESC
            LIMIT ?
            "#,
            ARTICLE_COLUMNS
        ))
        .bind(feed_id.to_string())
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Article::from).collect())
    }

    /// Get recent articles across all feeds
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<Article>> {
        let rows: Vec<ArticleRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM articles
            ORDER BY published DESC, created_at DESC
            LIMIT ?
            "#,
            ARTICLE_COLUMNS
        ))
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Article::from).collect())
    }

    /// Get articles not yet enriched, newest first
    pub async fn list_uncrawled(&self, limit: u32) -> Result<Vec<Article>> {
        let rows: Vec<ArticleRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM articles
            WHERE is_crawled = 0
            ORDER BY created_at DESC
            LIMIT ?
            "#,
            ARTICLE_COLUMNS
        ))
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Article::from).collect())
    }

    /// Persist enrichment results and set the crawled flag in one statement
    pub async fn update_crawled(
        &self,
        id: Uuid,
        crawled_content: &str,
        crawled_html: &str,
        crawled_title: Option<&str>,
        summary: Option<&str>,
    ) -> Result<()> {
        let now = Utc::now();
        let id_str = id.to_string();

        execute_with_retry(|| async {
            sqlx::query(
                r#"
                UPDATE articles
                SET crawled_content = ?,
                    crawled_html = ?,
                    crawled_title = ?,
                    content = COALESCE(?, content),
                    is_crawled = 1,
                    updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(crawled_content)
            .bind(crawled_html)
            .bind(crawled_title)
            .bind(summary)
            .bind(now)
            .bind(&id_str)
            .execute(self.db.pool())
            .await?;
            Ok(())
        })
        .await?;

        Ok(())
    }

    /// Get total article count
    pub async fn count(&self) -> Result<u32> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM articles")
            .fetch_one(self.db.pool())
            .await?;

        Ok(count.0 as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::NewFeed;
    use crate::storage::FeedRepository;

    async fn setup() -> (Database, Uuid) {
        let db = Database::new_in_memory().await.unwrap();
        let feed = FeedRepository::new(&db)
            .create(&NewFeed {
                name: "Example".to_string(),
                url: "https://example.com/rss".to_string(),
                ..NewFeed::default()
            })
            .await
            .unwrap();
        (db, feed.id)
    }

    fn new_article(feed_id: Uuid, guid: Option<&str>, link: &str) -> NewArticle {
        NewArticle {
            feed_id,
            title: "Title".to_string(),
            link: link.to_string(),
            description: Some("desc".to_string()),
            content: None,
            published: None,
            guid: guid.map(|s| s.to_string()),
            author: None,
            category: None,
        }
    }

    #[tokio::test]
    async fn test_insert_is_idempotent_by_guid() {
        let (db, feed_id) = setup().await;
        let repo = ArticleRepository::new(&db);

        let (first, created) = repo
            .create_if_absent(&new_article(feed_id, Some("abc"), "https://example.com/1"))
            .await
            .unwrap();
        assert!(created);

        // Same guid, different link: still the same article
        let (second, created) = repo
            .create_if_absent(&new_article(feed_id, Some("abc"), "https://example.com/other"))
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(second.id, first.id);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_insert_dedups_by_link_without_guid() {
        let (db, feed_id) = setup().await;
        let repo = ArticleRepository::new(&db);

        let (_, created) = repo
            .create_if_absent(&new_article(feed_id, None, "https://example.com/1"))
            .await
            .unwrap();
        assert!(created);

        let (_, created) = repo
            .create_if_absent(&new_article(feed_id, None, "https://example.com/1"))
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_same_guid_different_feeds_both_stored() {
        let (db, feed_a) = setup().await;
        let feed_b = FeedRepository::new(&db)
            .create(&NewFeed {
                name: "Other".to_string(),
                url: "https://other.example.com/rss".to_string(),
                ..NewFeed::default()
            })
            .await
            .unwrap()
            .id;
        let repo = ArticleRepository::new(&db);

        repo.create_if_absent(&new_article(feed_a, Some("abc"), "https://example.com/1"))
            .await
            .unwrap();
        let (_, created) = repo
            .create_if_absent(&new_article(feed_b, Some("abc"), "https://other.example.com/1"))
            .await
            .unwrap();
        assert!(created);
        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_update_crawled_sets_all_fields() {
        let (db, feed_id) = setup().await;
        let repo = ArticleRepository::new(&db);

        let (article, _) = repo
            .create_if_absent(&new_article(feed_id, Some("abc"), "https://example.com/1"))
            .await
            .unwrap();
        assert!(!article.is_crawled);

        repo.update_crawled(article.id, "body text", "<p>body</p>", Some("Page title"), None)
            .await
            .unwrap();

        let article = repo.find_by_id(article.id).await.unwrap().unwrap();
        assert!(article.is_crawled);
        assert_eq!(article.crawled_content.as_deref(), Some("body text"));
        assert_eq!(article.crawled_html.as_deref(), Some("<p>body</p>"));
        assert_eq!(article.crawled_title.as_deref(), Some("Page title"));
        // No summary supplied, original content untouched
        assert!(article.content.is_none());
    }

    #[tokio::test]
    async fn test_list_uncrawled_excludes_crawled() {
        let (db, feed_id) = setup().await;
        let repo = ArticleRepository::new(&db);

        let (a, _) = repo
            .create_if_absent(&new_article(feed_id, Some("a"), "https://example.com/a"))
            .await
            .unwrap();
        repo.create_if_absent(&new_article(feed_id, Some("b"), "https://example.com/b"))
            .await
            .unwrap();

        repo.update_crawled(a.id, "text", "html", None, None).await.unwrap();

        let uncrawled = repo.list_uncrawled(10).await.unwrap();
        assert_eq!(uncrawled.len(), 1);
        assert_eq!(uncrawled[0].guid.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_cascade_delete_with_feed() {
        let (db, feed_id) = setup().await;
        let repo = ArticleRepository::new(&db);

        repo.create_if_absent(&new_article(feed_id, Some("a"), "https://example.com/a"))
            .await
            .unwrap();
        assert_eq!(repo.count().await.unwrap(), 1);

        FeedRepository::new(&db).delete(feed_id).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 0);
    }
}
