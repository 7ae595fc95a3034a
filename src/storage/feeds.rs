use sqlx::QueryBuilder;
use std::collections::HashMap;

use super::schema::Database;
use super::types::{ArticleSummary, DatabaseError, Feed, FeedWithUnread, NewFeed};

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Insert a single subscription, returning the new feed id
    pub async fn insert_feed(&self, user_id: i64, name: &str, url: &str) -> Result<i64, DatabaseError> {
        let result = sqlx::query("INSERT INTO feeds (name, url, user_id) VALUES (?, ?, ?)")
            .bind(name)
            .bind(url)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Insert many subscriptions for one user in a single transaction.
    ///
    /// No existence check is made: a URL the user already follows is inserted
    /// again. Either every row is written or none is.
    /// PERF-001: Batch INSERT in chunks of 100
    pub async fn insert_feeds(&self, user_id: i64, feeds: &[NewFeed]) -> Result<usize, DatabaseError> {
        if feeds.is_empty() {
            return Ok(0);
        }

        const BATCH_SIZE: usize = 100;
        let mut tx = self.pool.begin().await?;

        for chunk in feeds.chunks(BATCH_SIZE) {
            let mut builder: QueryBuilder<sqlx::Sqlite> =
                QueryBuilder::new("INSERT INTO feeds (name, url, user_id) ");

            builder.push_values(chunk, |mut b, feed| {
                b.push_bind(&feed.name)
                    .push_bind(&feed.url)
                    .push_bind(user_id);
            });

            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(feeds.len())
    }

    /// All feeds owned by `user_id`, in insertion (id) order
    pub async fn get_feeds_for_user(&self, user_id: i64) -> Result<Vec<Feed>, DatabaseError> {
        let feeds = sqlx::query_as::<_, Feed>(
            "SELECT id, name, url, user_id FROM feeds WHERE user_id = ? ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }

    /// Every feed of every user (background refresh)
    pub async fn get_all_feeds(&self) -> Result<Vec<Feed>, DatabaseError> {
        let feeds = sqlx::query_as::<_, Feed>("SELECT id, name, url, user_id FROM feeds ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(feeds)
    }

    /// Look up a feed only if `user_id` owns it
    pub async fn get_feed_for_user(
        &self,
        feed_id: i64,
        user_id: i64,
    ) -> Result<Option<Feed>, DatabaseError> {
        let feed = sqlx::query_as::<_, Feed>(
            "SELECT id, name, url, user_id FROM feeds WHERE id = ? AND user_id = ?",
        )
        .bind(feed_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(feed)
    }

    /// Load the user's feeds, each preloaded with its unread articles only.
    ///
    /// Feed order matches [`Database::get_feeds_for_user`]. Articles come from
    /// one query joined on feed ownership, so the number of feeds never
    /// grows the statement.
    pub async fn get_feeds_with_unread_articles(
        &self,
        user_id: i64,
    ) -> Result<Vec<FeedWithUnread>, DatabaseError> {
        let feeds = self.get_feeds_for_user(user_id).await?;
        if feeds.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<ArticleSummary> = sqlx::query_as(
            "SELECT a.id, a.title, a.is_bookmark, a.is_read, a.link, a.feed_id FROM articles a \
             JOIN feeds f ON f.id = a.feed_id \
             WHERE f.user_id = ? AND a.is_read = 0 ORDER BY a.id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut by_feed: HashMap<i64, Vec<ArticleSummary>> = HashMap::new();
        for row in rows {
            by_feed.entry(row.feed_id).or_default().push(row);
        }

        Ok(feeds
            .into_iter()
            .map(|feed| {
                let unread = by_feed.remove(&feed.id).unwrap_or_default();
                FeedWithUnread { feed, unread }
            })
            .collect())
    }

    /// Rename a feed, returns true if a row was updated
    pub async fn rename_feed(&self, feed_id: i64, name: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE feeds SET name = ? WHERE id = ?")
            .bind(name)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark all articles as read for a specific feed, returns count of articles marked
    ///
    /// Uses `WHERE is_read = 0` so repeated calls do not rewrite rows.
    pub async fn mark_all_read_for_feed(&self, feed_id: i64) -> Result<u64, DatabaseError> {
        let result =
            sqlx::query("UPDATE articles SET is_read = 1 WHERE feed_id = ? AND is_read = 0")
                .bind(feed_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    /// Delete a feed owned by `user_id` together with its articles.
    ///
    /// Both deletes run in one transaction. Returns `None` when the user does
    /// not own the feed, otherwise the number of articles removed.
    pub async fn delete_feed(&self, feed_id: i64, user_id: i64) -> Result<Option<u64>, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let owned: Option<(i64,)> = sqlx::query_as("SELECT id FROM feeds WHERE id = ? AND user_id = ?")
            .bind(feed_id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        if owned.is_none() {
            return Ok(None);
        }

        let articles = sqlx::query("DELETE FROM articles WHERE feed_id = ?")
            .bind(feed_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM feeds WHERE id = ?")
            .bind(feed_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!(feed_id, articles = articles.rows_affected(), "Deleted feed");
        Ok(Some(articles.rows_affected()))
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, NewFeed, ParsedArticle};

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    fn test_article(guid: &str) -> ParsedArticle {
        ParsedArticle {
            guid: guid.to_string(),
            title: format!("Article {}", guid),
            link: format!("https://example.com/{}", guid),
            date: 1704067200,
            body: "Body".to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_feed_scoped_to_user() {
        let db = test_db().await;
        db.insert_feed(1, "Mine", "https://a.example.com/rss").await.unwrap();
        db.insert_feed(2, "Theirs", "https://b.example.com/rss").await.unwrap();

        let feeds = db.get_feeds_for_user(1).await.unwrap();
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].name, "Mine");
        assert_eq!(feeds[0].user_id, 1);
    }

    #[tokio::test]
    async fn test_insert_feeds_allows_duplicate_urls() {
        let db = test_db().await;
        let feed = NewFeed {
            name: "Dup".to_string(),
            url: "https://dup.example.com/rss".to_string(),
        };
        db.insert_feeds(7, &[feed.clone(), feed]).await.unwrap();

        let feeds = db.get_feeds_for_user(7).await.unwrap();
        assert_eq!(feeds.len(), 2);
        assert_ne!(feeds[0].id, feeds[1].id);
    }

    #[tokio::test]
    async fn test_insert_feeds_more_than_one_batch() {
        let db = test_db().await;
        let feeds: Vec<_> = (0..250)
            .map(|i| NewFeed {
                name: format!("Feed {}", i),
                url: format!("https://feed{}.example.com/rss", i),
            })
            .collect();

        let inserted = db.insert_feeds(1, &feeds).await.unwrap();
        assert_eq!(inserted, 250);
        assert_eq!(db.get_feeds_for_user(1).await.unwrap().len(), 250);
    }

    #[tokio::test]
    async fn test_unread_preload_excludes_read_articles() {
        let db = test_db().await;
        let feed_id = db.insert_feed(1, "Feed", "https://example.com/rss").await.unwrap();
        db.insert_articles(feed_id, &[test_article("1"), test_article("2")])
            .await
            .unwrap();
        let before = db.get_feeds_with_unread_articles(1).await.unwrap();
        assert_eq!(before[0].unread.len(), 2);
        db.mark_article_read(before[0].unread[0].id).await.unwrap();

        let feeds = db.get_feeds_with_unread_articles(1).await.unwrap();
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].unread.len(), 1);
        assert!(feeds[0].unread.iter().all(|a| !a.is_read));
    }

    #[tokio::test]
    async fn test_unread_preload_beyond_sqlite_variable_limit() {
        let db = test_db().await;
        let feeds: Vec<_> = (0..33_000)
            .map(|i| NewFeed {
                name: format!("Feed {}", i),
                url: format!("https://feed{}.example.com/rss", i),
            })
            .collect();
        db.insert_feeds(1, &feeds).await.unwrap();
        let last = db.get_feeds_for_user(1).await.unwrap().last().unwrap().id;
        db.insert_articles(last, &[test_article("1")]).await.unwrap();

        let other = db.insert_feed(2, "Other", "https://other.example.com/rss").await.unwrap();
        db.insert_articles(other, &[test_article("2")]).await.unwrap();

        let loaded = db.get_feeds_with_unread_articles(1).await.unwrap();
        assert_eq!(loaded.len(), 33_000);
        assert_eq!(loaded.iter().map(|f| f.unread.len()).sum::<usize>(), 1);
        assert_eq!(loaded.last().unwrap().unread.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_feed_removes_articles() {
        let db = test_db().await;
        let feed_id = db.insert_feed(1, "Feed", "https://example.com/rss").await.unwrap();
        db.insert_articles(feed_id, &[test_article("1"), test_article("2"), test_article("3")])
            .await
            .unwrap();

        let removed = db.delete_feed(feed_id, 1).await.unwrap();
        assert_eq!(removed, Some(3));
        assert!(db.get_feeds_for_user(1).await.unwrap().is_empty());

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM articles")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_delete_feed_of_other_user_is_refused() {
        let db = test_db().await;
        let feed_id = db.insert_feed(1, "Feed", "https://example.com/rss").await.unwrap();

        let removed = db.delete_feed(feed_id, 2).await.unwrap();
        assert_eq!(removed, None);
        assert_eq!(db.get_feeds_for_user(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mark_all_read_for_feed_idempotent() {
        let db = test_db().await;
        let feed_id = db.insert_feed(1, "Feed", "https://example.com/rss").await.unwrap();
        db.insert_articles(feed_id, &[test_article("1"), test_article("2")])
            .await
            .unwrap();

        assert_eq!(db.mark_all_read_for_feed(feed_id).await.unwrap(), 2);
        assert_eq!(db.mark_all_read_for_feed(feed_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rename_feed() {
        let db = test_db().await;
        let feed_id = db.insert_feed(1, "Old", "https://example.com/rss").await.unwrap();

        assert!(db.rename_feed(feed_id, "New").await.unwrap());
        let feed = db.get_feed_for_user(feed_id, 1).await.unwrap().unwrap();
        assert_eq!(feed.name, "New");
    }
}
