use super::schema::Database;
use super::types::{Article, DatabaseError, ParsedArticle};

const ARTICLE_COLUMNS: &str =
    "a.id, a.feed_id, a.guid, a.title, a.body, a.link, a.date, a.is_read, a.is_bookmark";

impl Database {
    // ========================================================================
    // Article Operations
    // ========================================================================

    /// Store freshly parsed articles for a feed, returns count of new rows.
    ///
    /// Articles already stored under the same `(feed_id, guid)` are left
    /// untouched, so read/bookmark state survives a refresh.
    pub async fn insert_articles(
        &self,
        feed_id: i64,
        articles: &[ParsedArticle],
    ) -> Result<usize, DatabaseError> {
        if articles.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0usize;

        for article in articles {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO articles (feed_id, guid, title, body, link, date)
                VALUES (?, ?, ?, ?, ?, ?)
            "#,
            )
            .bind(feed_id)
            .bind(&article.guid)
            .bind(&article.title)
            .bind(&article.body)
            .bind(&article.link)
            .bind(article.date)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// Find an article by id under a specific feed, only if `user_id` owns that feed
    pub async fn find_article_in_feed(
        &self,
        article_id: i64,
        feed_id: i64,
        user_id: i64,
    ) -> Result<Option<Article>, DatabaseError> {
        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles a \
             JOIN feeds f ON a.feed_id = f.id \
             WHERE a.id = ? AND a.feed_id = ? AND f.user_id = ?"
        );
        let article = sqlx::query_as::<_, Article>(&sql)
            .bind(article_id)
            .bind(feed_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(article)
    }

    /// Find an article by id through the ownership join on its feed
    pub async fn find_article_for_user(
        &self,
        article_id: i64,
        user_id: i64,
    ) -> Result<Option<Article>, DatabaseError> {
        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles a \
             JOIN feeds f ON a.feed_id = f.id \
             WHERE a.id = ? AND f.user_id = ?"
        );
        let article = sqlx::query_as::<_, Article>(&sql)
            .bind(article_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(article)
    }

    /// Set the read flag, even when it is already set
    pub async fn mark_article_read(&self, article_id: i64) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE articles SET is_read = 1 WHERE id = ?")
            .bind(article_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Overwrite both state flags of an article, returns true if the row exists
    pub async fn set_article_state(
        &self,
        article_id: i64,
        is_read: bool,
        is_bookmark: bool,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE articles SET is_read = ?, is_bookmark = ? WHERE id = ?")
            .bind(is_read)
            .bind(is_bookmark)
            .bind(article_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark read every other unread article of `feed_id` that shares `link`.
    ///
    /// Returns the number of rows changed. An empty link never matches.
    pub async fn mark_same_link_read(
        &self,
        feed_id: i64,
        link: &str,
        except_id: i64,
    ) -> Result<u64, DatabaseError> {
        if link.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            "UPDATE articles SET is_read = 1 WHERE feed_id = ? AND link = ? AND id != ? AND is_read = 0",
        )
        .bind(feed_id)
        .bind(link)
        .bind(except_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
