use super::query::{ArticleFilter, ArticleOrder, ArticleQuery};
use super::schema::Database;
use super::types::{ArticleSummary, DatabaseError};

/// Maximum number of articles to return from a search (OOM protection)
const MAX_ARTICLES: i64 = 2000;

impl Database {
    // ========================================================================
    // Search Operations
    // ========================================================================

    /// Substring search over title and body.
    ///
    /// `filter.text` is matched literally and case-insensitively (ASCII);
    /// the remaining filter fields narrow the search as usual. Results are
    /// newest first and capped at 2000 rows, with no total count.
    /// PERF-003: Hard cap prevents OOM on very broad queries
    pub async fn search_articles(
        &self,
        filter: ArticleFilter,
    ) -> Result<Vec<ArticleSummary>, DatabaseError> {
        tracing::debug!(
            limit = MAX_ARTICLES,
            user_id = filter.user_id,
            feed_id = ?filter.feed_id,
            "search_articles with limit cap"
        );

        let query = ArticleQuery {
            filter,
            order: ArticleOrder::IdDesc,
            limit: MAX_ARTICLES,
            offset: 0,
        };
        self.find_articles(&query).await
    }
}
