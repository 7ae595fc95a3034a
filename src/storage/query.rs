//! Article query specifications.
//!
//! Listing endpoints describe *what* they want as an [`ArticleQuery`] value
//! instead of chaining builder calls. The store renders the SQL `WHERE` clause
//! from the [`ArticleFilter`] in exactly one place, and [`Database::find_page`]
//! reuses that rendering for both the data query and its count query, so the
//! two can never disagree about which rows exist.

use sqlx::{QueryBuilder, Sqlite};

use super::schema::Database;
use super::types::{ArticleSummary, DatabaseError};

const SUMMARY_COLUMNS: &str = "a.id, a.title, a.is_bookmark, a.is_read, a.link, a.feed_id";

/// Predicate over articles. Always scoped to the feeds of one user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleFilter {
    /// Owner of the feeds the articles belong to
    pub user_id: i64,
    /// Restrict to a single feed
    pub feed_id: Option<i64>,
    /// Only `is_read = 0`
    pub unread_only: bool,
    /// Only `is_bookmark = 1`
    pub bookmarked_only: bool,
    /// Literal substring that must occur in the title or the body
    pub text: Option<String>,
}

impl ArticleFilter {
    pub fn for_user(user_id: i64) -> Self {
        Self {
            user_id,
            ..Self::default()
        }
    }
}

/// Result ordering. Ids are monotonic, so id order is insertion order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArticleOrder {
    #[default]
    IdDesc,
}

/// Filter + ordering + window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleQuery {
    pub filter: ArticleFilter,
    pub order: ArticleOrder,
    pub limit: i64,
    pub offset: i64,
}

impl ArticleQuery {
    /// Window for a 1-based page number.
    ///
    /// Returns `None` for `page < 1` or a non-positive page size, so a negative
    /// offset can never reach the database.
    pub fn page(filter: ArticleFilter, page_size: i64, page: i64) -> Option<Self> {
        if page < 1 || page_size < 1 {
            return None;
        }
        let offset = page_size.checked_mul(page - 1)?;
        Some(Self {
            filter,
            order: ArticleOrder::IdDesc,
            limit: page_size,
            offset,
        })
    }
}

/// Escape `%`, `_` and the escape character itself for `LIKE ... ESCAPE '\'`
pub(crate) fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Append `FROM ... WHERE ...` for `filter`
fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &ArticleFilter) {
    builder.push(" FROM articles a JOIN feeds f ON a.feed_id = f.id WHERE f.user_id = ");
    builder.push_bind(filter.user_id);

    if let Some(feed_id) = filter.feed_id {
        builder.push(" AND a.feed_id = ");
        builder.push_bind(feed_id);
    }
    if filter.unread_only {
        builder.push(" AND a.is_read = 0");
    }
    if filter.bookmarked_only {
        builder.push(" AND a.is_bookmark = 1");
    }
    if let Some(text) = &filter.text {
        let pattern = format!("%{}%", escape_like(text));
        builder.push(" AND (a.title LIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" ESCAPE '\\' OR a.body LIKE ");
        builder.push_bind(pattern);
        builder.push(" ESCAPE '\\')");
    }
}

fn push_window(builder: &mut QueryBuilder<'_, Sqlite>, query: &ArticleQuery) {
    match query.order {
        ArticleOrder::IdDesc => builder.push(" ORDER BY a.id DESC"),
    };
    builder.push(" LIMIT ");
    builder.push_bind(query.limit);
    builder.push(" OFFSET ");
    builder.push_bind(query.offset);
}

impl Database {
    /// Rows matching `query`, in its order and window
    pub async fn find_articles(&self, query: &ArticleQuery) -> Result<Vec<ArticleSummary>, DatabaseError> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT ");
        builder.push(SUMMARY_COLUMNS);
        push_filter(&mut builder, &query.filter);
        push_window(&mut builder, query);

        let rows = builder.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows)
    }

    /// Number of rows matching `filter`, ignoring any window
    pub async fn count_articles(&self, filter: &ArticleFilter) -> Result<i64, DatabaseError> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*)");
        push_filter(&mut builder, filter);

        let (count,): (i64,) = builder.build_query_as().fetch_one(&self.pool).await?;
        Ok(count)
    }

    /// One page of results plus the total match count.
    ///
    /// Both statements are rendered from `query.filter` and run inside one
    /// transaction so they observe the same snapshot.
    pub async fn find_page(
        &self,
        query: &ArticleQuery,
    ) -> Result<(Vec<ArticleSummary>, i64), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let mut data: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT ");
        data.push(SUMMARY_COLUMNS);
        push_filter(&mut data, &query.filter);
        push_window(&mut data, query);
        let rows: Vec<ArticleSummary> = data.build_query_as().fetch_all(&mut *tx).await?;

        let mut count: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*)");
        push_filter(&mut count, &query.filter);
        let (total,): (i64,) = count.build_query_as().fetch_one(&mut *tx).await?;

        tx.commit().await?;
        Ok((rows, total))
    }
}
