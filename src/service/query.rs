use super::{ArticlesPage, ServiceError};
use crate::config::Config;
use crate::storage::{ArticleFilter, ArticleQuery, ArticleSummary, Database};
use crate::util::MAX_SEARCH_QUERY_LENGTH;

/// Paginated listings and search, shaped by the caller's settings.
#[derive(Clone)]
pub struct ArticleQueryEngine {
    db: Database,
    page_size: i64,
}

impl ArticleQueryEngine {
    pub fn new(db: Database, config: &Config) -> Self {
        Self {
            db,
            page_size: config.page_size.max(1),
        }
    }

    /// Page `page` (1-based) of a feed's articles, newest first.
    ///
    /// Honors the user's `unread_only` setting. Feeds the user does not own
    /// produce an empty page with a count of 0.
    pub async fn get_articles(
        &self,
        feed_id: i64,
        user_id: i64,
        page: i64,
    ) -> Result<ArticlesPage, ServiceError> {
        check_page(page)?;
        let settings = self.db.get_settings(user_id).await?;

        let filter = ArticleFilter {
            feed_id: Some(feed_id),
            unread_only: settings.unread_only,
            ..ArticleFilter::for_user(user_id)
        };
        self.page_of(filter, page).await
    }

    /// Page `page` of the user's bookmarks across all feeds.
    pub async fn get_bookmarks(&self, page: i64, user_id: i64) -> Result<ArticlesPage, ServiceError> {
        check_page(page)?;
        let filter = ArticleFilter {
            bookmarked_only: true,
            ..ArticleFilter::for_user(user_id)
        };
        self.page_of(filter, page).await
    }

    /// Literal, case-insensitive substring search over titles and bodies.
    ///
    /// `feed_id` of `None` or `Some(0)` searches every feed of the user.
    pub async fn search(
        &self,
        search_string: &str,
        is_bookmark: bool,
        feed_id: Option<i64>,
        user_id: i64,
    ) -> Result<Vec<ArticleSummary>, ServiceError> {
        if search_string.len() > MAX_SEARCH_QUERY_LENGTH {
            return Err(ServiceError::InvalidInput(format!(
                "search string longer than {} bytes",
                MAX_SEARCH_QUERY_LENGTH
            )));
        }

        let filter = ArticleFilter {
            feed_id: feed_id.filter(|&id| id != 0),
            bookmarked_only: is_bookmark,
            text: Some(search_string.to_string()),
            ..ArticleFilter::for_user(user_id)
        };
        Ok(self.db.search_articles(filter).await?)
    }

    async fn page_of(&self, filter: ArticleFilter, page: i64) -> Result<ArticlesPage, ServiceError> {
        let query = ArticleQuery::page(filter, self.page_size, page)
            .ok_or_else(|| ServiceError::InvalidInput(format!("page {} out of range", page)))?;
        let (articles, count) = self.db.find_page(&query).await?;
        Ok(ArticlesPage { articles, count })
    }
}

fn check_page(page: i64) -> Result<(), ServiceError> {
    if page < 1 {
        return Err(ServiceError::InvalidInput("page must be 1 or greater".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ParsedArticle, Settings};

    fn article(i: usize, title: &str) -> ParsedArticle {
        ParsedArticle {
            guid: format!("guid-{}", i),
            title: title.to_string(),
            link: format!("https://example.com/{}", i),
            date: 1704067200 + i as i64,
            body: String::new(),
        }
    }

    async fn engine_with_feed(count: usize) -> (ArticleQueryEngine, Database, i64) {
        let db = Database::open(":memory:").await.unwrap();
        let feed_id = db.insert_feed(42, "Feed", "https://example.com/rss").await.unwrap();
        let articles: Vec<_> = (0..count).map(|i| article(i, &format!("Article {}", i))).collect();
        db.insert_articles(feed_id, &articles).await.unwrap();
        (ArticleQueryEngine::new(db.clone(), &Config::default()), db, feed_id)
    }

    #[tokio::test]
    async fn test_page_two_of_fifty() {
        let (engine, _db, feed_id) = engine_with_feed(50).await;

        let page = engine.get_articles(feed_id, 42, 2).await.unwrap();
        assert_eq!(page.count, 50);
        assert_eq!(page.articles.len(), 20);
        // ranks 21..=40 newest first: guid-29 down to guid-10
        assert_eq!(page.articles[0].title, "Article 29");
        assert_eq!(page.articles[19].title, "Article 10");

        let last = engine.get_articles(feed_id, 42, 3).await.unwrap();
        assert_eq!(last.articles.len(), 10);
        let past_end = engine.get_articles(feed_id, 42, 4).await.unwrap();
        assert!(past_end.articles.is_empty());
        assert_eq!(past_end.count, 50);
    }

    #[tokio::test]
    async fn test_invalid_page_rejected() {
        let (engine, _db, feed_id) = engine_with_feed(1).await;
        for page in [0, -1] {
            assert!(matches!(
                engine.get_articles(feed_id, 42, page).await,
                Err(ServiceError::InvalidInput(_))
            ));
            assert!(matches!(
                engine.get_bookmarks(page, 42).await,
                Err(ServiceError::InvalidInput(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_unread_only_setting_filters_page_and_count() {
        let (engine, db, feed_id) = engine_with_feed(5).await;
        let all = engine.get_articles(feed_id, 42, 1).await.unwrap();
        db.mark_article_read(all.articles[0].id).await.unwrap();

        db.replace_settings(&Settings {
            unread_only: true,
            ..Settings::defaults_for(42)
        })
        .await
        .unwrap();

        let page = engine.get_articles(feed_id, 42, 1).await.unwrap();
        assert_eq!(page.count, 4);
        assert_eq!(page.articles.len(), 4);
        assert!(page.articles.iter().all(|a| !a.is_read));
    }

    #[tokio::test]
    async fn test_foreign_feed_is_empty() {
        let (engine, _db, feed_id) = engine_with_feed(3).await;
        let page = engine.get_articles(feed_id, 7, 1).await.unwrap();
        assert!(page.articles.is_empty());
        assert_eq!(page.count, 0);
    }

    #[tokio::test]
    async fn test_bookmarks_across_feeds() {
        let (engine, db, feed_id) = engine_with_feed(3).await;
        let other = db.insert_feed(42, "Other", "https://other.example/rss").await.unwrap();
        db.insert_articles(other, &[article(9, "Elsewhere")]).await.unwrap();

        let all = engine.search("", false, None, 42).await.unwrap();
        assert_eq!(all.len(), 4);
        for a in all.iter().filter(|a| a.feed_id == other || a.title == "Article 0") {
            db.set_article_state(a.id, false, true).await.unwrap();
        }

        let page = engine.get_bookmarks(1, 42).await.unwrap();
        assert_eq!(page.count, 2);
        assert!(page.articles.iter().all(|a| a.is_bookmark));
        assert!(page.articles.iter().any(|a| a.feed_id == feed_id));
        assert!(page.articles.iter().any(|a| a.feed_id == other));
    }

    #[tokio::test]
    async fn test_search_feed_zero_means_all() {
        let (engine, db, feed_id) = engine_with_feed(2).await;
        let other = db.insert_feed(42, "Other", "https://other.example/rss").await.unwrap();
        db.insert_articles(other, &[article(9, "Article elsewhere")]).await.unwrap();

        assert_eq!(engine.search("article", false, Some(0), 42).await.unwrap().len(), 3);
        assert_eq!(engine.search("ARTICLE", false, Some(feed_id), 42).await.unwrap().len(), 2);
        assert!(engine.search("article", false, None, 7).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_string_length_capped() {
        let (engine, _db, _) = engine_with_feed(0).await;
        let long = "x".repeat(MAX_SEARCH_QUERY_LENGTH + 1);
        assert!(matches!(
            engine.search(&long, false, None, 42).await,
            Err(ServiceError::InvalidInput(_))
        ));
    }
}
