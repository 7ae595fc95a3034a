use super::{FeedRenameRequest, ServiceError};
use crate::feed::{parse_opml, write_opml, FeedFetcher, IngestError, OpmlDocument};
use crate::storage::{Database, Feed};

/// Subscription management: add, rename, delete, OPML in and out.
#[derive(Clone)]
pub struct Subscriptions {
    db: Database,
    fetcher: FeedFetcher,
}

impl Subscriptions {
    pub fn new(db: Database, fetcher: FeedFetcher) -> Self {
        Self { db, fetcher }
    }

    /// Subscribe after a successful fetch and parse of `url`.
    pub async fn add_feed(&self, url: &str, user_id: i64) -> Result<i64, IngestError> {
        self.fetcher.add_feed(url, user_id).await
    }

    /// Remove an owned feed and all of its articles.
    pub async fn delete_feed(&self, feed_id: i64, user_id: i64) -> Result<(), ServiceError> {
        match self.db.delete_feed(feed_id, user_id).await? {
            Some(articles) => {
                tracing::info!(feed_id, user_id, articles, "Unsubscribed from feed");
                Ok(())
            }
            None => Err(ServiceError::NotFound),
        }
    }

    /// Apply `req` to the owned feed `feed_id`.
    ///
    /// `mark_all_read` marks every article of the feed read; a non-empty
    /// `name` renames it. The id in the path wins over `req.feed_id`.
    pub async fn update_feed(
        &self,
        feed_id: i64,
        user_id: i64,
        req: &FeedRenameRequest,
    ) -> Result<Feed, ServiceError> {
        let mut feed = self
            .db
            .get_feed_for_user(feed_id, user_id)
            .await?
            .ok_or(ServiceError::NotFound)?;

        if req.mark_all_read {
            let marked = self.db.mark_all_read_for_feed(feed.id).await?;
            tracing::debug!(feed_id, marked, "Marked feed read");
        }

        let name = req.name.trim();
        if !name.is_empty() {
            self.db.rename_feed(feed.id, name).await?;
            feed.name = name.to_string();
        }

        Ok(feed)
    }

    /// Create one feed per OPML subscription outline, in one transaction.
    ///
    /// Existing subscriptions are not consulted; importing the same list
    /// twice yields duplicates. Returns the number of feeds created.
    pub async fn import_opml(&self, bytes: &[u8], user_id: i64) -> Result<usize, ServiceError> {
        let doc = parse_opml(bytes)?;
        let feeds = doc.to_new_feeds();
        let inserted = self.db.insert_feeds(user_id, &feeds).await?;
        tracing::info!(user_id, inserted, "Imported OPML");
        Ok(inserted)
    }

    /// The user's subscriptions as an OPML 1.1 document.
    pub async fn export_opml(&self, user_id: i64) -> Result<Vec<u8>, ServiceError> {
        let feeds = self.db.get_feeds_for_user(user_id).await?;
        let bytes = write_opml(&OpmlDocument::from_feeds(&feeds))?;
        Ok(bytes)
    }
}
