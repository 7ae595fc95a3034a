use std::future::Future;

use futures::stream::{self, StreamExt};
use serde::Serialize;

use super::ServiceError;
use crate::config::Config;
use crate::storage::{Database, Feed, FeedWithUnread};

/// A feed with its unread tally
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedSummary {
    pub feed: Feed,
    pub articles_count: usize,
    pub exist_unread: bool,
}

impl From<FeedWithUnread> for FeedSummary {
    fn from(f: FeedWithUnread) -> Self {
        let articles_count = f.unread.len();
        Self {
            feed: f.feed,
            articles_count,
            exist_unread: articles_count > 0,
        }
    }
}

/// Builds the sidebar listing of a user's feeds.
#[derive(Clone)]
pub struct FeedAggregator {
    db: Database,
    concurrency: usize,
}

impl FeedAggregator {
    pub fn new(db: Database, config: &Config) -> Self {
        Self {
            db,
            concurrency: config.aggregate_concurrency.max(1),
        }
    }

    /// Every feed of `user_id` in store order, with unread counts.
    pub async fn list_feeds(&self, user_id: i64) -> Result<Vec<FeedSummary>, ServiceError> {
        let feeds = self.db.get_feeds_with_unread_articles(user_id).await?;
        let summaries =
            summarize_concurrently(feeds, self.concurrency, |f| async move { FeedSummary::from(f) })
                .await;
        Ok(summaries)
    }
}

/// Run `summarize` over `feeds` with at most `limit` in flight.
///
/// Each task carries its input index and lands in that slot, so the output
/// order is the input order whatever the completion order.
async fn summarize_concurrently<F, Fut>(
    feeds: Vec<FeedWithUnread>,
    limit: usize,
    summarize: F,
) -> Vec<FeedSummary>
where
    F: Fn(FeedWithUnread) -> Fut,
    Fut: Future<Output = FeedSummary>,
{
    let mut slots: Vec<Option<FeedSummary>> = Vec::new();
    slots.resize_with(feeds.len(), || None);

    let mut completed = stream::iter(feeds.into_iter().enumerate())
        .map(|(index, feed)| {
            let task = summarize(feed);
            async move { (index, task.await) }
        })
        .buffer_unordered(limit.max(1));

    while let Some((index, summary)) = completed.next().await {
        slots[index] = Some(summary);
    }

    slots.into_iter().flatten().collect()
}
