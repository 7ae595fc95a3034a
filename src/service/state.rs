use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use super::{ArticleUpdateRequest, ServiceError};
use crate::storage::{Article, Database};

/// Mark read the other articles of `feed_id` sharing `link`, keeping `source_id` as is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeJob {
    pub feed_id: i64,
    pub link: String,
    pub source_id: i64,
}

/// Producer side of the background same-link cascade.
///
/// Jobs go through a bounded queue to a single worker. A full or closed
/// queue drops the job with a warning, and a failed job is logged and
/// dropped; nothing is reported back to the request that queued it.
#[derive(Clone)]
pub struct ReadCascade {
    tx: mpsc::Sender<CascadeJob>,
}

impl ReadCascade {
    /// Start the worker on the current runtime.
    pub fn spawn(db: Database, capacity: usize) -> (Self, JoinHandle<()>) {
        let (cascade, rx) = Self::bounded(capacity);
        let handle = tokio::spawn(run_worker(db, rx));
        (cascade, handle)
    }

    pub(crate) fn bounded(capacity: usize) -> (Self, mpsc::Receiver<CascadeJob>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queue `job` without waiting. Returns false when it was dropped.
    pub fn enqueue(&self, job: CascadeJob) -> bool {
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(TrySendError::Full(job)) => {
                tracing::warn!(
                    feed_id = job.feed_id,
                    article_id = job.source_id,
                    "Read cascade queue full, dropping job"
                );
                false
            }
            Err(TrySendError::Closed(job)) => {
                tracing::warn!(
                    feed_id = job.feed_id,
                    article_id = job.source_id,
                    "Read cascade worker stopped, dropping job"
                );
                false
            }
        }
    }
}

async fn run_worker(db: Database, mut rx: mpsc::Receiver<CascadeJob>) {
    while let Some(job) = rx.recv().await {
        match db.mark_same_link_read(job.feed_id, &job.link, job.source_id).await {
            Ok(marked) => {
                tracing::debug!(feed_id = job.feed_id, article_id = job.source_id, marked, "Read cascade applied");
            }
            Err(e) => {
                tracing::warn!(
                    feed_id = job.feed_id,
                    article_id = job.source_id,
                    error = %e,
                    "Read cascade failed"
                );
            }
        }
    }
    tracing::debug!("Read cascade worker exiting");
}

/// Read and bookmark transitions on single articles.
#[derive(Clone)]
pub struct ArticleStateManager {
    db: Database,
    cascade: ReadCascade,
}

impl ArticleStateManager {
    pub fn new(db: Database, cascade: ReadCascade) -> Self {
        Self { db, cascade }
    }

    /// Open an article: it must live under `feed_id`, owned by `user_id`.
    ///
    /// Marks it read (even if it already was) and, with `mark_same_read`
    /// enabled, queues the same-link cascade.
    pub async fn get_article(
        &self,
        article_id: i64,
        feed_id: i64,
        user_id: i64,
    ) -> Result<Article, ServiceError> {
        let mut article = self
            .db
            .find_article_in_feed(article_id, feed_id, user_id)
            .await?
            .ok_or(ServiceError::NotFound)?;

        let settings = self.db.get_settings(user_id).await?;

        self.db.mark_article_read(article.id).await?;
        article.is_read = true;

        if settings.mark_same_read && !article.link.is_empty() {
            self.cascade.enqueue(CascadeJob {
                feed_id: article.feed_id,
                link: article.link.clone(),
                source_id: article.id,
            });
        }

        Ok(article)
    }

    /// Overwrite both flags of an article owned by `user_id`.
    ///
    /// `path_id` must equal `req.article_id`; a mismatch is rejected before
    /// touching storage.
    pub async fn update_article(
        &self,
        user_id: i64,
        path_id: i64,
        req: ArticleUpdateRequest,
    ) -> Result<Article, ServiceError> {
        if path_id != req.article_id {
            return Err(ServiceError::InvalidInput(format!(
                "article id {} in path does not match {} in body",
                path_id, req.article_id
            )));
        }

        let mut article = self
            .db
            .find_article_for_user(req.article_id, user_id)
            .await?
            .ok_or(ServiceError::NotFound)?;

        self.db
            .set_article_state(article.id, req.is_read, req.is_bookmark)
            .await?;
        article.is_read = req.is_read;
        article.is_bookmark = req.is_bookmark;
        Ok(article)
    }
}
