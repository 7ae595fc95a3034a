//! Request-level operations over the article store.
//!
//! Each service owns a cloned [`Database`](crate::storage::Database) handle
//! and the slice of [`Config`](crate::config::Config) it needs; none of them
//! holds mutable state of its own.

mod aggregator;
mod query;
mod state;
mod subscriptions;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::feed::OpmlError;
use crate::storage::{ArticleSummary, DatabaseError};

pub use aggregator::{FeedAggregator, FeedSummary};
pub use query::ArticleQueryEngine;
pub use state::{ArticleStateManager, CascadeJob, ReadCascade};
pub use subscriptions::Subscriptions;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found")]
    NotFound,

    #[error("Parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Storage(#[from] DatabaseError),
}

impl From<OpmlError> for ServiceError {
    fn from(e: OpmlError) -> Self {
        ServiceError::Parse(e.to_string())
    }
}

/// One page of article summaries plus the total number of matches
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticlesPage {
    pub articles: Vec<ArticleSummary>,
    pub count: i64,
}

/// Body of `PUT /rss/{id}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FeedRenameRequest {
    pub feed_id: i64,
    pub name: String,
    #[serde(alias = "is_read_all")]
    pub mark_all_read: bool,
}

/// Body of `PUT /rss/{feed_id}/articles/{id}`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ArticleUpdateRequest {
    pub article_id: i64,
    pub is_read: bool,
    pub is_bookmark: bool,
}
