use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds a lock on the database file
    #[error("The database is locked by another process. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5): database is locked
        // SQLITE_LOCKED (6): database table is locked
        // SQLITE_CANTOPEN (14): unable to open database file
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }
}

// ============================================================================
// Input Types
// ============================================================================

/// A subscription to be created, as entered by a user or read from OPML
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFeed {
    pub name: String,
    pub url: String,
}

/// Represents a parsed article from a feed, ready to be stored
#[derive(Debug, Clone)]
pub struct ParsedArticle {
    pub guid: String,
    pub title: String,
    pub link: String,
    pub date: i64,
    pub body: String,
}

// ============================================================================
// Data Structures
// ============================================================================

/// Feed row owned by a single user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Feed {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub user_id: i64,
}

/// Full article as returned by the single-article endpoints.
///
/// `guid` only drives ingestion deduplication and is never serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Article {
    pub id: i64,
    pub feed_id: i64,
    #[serde(skip)]
    pub guid: String,
    pub title: String,
    pub body: String,
    pub link: String,
    pub date: i64,
    pub is_read: bool,
    pub is_bookmark: bool,
}

/// Listing projection of an article (no body, no date)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct ArticleSummary {
    pub id: i64,
    pub title: String,
    pub is_bookmark: bool,
    pub is_read: bool,
    pub link: String,
    pub feed_id: i64,
}

/// A feed together with its currently unread articles
#[derive(Debug, Clone)]
pub struct FeedWithUnread {
    pub feed: Feed,
    pub unread: Vec<ArticleSummary>,
}

/// Per-user reading preferences.
///
/// Only `unread_only` and `mark_same_read` change query behavior here; the
/// button flags are stored for the client UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, sqlx::FromRow)]
pub struct Settings {
    pub user_id: i64,
    pub unread_only: bool,
    pub mark_same_read: bool,
    pub rss_enabled: bool,
    pub show_preview_button: bool,
    pub show_tab_button: bool,
    pub show_read_button: bool,
    pub show_link_button: bool,
    pub show_bookmark_button: bool,
}

impl Settings {
    /// Defaults used when a user has no settings row yet
    pub fn defaults_for(user_id: i64) -> Self {
        Self {
            user_id,
            ..Self::default()
        }
    }
}
