mod articles;
mod feeds;
mod query;
mod schema;
mod search;
mod settings;
mod types;

pub use query::{ArticleFilter, ArticleOrder, ArticleQuery};
pub use schema::Database;
pub use types::{
    Article, ArticleSummary, DatabaseError, Feed, FeedWithUnread, NewFeed, ParsedArticle, Settings,
};
