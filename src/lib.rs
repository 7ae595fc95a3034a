//! Personal news aggregation server: feed subscriptions, article state and
//! OPML exchange behind a REST API.

pub mod api;
pub mod config;
pub mod feed;
pub mod service;
pub mod storage;
pub mod util;
