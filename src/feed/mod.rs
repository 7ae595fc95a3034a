//! Feed retrieval and subscription-list formats.
//!
//! - [`parser`] - RSS/Atom/JSON Feed decoding via `feed-rs`
//! - [`fetcher`] - bounded HTTP download, subscription and refresh
//! - [`opml`] - OPML import and export

mod fetcher;
mod opml;
mod parser;

pub use fetcher::{
    build_http_client, fetch_document, FeedFetcher, FetchError, FetchResult, IngestError,
    IngestStage,
};
pub use opml::{parse_opml, write_opml, OpmlDocument, OpmlError, OpmlOutline};
pub use parser::{parse_feed, ParsedFeed, MAX_BODY_BYTES};
