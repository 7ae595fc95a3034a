//! Small helpers shared by ingestion and the API layer.
//!
//! - **URL validation**: scheme checks and an SSRF guard for feed URLs
//! - **Text processing**: control-character stripping and byte-bounded truncation

mod text;
mod url_validator;

pub use text::{strip_control_chars, truncate_bytes};
pub use url_validator::{validate_feed_url, UrlValidationError};

/// Longest search needle accepted by the API, in bytes
pub const MAX_SEARCH_QUERY_LENGTH: usize = 256;
