use feed_rs::parser;
use sha2::{Digest, Sha256};

use crate::storage::ParsedArticle;
use crate::util::{strip_control_chars, truncate_bytes};

/// Stored article bodies are cut to this many bytes
pub const MAX_BODY_BYTES: usize = 8192;

/// A decoded feed document
#[derive(Debug, Clone)]
pub struct ParsedFeed {
    /// Channel title, `None` when the document has none or it is blank
    pub title: Option<String>,
    pub articles: Vec<ParsedArticle>,
}

/// Parse RSS 0.9x/1.0/2.0, Atom or JSON Feed bytes.
///
/// feed-rs reads the XML declaration and decodes non-UTF-8 documents itself.
/// Entries without a date are stamped with the current time.
pub fn parse_feed(bytes: &[u8]) -> Result<ParsedFeed, parser::ParseFeedError> {
    let feed = parser::parse(bytes)?;
    let now = chrono::Utc::now().timestamp();

    let title = feed
        .title
        .map(|t| strip_control_chars(t.content.trim()).into_owned())
        .filter(|t| !t.is_empty());

    let articles = feed
        .entries
        .into_iter()
        .map(|entry| {
            let link = entry
                .links
                .first()
                .map(|l| l.href.trim().to_string())
                .unwrap_or_default();
            let date = entry
                .published
                .or(entry.updated)
                .map(|dt| dt.timestamp())
                .unwrap_or(now);
            let body = entry
                .content
                .and_then(|c| c.body)
                .or_else(|| entry.summary.map(|s| s.content))
                .unwrap_or_default();
            let title = entry
                .title
                .map(|t| strip_control_chars(t.content.trim()).into_owned())
                .unwrap_or_default();

            let guid = generate_guid(&entry.id, &link, &title, date);

            ParsedArticle {
                guid,
                title,
                link,
                date,
                body: truncate_bytes(&strip_control_chars(&body), MAX_BODY_BYTES).into_owned(),
            }
        })
        .collect();

    Ok(ParsedFeed { title, articles })
}

/// Entry id when present, otherwise a SHA-256 of link|title|date.
fn generate_guid(existing: &str, link: &str, title: &str, date: i64) -> String {
    let trimmed = existing.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }

    let input = format!("{}|{}|{}", link, title, date);
    format!("{:x}", Sha256::digest(input.as_bytes()))
}
