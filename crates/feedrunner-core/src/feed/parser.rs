use chrono::{DateTime, Utc};
use feed_rs::parser;

use crate::{Error, Result};

/// Parsed feed metadata and entries
pub struct ParsedFeed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub entries: Vec<ParsedEntry>,
}

/// One entry extracted from a feed document
pub struct ParsedEntry {
    pub guid: Option<String>,
    pub link: Option<String>,
    pub title: String,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub author: Option<String>,
}

impl ParsedEntry {
    /// Entries without a guid or link carry no dedup identity and are dropped
    pub fn has_identity(&self) -> bool {
        self.guid.is_some() || self.link.is_some()
    }
}

/// Parse RSS/Atom feed content into structured data.
/// A document that fails to parse at all is an error; individual entries
/// missing fields are kept with whatever was recoverable.
pub fn parse_feed(content: &[u8]) -> Result<ParsedFeed> {
    let feed = parser::parse(content).map_err(|e| Error::FeedParse(e.to_string()))?;

    let title = feed.title.map(|t| t.content);
    let description = feed.description.map(|d| d.content);

    let entries = feed
        .entries
        .into_iter()
        .map(|entry| {
            let guid = if entry.id.is_empty() {
                None
            } else {
                Some(entry.id)
            };

            let link = entry.links.first().map(|l| l.href.clone());

            let title = entry
                .title
                .map(|t| t.content)
                .unwrap_or_else(|| "Untitled".to_string());

            let summary = entry.summary.map(|s| html_to_text(&s.content));

            let content = entry.content.and_then(|c| c.body).map(|b| html_to_text(&b));

            let published = entry
                .published
                .or(entry.updated)
                .map(DateTime::<Utc>::from);

            let author = entry.authors.first().map(|a| a.name.clone());

            ParsedEntry {
                guid,
                link,
                title,
                summary,
                content,
                published,
                author,
            }
        })
        .collect();

    Ok(ParsedFeed {
        title,
        description,
        entries,
    })
}

/// Convert HTML content to plain text
fn html_to_text(html: &str) -> String {
    html2text::from_read(html.as_bytes(), 80).unwrap_or_else(|_| html.to_string())
}
