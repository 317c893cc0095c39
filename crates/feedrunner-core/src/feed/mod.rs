mod extract;
mod fetcher;
mod models;
mod parser;

pub use extract::extract_content;
pub use fetcher::{FeedFetcher, FeedProbe};
pub use models::{Article, Feed, FeedPatch, Job, JobPatch, NewArticle, NewFeed, NewJob};
pub use parser::{parse_feed, ParsedEntry, ParsedFeed};
