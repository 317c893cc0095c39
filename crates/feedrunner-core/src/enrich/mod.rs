mod enricher;
mod reader;
mod summarizer;

pub use enricher::{ContentEnricher, EnrichReport};
pub use reader::ReaderClient;
pub use summarizer::Summarizer;

use crate::Result;

/// External reader service: given a target URL, return extracted textual
/// content or fail. Implementations own their retry policy.
#[async_trait::async_trait]
pub trait ContentReader: Send + Sync {
    async fn read(&self, url: &str) -> Result<String>;
}

/// External summarization service: given text, return a condensed version
/// or fail. Implementations own their retry policy.
#[async_trait::async_trait]
pub trait SummaryProvider: Send + Sync {
    async fn summarize(&self, content: &str) -> Result<String>;
}
