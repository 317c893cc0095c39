mod enrich_queue;
mod schedule;
mod service;
mod tasks;

pub use enrich_queue::EnrichQueue;
pub use schedule::{next_after, parse_schedule};
pub use service::{JobStatus, SchedulerService, SchedulerStatus};
pub use tasks::{fetch_and_store_feed, fetch_due_feeds, fetch_single_feed, FeedFetchOutcome, SweepReport};
