pub mod daemon;
pub mod enrich;
pub mod feed;
pub mod fetch;
pub mod job;
