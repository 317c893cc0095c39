mod database;
mod feed_repo;
mod article_repo;
mod job_repo;
pub mod retry;

pub use database::Database;
pub use feed_repo::FeedRepository;
pub use article_repo::ArticleRepository;
pub use job_repo::JobRepository;
