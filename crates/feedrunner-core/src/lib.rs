pub mod config;
pub mod error;
pub mod feed;
pub mod storage;
pub mod enrich;
pub mod scheduler;

pub use config::AppConfig;
pub use error::{Error, Result};
