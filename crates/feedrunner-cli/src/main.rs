use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feedrunner_core::{storage::Database, AppConfig};

mod commands;

#[derive(Parser)]
#[command(name = "feedrunner")]
#[command(author, version, about = "RSS ingestion and scheduling pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch due feeds now, or a single feed with --feed
    Fetch {
        /// Fetch only this feed (by name), even if it is not due
        #[arg(short, long)]
        feed: Option<String>,
    },
    /// Probe a feed URL without storing anything
    Validate {
        /// Feed URL to check
        url: String,
    },
    /// Manage feeds
    Feed {
        #[command(subcommand)]
        action: FeedAction,
    },
    /// Manage scheduled jobs
    Job {
        #[command(subcommand)]
        action: JobAction,
    },
    /// Crawl full content for stored articles that lack it
    Enrich {
        /// Maximum number of articles to process
        #[arg(short, long)]
        limit: Option<u32>,
    },
    /// Background daemon running the cron scheduler
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },
}

#[derive(Subcommand)]
enum FeedAction {
    /// Add a feed subscription
    Add {
        /// Feed URL
        url: String,
        /// Display name; defaults to the feed's own title
        #[arg(short, long)]
        name: Option<String>,
        /// Category label
        #[arg(short, long, default_value = "General")]
        category: String,
        /// Fetch interval in seconds
        #[arg(short, long, default_value_t = 3600)]
        interval: i64,
    },
    /// List all feeds
    List,
    /// Remove a feed and its articles
    Remove {
        /// Name of the feed to remove
        name: String,
    },
}

#[derive(Subcommand)]
enum JobAction {
    /// Add a cron job
    Add {
        /// Job name
        name: String,
        /// Cron expression, e.g. "0 * * * *"
        schedule: String,
        /// Create the job without activating it
        #[arg(long)]
        inactive: bool,
    },
    /// List all jobs with their run statistics
    List,
    /// Remove a job
    Remove {
        /// Name of the job to remove
        name: String,
    },
    /// Activate a job
    Enable { name: String },
    /// Deactivate a job
    Disable { name: String },
}

#[derive(Subcommand)]
enum DaemonAction {
    /// Start the scheduler daemon
    Start,
    /// Stop a running daemon
    Stop,
    /// Check daemon status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    let config = Arc::new(AppConfig::load()?);
    let db = Database::new(&config).await?;

    match cli.command {
        Commands::Fetch { feed } => commands::fetch::run(&db, &config, feed.as_deref()).await,
        Commands::Validate { url } => commands::feed::validate(&config, &url).await,
        Commands::Feed { action } => match action {
            FeedAction::Add {
                url,
                name,
                category,
                interval,
            } => commands::feed::add(&db, &config, &url, name.as_deref(), &category, interval).await,
            FeedAction::List => commands::feed::list(&db).await,
            FeedAction::Remove { name } => commands::feed::remove(&db, &name).await,
        },
        Commands::Job { action } => match action {
            JobAction::Add {
                name,
                schedule,
                inactive,
            } => commands::job::add(&db, &name, &schedule, !inactive).await,
            JobAction::List => commands::job::list(&db).await,
            JobAction::Remove { name } => commands::job::remove(&db, &name).await,
            JobAction::Enable { name } => commands::job::set_active(&db, &name, true).await,
            JobAction::Disable { name } => commands::job::set_active(&db, &name, false).await,
        },
        Commands::Enrich { limit } => commands::enrich::run(&db, &config, limit).await,
        Commands::Daemon { action } => match action {
            DaemonAction::Start => commands::daemon::start(db, config).await,
            DaemonAction::Stop => commands::daemon::stop().await,
            DaemonAction::Status => commands::daemon::status().await,
        },
    }
}
