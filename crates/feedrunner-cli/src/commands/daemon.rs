use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use feedrunner_core::enrich::{ContentEnricher, ReaderClient, Summarizer, SummaryProvider};
use feedrunner_core::feed::FeedFetcher;
use feedrunner_core::scheduler::SchedulerService;
use feedrunner_core::storage::Database;
use feedrunner_core::AppConfig;

fn pid_file_path() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("feedrunner")
        .join("daemon.pid")
}

/// Read the PID file and check the process is alive
fn is_daemon_running() -> Option<u32> {
    let pid_path = pid_file_path();
    if !pid_path.exists() {
        return None;
    }

    let mut file = fs::File::open(&pid_path).ok()?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    let pid: u32 = contents.trim().parse().ok()?;

    #[cfg(unix)]
    {
        use std::process::Command;
        let output = Command::new("kill")
            .arg("-0")
            .arg(pid.to_string())
            .output()
            .ok()?;
        if output.status.success() {
            return Some(pid);
        }
    }

    #[cfg(windows)]
    {
        return Some(pid);
    }

    // Stale PID file
    let _ = fs::remove_file(&pid_path);
    None
}

fn write_pid_file() -> Result<()> {
    let pid_path = pid_file_path();
    if let Some(parent) = pid_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(&pid_path)?;
    writeln!(file, "{}", std::process::id())?;
    Ok(())
}

fn remove_pid_file() {
    let _ = fs::remove_file(pid_file_path());
}

/// Build the enricher from config; the daemon runs without it when the
/// reader token is not configured.
fn build_enricher(db: &Database, config: &Arc<AppConfig>) -> Option<Arc<ContentEnricher>> {
    let reader = match ReaderClient::new(config) {
        Ok(reader) => Arc::new(reader),
        Err(e) => {
            warn!("Content enrichment disabled: {}", e);
            return None;
        }
    };

    let summarizer: Option<Arc<dyn SummaryProvider>> = if config.summarize.enabled {
        match Summarizer::new(config) {
            Ok(s) => {
                info!("Summarization enabled (model: {})", config.summarize.model);
                Some(Arc::new(s))
            }
            Err(e) => {
                warn!("Summarization disabled: {}", e);
                None
            }
        }
    } else {
        None
    };

    Some(Arc::new(ContentEnricher::new(db.clone(), reader, summarizer)))
}

/// Start the scheduler daemon in the foreground
pub async fn start(db: Database, config: Arc<AppConfig>) -> Result<()> {
    if let Some(pid) = is_daemon_running() {
        println!("Daemon is already running (PID: {})", pid);
        return Ok(());
    }

    println!("Starting feedrunner daemon...");
    write_pid_file()?;

    let fetcher = Arc::new(FeedFetcher::new(&config)?);
    let mut service = SchedulerService::new(db.clone(), config.clone(), fetcher);
    if let Some(enricher) = build_enricher(&db, &config) {
        service = service.with_enricher(enricher);
    }

    service.start().await?;

    let status = service.status().await;
    println!(
        "Daemon started (PID: {}), {} job(s) scheduled. Press Ctrl+C or run 'feedrunner daemon stop' to stop.",
        std::process::id(),
        status.scheduled_jobs
    );
    for job in &status.jobs {
        let next = job
            .next_run
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("  {} {} — next run {}", job.name, job.trigger, next);
    }

    tokio::signal::ctrl_c().await.ok();
    info!("Received shutdown signal");

    service.shutdown().await;
    remove_pid_file();
    println!("Daemon stopped.");

    Ok(())
}

/// Signal a running daemon to stop
pub async fn stop() -> Result<()> {
    match is_daemon_running() {
        Some(pid) => {
            println!("Stopping daemon (PID: {})...", pid);

            #[cfg(unix)]
            {
                use std::process::Command;
                let output = Command::new("kill")
                    .arg("-TERM")
                    .arg(pid.to_string())
                    .output()?;

                if output.status.success() {
                    tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;

                    if is_daemon_running().is_none() {
                        println!("Daemon stopped.");
                    } else {
                        let _ = Command::new("kill").arg("-9").arg(pid.to_string()).output();
                        remove_pid_file();
                        println!("Daemon forcefully terminated.");
                    }
                } else {
                    println!("Failed to stop daemon; kill it manually: kill {}", pid);
                }
            }

            #[cfg(windows)]
            {
                println!("Please stop the daemon manually on Windows (PID: {})", pid);
            }
        }
        None => {
            println!("Daemon is not running.");
        }
    }

    Ok(())
}

/// Report whether a daemon is running
pub async fn status() -> Result<()> {
    match is_daemon_running() {
        Some(pid) => {
            println!("Daemon is running (PID: {})", pid);
            println!("PID file: {}", pid_file_path().display());
        }
        None => {
            println!("Daemon is not running.");
        }
    }

    Ok(())
}
