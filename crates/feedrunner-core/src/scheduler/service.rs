use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::enrich_queue::{spawn_worker, EnrichQueue};
use super::schedule::{next_after, parse_schedule};
use super::tasks::{fetch_due_feeds, SweepReport};
use crate::config::AppConfig;
use crate::enrich::ContentEnricher;
use crate::feed::{FeedFetcher, Job, JobPatch, NewJob};
use crate::storage::{Database, JobRepository};
use crate::{Error, Result};

/// Jobs seeded into an empty store on first start: an hourly sweep plus
/// two denser alternatives that stay disabled until someone turns them on.
const DEFAULT_JOBS: &[(&str, &str, bool)] = &[
    ("rss_fetch_hourly", "0 * * * *", true),
    ("rss_fetch_30min", "*/30 * * * *", false),
    ("rss_fetch_15min", "*/15 * * * *", false),
];

/// Snapshot of the scheduler for status queries
#[derive(Debug, Clone)]
pub struct SchedulerStatus {
    pub running: bool,
    pub scheduled_jobs: usize,
    pub jobs: Vec<JobStatus>,
}

#[derive(Debug, Clone)]
pub struct JobStatus {
    pub id: Uuid,
    pub name: String,
    pub trigger: String,
    pub next_run: Option<DateTime<Utc>>,
}

struct ScheduledJob {
    name: String,
    expression: String,
    schedule: Schedule,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct State {
    running: bool,
    jobs: HashMap<Uuid, ScheduledJob>,
    queue: Option<EnrichQueue>,
    enrich_worker: Option<JoinHandle<()>>,
}

/// Owns the cron jobs that drive the fetch pipeline. Each scheduled job
/// runs in its own loop task; executions within one job are sequential by
/// construction, and a process-wide sweep lock keeps two jobs from
/// fetching the same feeds at once.
pub struct SchedulerService {
    db: Database,
    config: Arc<AppConfig>,
    fetcher: Arc<FeedFetcher>,
    enricher: Option<Arc<ContentEnricher>>,
    sweep_lock: Arc<Mutex<()>>,
    shutdown_tx: watch::Sender<bool>,
    state: Mutex<State>,
}

impl SchedulerService {
    pub fn new(db: Database, config: Arc<AppConfig>, fetcher: Arc<FeedFetcher>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            db,
            config,
            fetcher,
            enricher: None,
            sweep_lock: Arc::new(Mutex::new(())),
            shutdown_tx,
            state: Mutex::new(State::default()),
        }
    }

    /// Attach the enricher; newly stored articles are then queued for
    /// crawling after each sweep.
    pub fn with_enricher(mut self, enricher: Arc<ContentEnricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    /// Seed default jobs, start the enrichment worker, and schedule every
    /// active job from the store.
    pub async fn start(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.running {
            return Ok(());
        }

        if let Some(enricher) = &self.enricher {
            let (queue, rx) = EnrichQueue::new(self.config.scheduler.enrich_queue_capacity);
            let worker = spawn_worker(
                rx,
                enricher.clone(),
                Duration::from_secs(self.config.scheduler.enrich_spacing_secs),
                self.shutdown_tx.subscribe(),
            );
            state.queue = Some(queue);
            state.enrich_worker = Some(worker);
        }

        let jobs = JobRepository::new(&self.db);
        for &(name, expression, active) in DEFAULT_JOBS {
            if jobs.find_by_name(name).await?.is_none() {
                jobs.create(&NewJob {
                    name: name.to_string(),
                    schedule: expression.to_string(),
                    active,
                })
                .await?;
                info!("Seeded default job {} ({})", name, expression);
            }
        }

        for job in jobs.list_active().await? {
            if let Err(e) = self.schedule_job_locked(&mut state, &job) {
                warn!("Cannot schedule job {}: {}; deactivating", job.name, e);
                jobs.set_active(job.id, false).await?;
            }
        }

        state.running = true;
        info!("Scheduler started with {} job(s)", state.jobs.len());
        Ok(())
    }

    /// Stop all job loops and the enrichment worker
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);

        let mut state = self.state.lock().await;
        for (_, job) in state.jobs.drain() {
            if job.handle.await.is_err() {
                warn!("Job loop for {} ended abnormally", job.name);
            }
        }
        if let Some(worker) = state.enrich_worker.take() {
            let _ = worker.await;
        }
        state.queue = None;
        state.running = false;
        info!("Scheduler stopped");
    }

    /// Validate a job's schedule and start its loop task. An invalid cron
    /// expression is rejected here; the caller decides what happens to the
    /// stored job.
    pub async fn schedule_job(&self, job: &Job) -> Result<()> {
        let mut state = self.state.lock().await;
        self.schedule_job_locked(&mut state, job)
    }

    fn schedule_job_locked(&self, state: &mut State, job: &Job) -> Result<()> {
        let schedule = parse_schedule(&job.schedule)?;

        if let Some(previous) = state.jobs.remove(&job.id) {
            previous.handle.abort();
        }

        let handle = tokio::spawn(run_job_loop(
            self.db.clone(),
            self.fetcher.clone(),
            state.queue.clone(),
            self.sweep_lock.clone(),
            job.id,
            job.name.clone(),
            schedule.clone(),
            Duration::from_secs(self.config.scheduler.misfire_grace_secs),
            self.shutdown_tx.subscribe(),
        ));

        state.jobs.insert(
            job.id,
            ScheduledJob {
                name: job.name.clone(),
                expression: job.schedule.clone(),
                schedule,
                handle,
            },
        );
        info!("Scheduled job {} ({})", job.name, job.schedule);
        Ok(())
    }

    /// Stop a job's loop task; returns whether it was scheduled
    pub async fn unschedule_job(&self, id: Uuid) -> bool {
        let mut state = self.state.lock().await;
        match state.jobs.remove(&id) {
            Some(job) => {
                job.handle.abort();
                info!("Unscheduled job {}", job.name);
                true
            }
            None => false,
        }
    }

    /// Create a job and, when active, schedule it. An invalid schedule
    /// leaves the job stored but inactive.
    pub async fn create_and_schedule(&self, new_job: &NewJob) -> Result<Job> {
        let jobs = JobRepository::new(&self.db);
        let job = jobs.create(new_job).await?;

        if job.active {
            if let Err(e) = self.schedule_job(&job).await {
                jobs.set_active(job.id, false).await?;
                return Err(e);
            }
        }

        Ok(job)
    }

    /// Apply a patch and bring the live schedule in line with the stored
    /// job. Deactivating unschedules; an invalid new expression forces the
    /// job inactive.
    pub async fn update_and_reschedule(&self, id: Uuid, patch: &JobPatch) -> Result<Job> {
        let jobs = JobRepository::new(&self.db);
        let job = jobs.update(id, patch).await?;

        self.unschedule_job(id).await;

        if job.active {
            if let Err(e) = self.schedule_job(&job).await {
                jobs.set_active(id, false).await?;
                return Err(e);
            }
        }

        Ok(job)
    }

    /// Delete a job from the store and stop its loop
    pub async fn delete_and_unschedule(&self, id: Uuid) -> Result<bool> {
        self.unschedule_job(id).await;
        JobRepository::new(&self.db).delete(id).await
    }

    /// Run a due-feed sweep right now, outside any job. Fails when a sweep
    /// is already in flight.
    pub async fn trigger_now(&self) -> Result<SweepReport> {
        let queue = self.state.lock().await.queue.clone();

        let guard = self.sweep_lock.try_lock().map_err(|_| {
            Error::Other("A fetch sweep is already running".to_string())
        })?;
        let report = fetch_due_feeds(&self.db, &self.fetcher, queue.as_ref()).await;
        drop(guard);

        report
    }

    /// Snapshot the live schedule
    pub async fn status(&self) -> SchedulerStatus {
        let state = self.state.lock().await;
        let now = Utc::now();

        let mut jobs: Vec<JobStatus> = state
            .jobs
            .iter()
            .map(|(&id, job)| JobStatus {
                id,
                name: job.name.clone(),
                trigger: format!("cron[{}]", job.expression),
                next_run: next_after(&job.schedule, now),
            })
            .collect();
        jobs.sort_by(|a, b| a.name.cmp(&b.name));

        SchedulerStatus {
            running: state.running,
            scheduled_jobs: jobs.len(),
            jobs,
        }
    }
}

/// One job's life: sleep until the next cron occurrence, apply the misfire
/// grace window, run the sweep under the process-wide lock, persist run
/// statistics, repeat until shutdown.
#[allow(clippy::too_many_arguments)]
async fn run_job_loop(
    db: Database,
    fetcher: Arc<FeedFetcher>,
    queue: Option<EnrichQueue>,
    sweep_lock: Arc<Mutex<()>>,
    job_id: Uuid,
    name: String,
    schedule: Schedule,
    misfire_grace: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let now = Utc::now();
        let Some(next) = next_after(&schedule, now) else {
            warn!("Job {} has no future occurrence, stopping its loop", name);
            break;
        };

        if let Err(e) = JobRepository::new(&db).update_next_run(job_id, next).await {
            warn!("Cannot persist next run for job {}: {}", name, e);
        }

        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        tokio::select! {
            result = shutdown.changed() => {
                if result.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
            _ = tokio::time::sleep(wait) => {}
        }

        let started = Utc::now();
        let lateness = (started - next).to_std().unwrap_or(Duration::ZERO);
        if lateness > misfire_grace {
            // Too late to still honor this occurrence; never catch up
            warn!(
                "Job {} missed its {} trigger by {:?}, skipping",
                name, next, lateness
            );
            continue;
        }

        let error = match sweep_lock.try_lock() {
            Ok(_guard) => match fetch_due_feeds(&db, &fetcher, queue.as_ref()).await {
                Ok(report) => report.error_summary(),
                Err(e) => {
                    error!("Sweep failed for job {}: {}", name, e);
                    Some(e.to_string())
                }
            },
            Err(_) => {
                info!("Job {} skipped: a sweep is already running", name);
                continue;
            }
        };

        let upcoming = next_after(&schedule, started);
        if let Err(e) = JobRepository::new(&db)
            .update_run_status(job_id, started, upcoming, error.as_deref())
            .await
        {
            warn!("Cannot persist run status for job {}: {}", name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_service(db: &Database) -> SchedulerService {
        let config = Arc::new(AppConfig::default());
        let fetcher = Arc::new(FeedFetcher::new(&config).unwrap());
        SchedulerService::new(db.clone(), config, fetcher)
    }

    #[tokio::test]
    async fn test_start_seeds_default_jobs() {
        let db = Database::new_in_memory().await.unwrap();
        let service = test_service(&db);
        service.start().await.unwrap();

        let stored = JobRepository::new(&db).list_all().await.unwrap();
        assert_eq!(stored.len(), 3);
        let hourly = stored.iter().find(|j| j.name == "rss_fetch_hourly").unwrap();
        assert!(hourly.active);
        assert!(stored.iter().filter(|j| j.active).count() == 1);

        let status = service.status().await;
        assert!(status.running);
        assert_eq!(status.scheduled_jobs, 1);
        assert_eq!(status.jobs[0].name, "rss_fetch_hourly");
        assert_eq!(status.jobs[0].trigger, "cron[0 * * * *]");
        assert!(status.jobs[0].next_run.is_some());

        service.shutdown().await;
        assert!(!service.status().await.running);
    }

    #[tokio::test]
    async fn test_invalid_schedule_leaves_job_inactive() {
        let db = Database::new_in_memory().await.unwrap();
        let service = test_service(&db);

        let result = service
            .create_and_schedule(&NewJob {
                name: "broken".to_string(),
                schedule: "bad cron".to_string(),
                active: true,
            })
            .await;
        assert!(matches!(result, Err(Error::Schedule { .. })));

        let stored = JobRepository::new(&db)
            .find_by_name("broken")
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.active);
        assert_eq!(service.status().await.scheduled_jobs, 0);
    }

    #[tokio::test]
    async fn test_deactivating_unschedules() {
        let db = Database::new_in_memory().await.unwrap();
        let service = test_service(&db);

        let job = service
            .create_and_schedule(&NewJob {
                name: "sweep".to_string(),
                schedule: "*/15 * * * *".to_string(),
                active: true,
            })
            .await
            .unwrap();
        assert_eq!(service.status().await.scheduled_jobs, 1);

        let patch = JobPatch {
            active: Some(false),
            ..Default::default()
        };
        let updated = service.update_and_reschedule(job.id, &patch).await.unwrap();
        assert!(!updated.active);
        assert_eq!(service.status().await.scheduled_jobs, 0);
    }

    #[tokio::test]
    async fn test_trigger_now_with_no_feeds() {
        let db = Database::new_in_memory().await.unwrap();
        let service = test_service(&db);

        let report = service.trigger_now().await.unwrap();
        assert_eq!(report.total_feeds, 0);
        assert_eq!(report.new_articles, 0);
    }

    #[tokio::test]
    async fn test_delete_unschedules() {
        let db = Database::new_in_memory().await.unwrap();
        let service = test_service(&db);

        let job = service
            .create_and_schedule(&NewJob {
                name: "temp".to_string(),
                schedule: "0 * * * *".to_string(),
                active: true,
            })
            .await
            .unwrap();

        assert!(service.delete_and_unschedule(job.id).await.unwrap());
        assert_eq!(service.status().await.scheduled_jobs, 0);
        assert!(JobRepository::new(&db).find_by_id(job.id).await.unwrap().is_none());
    }
}
