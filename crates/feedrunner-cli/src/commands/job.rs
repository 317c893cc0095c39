use anyhow::{anyhow, Result};

use feedrunner_core::feed::NewJob;
use feedrunner_core::scheduler::parse_schedule;
use feedrunner_core::storage::{Database, JobRepository};

async fn find_job(db: &Database, name: &str) -> Result<feedrunner_core::feed::Job> {
    JobRepository::new(db)
        .find_by_name(name)
        .await?
        .ok_or_else(|| anyhow!("No job named '{}'", name))
}

/// Validate the cron expression and store the job
pub async fn add(db: &Database, name: &str, schedule: &str, active: bool) -> Result<()> {
    parse_schedule(schedule)?;

    let job = JobRepository::new(db)
        .create(&NewJob {
            name: name.to_string(),
            schedule: schedule.to_string(),
            active,
        })
        .await?;

    let status = if job.active { "active" } else { "inactive" };
    println!("Added job '{}' ({}, {})", job.name, job.schedule, status);
    Ok(())
}

/// List all jobs with run statistics
pub async fn list(db: &Database) -> Result<()> {
    let jobs = JobRepository::new(db).list_all().await?;

    if jobs.is_empty() {
        println!("No jobs.");
        return Ok(());
    }

    println!("{} job(s):", jobs.len());
    for job in jobs {
        let status = if job.active { "active" } else { "inactive" };
        let next = job
            .next_run
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "-".to_string());

        println!(
            "  {} [{}] {} — next {}, runs {}, errors {}",
            job.name, job.schedule, status, next, job.run_count, job.error_count
        );
        if let Some(error) = &job.last_error {
            println!("    last error: {}", error);
        }
    }

    Ok(())
}

/// Remove a job
pub async fn remove(db: &Database, name: &str) -> Result<()> {
    let job = find_job(db, name).await?;
    JobRepository::new(db).delete(job.id).await?;
    println!("Removed job '{}'", name);
    Ok(())
}

/// Flip a job's active flag. The expression is re-validated on enable so a
/// job with a broken schedule cannot come back to life.
pub async fn set_active(db: &Database, name: &str, active: bool) -> Result<()> {
    let job = find_job(db, name).await?;
    if active {
        parse_schedule(&job.schedule)?;
    }

    JobRepository::new(db).set_active(job.id, active).await?;
    println!(
        "Job '{}' is now {}",
        name,
        if active { "active" } else { "inactive" }
    );
    Ok(())
}
