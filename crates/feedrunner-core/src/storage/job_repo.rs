use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::retry::execute_with_retry;
use super::Database;
use crate::feed::{Job, JobPatch, NewJob};
use crate::{Error, Result};

/// Repository for cron job records
pub struct JobRepository<'a> {
    db: &'a Database,
}

#[derive(FromRow)]
struct JobRow {
    id: String,
    name: String,
    schedule: String,
    active: i32,
    last_run: Option<DateTime<Utc>>,
    next_run: Option<DateTime<Utc>>,
    run_count: i64,
    error_count: i64,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<JobRow> for Job {
    fn from(row: JobRow) -> Self {
        Job {
            id: Uuid::parse_str(&row.id).unwrap_or_default(),
            name: row.name,
            schedule: row.schedule,
            active: row.active != 0,
            last_run: row.last_run,
            next_run: row.next_run,
            run_count: row.run_count,
            error_count: row.error_count,
            last_error: row.last_error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const JOB_COLUMNS: &str = "id, name, schedule, active, last_run, next_run, \
                           run_count, error_count, last_error, created_at, updated_at";

impl<'a> JobRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Create a new job; a name collision is reported as AlreadyExists
    pub async fn create(&self, new_job: &NewJob) -> Result<Job> {
        if self.find_by_name(&new_job.name).await?.is_some() {
            return Err(Error::AlreadyExists(format!("Job '{}'", new_job.name)));
        }

        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO jobs (id, name, schedule, active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&new_job.name)
        .bind(&new_job.schedule)
        .bind(new_job.active as i32)
        .bind(now)
        .bind(now)
        .execute(self.db.pool())
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| Error::JobNotFound(id.to_string()))
    }

    /// Find a job by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Job>> {
        let row: Option<JobRow> =
            sqlx::query_as(&format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS))
                .bind(id.to_string())
                .fetch_optional(self.db.pool())
                .await?;

        Ok(row.map(Job::from))
    }

    /// Find a job by name
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Job>> {
        let row: Option<JobRow> =
            sqlx::query_as(&format!("SELECT {} FROM jobs WHERE name = ?", JOB_COLUMNS))
                .bind(name)
                .fetch_optional(self.db.pool())
                .await?;

        Ok(row.map(Job::from))
    }

    /// Get all jobs
    pub async fn list_all(&self) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> =
            sqlx::query_as(&format!("SELECT {} FROM jobs ORDER BY name ASC", JOB_COLUMNS))
                .fetch_all(self.db.pool())
                .await?;

        Ok(rows.into_iter().map(Job::from).collect())
    }

    /// Get all active jobs
    pub async fn list_active(&self) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> = sqlx::query_as(&format!(
            "SELECT {} FROM jobs WHERE active = 1 ORDER BY name ASC",
            JOB_COLUMNS
        ))
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Job::from).collect())
    }

    /// Apply a partial update to a job
    pub async fn update(&self, id: Uuid, patch: &JobPatch) -> Result<Job> {
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE jobs
            SET name = COALESCE(?, name),
                schedule = COALESCE(?, schedule),
                active = COALESCE(?, active),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&patch.name)
        .bind(&patch.schedule)
        .bind(patch.active.map(|a| a as i32))
        .bind(now)
        .bind(id.to_string())
        .execute(self.db.pool())
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| Error::JobNotFound(id.to_string()))
    }

    /// Set the active flag, used to force a job inactive when scheduling fails
    pub async fn set_active(&self, id: Uuid, active: bool) -> Result<()> {
        let now = Utc::now();
        let id_str = id.to_string();

        execute_with_retry(|| async {
            sqlx::query("UPDATE jobs SET active = ?, updated_at = ? WHERE id = ?")
                .bind(active as i32)
                .bind(now)
                .bind(&id_str)
                .execute(self.db.pool())
                .await?;
            Ok(())
        })
        .await?;

        Ok(())
    }

    /// Write the next scheduled run time
    pub async fn update_next_run(&self, id: Uuid, next_run: DateTime<Utc>) -> Result<()> {
        let now = Utc::now();
        let id_str = id.to_string();

        execute_with_retry(|| async {
            sqlx::query("UPDATE jobs SET next_run = ?, updated_at = ? WHERE id = ?")
                .bind(next_run)
                .bind(now)
                .bind(&id_str)
                .execute(self.db.pool())
                .await?;
            Ok(())
        })
        .await?;

        Ok(())
    }

    /// Record one execution: bumps the run counter, stores the last/next run
    /// times, and records or clears the error text.
    pub async fn update_run_status(
        &self,
        id: Uuid,
        last_run: DateTime<Utc>,
        next_run: Option<DateTime<Utc>>,
        error: Option<&str>,
    ) -> Result<()> {
        let now = Utc::now();
        let id_str = id.to_string();

        execute_with_retry(|| async {
            match error {
                Some(message) => {
                    sqlx::query(
                        r#"
                        UPDATE jobs
                        SET last_run = ?,
                            next_run = COALESCE(?, next_run),
                            run_count = run_count + 1,
                            error_count = error_count + 1,
                            last_error = ?,
                            updated_at = ?
                        WHERE id = ?
                        "#,
                    )
                    .bind(last_run)
                    .bind(next_run)
                    .bind(message)
                    .bind(now)
                    .bind(&id_str)
                    .execute(self.db.pool())
                    .await?;
                }
                None => {
                    sqlx::query(
                        r#"
                        UPDATE jobs
                        SET last_run = ?,
                            next_run = COALESCE(?, next_run),
                            run_count = run_count + 1,
                            last_error = NULL,
                            updated_at = ?
                        WHERE id = ?
                        "#,
                    )
                    .bind(last_run)
                    .bind(next_run)
                    .bind(now)
                    .bind(&id_str)
                    .execute(self.db.pool())
                    .await?;
                }
            }
            Ok(())
        })
        .await?;

        Ok(())
    }

    /// Delete a job
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id.to_string())
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
