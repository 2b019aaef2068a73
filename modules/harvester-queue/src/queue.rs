//! Automation Queue (§4.11): a durable, deduped priority queue backed by
//! SQLite, shared by the same store family as the Evidence Store and
//! Review State (§5: single-writer WAL connection).

use chrono::{DateTime, Utc};
use harvester_common::{AutomationJob, JobStatus, JobType};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::error::Result;

/// Jobs that fail this many times move to `Abandoned` instead of being
/// retried forever (SPEC_FULL.md supplement: dead-letter accounting).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

#[derive(Clone)]
pub struct AutomationQueue {
    pool: SqlitePool,
    max_attempts: u32,
}

impl AutomationQueue {
    pub async fn open(path: &str) -> Result<Self> {
        let url = format!("sqlite://{path}?mode=rwc");
        let pool = SqlitePoolOptions::new().max_connections(1).connect(&url).await?;
        Self::from_pool(pool).await
    }

    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await?;
        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query("PRAGMA journal_mode=WAL").execute(&pool).await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS automation_jobs (
                job_id TEXT PRIMARY KEY,
                job_type TEXT NOT NULL,
                priority INTEGER NOT NULL,
                status TEXT NOT NULL,
                dedupe_key TEXT NOT NULL,
                reason_tags TEXT NOT NULL,
                next_run_at TEXT,
                attempts INTEGER NOT NULL DEFAULT 0,
                payload TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_dedupe ON automation_jobs(dedupe_key, status)")
            .execute(&pool)
            .await?;

        Ok(Self { pool, max_attempts: DEFAULT_MAX_ATTEMPTS })
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Enqueue a job, or return the id of an existing queued/running/
    /// cooldown job sharing the same dedupe key (§4.11: dedupe by
    /// `{type, domain, query-norm, field-targets, reason}`).
    pub async fn enqueue(
        &self,
        job_type: JobType,
        dedupe_key: impl Into<String>,
        reason_tags: Vec<String>,
        payload: serde_json::Value,
    ) -> Result<String> {
        let dedupe_key = dedupe_key.into();
        let active_statuses = [
            serde_json::to_string(&JobStatus::Queued)?,
            serde_json::to_string(&JobStatus::Running)?,
            serde_json::to_string(&JobStatus::Cooldown)?,
        ];

        let existing: Option<(String,)> = sqlx::query_as(
            "SELECT job_id FROM automation_jobs WHERE dedupe_key = ? AND status IN (?, ?, ?)",
        )
        .bind(&dedupe_key)
        .bind(&active_statuses[0])
        .bind(&active_statuses[1])
        .bind(&active_statuses[2])
        .fetch_optional(&self.pool)
        .await?;

        if let Some((job_id,)) = existing {
            info!(job_id, dedupe_key, "job already queued, skipping duplicate enqueue");
            return Ok(job_id);
        }

        let job_id = format!("job-{}", Uuid::new_v4());
        let status = serde_json::to_string(&JobStatus::Queued)?;
        let job_type_json = serde_json::to_string(&job_type)?;
        let reason_tags_json = serde_json::to_string(&reason_tags)?;

        sqlx::query(
            r#"
            INSERT INTO automation_jobs
                (job_id, job_type, priority, status, dedupe_key, reason_tags, next_run_at, attempts, payload)
            VALUES (?, ?, ?, ?, ?, ?, NULL, 0, ?)
            "#,
        )
        .bind(&job_id)
        .bind(&job_type_json)
        .bind(job_type.default_priority() as i64)
        .bind(&status)
        .bind(&dedupe_key)
        .bind(&reason_tags_json)
        .bind(payload.to_string())
        .execute(&self.pool)
        .await?;

        Ok(job_id)
    }

    /// Pop the highest-priority (lowest `priority` number) queued job whose
    /// `next_run_at` has passed (or is unset). Marks it `running`.
    pub async fn pop_next(&self, now: DateTime<Utc>) -> Result<Option<AutomationJob>> {
        let queued = serde_json::to_string(&JobStatus::Queued)?;
        let row = sqlx::query(
            r#"
            SELECT job_id, job_type, priority, status, dedupe_key, reason_tags, next_run_at, attempts, payload
            FROM automation_jobs
            WHERE status = ? AND (next_run_at IS NULL OR next_run_at <= ?)
            ORDER BY priority ASC, job_id ASC
            LIMIT 1
            "#,
        )
        .bind(&queued)
        .bind(now.to_rfc3339())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };
        let job = row_to_job(&row)?;

        let running = serde_json::to_string(&JobStatus::Running)?;
        sqlx::query("UPDATE automation_jobs SET status = ? WHERE job_id = ?")
            .bind(&running)
            .bind(&job.job_id)
            .execute(&self.pool)
            .await?;

        Ok(Some(AutomationJob { status: JobStatus::Running, ..job }))
    }

    pub async fn mark_done(&self, job_id: &str) -> Result<()> {
        self.set_status(job_id, JobStatus::Done, None).await
    }

    /// Record a failure. Under `max_attempts`, the job returns to
    /// `Cooldown` with `next_run_at` set for a later retry; at or beyond
    /// it, the job moves to the terminal `Abandoned` state so a
    /// permanently broken job never spins forever (SPEC_FULL.md supplement).
    pub async fn mark_failed(&self, job_id: &str, retry_after: chrono::Duration, now: DateTime<Utc>) -> Result<JobStatus> {
        let attempts: i64 = sqlx::query_scalar("SELECT attempts FROM automation_jobs WHERE job_id = ?")
            .bind(job_id)
            .fetch_one(&self.pool)
            .await?;
        let attempts = attempts as u32 + 1;

        sqlx::query("UPDATE automation_jobs SET attempts = ? WHERE job_id = ?")
            .bind(attempts as i64)
            .bind(job_id)
            .execute(&self.pool)
            .await?;

        if attempts >= self.max_attempts {
            self.set_status(job_id, JobStatus::Abandoned, None).await?;
            return Ok(JobStatus::Abandoned);
        }

        self.set_status(job_id, JobStatus::Cooldown, Some(now + retry_after)).await?;
        Ok(JobStatus::Cooldown)
    }

    /// Release a cooldown job back to `queued` once its `next_run_at` has
    /// passed — called by the orchestrator at round boundaries (§4.11).
    pub async fn release_due_cooldowns(&self, now: DateTime<Utc>) -> Result<u64> {
        let cooldown = serde_json::to_string(&JobStatus::Cooldown)?;
        let queued = serde_json::to_string(&JobStatus::Queued)?;
        let result = sqlx::query(
            "UPDATE automation_jobs SET status = ?, next_run_at = NULL WHERE status = ? AND next_run_at <= ?",
        )
        .bind(&queued)
        .bind(&cooldown)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn set_status(&self, job_id: &str, status: JobStatus, next_run_at: Option<DateTime<Utc>>) -> Result<()> {
        let status_json = serde_json::to_string(&status)?;
        sqlx::query("UPDATE automation_jobs SET status = ?, next_run_at = ? WHERE job_id = ?")
            .bind(&status_json)
            .bind(next_run_at.map(|t| t.to_rfc3339()))
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn count_by_status(&self, status: JobStatus) -> Result<i64> {
        let status_json = serde_json::to_string(&status)?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM automation_jobs WHERE status = ?")
            .bind(&status_json)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn row_to_job(row: &sqlx::sqlite::SqliteRow) -> Result<AutomationJob> {
    let next_run_at: Option<String> = row.try_get("next_run_at").ok();
    Ok(AutomationJob {
        job_id: row.get("job_id"),
        job_type: serde_json::from_str(&row.get::<String, _>("job_type"))?,
        priority: row.get::<i64, _>("priority") as u8,
        status: serde_json::from_str(&row.get::<String, _>("status"))?,
        dedupe_key: row.get("dedupe_key"),
        reason_tags: serde_json::from_str(&row.get::<String, _>("reason_tags"))?,
        next_run_at: next_run_at.and_then(|s| s.parse().ok()),
        attempts: row.get::<i64, _>("attempts") as u32,
        payload: serde_json::from_str(&row.get::<String, _>("payload"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enqueue_dedupes_against_an_already_queued_job() {
        let queue = AutomationQueue::open_in_memory().await.unwrap();
        let first = queue
            .enqueue(JobType::RepairSearch, "dk-1", vec!["dead_path".into()], serde_json::json!({}))
            .await
            .unwrap();
        let second = queue
            .enqueue(JobType::RepairSearch, "dk-1", vec!["dead_path".into()], serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(queue.count_by_status(JobStatus::Queued).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn pop_next_returns_highest_priority_first() {
        let queue = AutomationQueue::open_in_memory().await.unwrap();
        queue.enqueue(JobType::StalenessRefresh, "dk-a", vec![], serde_json::json!({})).await.unwrap();
        queue.enqueue(JobType::RepairSearch, "dk-b", vec![], serde_json::json!({})).await.unwrap();

        let job = queue.pop_next(Utc::now()).await.unwrap().unwrap();
        assert_eq!(job.job_type, JobType::RepairSearch);
        assert_eq!(job.status, JobStatus::Running);
    }

    #[tokio::test]
    async fn pop_next_skips_jobs_still_in_cooldown() {
        let queue = AutomationQueue::open_in_memory().await.unwrap();
        let job_id = queue.enqueue(JobType::RepairSearch, "dk-a", vec![], serde_json::json!({})).await.unwrap();
        let job = queue.pop_next(Utc::now()).await.unwrap().unwrap();
        assert_eq!(job.job_id, job_id);

        queue.mark_failed(&job_id, chrono::Duration::hours(1), Utc::now()).await.unwrap();
        assert!(queue.pop_next(Utc::now()).await.unwrap().is_none());

        let later = Utc::now() + chrono::Duration::hours(2);
        assert_eq!(queue.release_due_cooldowns(later).await.unwrap(), 1);
        let job = queue.pop_next(later).await.unwrap().unwrap();
        assert_eq!(job.job_id, job_id);
    }

    #[tokio::test]
    async fn repeated_failures_abandon_the_job_instead_of_retrying_forever() {
        let queue = AutomationQueue::open_in_memory().await.unwrap().with_max_attempts(2);
        let job_id = queue.enqueue(JobType::DomainBackoff, "dk-a", vec![], serde_json::json!({})).await.unwrap();

        let status1 = queue.mark_failed(&job_id, chrono::Duration::minutes(1), Utc::now()).await.unwrap();
        assert_eq!(status1, JobStatus::Cooldown);

        let status2 = queue.mark_failed(&job_id, chrono::Duration::minutes(1), Utc::now()).await.unwrap();
        assert_eq!(status2, JobStatus::Abandoned);
    }
}
