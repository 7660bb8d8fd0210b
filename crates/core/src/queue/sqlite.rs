//! SQLite-backed job queue implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use super::timing::next_fire;
use super::{
    JobQueue, JobStatus, NewJob, NewTrigger, QueueError, QueueStats, QueuedJob, RecurringTrigger,
    DEFAULT_MAX_ATTEMPTS,
};

const JOB_COLUMNS: &str = "id, queue, name, payload, status, progress, attempts, max_attempts, run_at, last_error, created_at, updated_at";
const TRIGGER_COLUMNS: &str =
    "repeat_key, queue, name, cron, payload, next_run_at, last_run_at, created_at";

/// SQLite-backed job queue.
pub struct SqliteJobQueue {
    conn: Mutex<Connection>,
    default_max_attempts: u32,
}

impl SqliteJobQueue {
    /// Create a new SQLite queue, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, QueueError> {
        let conn = Connection::open(path).map_err(db_err)?;
        conn.busy_timeout(Duration::from_secs(5)).map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            default_max_attempts: DEFAULT_MAX_ATTEMPTS,
        })
    }

    /// Create an in-memory SQLite queue (useful for testing).
    pub fn in_memory() -> Result<Self, QueueError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            default_max_attempts: DEFAULT_MAX_ATTEMPTS,
        })
    }

    /// Attempts granted to jobs fired by recurring triggers.
    pub fn with_default_max_attempts(mut self, max_attempts: u32) -> Self {
        self.default_max_attempts = max_attempts;
        self
    }

    fn initialize_schema(conn: &Connection) -> Result<(), QueueError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS queue_jobs (
                id TEXT PRIMARY KEY,
                queue TEXT NOT NULL,
                name TEXT NOT NULL,
                payload TEXT NOT NULL,
                status TEXT NOT NULL,
                progress INTEGER NOT NULL DEFAULT 0,
                attempts INTEGER NOT NULL DEFAULT 0,
                max_attempts INTEGER NOT NULL,
                run_at TEXT NOT NULL,
                last_error TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_queue_jobs_claim ON queue_jobs(queue, status, run_at);

            CREATE TABLE IF NOT EXISTS queue_triggers (
                repeat_key TEXT PRIMARY KEY,
                queue TEXT NOT NULL,
                name TEXT NOT NULL,
                cron TEXT NOT NULL,
                payload TEXT NOT NULL,
                next_run_at TEXT NOT NULL,
                last_run_at TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_queue_triggers_next ON queue_triggers(next_run_at);
            "#,
        )
        .map_err(db_err)?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, QueueError> {
        self.conn
            .lock()
            .map_err(|_| QueueError::Database("connection lock poisoned".to_string()))
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<QueuedJob> {
        let payload: String = row.get(3)?;
        let status: String = row.get(4)?;
        let run_at: String = row.get(8)?;
        let created_at: String = row.get(10)?;
        let updated_at: String = row.get(11)?;

        Ok(QueuedJob {
            id: row.get(0)?,
            queue: row.get(1)?,
            name: row.get(2)?,
            payload: parse_payload(3, &payload)?,
            status: JobStatus::parse(&status).unwrap_or(JobStatus::Failed),
            progress: row.get(5)?,
            attempts: row.get(6)?,
            max_attempts: row.get(7)?,
            run_at: parse_timestamp(&run_at),
            last_error: row.get(9)?,
            created_at: parse_timestamp(&created_at),
            updated_at: parse_timestamp(&updated_at),
        })
    }

    fn row_to_trigger(row: &rusqlite::Row) -> rusqlite::Result<RecurringTrigger> {
        let payload: String = row.get(4)?;
        let next_run_at: String = row.get(5)?;
        let last_run_at: Option<String> = row.get(6)?;
        let created_at: String = row.get(7)?;

        Ok(RecurringTrigger {
            repeat_key: row.get(0)?,
            queue: row.get(1)?,
            name: row.get(2)?,
            cron: row.get(3)?,
            payload: parse_payload(4, &payload)?,
            next_run_at: parse_timestamp(&next_run_at),
            last_run_at: last_run_at.as_deref().map(parse_timestamp),
            created_at: parse_timestamp(&created_at),
        })
    }

    fn query_job(conn: &Connection, id: &str) -> Result<Option<QueuedJob>, QueueError> {
        conn.query_row(
            &format!("SELECT {JOB_COLUMNS} FROM queue_jobs WHERE id = ?"),
            params![id],
            Self::row_to_job,
        )
        .optional()
        .map_err(db_err)
    }

    fn query_trigger(
        conn: &Connection,
        repeat_key: &str,
    ) -> Result<Option<RecurringTrigger>, QueueError> {
        conn.query_row(
            &format!("SELECT {TRIGGER_COLUMNS} FROM queue_triggers WHERE repeat_key = ?"),
            params![repeat_key],
            Self::row_to_trigger,
        )
        .optional()
        .map_err(db_err)
    }
}

/// Id of the job a trigger fires for the slot scheduled at `scheduled_for`.
fn fired_job_id(repeat_key: &str, scheduled_for: DateTime<Utc>) -> String {
    format!("{}{}", fired_job_prefix(repeat_key), scheduled_for.timestamp_millis())
}

fn fired_job_prefix(repeat_key: &str) -> String {
    format!("repeat:{repeat_key}:")
}

#[async_trait]
impl JobQueue for SqliteJobQueue {
    async fn upsert_trigger(&self, trigger: NewTrigger) -> Result<RecurringTrigger, QueueError> {
        let now = Utc::now();
        let next_run_at = next_fire(&trigger.cron, now)?;
        let payload = serde_json::to_string(&trigger.payload)?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO queue_triggers (repeat_key, queue, name, cron, payload, next_run_at, last_run_at, created_at)
             VALUES (?, ?, ?, ?, ?, ?, NULL, ?)
             ON CONFLICT(repeat_key) DO UPDATE SET
                queue = excluded.queue,
                name = excluded.name,
                cron = excluded.cron,
                payload = excluded.payload,
                next_run_at = excluded.next_run_at",
            params![
                trigger.repeat_key,
                trigger.queue,
                trigger.name,
                trigger.cron,
                payload,
                format_timestamp(next_run_at),
                format_timestamp(now),
            ],
        )
        .map_err(db_err)?;

        debug!(
            repeat_key = %trigger.repeat_key,
            cron = %trigger.cron,
            next_run_at = %next_run_at,
            "Trigger stored"
        );

        Self::query_trigger(&conn, &trigger.repeat_key)?
            .ok_or_else(|| QueueError::Database(format!("trigger {} vanished", trigger.repeat_key)))
    }

    async fn remove_trigger(&self, repeat_key: &str) -> Result<bool, QueueError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;

        let removed = tx
            .execute(
                "DELETE FROM queue_triggers WHERE repeat_key = ?",
                params![repeat_key],
            )
            .map_err(db_err)?;

        let prefix = fired_job_prefix(repeat_key);
        let fired = tx
            .execute(
                "DELETE FROM queue_jobs
                 WHERE substr(id, 1, length(?1)) = ?1 AND status != 'active'",
                params![prefix],
            )
            .map_err(db_err)?;

        tx.commit().map_err(db_err)?;

        if fired > 0 {
            debug!(repeat_key, fired, "Removed pending fired jobs with trigger");
        }

        Ok(removed > 0)
    }

    async fn get_trigger(&self, repeat_key: &str) -> Result<Option<RecurringTrigger>, QueueError> {
        let conn = self.lock()?;
        Self::query_trigger(&conn, repeat_key)
    }

    async fn list_triggers(&self) -> Result<Vec<RecurringTrigger>, QueueError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {TRIGGER_COLUMNS} FROM queue_triggers ORDER BY next_run_at, repeat_key"
            ))
            .map_err(db_err)?;

        let rows = stmt.query_map([], Self::row_to_trigger).map_err(db_err)?;

        let mut triggers = Vec::new();
        for row in rows {
            triggers.push(row.map_err(db_err)?);
        }
        Ok(triggers)
    }

    async fn get_job(&self, id: &str) -> Result<Option<QueuedJob>, QueueError> {
        let conn = self.lock()?;
        Self::query_job(&conn, id)
    }

    async fn list_jobs(&self, queue: &str) -> Result<Vec<QueuedJob>, QueueError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {JOB_COLUMNS} FROM queue_jobs WHERE queue = ? ORDER BY created_at, id"
            ))
            .map_err(db_err)?;

        let rows = stmt
            .query_map(params![queue], Self::row_to_job)
            .map_err(db_err)?;

        let mut jobs = Vec::new();
        for row in rows {
            jobs.push(row.map_err(db_err)?);
        }
        Ok(jobs)
    }

    async fn remove_job(&self, id: &str) -> Result<bool, QueueError> {
        let conn = self.lock()?;
        let removed = conn
            .execute(
                "DELETE FROM queue_jobs WHERE id = ? AND status != 'active'",
                params![id],
            )
            .map_err(db_err)?;
        Ok(removed > 0)
    }

    async fn add_bulk(&self, jobs: Vec<NewJob>) -> Result<Vec<String>, QueueError> {
        if jobs.is_empty() {
            return Ok(Vec::new());
        }

        let now = format_timestamp(Utc::now());
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;
        let mut inserted = Vec::with_capacity(jobs.len());

        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR IGNORE INTO queue_jobs
                     (id, queue, name, payload, status, progress, attempts, max_attempts, run_at, last_error, created_at, updated_at)
                     VALUES (?, ?, ?, ?, 'pending', 0, 0, ?, ?, NULL, ?, ?)",
                )
                .map_err(db_err)?;

            for job in jobs {
                let payload = serde_json::to_string(&job.payload)?;
                let changed = stmt
                    .execute(params![
                        job.id,
                        job.queue,
                        job.name,
                        payload,
                        job.max_attempts,
                        now,
                        now,
                        now,
                    ])
                    .map_err(db_err)?;

                if changed > 0 {
                    inserted.push(job.id);
                } else {
                    debug!(job_id = %job.id, "Job already queued, skipped");
                }
            }
        }

        tx.commit().map_err(db_err)?;
        Ok(inserted)
    }

    async fn promote_due_triggers(&self, now: DateTime<Utc>) -> Result<usize, QueueError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;
        let now_str = format_timestamp(now);

        let due = {
            let mut stmt = tx
                .prepare(&format!(
                    "SELECT {TRIGGER_COLUMNS} FROM queue_triggers WHERE next_run_at <= ?"
                ))
                .map_err(db_err)?;
            let rows = stmt
                .query_map(params![now_str], Self::row_to_trigger)
                .map_err(db_err)?;
            let mut due = Vec::new();
            for row in rows {
                due.push(row.map_err(db_err)?);
            }
            due
        };

        let mut added = 0;
        for trigger in due {
            let job_id = fired_job_id(&trigger.repeat_key, trigger.next_run_at);
            added += tx
                .execute(
                    "INSERT OR IGNORE INTO queue_jobs
                     (id, queue, name, payload, status, progress, attempts, max_attempts, run_at, last_error, created_at, updated_at)
                     VALUES (?, ?, ?, ?, 'pending', 0, 0, ?, ?, NULL, ?, ?)",
                    params![
                        job_id,
                        trigger.queue,
                        trigger.name,
                        serde_json::to_string(&trigger.payload)?,
                        self.default_max_attempts,
                        now_str,
                        now_str,
                        now_str,
                    ],
                )
                .map_err(db_err)?;

            // Missed slots are skipped rather than replayed
            let next = next_fire(&trigger.cron, now)?;
            tx.execute(
                "UPDATE queue_triggers SET next_run_at = ?, last_run_at = ? WHERE repeat_key = ?",
                params![format_timestamp(next), now_str, trigger.repeat_key],
            )
            .map_err(db_err)?;

            info!(repeat_key = %trigger.repeat_key, job_id = %job_id, "Trigger fired");
        }

        tx.commit().map_err(db_err)?;
        Ok(added)
    }

    async fn claim_next(
        &self,
        queue: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<QueuedJob>, QueueError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;
        let now_str = format_timestamp(now);

        let id: Option<String> = tx
            .query_row(
                "SELECT id FROM queue_jobs
                 WHERE queue = ? AND status = 'pending' AND run_at <= ?
                 ORDER BY run_at, created_at, id
                 LIMIT 1",
                params![queue, now_str],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;

        let Some(id) = id else {
            return Ok(None);
        };

        tx.execute(
            "UPDATE queue_jobs
             SET status = 'active', attempts = attempts + 1, progress = 0, updated_at = ?
             WHERE id = ?",
            params![now_str, id],
        )
        .map_err(db_err)?;

        let job = Self::query_job(&tx, &id)?;
        tx.commit().map_err(db_err)?;
        Ok(job)
    }

    async fn report_progress(&self, id: &str, progress: u8) -> Result<(), QueueError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE queue_jobs SET progress = ?, updated_at = ? WHERE id = ?",
            params![progress.min(100), format_timestamp(Utc::now()), id],
        )
        .map_err(db_err)?;
        Ok(())
    }

    async fn complete(&self, id: &str) -> Result<(), QueueError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM queue_jobs WHERE id = ?", params![id])
            .map_err(db_err)?;
        Ok(())
    }

    async fn fail(
        &self,
        id: &str,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<(), QueueError> {
        let conn = self.lock()?;
        let now = format_timestamp(Utc::now());

        match retry_at {
            Some(retry_at) => conn.execute(
                "UPDATE queue_jobs
                 SET status = 'pending', run_at = ?, last_error = ?, updated_at = ?
                 WHERE id = ?",
                params![format_timestamp(retry_at), error, now, id],
            ),
            None => conn.execute(
                "UPDATE queue_jobs SET status = 'failed', last_error = ?, updated_at = ? WHERE id = ?",
                params![error, now, id],
            ),
        }
        .map_err(db_err)?;

        Ok(())
    }

    async fn recover_stalled(&self) -> Result<usize, QueueError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE queue_jobs SET status = 'pending', updated_at = ? WHERE status = 'active'",
            params![format_timestamp(Utc::now())],
        )
        .map_err(db_err)
    }

    async fn stats(&self) -> Result<QueueStats, QueueError> {
        let conn = self.lock()?;
        let mut stats = QueueStats::default();

        let mut stmt = conn
            .prepare("SELECT status, COUNT(*) FROM queue_jobs GROUP BY status")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(db_err)?;

        for row in rows {
            let (status, count) = row.map_err(db_err)?;
            match JobStatus::parse(&status) {
                Some(JobStatus::Pending) => stats.pending = count as u64,
                Some(JobStatus::Active) => stats.active = count as u64,
                Some(JobStatus::Failed) => stats.failed = count as u64,
                None => {}
            }
        }

        stats.triggers = conn
            .query_row("SELECT COUNT(*) FROM queue_triggers", [], |row| {
                row.get::<_, i64>(0)
            })
            .map_err(db_err)? as u64;

        Ok(stats)
    }
}

fn db_err(e: rusqlite::Error) -> QueueError {
    QueueError::Database(e.to_string())
}

fn parse_payload(column: usize, raw: &str) -> rusqlite::Result<serde_json::Value> {
    serde_json::from_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
