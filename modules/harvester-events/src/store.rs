//! EventStore — append-only fact store backed by SQLite (WAL mode, §5:
//! "writers serialize on a single connection, readers may be concurrent").
//!
//! Gap-free reads are guaranteed internally. Consumers never see id gaps
//! from rolled-back or in-flight transactions. This is the store's job.

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::warn;

use crate::types::{AppendEvent, StoredEvent};

/// Append-only fact store. The single source of truth for the run's audit
/// trail (distinct from `tracing` operational logs, see SPEC_FULL.md).
#[derive(Clone)]
pub struct EventStore {
    pool: SqlitePool,
}

impl EventStore {
    /// Open (creating if absent) the SQLite-backed event log at `path`.
    pub async fn open(path: &str) -> Result<Self> {
        let url = format!("sqlite://{path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(1) // single writer connection per §5
            .connect(&url)
            .await?;

        sqlx::query("PRAGMA journal_mode=WAL").execute(&pool).await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                ts TEXT NOT NULL,
                stage TEXT NOT NULL,
                event TEXT NOT NULL,
                scope TEXT NOT NULL,
                parent_seq INTEGER,
                caused_by_seq INTEGER,
                run_id TEXT,
                actor TEXT,
                payload TEXT NOT NULL,
                schema_v INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_run_id ON events(run_id)")
            .execute(&pool)
            .await?;

        Ok(Self { pool })
    }

    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await?;
        sqlx::query(
            r#"
            CREATE TABLE events (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                ts TEXT NOT NULL,
                stage TEXT NOT NULL,
                event TEXT NOT NULL,
                scope TEXT NOT NULL,
                parent_seq INTEGER,
                caused_by_seq INTEGER,
                run_id TEXT,
                actor TEXT,
                payload TEXT NOT NULL,
                schema_v INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }

    /// Append a root fact (no parent). Returns a handle for emitting children.
    pub async fn append(&self, event: AppendEvent) -> Result<EventHandle> {
        let stored = self.insert(&event, None, None).await?;
        Ok(EventHandle {
            seq: stored.seq,
            caused_by: stored.seq,
            store: self.clone(),
            run_id: event.run_id,
            actor: event.actor,
        })
    }

    /// Append a root fact and return the full StoredEvent.
    pub async fn append_and_read(&self, event: AppendEvent) -> Result<StoredEvent> {
        self.insert(&event, None, None).await
    }

    /// Append a fact chained off `parent_seq` and return the full StoredEvent.
    /// For callers (e.g. the dispatch engine) that track causal chains themselves
    /// rather than threading an `EventHandle` through.
    pub async fn append_child_and_read(
        &self,
        parent_seq: i64,
        event: AppendEvent,
    ) -> Result<StoredEvent> {
        self.insert(&event, Some(parent_seq), Some(parent_seq)).await
    }

    async fn insert(
        &self,
        event: &AppendEvent,
        parent_seq: Option<i64>,
        caused_by_seq: Option<i64>,
    ) -> Result<StoredEvent> {
        let now = chrono::Utc::now();
        let payload_text = serde_json::to_string(&event.payload)?;

        let row = sqlx::query(
            r#"
            INSERT INTO events (ts, stage, event, scope, parent_seq, caused_by_seq, run_id, actor, payload, schema_v)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING seq
            "#,
        )
        .bind(now.to_rfc3339())
        .bind(&event.stage)
        .bind(&event.event)
        .bind(&event.scope)
        .bind(parent_seq)
        .bind(caused_by_seq)
        .bind(&event.run_id)
        .bind(&event.actor)
        .bind(&payload_text)
        .bind(event.schema_v)
        .fetch_one(&self.pool)
        .await?;

        let seq: i64 = row.try_get("seq")?;
        Ok(StoredEvent {
            seq,
            ts: now,
            stage: event.stage.clone(),
            event: event.event.clone(),
            scope: event.scope.clone(),
            parent_seq,
            caused_by_seq,
            run_id: event.run_id.clone(),
            actor: event.actor.clone(),
            payload: event.payload.clone(),
            schema_v: event.schema_v,
        })
    }

    /// Read facts in flat sequence order starting from `seq_start` (inclusive).
    ///
    /// **Gap-free guarantee:** stops at the first gap in the sequence so a
    /// concurrent in-flight insert is never skipped over; the next call
    /// picks up once the gap closes.
    pub async fn read_from(&self, seq_start: i64, limit: usize) -> Result<Vec<StoredEvent>> {
        let rows = sqlx::query(
            "SELECT * FROM events WHERE seq >= ? ORDER BY seq ASC LIMIT ?",
        )
        .bind(seq_start)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut result = Vec::with_capacity(rows.len());
        let mut expected_seq = seq_start;
        for row in rows {
            let event = row_to_event(&row)?;
            if event.seq != expected_seq {
                break;
            }
            expected_seq = event.seq + 1;
            result.push(event);
        }
        Ok(result)
    }

    pub async fn read_by_run(&self, run_id: &str) -> Result<Vec<StoredEvent>> {
        let rows = sqlx::query("SELECT * FROM events WHERE run_id = ? ORDER BY seq ASC")
            .bind(run_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_event).collect()
    }

    pub async fn read_by_type(&self, stage: &str, event: &str, limit: usize) -> Result<Vec<StoredEvent>> {
        let rows = sqlx::query(
            "SELECT * FROM events WHERE stage = ? AND event = ? ORDER BY seq ASC LIMIT ?",
        )
        .bind(stage)
        .bind(event)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_event).collect()
    }

    pub async fn latest_seq(&self) -> Result<i64> {
        let row = sqlx::query("SELECT MAX(seq) as m FROM events").fetch_one(&self.pool).await?;
        let m: Option<i64> = row.try_get("m")?;
        Ok(m.unwrap_or(0))
    }

    #[cfg(test)]
    pub async fn read_all(&self) -> Result<Vec<StoredEvent>> {
        let rows = sqlx::query("SELECT * FROM events ORDER BY seq ASC").fetch_all(&self.pool).await?;
        rows.iter().map(row_to_event).collect()
    }
}

fn row_to_event(row: &sqlx::sqlite::SqliteRow) -> Result<StoredEvent> {
    let payload_text: String = row.try_get("payload")?;
    let payload = serde_json::from_str(&payload_text).unwrap_or(serde_json::Value::Null);
    let ts_text: String = row.try_get("ts")?;
    let ts = chrono::DateTime::parse_from_rfc3339(&ts_text)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(|_| chrono::Utc::now());

    Ok(StoredEvent {
        seq: row.try_get("seq")?,
        ts,
        stage: row.try_get("stage")?,
        event: row.try_get("event")?,
        scope: row.try_get("scope")?,
        parent_seq: row.try_get("parent_seq")?,
        caused_by_seq: row.try_get("caused_by_seq")?,
        run_id: row.try_get("run_id")?,
        actor: row.try_get("actor")?,
        payload,
        schema_v: row.try_get("schema_v")?,
    })
}

/// Handle returned by append(). Use to emit child events in the same causal chain.
pub struct EventHandle {
    seq: i64,
    caused_by: i64,
    store: EventStore,
    run_id: Option<String>,
    actor: Option<String>,
}

impl EventHandle {
    /// Append a child fact caused by this event. Returns a handle for grandchildren.
    pub async fn append(&self, mut event: AppendEvent) -> Result<EventHandle> {
        event.run_id = event.run_id.or_else(|| self.run_id.clone());
        event.actor = event.actor.or_else(|| self.actor.clone());

        let stored = self
            .store
            .insert(&event, Some(self.seq), Some(self.caused_by))
            .await?;

        Ok(EventHandle {
            seq: stored.seq,
            caused_by: self.caused_by,
            store: self.store.clone(),
            run_id: stored.run_id,
            actor: stored.actor,
        })
    }

    /// Fire-and-forget: append a child fact, discard the handle.
    pub fn log(&self, mut event: AppendEvent) {
        event.run_id = event.run_id.or_else(|| self.run_id.clone());
        event.actor = event.actor.or_else(|| self.actor.clone());

        let store = self.store.clone();
        let seq = self.seq;
        let caused_by = self.caused_by;
        tokio::spawn(async move {
            if let Err(e) = store.insert(&event, Some(seq), Some(caused_by)).await {
                warn!(error = %e, "failed to log fire-and-forget event");
            }
        });
    }

    pub fn seq(&self) -> i64 {
        self.seq
    }

    pub fn caused_by(&self) -> i64 {
        self.caused_by
    }
}
