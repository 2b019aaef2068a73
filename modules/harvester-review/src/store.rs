//! SQLite persistence for lane state and the append-only audit log (§5:
//! "Review State mutations are serialized per `(lane, target_key)` via a
//! keyed lock"; here that lock is SQLite's single-writer WAL connection).

use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use crate::error::Result;
use crate::types::{AuditEvent, ReviewState, TargetKey};

#[derive(Clone)]
pub struct ReviewStore {
    pool: SqlitePool,
}

impl ReviewStore {
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
            CREATE TABLE IF NOT EXISTS review_lane_state (
                key_id TEXT PRIMARY KEY,
                lane TEXT NOT NULL,
                state_json TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS review_audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                key_id TEXT NOT NULL,
                lane TEXT NOT NULL,
                action TEXT NOT NULL,
                prev_state_json TEXT,
                new_state_json TEXT NOT NULL,
                at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_audit_key ON review_audit_log(key_id)")
            .execute(&pool)
            .await?;

        Ok(Self { pool })
    }

    /// Persist a transition's resulting state plus its audit event. The
    /// audit table is append-only (invariant 8); the lane-state table is
    /// the one place a row is overwritten, by design — it's a projection,
    /// not the log of record.
    pub async fn apply(&self, key: &TargetKey, new_state: &ReviewState, event: &AuditEvent) -> Result<()> {
        let key_id = key.stable_id();
        let lane = serde_json::to_string(&event.lane)?;
        let state_json = serde_json::to_string(new_state)?;

        sqlx::query(
            r#"
            INSERT INTO review_lane_state (key_id, lane, state_json, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(key_id) DO UPDATE SET state_json = excluded.state_json, updated_at = excluded.updated_at
            "#,
        )
        .bind(&key_id)
        .bind(&lane)
        .bind(&state_json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        let prev_json = event.prev_state.as_ref().map(serde_json::to_string).transpose()?;
        let action = serde_json::to_string(&event.action)?;
        let new_json = serde_json::to_string(&event.new_state)?;

        sqlx::query(
            r#"
            INSERT INTO review_audit_log (key_id, lane, action, prev_state_json, new_state_json, at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&key_id)
        .bind(&lane)
        .bind(&action)
        .bind(prev_json)
        .bind(&new_json)
        .bind(event.at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn current_state(&self, key: &TargetKey) -> Result<Option<ReviewState>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT state_json FROM review_lane_state WHERE key_id = ?")
                .bind(key.stable_id())
                .fetch_optional(&self.pool)
                .await?;

        Ok(match row {
            Some((json,)) => Some(serde_json::from_str(&json)?),
            None => None,
        })
    }

    pub async fn audit_log_for(&self, key: &TargetKey) -> Result<Vec<AuditEvent>> {
        let rows = sqlx::query(
            "SELECT key_id, lane, action, prev_state_json, new_state_json, at FROM review_audit_log WHERE key_id = ? ORDER BY id ASC",
        )
        .bind(key.stable_id())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| {
                let prev_json: Option<String> = r.try_get("prev_state_json").ok();
                let at_str: String = r.get("at");
                Ok(AuditEvent {
                    key_id: r.get("key_id"),
                    lane: serde_json::from_str(&r.get::<String, _>("lane"))?,
                    action: serde_json::from_str(&r.get::<String, _>("action"))?,
                    prev_state: prev_json.map(|j| serde_json::from_str(&j)).transpose()?,
                    new_state: serde_json::from_str(&r.get::<String, _>("new_state_json"))?,
                    at: at_str.parse().unwrap_or_else(|_| Utc::now()),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transitions::primary_accept;

    #[tokio::test]
    async fn apply_persists_state_and_appends_audit_row() {
        let store = ReviewStore::open_in_memory().await.unwrap();
        let key = TargetKey::Grid { product_id: "p1".into(), field_key: "weight_kg".into() };

        let (state1, event1) = primary_accept(&key, &ReviewState::AiPending, "c1", "60", Utc::now());
        store.apply(&key, &state1, &event1).await.unwrap();

        let (state2, event2) = primary_accept(&key, &state1, "c2", "62", Utc::now());
        store.apply(&key, &state2, &event2).await.unwrap();

        let current = store.current_state(&key).await.unwrap().unwrap();
        assert_eq!(current, state2);

        let log = store.audit_log_for(&key).await.unwrap();
        assert_eq!(log.len(), 2, "audit log is append-only across both transitions");
    }
}
