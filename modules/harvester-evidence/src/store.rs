//! SQLite persistence for the evidence index. Content-addressed, FTS-backed
//! with a substring fallback (§4.1).

use chrono::Utc;
use harvester_common::content_hash;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::warn;

use crate::error::Result;
use crate::types::{DocumentSummary, OccurrenceMeta, PutResult, PutStatus, Scope, SearchHit};

#[derive(Clone)]
pub struct EvidenceStore {
    pool: SqlitePool,
    fts_available: bool,
}

impl EvidenceStore {
    pub async fn open(path: &str) -> Result<Self> {
        let url = format!("sqlite://{path}?mode=rwc");
        let pool = SqlitePoolOptions::new().max_connections(1).connect(&url).await?;
        Self::from_pool(pool).await
    }

    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query("PRAGMA journal_mode=WAL").execute(&pool).await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS snippets (
                snippet_id TEXT PRIMARY KEY,
                text TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                quarantined INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS occurrences (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                snippet_id TEXT NOT NULL REFERENCES snippets(snippet_id),
                source_id TEXT NOT NULL,
                run_id TEXT,
                product_id TEXT,
                category TEXT,
                field_key TEXT,
                assertion_id TEXT,
                tier INTEGER,
                retrieved_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_occ_source ON occurrences(source_id)")
            .execute(&pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_occ_run ON occurrences(run_id)")
            .execute(&pool)
            .await?;

        // FTS5 is a compile-time feature of the bundled sqlite3; probe it
        // once at startup rather than per query.
        let fts_available = sqlx::query(
            "CREATE VIRTUAL TABLE IF NOT EXISTS snippets_fts USING fts5(snippet_id UNINDEXED, text)",
        )
        .execute(&pool)
        .await
        .is_ok();

        if !fts_available {
            warn!("FTS5 unavailable in this sqlite build; search() falls back to substring ranking");
        }

        Ok(Self { pool, fts_available })
    }

    /// Index `snippet_text`, deduplicating on its content hash. Records an
    /// occurrence linking the (possibly shared) snippet to `source_id`.
    pub async fn put(
        &self,
        source_id: &str,
        snippet_text: &str,
        meta: OccurrenceMeta,
    ) -> Result<PutResult> {
        let hash = content_hash(snippet_text);
        let snippet_id = hash.clone();

        let existing: Option<String> = sqlx::query_scalar("SELECT snippet_id FROM snippets WHERE snippet_id = ?")
            .bind(&snippet_id)
            .fetch_optional(&self.pool)
            .await?;

        let status = if existing.is_none() {
            sqlx::query(
                "INSERT INTO snippets (snippet_id, text, content_hash, quarantined, created_at) VALUES (?, ?, ?, 0, ?)",
            )
            .bind(&snippet_id)
            .bind(snippet_text)
            .bind(&hash)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;

            if self.fts_available {
                sqlx::query("INSERT INTO snippets_fts (snippet_id, text) VALUES (?, ?)")
                    .bind(&snippet_id)
                    .bind(snippet_text)
                    .execute(&self.pool)
                    .await?;
            }
            PutStatus::New
        } else {
            let already_for_source: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM occurrences WHERE snippet_id = ? AND source_id = ?",
            )
            .bind(&snippet_id)
            .bind(source_id)
            .fetch_one(&self.pool)
            .await?;

            if already_for_source > 0 {
                PutStatus::Reused
            } else {
                PutStatus::Updated
            }
        };

        sqlx::query(
            r#"
            INSERT INTO occurrences
                (snippet_id, source_id, run_id, product_id, category, field_key, assertion_id, tier, retrieved_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&snippet_id)
        .bind(source_id)
        .bind(&meta.run_id)
        .bind(&meta.product_id)
        .bind(&meta.category)
        .bind(&meta.field_key)
        .bind(&meta.assertion_id)
        .bind(meta.tier)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(PutResult { snippet_id, status })
    }

    /// Full-text search scoped to a run/product/category, with a
    /// case-insensitive substring fallback when FTS5 is unavailable.
    pub async fn search(&self, query: &str, scope: Scope, limit: i64) -> Result<Vec<SearchHit>> {
        if self.fts_available {
            let sql = format!(
                r#"
                SELECT o.snippet_id, o.source_id, o.field_key, o.assertion_id, o.tier, s.text
                FROM snippets_fts f
                JOIN snippets s ON s.snippet_id = f.snippet_id
                JOIN occurrences o ON o.snippet_id = f.snippet_id
                WHERE f.text MATCH ? AND s.quarantined = 0 AND o.{col} = ?
                LIMIT ?
                "#,
                col = scope.column()
            );
            let rows = sqlx::query(&sql)
                .bind(query)
                .bind(scope.value())
                .bind(limit)
                .fetch_all(&self.pool)
                .await;

            if let Ok(rows) = rows {
                return Ok(rows.iter().map(|r| row_to_hit(r, query)).collect());
            }
        }

        let sql = format!(
            r#"
            SELECT o.snippet_id, o.source_id, o.field_key, o.assertion_id, o.tier, s.text
            FROM snippets s
            JOIN occurrences o ON o.snippet_id = s.snippet_id
            WHERE s.quarantined = 0 AND o.{col} = ? AND s.text LIKE ?
            LIMIT ?
            "#,
            col = scope.column()
        );
        let like_pattern = format!("%{query}%");
        let rows = sqlx::query(&sql)
            .bind(scope.value())
            .bind(&like_pattern)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|r| row_to_hit(r, query)).collect())
    }

    /// Document summaries (one per source) with artifact and unique-hash counts.
    pub async fn list_documents(&self, scope: Scope) -> Result<Vec<DocumentSummary>> {
        let sql = format!(
            r#"
            SELECT source_id, COUNT(*) as artifact_count, COUNT(DISTINCT snippet_id) as unique_hash_count
            FROM occurrences
            WHERE {col} = ?
            GROUP BY source_id
            "#,
            col = scope.column()
        );
        let rows = sqlx::query(&sql).bind(scope.value()).fetch_all(&self.pool).await?;

        Ok(rows
            .iter()
            .map(|r| DocumentSummary {
                source_id: r.get("source_id"),
                artifact_count: r.get("artifact_count"),
                unique_hash_count: r.get("unique_hash_count"),
            })
            .collect())
    }

    /// Quarantine a snippet whose stored hash no longer matches its text.
    /// Evidence is retained; callers mark the owning assertion `evidence_broken`.
    pub async fn quarantine_if_corrupt(&self, snippet_id: &str) -> Result<bool> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT text, content_hash FROM snippets WHERE snippet_id = ?")
                .bind(snippet_id)
                .fetch_optional(&self.pool)
                .await?;

        let Some((text, stored_hash)) = row else {
            return Ok(false);
        };

        if content_hash(&text) == stored_hash {
            return Ok(false);
        }

        sqlx::query("UPDATE snippets SET quarantined = 1 WHERE snippet_id = ?")
            .bind(snippet_id)
            .execute(&self.pool)
            .await?;
        warn!(snippet_id, "quarantined snippet with mismatched content hash");
        Ok(true)
    }
}

fn row_to_hit(row: &sqlx::sqlite::SqliteRow, query: &str) -> SearchHit {
    let text: String = row.get("text");
    let preview: String = text.chars().take(200).collect();
    let highlighted = highlight(&text, query);
    SearchHit {
        snippet_id: row.get("snippet_id"),
        source_id: row.get("source_id"),
        field_key: row.try_get("field_key").ok(),
        assertion_id: row.try_get("assertion_id").ok(),
        tier: row.try_get("tier").ok(),
        highlighted_quote: highlighted,
        snippet_preview: preview,
    }
}

fn highlight(text: &str, query: &str) -> String {
    let lower_text = text.to_lowercase();
    let lower_query = query.to_lowercase();
    match lower_text.find(&lower_query) {
        Some(pos) => {
            let start = pos.saturating_sub(40);
            let end = (pos + query.len() + 40).min(text.len());
            format!("...{}...", &text[start..end])
        }
        None => text.chars().take(120).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_dedupes_identical_text_across_sources() {
        let store = EvidenceStore::open_in_memory().await.unwrap();
        let meta = OccurrenceMeta {
            run_id: Some("r1".into()),
            ..Default::default()
        };

        let first = store.put("src-a", "Battery life is 12 hours.", meta.clone()).await.unwrap();
        assert_eq!(first.status, PutStatus::New);

        let second = store.put("src-b", "Battery life is 12 hours.", meta.clone()).await.unwrap();
        assert_eq!(second.status, PutStatus::Updated);
        assert_eq!(first.snippet_id, second.snippet_id);

        let third = store.put("src-b", "Battery life is 12 hours.", meta).await.unwrap();
        assert_eq!(third.status, PutStatus::Reused);
    }

    #[tokio::test]
    async fn search_finds_indexed_text_in_scope() {
        let store = EvidenceStore::open_in_memory().await.unwrap();
        store
            .put(
                "src-a",
                "Weighs 1.2kg with the stand attached.",
                OccurrenceMeta {
                    run_id: Some("r1".into()),
                    field_key: Some("weight".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let hits = store.search("weighs", Scope::Run("r1".into()), 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].field_key.as_deref(), Some("weight"));

        let miss = store.search("weighs", Scope::Run("other".into()), 10).await.unwrap();
        assert!(miss.is_empty());
    }

    #[tokio::test]
    async fn list_documents_counts_per_source() {
        let store = EvidenceStore::open_in_memory().await.unwrap();
        let meta = OccurrenceMeta {
            product_id: Some("p1".into()),
            ..Default::default()
        };
        store.put("src-a", "text one", meta.clone()).await.unwrap();
        store.put("src-a", "text two", meta).await.unwrap();

        let docs = store.list_documents(Scope::Product("p1".into())).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].artifact_count, 2);
        assert_eq!(docs[0].unique_hash_count, 2);
    }

    #[tokio::test]
    async fn quarantine_detects_tampered_hash() {
        let store = EvidenceStore::open_in_memory().await.unwrap();
        let put = store.put("src-a", "original text", OccurrenceMeta::default()).await.unwrap();

        sqlx::query("UPDATE snippets SET text = 'tampered text' WHERE snippet_id = ?")
            .bind(&put.snippet_id)
            .execute(&store.pool)
            .await
            .unwrap();

        let quarantined = store.quarantine_if_corrupt(&put.snippet_id).await.unwrap();
        assert!(quarantined);
    }
}
