/// SQLite-backed vector store.
///
/// Vectors are persisted as JSON arrays of doubles with a fixed length per
/// kind; the encoder rejects NaN and infinities before anything reaches a
/// row. Search is a brute-force cosine scan, which is plenty for the
/// per-region corpus sizes this system sees.
use async_trait::async_trait;
use burnflow_core::domain::{cosine_similarity, decode_vector, encode_vector, VectorKind};
use burnflow_core::ports::{VectorMatch, VectorStore};
use chrono::Utc;
use sqlx::{query, query_as, FromRow, SqlitePool};

use crate::error::StorageError;

pub struct SqliteVectorStore {
    pool: SqlitePool,
}

#[derive(Debug, FromRow)]
struct VectorRow {
    entity_id: i64,
    vector: String,
}

impl SqliteVectorStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn upsert(&self, kind: VectorKind, id: u64, vector: &[f64]) -> anyhow::Result<()> {
        let encoded = encode_vector(kind, vector)
            .map_err(|e| anyhow::anyhow!("refusing to persist vector for {id}: {e}"))?;

        query(
            "INSERT INTO vectors (kind, entity_id, vector, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(kind, entity_id) DO UPDATE SET
                vector = excluded.vector,
                updated_at = excluded.updated_at",
        )
        .bind(kind.as_str())
        .bind(id as i64)
        .bind(encoded.to_string())
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn search(
        &self,
        kind: VectorKind,
        vector: &[f64],
        k: usize,
        min_sim: f64,
    ) -> anyhow::Result<Vec<VectorMatch>> {
        let rows = query_as::<_, VectorRow>(
            "SELECT entity_id, vector FROM vectors WHERE kind = ?",
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut matches = Vec::new();
        for row in rows {
            let corrupt = |reason: String| StorageError::CorruptVector {
                kind: kind.as_str().to_string(),
                entity_id: row.entity_id,
                reason,
            };
            let value: serde_json::Value =
                serde_json::from_str(&row.vector).map_err(|e| corrupt(e.to_string()))?;
            let stored = decode_vector(kind, &value).map_err(|e| corrupt(e.to_string()))?;
            let similarity = cosine_similarity(vector, &stored);
            if similarity >= min_sim {
                matches.push(VectorMatch {
                    id: row.entity_id as u64,
                    similarity,
                });
            }
        }

        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
        matches.truncate(k);
        Ok(matches)
    }
}
