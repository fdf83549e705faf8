use crate::domain::VectorKind;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorMatch {
    pub id: u64,
    pub similarity: f64,
}

/// Vector-similarity storage, keyed by kind (burn / weather / plume).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(&self, kind: VectorKind, id: u64, vector: &[f64]) -> anyhow::Result<()>;

    /// Top-k cosine matches with similarity >= `min_sim`.
    async fn search(
        &self,
        kind: VectorKind,
        vector: &[f64],
        k: usize,
        min_sim: f64,
    ) -> anyhow::Result<Vec<VectorMatch>>;
}
