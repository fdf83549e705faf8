use async_trait::async_trait;

/// Text embedding capability. `dims` must be 64 or 128. A deterministic
/// local feature map may stand in for a remote model.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str, dims: usize) -> anyhow::Result<Vec<f64>>;
}
