//! Embedding Provider: text → fixed-dimension float vector.

mod error;
mod mock;
mod remote;

pub use error::EmbeddingError;
pub use mock::MockEmbeddingProvider;
pub use remote::RemoteEmbeddingProvider;

use async_trait::async_trait;

/// Converts text to a dense vector, reports its health, and names itself.
///
/// Two implementations exist: [`RemoteEmbeddingProvider`], backed by a
/// local model server, and [`MockEmbeddingProvider`], a deterministic
/// fallback bound once at startup if the remote probe fails (
/// "Provider selection" — no live re-probing).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds a single piece of text. Individual failures are surfaced to
    /// the caller rather than silently degraded.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embeds a batch of texts; implementations may pipeline internally
    /// but make no ordering promise beyond returning results in input
    /// order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// The fixed dimension of vectors this provider produces.
    fn dimensions(&self) -> usize;

    /// A human-readable model identifier, surfaced in diagnostics.
    fn model_name(&self) -> &str;

    /// Checks reachability within a short deadline. Used only at startup:
    /// health probes use a 2s deadline; no live re-probing thereafter.
    async fn health_probe(&self) -> Result<(), EmbeddingError>;
}
