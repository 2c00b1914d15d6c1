use super::error::VectorIndexError;
use super::VectorIndex;

/// Runs a mutating call against `index`, and if it fails with
/// `CollectionNotFound`, creates the collection and retries exactly once.
/// A second failure after the retry is returned as-is.
///
/// This is a combinator rather than per-backend logic so the retry policy
/// is written once and applies identically to the remote and mock index.
pub async fn with_lazy_collection<'a, T, F, Fut>(
    index: &'a dyn VectorIndex,
    collection: &'a str,
    dimensions: usize,
    mut call: F,
) -> Result<T, VectorIndexError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, VectorIndexError>> + 'a,
{
    match call().await {
        Err(VectorIndexError::CollectionNotFound { .. }) => {
            index.create_collection(collection, dimensions).await?;
            call().await
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::vector::mock::MockVectorIndex;
    use crate::vector::{Metadata, VectorRecord};

    #[tokio::test]
    async fn retries_once_after_creating_missing_collection() {
        let index = MockVectorIndex::new();
        let attempts = AtomicUsize::new(0);

        let result = with_lazy_collection(&index, "new-collection", 2, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            index.store(
                "new-collection",
                VectorRecord {
                    id: "a".to_string(),
                    vector: vec![1.0, 0.0],
                    metadata: Metadata::new(),
                },
            )
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn does_not_retry_non_missing_collection_errors() {
        let index = MockVectorIndex::new();
        index.create_collection("c", 2).await.unwrap();
        let attempts = AtomicUsize::new(0);

        let result = with_lazy_collection(&index, "c", 2, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            index.store(
                "c",
                VectorRecord {
                    id: "a".to_string(),
                    vector: vec![1.0, 0.0, 0.0],
                    metadata: Metadata::new(),
                },
            )
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
