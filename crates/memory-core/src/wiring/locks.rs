use tokio::sync::{Mutex, MutexGuard};

/// Number of stripes in the per-id lock table. A striped lock keyed by
/// `hash(id) mod N` is sufficient to serialize per-id writes without
/// a single global mutex; 64 is a reasonable default for typical
/// concurrency levels.
const STRIPE_COUNT: usize = 64;

/// Serializes operations targeting the same memory id so that two
/// concurrent requests for the same id never interleave their writes
/// to the relational store and the vector index. Cross-id operations
/// are not ordered by this table.
///
/// Uses BLAKE3, truncated to 64 bits, as the stripe-selection hash.
pub struct StripedLocks {
    stripes: Vec<Mutex<()>>,
}

impl Default for StripedLocks {
    fn default() -> Self {
        Self::new()
    }
}

impl StripedLocks {
    pub fn new() -> Self {
        Self {
            stripes: (0..STRIPE_COUNT).map(|_| Mutex::new(())).collect(),
        }
    }

    fn stripe_index(id: &str) -> usize {
        let hash = blake3::hash(id.as_bytes());
        let bytes: [u8; 8] = hash.as_bytes()[0..8].try_into().expect("blake3 output >= 8 bytes");
        (u64::from_le_bytes(bytes) % STRIPE_COUNT as u64) as usize
    }

    /// Acquires the stripe guarding `id`. Held until the returned guard
    /// is dropped.
    pub async fn acquire(&self, id: &str) -> MutexGuard<'_, ()> {
        self.stripes[Self::stripe_index(id)].lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stripe_index_is_deterministic() {
        assert_eq!(StripedLocks::stripe_index("memory-1"), StripedLocks::stripe_index("memory-1"));
    }

    #[tokio::test]
    async fn acquire_serializes_same_id() {
        let locks = StripedLocks::new();
        let _guard = locks.acquire("a").await;
        // A second acquire on a different id must not block on the same stripe
        // unless it hashes to the same stripe; exercise the common path here.
        drop(_guard);
        let _guard2 = locks.acquire("a").await;
    }
}
