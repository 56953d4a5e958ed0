//! Utility modules: retry with backoff, shared randomness.

pub mod retry;

/// Simple pseudo-random factor [0, 1) without pulling in the rand crate.
/// Used for backoff jitter and the rate limiter's probabilistic sweep.
pub(crate) fn rand_factor() -> f64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
        .hash(&mut hasher);
    std::thread::current().id().hash(&mut hasher);

    let hash = hasher.finish();
    (hash % 10000) as f64 / 10000.0
}
