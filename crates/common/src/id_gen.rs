//! Identifier generation.
//!
//! Services take an `Arc<dyn IdGenerator>` so tests can supply deterministic
//! ids while production uses a collision-free counter.

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

/// Produces unique identifier strings.
pub trait IdGenerator: Send + Sync {
    /// Returns the next identifier. Never returns the same value twice for
    /// the lifetime of the generator.
    fn next_id(&self) -> String;
}

/// Monotonic counter rendered as `PREFIX-000001`.
#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIdGenerator {
    /// Creates a generator starting at 1.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::starting_at(prefix, 1)
    }

    /// Creates a generator whose first id uses `start`.
    pub fn starting_at(prefix: impl Into<String>, start: u64) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(start),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{:06}", self.prefix, n)
    }
}

/// Random UUID v4 identifiers, optionally prefixed.
#[derive(Debug, Default)]
pub struct UuidIdGenerator {
    prefix: Option<String>,
}

impl UuidIdGenerator {
    /// Creates an unprefixed generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a generator rendering `PREFIX-<uuid>`.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }
}

impl IdGenerator for UuidIdGenerator {
    fn next_id(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}-{}", Uuid::new_v4()),
            None => Uuid::new_v4().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn sequential_ids_are_zero_padded_and_increasing() {
        let ids = SequentialIdGenerator::new("ORD");
        assert_eq!(ids.next_id(), "ORD-000001");
        assert_eq!(ids.next_id(), "ORD-000002");
    }

    #[test]
    fn starting_at_offsets_the_counter() {
        let ids = SequentialIdGenerator::starting_at("TXN", 41);
        assert_eq!(ids.next_id(), "TXN-000041");
    }

    #[test]
    fn sequential_ids_are_unique_across_threads() {
        let ids = Arc::new(SequentialIdGenerator::new("ORD"));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ids = Arc::clone(&ids);
                std::thread::spawn(move || (0..250).map(|_| ids.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id generated");
            }
        }
        assert_eq!(seen.len(), 2000);
    }

    #[test]
    fn uuid_ids_carry_prefix() {
        let ids = UuidIdGenerator::with_prefix("TXN");
        let id = ids.next_id();
        assert!(id.starts_with("TXN-"));
        assert_ne!(id, ids.next_id());
    }
}
