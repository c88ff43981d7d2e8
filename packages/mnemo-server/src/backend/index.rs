//! The `IndexBackend` contract: the vector index is an external
//! collaborator (§1), specified only by the operations the stores consume.
//! Modeled on the teacher's [`StorageEngine`]-style low-level trait
//! (`snapshot_iter`/`random_samples`/cursor pagination), adapted from a
//! generic KV engine to a vector-similarity one.
//!
//! `InMemoryIndexBackend` is the reference implementation: a naive bag-of-
//! words embedding plus linear cosine-distance scan, good enough for tests
//! and small deployments. Any persistent ANN store can implement the same
//! trait in its place.

use async_trait::async_trait;
use dashmap::DashMap;
use mnemo_core::{Memory, QueriedMemory};

/// Vector-collection operations consumed by [`crate::store::SemanticStore`].
/// Collection names here are already the *physical* name
/// (`<collection>_<tier>`, see [`mnemo_core::physical_collection`]).
#[async_trait]
pub trait IndexBackend: Send + Sync {
    /// Inserts or overwrites `memory` under `memory.id` (last-write-wins).
    async fn add(&self, collection: &str, memory: Memory) -> anyhow::Result<()>;

    /// Idempotent removal; no error if `id` is missing.
    async fn delete(&self, collection: &str, id: &str) -> anyhow::Result<()>;

    /// Semantic query, ordered by ascending distance, capped at `n`.
    async fn query(
        &self,
        collection: &str,
        text: &str,
        n: usize,
    ) -> anyhow::Result<Vec<QueriedMemory>>;

    /// Up to `n` oldest-by-insertion-order entries, without removing them.
    async fn scan_oldest(&self, collection: &str, n: usize) -> anyhow::Result<Vec<Memory>>;

    /// Exact current size of `collection`.
    async fn count(&self, collection: &str) -> anyhow::Result<usize>;

    /// Drops and recreates `collection`, discarding all entries.
    async fn drop_collection(&self, collection: &str) -> anyhow::Result<()>;

    /// Every collection name currently known to the backend.
    async fn collection_names(&self) -> anyhow::Result<Vec<String>>;
}

struct Slot {
    memory: Memory,
    seq: u64,
}

/// Reference [`IndexBackend`]: one `DashMap<id, Slot>` per collection, a
/// monotonic insertion sequence for oldest-first ordering, and a crude
/// term-overlap distance in place of a real embedding model.
#[derive(Default)]
pub struct InMemoryIndexBackend {
    collections: DashMap<String, DashMap<String, Slot>>,
    seq: std::sync::atomic::AtomicU64,
}

impl InMemoryIndexBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
    }
}

/// Jaccard distance over lowercase whitespace tokens: `0.0` for identical
/// bags of words, `1.0` for no overlap. A stand-in for a real embedding
/// model's cosine distance -- good enough to make query ordering and the
/// round-trip property test (§8) meaningful without a network call.
fn term_distance(a: &str, b: &str) -> f64 {
    use std::collections::HashSet;
    let ta: HashSet<&str> = a.split_whitespace().collect();
    let tb: HashSet<&str> = b.split_whitespace().collect();
    if ta.is_empty() && tb.is_empty() {
        return 0.0;
    }
    let intersection = ta.intersection(&tb).count();
    let union = ta.union(&tb).count().max(1);
    1.0 - (intersection as f64 / union as f64)
}

#[async_trait]
impl IndexBackend for InMemoryIndexBackend {
    async fn add(&self, collection: &str, memory: Memory) -> anyhow::Result<()> {
        let coll = self.collections.entry(collection.to_string()).or_default();
        coll.insert(
            memory.id.clone(),
            Slot {
                memory,
                seq: self.next_seq(),
            },
        );
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> anyhow::Result<()> {
        if let Some(coll) = self.collections.get(collection) {
            coll.remove(id);
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        text: &str,
        n: usize,
    ) -> anyhow::Result<Vec<QueriedMemory>> {
        let Some(coll) = self.collections.get(collection) else {
            return Ok(Vec::new());
        };
        let mut scored: Vec<QueriedMemory> = coll
            .iter()
            .map(|entry| QueriedMemory {
                memory: entry.value().memory.clone(),
                distance: term_distance(text, &entry.value().memory.content),
            })
            .collect();
        scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        scored.truncate(n);
        Ok(scored)
    }

    async fn scan_oldest(&self, collection: &str, n: usize) -> anyhow::Result<Vec<Memory>> {
        let Some(coll) = self.collections.get(collection) else {
            return Ok(Vec::new());
        };
        let mut entries: Vec<(u64, Memory)> = coll
            .iter()
            .map(|e| (e.value().seq, e.value().memory.clone()))
            .collect();
        entries.sort_by_key(|(seq, _)| *seq);
        entries.truncate(n);
        Ok(entries.into_iter().map(|(_, m)| m).collect())
    }

    async fn count(&self, collection: &str) -> anyhow::Result<usize> {
        Ok(self.collections.get(collection).map_or(0, |c| c.len()))
    }

    async fn drop_collection(&self, collection: &str) -> anyhow::Result<()> {
        self.collections.remove(collection);
        Ok(())
    }

    async fn collection_names(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.collections.iter().map(|e| e.key().clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem(id: &str, content: &str, time: i64) -> Memory {
        let mut m = Memory::new(content, time);
        m.id = id.to_string();
        m
    }

    #[tokio::test]
    async fn add_and_count() {
        let backend = InMemoryIndexBackend::new();
        backend.add("c1", mem("a", "apples are red", 1)).await.unwrap();
        backend.add("c1", mem("b", "bananas are yellow", 2)).await.unwrap();
        assert_eq!(backend.count("c1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn add_overwrites_same_id() {
        let backend = InMemoryIndexBackend::new();
        backend.add("c1", mem("a", "first", 1)).await.unwrap();
        backend.add("c1", mem("a", "second", 2)).await.unwrap();
        assert_eq!(backend.count("c1").await.unwrap(), 1);
        let results = backend.query("c1", "second", 1).await.unwrap();
        assert_eq!(results[0].memory.content, "second");
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let backend = InMemoryIndexBackend::new();
        backend.delete("missing", "also-missing").await.unwrap();
        backend.add("c1", mem("a", "x", 1)).await.unwrap();
        backend.delete("c1", "a").await.unwrap();
        backend.delete("c1", "a").await.unwrap();
        assert_eq!(backend.count("c1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn query_orders_by_ascending_distance() {
        let backend = InMemoryIndexBackend::new();
        backend.add("c1", mem("a", "apples are red", 1)).await.unwrap();
        backend.add("c1", mem("b", "cars are fast", 2)).await.unwrap();
        let results = backend.query("c1", "apples are red", 2).await.unwrap();
        assert_eq!(results[0].memory.id, "a");
        assert!(results[0].distance <= results[1].distance);
    }

    #[tokio::test]
    async fn query_missing_collection_is_empty() {
        let backend = InMemoryIndexBackend::new();
        let results = backend.query("missing", "x", 5).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn scan_oldest_respects_insertion_order() {
        let backend = InMemoryIndexBackend::new();
        backend.add("c1", mem("a", "x", 1)).await.unwrap();
        backend.add("c1", mem("b", "y", 2)).await.unwrap();
        backend.add("c1", mem("c", "z", 3)).await.unwrap();

        let oldest = backend.scan_oldest("c1", 2).await.unwrap();
        assert_eq!(oldest.len(), 2);
        assert_eq!(oldest[0].id, "a");
        assert_eq!(oldest[1].id, "b");
    }

    #[tokio::test]
    async fn drop_collection_removes_everything() {
        let backend = InMemoryIndexBackend::new();
        backend.add("c1", mem("a", "x", 1)).await.unwrap();
        backend.drop_collection("c1").await.unwrap();
        assert_eq!(backend.count("c1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn collection_names_lists_all() {
        let backend = InMemoryIndexBackend::new();
        backend.add("a_stm", mem("1", "x", 1)).await.unwrap();
        backend.add("a_ltm", mem("2", "y", 1)).await.unwrap();
        let mut names = backend.collection_names().await.unwrap();
        names.sort();
        assert_eq!(names, vec!["a_ltm".to_string(), "a_stm".to_string()]);
    }
}
