//! `EvictingStore`: wraps the STM tier's [`SemanticStore`] with a
//! progressive-eviction policy so the collection never drifts far past its
//! configured ceiling. Grounded on the teacher's `MutationObserver`
//! pattern -- the callback fired on eviction is a one-method trait instead
//! of a boxed closure, matching design note 3 (closures holding store state
//! across an eviction boundary are an ownership headache; a trait object
//! scoped to `Arc<dyn EvictionSink>` is not).

use std::sync::Arc;

use async_trait::async_trait;
use mnemo_core::Memory;

use crate::store::SemanticStore;

const POP_CHUNK: usize = 256;

/// Receives evicted batches. Implementations (the [`crate::compressor::Compressor`]
/// queue) must not block here -- the contract is "enqueue, don't process".
#[async_trait]
pub trait EvictionSink: Send + Sync {
    async fn on_evict(&self, collection: &str, batch: Vec<Memory>);
}

pub struct EvictingStore {
    inner: SemanticStore,
    sink: Arc<dyn EvictionSink>,
    progressive_eviction: bool,
    max_size_before_evict: i64,
    evict_fraction: f64,
    evict_min_batch: usize,
}

impl EvictingStore {
    #[must_use]
    pub fn new(
        inner: SemanticStore,
        sink: Arc<dyn EvictionSink>,
        progressive_eviction: bool,
        max_size_before_evict: i64,
        evict_fraction: f64,
        evict_min_batch: usize,
    ) -> Self {
        Self {
            inner,
            sink,
            progressive_eviction,
            max_size_before_evict,
            evict_fraction,
            evict_min_batch,
        }
    }

    pub async fn store(&self, memory: Memory) -> anyhow::Result<()> {
        self.inner.store(memory).await?;
        self.maybe_evict().await
    }

    pub async fn query(&self, text: &str, n: usize) -> anyhow::Result<Vec<mnemo_core::QueriedMemory>> {
        self.inner.query(text, n).await
    }

    pub async fn count(&self) -> anyhow::Result<usize> {
        self.inner.count().await
    }

    pub async fn clear(&self) -> anyhow::Result<()> {
        self.inner.clear(POP_CHUNK).await
    }

    /// §4.2's overflow formula: evict `n = max(overflow, current*fraction,
    /// min_batch)`, or just `max(overflow, min_batch)` when the fraction is
    /// disabled (`0.0`).
    async fn maybe_evict(&self) -> anyhow::Result<()> {
        if !self.progressive_eviction {
            return Ok(());
        }
        let current = self.inner.count().await? as i64;
        let overflow = current - self.max_size_before_evict;
        if overflow <= 0 {
            return Ok(());
        }

        let fraction_based = (current as f64 * self.evict_fraction).floor() as i64;
        let n = if self.evict_fraction > 0.0 {
            overflow.max(fraction_based).max(self.evict_min_batch as i64)
        } else {
            overflow.max(self.evict_min_batch as i64)
        };

        self.pop_and_notify(n as usize).await
    }

    async fn pop_and_notify(&self, mut remaining: usize) -> anyhow::Result<()> {
        while remaining > 0 {
            let take = remaining.min(POP_CHUNK);
            let batch = self.inner.pop_oldest(take).await?;
            if batch.is_empty() {
                break;
            }
            let popped = batch.len();
            self.sink.on_evict(self.inner.name(), batch).await;
            remaining -= popped;
            if popped < take {
                break;
            }
        }
        Ok(())
    }

    /// Forced eviction (the `evict` message): drains the whole collection.
    pub async fn evict_all(&self) -> anyhow::Result<()> {
        loop {
            let batch = self.inner.pop_oldest(POP_CHUNK).await?;
            if batch.is_empty() {
                return Ok(());
            }
            self.sink.on_evict(self.inner.name(), batch).await;
        }
    }
}
