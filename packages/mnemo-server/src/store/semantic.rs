//! `SemanticStore`: a thin, tier-agnostic wrapper over an [`IndexBackend`]
//! collection. Grounded on the teacher's `RecordStore` (a typed façade over
//! the raw `StorageEngine`) -- here the façade adds the oldest-first
//! pop primitive both `EvictingStore` and `DecayingStore` are built from,
//! plus a hard size-cap safety net so a misbehaving caller can't make a
//! collection grow without bound even if the wrapping tier forgets to
//! evict.

use std::sync::Arc;

use mnemo_core::{Memory, QueriedMemory};

use crate::backend::IndexBackend;

/// A single physical collection (already `<collection>_<tier>`-named) in
/// the backing index.
pub struct SemanticStore {
    backend: Arc<dyn IndexBackend>,
    name: String,
    hard_cap: Option<usize>,
}

impl SemanticStore {
    #[must_use]
    pub fn new(backend: Arc<dyn IndexBackend>, name: impl Into<String>, hard_cap: Option<usize>) -> Self {
        Self {
            backend,
            name: name.into(),
            hard_cap,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inserts `memory`, then -- if a hard cap is set -- trims the oldest
    /// surplus entries so the collection never exceeds it regardless of
    /// whether the wrapping tier's own eviction runs.
    pub async fn store(&self, memory: Memory) -> anyhow::Result<()> {
        self.backend.add(&self.name, memory).await?;
        if let Some(cap) = self.hard_cap {
            self.enforce_cap(cap).await?;
        }
        Ok(())
    }

    async fn enforce_cap(&self, cap: usize) -> anyhow::Result<()> {
        let count = self.backend.count(&self.name).await?;
        if count <= cap {
            return Ok(());
        }
        let surplus = count - cap;
        let oldest = self.backend.scan_oldest(&self.name, surplus).await?;
        for memory in oldest {
            self.backend.delete(&self.name, &memory.id).await?;
        }
        Ok(())
    }

    pub async fn query(&self, text: &str, n: usize) -> anyhow::Result<Vec<QueriedMemory>> {
        self.backend.query(&self.name, text, n).await
    }

    pub async fn count(&self) -> anyhow::Result<usize> {
        self.backend.count(&self.name).await
    }

    /// Removes and returns up to `n` oldest-by-insertion-order memories.
    /// Not atomic against concurrent writers on the same collection --
    /// callers that need linearizability serialize at the `Bundle` layer.
    pub async fn pop_oldest(&self, n: usize) -> anyhow::Result<Vec<Memory>> {
        let batch = self.backend.scan_oldest(&self.name, n).await?;
        for memory in &batch {
            self.backend.delete(&self.name, &memory.id).await?;
        }
        Ok(batch)
    }

    /// Removes everything, in bounded-size chunks so a huge collection
    /// doesn't hold up the dispatcher in one call.
    pub async fn clear(&self, chunk: usize) -> anyhow::Result<()> {
        loop {
            let batch = self.pop_oldest(chunk).await?;
            if batch.is_empty() {
                return Ok(());
            }
        }
    }
}
