//! `DecayingStore`: the LTM-wide decay pass (§4.3). Unlike `EvictingStore`,
//! which is scoped to one STM collection, decay runs across every LTM
//! collection known to the backend in a single sweep, driven by a
//! persisted `last_run` timestamp. Grounded on the teacher's
//! `RecordStoreFactory`-adjacent persistence helpers for the
//! write-temp-then-rename pattern used for crash-safe metadata.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use mnemo_core::Clock;
use serde::{Deserialize, Serialize};

use crate::backend::IndexBackend;

const CHUNK: usize = 500;
const LTM_SUFFIX: &str = "_ltm";
const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct DecayMeta {
    last_run: i64,
}

pub struct DecayingStore {
    backend: Arc<dyn IndexBackend>,
    clock: Arc<dyn Clock>,
    meta_path: PathBuf,
}

impl DecayingStore {
    #[must_use]
    pub fn new(backend: Arc<dyn IndexBackend>, clock: Arc<dyn Clock>, meta_path: PathBuf) -> Self {
        Self {
            backend,
            clock,
            meta_path,
        }
    }

    fn load_meta(&self) -> anyhow::Result<Option<DecayMeta>> {
        match std::fs::read_to_string(&self.meta_path) {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Writes `decay.json` via a temp file + rename so a crash mid-write
    /// never leaves a half-written `last_run` behind.
    fn save_meta(&self, meta: DecayMeta) -> anyhow::Result<()> {
        if let Some(parent) = self.meta_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp_path = tmp_path_for(&self.meta_path);
        std::fs::write(&tmp_path, serde_json::to_string(&meta)?)?;
        std::fs::rename(&tmp_path, &self.meta_path)?;
        Ok(())
    }

    /// Runs one decay sweep over every `*_ltm` collection. A fresh install
    /// (no `decay.json` yet) seeds `last_run` to now and does no decay --
    /// there is nothing to age yet.
    pub async fn decay_all(&self) -> anyhow::Result<()> {
        let now = self.clock.now_secs();
        let last_run = match self.load_meta()? {
            Some(meta) => meta.last_run,
            None => {
                self.save_meta(DecayMeta { last_run: now })?;
                return Ok(());
            }
        };

        let elapsed_days = (now - last_run).div_euclid(SECONDS_PER_DAY);
        if elapsed_days <= 0 {
            return Ok(());
        }

        let collections: Vec<String> = self
            .backend
            .collection_names()
            .await?
            .into_iter()
            .filter(|name| name.ends_with(LTM_SUFFIX))
            .collect();

        for collection in &collections {
            self.decay_collection(collection, elapsed_days).await?;
        }

        self.save_meta(DecayMeta { last_run: now })
    }

    /// Snapshots the whole collection once and ages each entry exactly
    /// once. `backend.add` assigns a fresh insertion sequence on
    /// re-insert, so scanning-and-reinserting in the same loop (as a naive
    /// chunked walk over `scan_oldest` would) sorts survivors back into
    /// the oldest window and ages them again later in the same sweep.
    /// Taking the snapshot up front and never re-scanning avoids that.
    async fn decay_collection(&self, collection: &str, elapsed_days: i64) -> anyhow::Result<()> {
        let total = self.backend.count(collection).await?;
        let snapshot = self.backend.scan_oldest(collection, total).await?;

        for chunk in snapshot.chunks(CHUNK) {
            for memory in chunk {
                match memory.lifetime {
                    None => {
                        self.backend.delete(collection, &memory.id).await?;
                    }
                    Some(_) if memory.is_protected() => {}
                    Some(lifetime) => {
                        let new_lifetime = lifetime - elapsed_days;
                        if new_lifetime <= 0 {
                            self.backend.delete(collection, &memory.id).await?;
                        } else {
                            let mut aged = memory.clone();
                            aged.lifetime = Some(new_lifetime);
                            self.backend.add(collection, aged).await?;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryIndexBackend;
    use mnemo_core::{FixedClock, Memory};
    use tempfile::tempdir;

    fn store_with_clock(millis: i64) -> (DecayingStore, Arc<InMemoryIndexBackend>, PathBuf) {
        let dir = tempdir().unwrap();
        let meta_path = dir.path().join("decay_meta").join("decay.json");
        let backend = Arc::new(InMemoryIndexBackend::new());
        let clock = Arc::new(FixedClock::new(millis));
        let store = DecayingStore::new(backend.clone(), clock, meta_path.clone());
        std::mem::forget(dir); // keep tempdir alive for the test's duration
        (store, backend, meta_path)
    }

    #[tokio::test]
    async fn first_run_seeds_last_run_without_decaying() {
        let (store, backend, meta_path) = store_with_clock(0);
        let mut m = Memory::new("x", 0);
        m.lifetime = Some(10);
        m.score = Some(0.5);
        backend.add("agent_ltm", m).await.unwrap();

        store.decay_all().await.unwrap();
        assert!(meta_path.exists());
        assert_eq!(backend.count("agent_ltm").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn decay_ages_lifetimes_by_elapsed_days() {
        let (store, backend, _path) = store_with_clock(0);
        let mut m = Memory::new("x", 0);
        m.lifetime = Some(10);
        m.score = Some(0.5);
        backend.add("agent_ltm", m).await.unwrap();
        store.decay_all().await.unwrap(); // seeds last_run at t=0

        // advance clock by 3 days
        let clock = FixedClock::new(3 * SECONDS_PER_DAY * 1000);
        let store = DecayingStore::new(backend.clone(), Arc::new(clock), _path);
        store.decay_all().await.unwrap();

        let remaining = backend.scan_oldest("agent_ltm", 10).await.unwrap();
        assert_eq!(remaining[0].lifetime, Some(7));
    }

    #[tokio::test]
    async fn decay_expires_memories_whose_lifetime_runs_out() {
        let (store, backend, path) = store_with_clock(0);
        let mut m = Memory::new("x", 0);
        m.lifetime = Some(2);
        m.score = Some(0.1);
        backend.add("agent_ltm", m).await.unwrap();
        store.decay_all().await.unwrap();

        let clock = FixedClock::new(5 * SECONDS_PER_DAY * 1000);
        let store = DecayingStore::new(backend.clone(), Arc::new(clock), path);
        store.decay_all().await.unwrap();

        assert_eq!(backend.count("agent_ltm").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn lifetime_none_is_removed_immediately() {
        let (store, backend, path) = store_with_clock(0);
        let mut m = Memory::new("x", 0);
        m.lifetime = None;
        backend.add("agent_ltm", m).await.unwrap();
        store.decay_all().await.unwrap();

        let clock = FixedClock::new(SECONDS_PER_DAY * 1000);
        let store = DecayingStore::new(backend.clone(), Arc::new(clock), path);
        store.decay_all().await.unwrap();
        assert_eq!(backend.count("agent_ltm").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn protected_memories_survive_unchanged() {
        let (store, backend, path) = store_with_clock(0);
        let mut m = Memory::new("important", 0);
        m.lifetime = Some(3);
        m.score = Some(0.9);
        backend.add("agent_ltm", m).await.unwrap();
        store.decay_all().await.unwrap();

        let clock = FixedClock::new(100 * SECONDS_PER_DAY * 1000);
        let store = DecayingStore::new(backend.clone(), Arc::new(clock), path);
        store.decay_all().await.unwrap();

        let remaining = backend.scan_oldest("agent_ltm", 10).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].lifetime, Some(3));
    }

    #[tokio::test]
    async fn large_collection_ages_every_entry_exactly_once() {
        let (store, backend, _path) = store_with_clock(0);
        for i in 0..(CHUNK + 50) {
            let mut m = Memory::new(format!("entry {i}"), 0);
            m.lifetime = Some(10);
            m.score = Some(0.5);
            backend.add("agent_ltm", m).await.unwrap();
        }
        store.decay_all().await.unwrap(); // seeds last_run at t=0

        let clock = FixedClock::new(3 * SECONDS_PER_DAY * 1000);
        let store = DecayingStore::new(backend.clone(), Arc::new(clock), _path);
        store.decay_all().await.unwrap();

        let remaining = backend.scan_oldest("agent_ltm", CHUNK + 50).await.unwrap();
        assert_eq!(remaining.len(), CHUNK + 50);
        assert!(remaining.iter().all(|m| m.lifetime == Some(7)));
    }

    #[tokio::test]
    async fn zero_elapsed_days_is_a_no_op() {
        let (store, backend, _path) = store_with_clock(0);
        let mut m = Memory::new("x", 0);
        m.lifetime = Some(5);
        backend.add("agent_ltm", m).await.unwrap();
        store.decay_all().await.unwrap();
        store.decay_all().await.unwrap();

        let remaining = backend.scan_oldest("agent_ltm", 10).await.unwrap();
        assert_eq!(remaining[0].lifetime, Some(5));
    }
}
