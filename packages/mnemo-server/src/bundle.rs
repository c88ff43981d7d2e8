//! `Bundle`: lazily constructs and caches the STM/LTM/user-log stores for
//! each agent collection. Grounded on the teacher's `RecordStoreFactory` --
//! a name-keyed cache of store handles built from one shared config plus a
//! shared backend -- but the physical store here is one of three distinct
//! wrapper types rather than one generic `RecordStore<T>`.
//!
//! §5 requires every mutating handler on a collection to run one at a
//! time; rather than per-store fine-grained locking, `Bundle::lock`
//! exposes a single global guard the dispatcher holds for the duration of
//! a handler, matching the "serialize globally" option the concurrency
//! model explicitly allows.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use mnemo_core::{physical_collection, Clock, Tier};
use tokio::sync::Mutex;

use crate::backend::IndexBackend;
use crate::config::Settings;
use crate::store::{DecayingStore, EvictingStore, EvictionSink, FileUserLogStore, SemanticStore, UserLogStore};

pub struct Bundle {
    backend: Arc<dyn IndexBackend>,
    settings: Settings,
    eviction_sink: Arc<dyn EvictionSink>,
    decaying: Arc<DecayingStore>,
    user_log: Arc<dyn UserLogStore>,
    stm_stores: DashMap<String, Arc<EvictingStore>>,
    ltm_stores: DashMap<String, Arc<SemanticStore>>,
    write_lock: Mutex<()>,
}

impl Bundle {
    #[must_use]
    pub fn new(
        backend: Arc<dyn IndexBackend>,
        settings: Settings,
        eviction_sink: Arc<dyn EvictionSink>,
        clock: Arc<dyn Clock>,
        users_root: PathBuf,
        decay_meta_path: PathBuf,
    ) -> Self {
        let decaying = Arc::new(DecayingStore::new(backend.clone(), clock, decay_meta_path));
        let user_log = Arc::new(FileUserLogStore::new(users_root, settings.user_db.max_size_per_user));
        Self {
            backend,
            settings,
            eviction_sink,
            decaying,
            user_log,
            stm_stores: DashMap::new(),
            ltm_stores: DashMap::new(),
            write_lock: Mutex::new(()),
        }
    }

    pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    #[must_use]
    pub fn stm(&self, ai_name: &str) -> Arc<EvictingStore> {
        self.stm_stores
            .entry(ai_name.to_string())
            .or_insert_with(|| {
                let physical = physical_collection(ai_name, Tier::Stm);
                let semantic = SemanticStore::new(self.backend.clone(), physical, None);
                Arc::new(EvictingStore::new(
                    semantic,
                    self.eviction_sink.clone(),
                    self.settings.short_vdb.progressive_eviction,
                    self.settings.short_vdb.max_size_before_evict,
                    self.settings.compression.batch_fraction_on_breach,
                    self.settings.compression.min_batch_on_breach,
                ))
            })
            .clone()
    }

    #[must_use]
    pub fn ltm(&self, ai_name: &str) -> Arc<SemanticStore> {
        self.ltm_stores
            .entry(ai_name.to_string())
            .or_insert_with(|| {
                let physical = physical_collection(ai_name, Tier::Ltm);
                let cap = usize::try_from(self.settings.long_vdb.max_size.max(0)).unwrap_or(usize::MAX);
                Arc::new(SemanticStore::new(self.backend.clone(), physical, Some(cap)))
            })
            .clone()
    }

    #[must_use]
    pub fn user_log(&self) -> Arc<dyn UserLogStore> {
        self.user_log.clone()
    }

    #[must_use]
    pub fn decaying(&self) -> Arc<DecayingStore> {
        self.decaying.clone()
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}
