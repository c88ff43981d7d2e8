//! `--dump`: a read-only snapshot of every tier for every known agent,
//! written to `dump.json`. Grounded on the teacher's admin-facing snapshot
//! tooling -- a flat walk over every collection the backend knows about,
//! with no mutation, so it is safe to run against a live store.

use std::collections::BTreeMap;
use std::path::Path;

use mnemo_core::Memory;
use serde::Serialize;

use crate::backend::IndexBackend;
use crate::store::UserLogStore;

#[derive(Debug, Serialize)]
pub struct DumpReport {
    /// Physical collection name (`<agent>_stm`/`<agent>_ltm`) -> its memories.
    pub collections: BTreeMap<String, Vec<Memory>>,
    /// Agent name -> user -> that user's log.
    pub users: BTreeMap<String, BTreeMap<String, Vec<Memory>>>,
}

/// Walks every collection the backend knows about plus every user log for
/// every agent those collections name, without deleting or mutating
/// anything.
pub async fn collect(backend: &dyn IndexBackend, user_log: &dyn UserLogStore) -> anyhow::Result<DumpReport> {
    let mut collections = BTreeMap::new();
    let mut agents = std::collections::BTreeSet::new();

    for name in backend.collection_names().await? {
        let count = backend.count(&name).await?;
        let memories = backend.scan_oldest(&name, count).await?;
        if let Some(agent) = name.strip_suffix("_stm").or_else(|| name.strip_suffix("_ltm")) {
            agents.insert(agent.to_string());
        }
        collections.insert(name, memories);
    }

    let mut users = BTreeMap::new();
    for agent in agents {
        let mut per_user = BTreeMap::new();
        for user in user_log.users(&agent).await? {
            let memories = user_log.read(&agent, &user).await?;
            per_user.insert(user, memories);
        }
        if !per_user.is_empty() {
            users.insert(agent, per_user);
        }
    }

    Ok(DumpReport { collections, users })
}

pub async fn write_to(
    backend: &dyn IndexBackend,
    user_log: &dyn UserLogStore,
    path: &Path,
) -> anyhow::Result<()> {
    let report = collect(backend, user_log).await?;
    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(path, json)?;
    Ok(())
}
