//! `UserLogStore`: the per-user append-only log tier (§3, §6). Grounded on
//! the teacher's `MapDataStore` -- a small keyed JSON-file store -- but
//! specialized to one file per `(collection, user)` pair under
//! `./users/<sanitized_collection>/<sanitized_user>.json`, scoped
//! open/write/close per call rather than holding a long-lived handle, as
//! design note 6 requires.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mnemo_core::Memory;
use serde::{Deserialize, Serialize};

const RESERVED_WINDOWS_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Replaces any character outside `[A-Za-z0-9_-]` with `_`, truncates to
/// 255 bytes, and appends `_safe` to reserved device names so the result
/// is always a usable file/dir component.
#[must_use]
pub fn sanitize(raw: &str) -> String {
    let mut out: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    out.truncate(255);
    if RESERVED_WINDOWS_NAMES.contains(&out.to_uppercase().as_str()) {
        out.push_str("_safe");
    }
    out
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LogFile {
    mems: Vec<Memory>,
}

#[async_trait]
pub trait UserLogStore: Send + Sync {
    async fn append(&self, collection: &str, user: &str, memory: Memory) -> anyhow::Result<()>;
    async fn read(&self, collection: &str, user: &str) -> anyhow::Result<Vec<Memory>>;
    async fn clear(&self, collection: &str, user: &str) -> anyhow::Result<()>;
    /// Every user currently on file for `collection`, for collection-wide clear.
    async fn users(&self, collection: &str) -> anyhow::Result<Vec<String>>;
}

pub struct FileUserLogStore {
    root: PathBuf,
    max_size_per_user: usize,
}

impl FileUserLogStore {
    #[must_use]
    pub fn new(root: PathBuf, max_size_per_user: usize) -> Self {
        Self { root, max_size_per_user }
    }

    fn path_for(&self, collection: &str, user: &str) -> PathBuf {
        self.root.join(sanitize(collection)).join(format!("{}.json", sanitize(user)))
    }

    fn read_file(path: &Path) -> anyhow::Result<LogFile> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(LogFile::default()),
            Err(err) => Err(err.into()),
        }
    }

    fn write_file(path: &Path, log: &LogFile) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string(log)?)?;
        Ok(())
    }
}

#[async_trait]
impl UserLogStore for FileUserLogStore {
    async fn append(&self, collection: &str, user: &str, memory: Memory) -> anyhow::Result<()> {
        let path = self.path_for(collection, user);
        let mut log = Self::read_file(&path)?;
        log.mems.push(memory);
        if log.mems.len() > self.max_size_per_user {
            let drop = log.mems.len() - self.max_size_per_user;
            log.mems.drain(0..drop);
        }
        Self::write_file(&path, &log)
    }

    async fn read(&self, collection: &str, user: &str) -> anyhow::Result<Vec<Memory>> {
        Ok(Self::read_file(&self.path_for(collection, user))?.mems)
    }

    async fn clear(&self, collection: &str, user: &str) -> anyhow::Result<()> {
        let path = self.path_for(collection, user);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn users(&self, collection: &str) -> anyhow::Result<Vec<String>> {
        let dir = self.root.join(sanitize(collection));
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut users = Vec::new();
        for entry in entries {
            let entry = entry?;
            if let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str()) {
                users.push(stem.to_string());
            }
        }
        Ok(users)
    }
}
