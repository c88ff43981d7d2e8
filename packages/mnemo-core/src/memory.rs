//! The `Memory` data model shared by every store, the protocol, and the
//! compressor/processor pipelines.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A durable unit of knowledge held in STM, LTM, or a user log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    /// Opaque unique id, assigned on creation and never reused.
    pub id: String,
    /// Memory text, in practice no more than ~2000 characters.
    pub content: String,
    /// Creation timestamp, milliseconds since epoch.
    pub time: i64,
    /// Associated user identifier, if any.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub user: Option<String>,
    /// Importance in `[0, 1]`. Absent means unscored.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub score: Option<f64>,
    /// Remaining days before decay expiry. Absent means immortal in the
    /// same sense a `None` score means unscored, but see the decay
    /// contract for how an absent lifetime is actually treated.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub lifetime: Option<i64>,
}

impl Memory {
    /// Builds a memory with a freshly generated id.
    #[must_use]
    pub fn new(content: impl Into<String>, time: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            time,
            user: None,
            score: None,
            lifetime: None,
        }
    }

    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    #[must_use]
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    #[must_use]
    pub fn with_lifetime(mut self, lifetime: i64) -> Self {
        self.lifetime = Some(lifetime);
        self
    }

    /// A memory counts as "protected" from decay once its score clears 0.85.
    #[must_use]
    pub fn is_protected(&self) -> bool {
        self.score.is_some_and(|s| s > 0.85)
    }
}

/// Pairs a [`Memory`] with a similarity distance; lower is more similar.
/// Produced only by query paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueriedMemory {
    pub memory: Memory,
    pub distance: f64,
}

/// One of the three isolated stores kept per collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Stm,
    Ltm,
    Users,
}

impl Tier {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Stm => "stm",
            Tier::Ltm => "ltm",
            Tier::Users => "users",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds the physical collection name an `IndexBackend` sees: tiers of the
/// same agent collection never collide in one backend.
#[must_use]
pub fn physical_collection(collection: &str, tier: Tier) -> String {
    format!("{collection}_{tier}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physical_collection_namespaces_tiers() {
        assert_eq!(physical_collection("alice", Tier::Stm), "alice_stm");
        assert_eq!(physical_collection("alice", Tier::Ltm), "alice_ltm");
    }

    #[test]
    fn protected_requires_score_above_point_eight_five() {
        let m = Memory::new("x", 0).with_score(0.85);
        assert!(!m.is_protected());
        let m = Memory::new("x", 0).with_score(0.86);
        assert!(m.is_protected());
    }

    #[test]
    fn new_memory_has_unique_id() {
        let a = Memory::new("x", 0);
        let b = Memory::new("x", 0);
        assert_ne!(a.id, b.id);
    }
}
