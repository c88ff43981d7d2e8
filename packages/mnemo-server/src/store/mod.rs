//! The three memory tiers: a bounded/evicting STM, a decaying LTM, and a
//! per-user append-only log. All three sit on top of [`crate::backend`].

mod decaying;
mod evicting;
mod semantic;
mod user_log;

pub use decaying::DecayingStore;
pub use evicting::{EvictingStore, EvictionSink};
pub use semantic::SemanticStore;
pub use user_log::{sanitize, FileUserLogStore, UserLogStore};
