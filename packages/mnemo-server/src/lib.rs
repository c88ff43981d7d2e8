//! Tiered memory service: STM/LTM/user-log storage, LLM-driven
//! distillation, and a WebSocket control channel in front of it all.

pub mod backend;
pub mod bundle;
pub mod cli;
pub mod compressor;
pub mod config;
pub mod dispatcher;
pub mod dump;
pub mod network;
pub mod processor;
pub mod scheduler;
pub mod store;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use mnemo_core::{ClientMessage, FixedClock, Memory, Tier};
    use tempfile::tempdir;

    use crate::backend::{InMemoryIndexBackend, MockLlmClient};
    use crate::bundle::Bundle;
    use crate::compressor::Compressor;
    use crate::config::Settings;
    use crate::dispatcher::{DispatchOutcome, Dispatcher};
    use crate::processor::Processor;
    use crate::scheduler::DecayScheduler;
    use crate::store::EvictionSink;

    struct NoopSink;
    #[async_trait]
    impl EvictionSink for NoopSink {
        async fn on_evict(&self, _collection: &str, _batch: Vec<Memory>) {}
    }

    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }

    /// Wires `Settings` -> `Bundle` -> `Compressor` -> `DecayScheduler` ->
    /// `Dispatcher` the way `main` does, and drives one store/query round
    /// trip through the whole stack.
    #[tokio::test]
    async fn full_stack_store_then_query_round_trips() {
        let dir = tempdir().unwrap();
        let backend = Arc::new(InMemoryIndexBackend::new());
        let clock = Arc::new(FixedClock::new(1_000));
        let settings = Settings::default();

        let (compressor, _compressor_handle) = Compressor::spawn(
            Arc::new(MockLlmClient::new()),
            backend.clone(),
            clock.clone(),
            settings.compression.clone(),
            settings.long_vdb.max_memory_lifetime,
        );

        let bundle = Arc::new(Bundle::new(
            backend,
            settings,
            Arc::new(compressor),
            clock.clone(),
            dir.path().join("users"),
            dir.path().join("decay_meta/decay.json"),
        ));

        let (_scheduler, scheduler_handle) =
            DecayScheduler::spawn_with_interval(bundle.decaying(), std::time::Duration::from_secs(3600));
        scheduler_handle.abort();

        let processor = Arc::new(Processor::new(Arc::new(MockLlmClient::new()), dir.path().join("prompt.txt")));
        let dispatcher = Dispatcher::new(bundle, processor, clock);

        let memory = Memory::new("full stack round trip", 1);
        let id = memory.id.clone();

        let outcome = dispatcher
            .dispatch(ClientMessage::Store {
                uid: "u1".into(),
                ai_name: "agent".into(),
                memories: vec![memory],
                to: vec![Tier::Stm],
            })
            .await;
        assert!(matches!(outcome, DispatchOutcome::Reply(None)));

        let outcome = dispatcher
            .dispatch(ClientMessage::Query {
                uid: "u2".into(),
                ai_name: "agent".into(),
                query: "full stack round trip".into(),
                user: None,
                from: vec![Tier::Stm],
                n: vec![1],
            })
            .await;

        match outcome {
            DispatchOutcome::Reply(Some(mnemo_core::ServerMessage::Query { stm: Some(results), .. })) => {
                assert_eq!(results[0].memory.id, id);
            }
            _ => panic!("expected a query reply with stm results"),
        }
    }
}
