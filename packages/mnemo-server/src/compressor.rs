//! `Compressor`: consumes evicted STM batches and distills them into LTM
//! memories (§4.4). Grounded on the teacher's `BackgroundRunnable` /
//! `BackgroundWorker<T>` pattern -- a bounded mpsc queue drained by one
//! long-lived task -- adapted from a generic deferred-work queue to this
//! specific two-LLM-call pipeline. `on_evict` (the [`EvictionSink`] impl)
//! is the non-blocking producer side; per design note 4, overflow spawns a
//! one-shot task rather than blocking the dispatcher or dropping the
//! batch.

use std::sync::Arc;

use async_trait::async_trait;
use mnemo_core::{Clock, Memory};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::backend::{call_with_retry, IndexBackend, LLMClient};
use crate::config::CompressionConfig;
use crate::store::EvictionSink;

const QUEUE_CAPACITY: usize = 8;
const LLM_ATTEMPTS: u32 = 5;
const LLM_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);
const SCORE_FALLBACK: f64 = 0.6;

type Batch = (String, Vec<Memory>);

pub struct Compressor {
    sender: mpsc::Sender<Batch>,
    inner: Arc<Inner>,
}

struct Inner {
    llm: Arc<dyn LLMClient>,
    backend: Arc<dyn IndexBackend>,
    clock: Arc<dyn Clock>,
    config: CompressionConfig,
    max_memory_lifetime: i64,
}

impl Compressor {
    #[must_use]
    pub fn spawn(
        llm: Arc<dyn LLMClient>,
        backend: Arc<dyn IndexBackend>,
        clock: Arc<dyn Clock>,
        config: CompressionConfig,
        max_memory_lifetime: i64,
    ) -> (Self, JoinHandle<()>) {
        let inner = Arc::new(Inner {
            llm,
            backend,
            clock,
            config,
            max_memory_lifetime,
        });
        let (sender, mut receiver) = mpsc::channel::<Batch>(QUEUE_CAPACITY);
        let worker_inner = inner.clone();
        let handle = tokio::spawn(async move {
            while let Some((collection, batch)) = receiver.recv().await {
                if let Err(err) = worker_inner.compress_batch(&collection, batch).await {
                    error!(%err, collection, "compression batch failed");
                }
            }
        });
        (Self { sender, inner }, handle)
    }
}

#[async_trait]
impl EvictionSink for Compressor {
    async fn on_evict(&self, collection: &str, batch: Vec<Memory>) {
        match self.sender.try_send((collection.to_string(), batch)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full((collection, batch))) => {
                warn!(collection, "compression queue full, spawning one-shot worker");
                let inner = self.inner.clone();
                tokio::spawn(async move {
                    if let Err(err) = inner.compress_batch(&collection, batch).await {
                        error!(%err, collection, "overflow compression batch failed");
                    }
                });
            }
            Err(mpsc::error::TrySendError::Closed((collection, _))) => {
                error!(collection, "compression worker gone, batch dropped");
            }
        }
    }
}

impl Inner {
    async fn compress_batch(&self, stm_collection: &str, batch: Vec<Memory>) -> anyhow::Result<()> {
        if !self.config.enabled {
            return Ok(());
        }
        let filtered: Vec<Memory> = batch
            .into_iter()
            .filter(|m| m.score.unwrap_or(0.0) >= self.config.score_floor_for_ltm)
            .collect();
        if filtered.is_empty() {
            return Ok(());
        }

        let ltm_collection = ltm_collection_for(stm_collection);
        let distill_prompt = render_distill_prompt(&filtered);

        let distilled = {
            let llm = self.llm.clone();
            let prompt = distill_prompt.clone();
            call_with_retry(LLM_ATTEMPTS, LLM_TIMEOUT, move || {
                let llm = llm.clone();
                let prompt = prompt.clone();
                async move { llm.distill(&prompt).await }
            })
            .await
        };

        let distilled = match distilled {
            Ok(response) => response,
            Err(err) => {
                // Distillation failure loses this batch entirely; there is
                // no dead-letter path for raw evicted memories today.
                error!(%err, collection = stm_collection, "distillation failed, batch dropped");
                return Ok(());
            }
        };

        for candidate in distilled.candidates {
            self.absorb_candidate(&ltm_collection, &filtered, candidate).await?;
        }
        Ok(())
    }

    async fn absorb_candidate(
        &self,
        ltm_collection: &str,
        filtered: &[Memory],
        candidate: crate::backend::DistillCandidate,
    ) -> anyhow::Result<()> {
        let contributing: Vec<&Memory> = filtered
            .iter()
            .filter(|m| candidate.source_ids.contains(&m.id))
            .collect();
        let score = mean_score(&contributing)
            .or_else(|| mean_score(&filtered.iter().collect::<Vec<_>>()))
            .unwrap_or(SCORE_FALLBACK);
        let lifetime = (score * self.max_memory_lifetime as f64).floor() as i64;

        let neighbors = self
            .backend
            .query(ltm_collection, &candidate.text, self.config.similar_top_k)
            .await?;

        let (new_text, delete_ids) = if let Some(nearest) = neighbors.first() {
            let prompt = render_merge_prompt(&candidate.text, &nearest.memory.content);
            let llm = self.llm.clone();
            let decision = call_with_retry(LLM_ATTEMPTS, LLM_TIMEOUT, move || {
                let llm = llm.clone();
                let prompt = prompt.clone();
                async move { llm.merge(&prompt).await }
            })
            .await;
            match decision {
                Ok(decision) => (decision.new_text, decision.delete_ids),
                Err(err) => {
                    warn!(%err, "merge decision failed, storing candidate unmerged");
                    (candidate.text.clone(), Vec::new())
                }
            }
        } else {
            (candidate.text.clone(), Vec::new())
        };

        for id in &delete_ids {
            if let Err(err) = self.backend.delete(ltm_collection, id).await {
                warn!(%err, id, "failed to delete merged-away memory");
            }
        }

        let memory = Memory::new(new_text.trim(), self.clock.now_millis())
            .with_score(score)
            .with_lifetime(lifetime);
        self.backend.add(ltm_collection, memory).await
    }
}

fn mean_score(memories: &[&Memory]) -> Option<f64> {
    let scores: Vec<f64> = memories.iter().filter_map(|m| m.score).collect();
    if scores.is_empty() {
        return None;
    }
    Some(scores.iter().sum::<f64>() / scores.len() as f64)
}

fn ltm_collection_for(stm_collection: &str) -> String {
    stm_collection
        .strip_suffix("_stm")
        .map_or_else(|| format!("{stm_collection}_ltm"), |base| format!("{base}_ltm"))
}

fn render_distill_prompt(memories: &[Memory]) -> String {
    let mut prompt = String::from("Distill these memories into fewer, clearer long-term memories:\n");
    for m in memories {
        prompt.push_str(&format!("- [{}] {}\n", m.id, m.content));
    }
    prompt
}

fn render_merge_prompt(candidate_text: &str, neighbor_text: &str) -> String {
    format!(
        "Candidate memory: {candidate_text}\nNearest existing memory: {neighbor_text}\n\
         Decide whether to merge them; default to not merging unless they describe the same event."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DistillResponse, InMemoryIndexBackend, MergeDecision, MockLlmClient};
    use mnemo_core::FixedClock;

    fn memory_with_score(content: &str, score: f64) -> Memory {
        Memory::new(content, 1).with_score(score)
    }

    #[test]
    fn ltm_collection_strips_stm_suffix() {
        assert_eq!(ltm_collection_for("agent_stm"), "agent_ltm");
        assert_eq!(ltm_collection_for("agent"), "agent_ltm");
    }

    #[tokio::test]
    async fn batch_below_score_floor_is_dropped_without_llm_call() {
        let llm = Arc::new(MockLlmClient::new());
        let backend = Arc::new(InMemoryIndexBackend::new());
        let clock = Arc::new(FixedClock::new(0));
        let config = CompressionConfig {
            score_floor_for_ltm: 0.5,
            ..Default::default()
        };
        let inner = Inner {
            llm,
            backend: backend.clone(),
            clock,
            config,
            max_memory_lifetime: 90,
        };
        let batch = vec![memory_with_score("low", 0.1)];
        inner.compress_batch("agent_stm", batch).await.unwrap();
        assert_eq!(backend.count("agent_ltm").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn distilled_candidate_without_neighbor_skips_merge_call() {
        let mock = Arc::new(MockLlmClient::new());
        let source = memory_with_score("went for a walk", 0.8);
        mock.push_distill(DistillResponse {
            candidates: vec![crate::backend::DistillCandidate {
                text: "took a walk outside".into(),
                source_ids: vec![source.id.clone()],
            }],
        });
        let backend = Arc::new(InMemoryIndexBackend::new());
        let clock = Arc::new(FixedClock::new(5000));
        let inner = Inner {
            llm: mock,
            backend: backend.clone(),
            clock,
            config: CompressionConfig::default(),
            max_memory_lifetime: 90,
        };
        inner.compress_batch("agent_stm", vec![source]).await.unwrap();

        let stored = backend.scan_oldest("agent_ltm", 10).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].content, "took a walk outside");
        assert_eq!(stored[0].score, Some(0.8));
        assert_eq!(stored[0].lifetime, Some(72));
    }

    #[tokio::test]
    async fn neighbor_present_triggers_merge_and_delete() {
        let mock = Arc::new(MockLlmClient::new());
        let source = memory_with_score("ate pizza for lunch", 0.7);
        mock.push_distill(DistillResponse {
            candidates: vec![crate::backend::DistillCandidate {
                text: "had pizza".into(),
                source_ids: vec![source.id.clone()],
            }],
        });
        mock.push_merge(MergeDecision {
            new_text: "enjoys pizza for lunch".into(),
            delete_ids: vec!["neighbor-1".into()],
        });

        let backend = Arc::new(InMemoryIndexBackend::new());
        let mut neighbor = Memory::new("likes pizza", 0);
        neighbor.id = "neighbor-1".into();
        backend.add("agent_ltm", neighbor).await.unwrap();

        let clock = Arc::new(FixedClock::new(0));
        let inner = Inner {
            llm: mock,
            backend: backend.clone(),
            clock,
            config: CompressionConfig::default(),
            max_memory_lifetime: 90,
        };
        inner.compress_batch("agent_stm", vec![source]).await.unwrap();

        assert!(backend.query("agent_ltm", "neighbor-1", 5).await.unwrap().iter().all(|q| q.memory.id != "neighbor-1"));
        let stored = backend.scan_oldest("agent_ltm", 10).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].content, "enjoys pizza for lunch");
    }

    #[tokio::test]
    async fn distillation_failure_drops_batch_without_panicking() {
        let mock = Arc::new(MockLlmClient::new());
        for _ in 0..LLM_ATTEMPTS {
            mock.push_distill_err("model unavailable");
        }
        let backend = Arc::new(InMemoryIndexBackend::new());
        let clock = Arc::new(FixedClock::new(0));
        let inner = Inner {
            llm: mock,
            backend: backend.clone(),
            clock,
            config: CompressionConfig::default(),
            max_memory_lifetime: 90,
        };
        let result = inner
            .compress_batch("agent_stm", vec![memory_with_score("x", 0.9)])
            .await;
        assert!(result.is_ok());
        assert_eq!(backend.count("agent_ltm").await.unwrap(), 0);
    }
}
