//! The `LLMClient` contract: an opaque language-model collaborator (§1)
//! that returns structured JSON matching one of three declared schemas --
//! process, distill, merge. `OpenAiLlmClient` talks to an OpenAI-compatible
//! chat-completions endpoint (teacher already depends on `reqwest`);
//! `MockLlmClient` replays canned responses for tests.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use mnemo_core::ChatTurn;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Output of a `process` call (§4.5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessResult {
    pub summary: String,
    pub remember: Vec<RememberItem>,
    pub emotions: Emotions,
    pub emotional_intensity: f64,
    pub importance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RememberItem {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub user: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emotions {
    pub neutral: f64,
    pub sadness: f64,
    pub joy: f64,
    pub love: f64,
    pub anger: f64,
    pub fear: f64,
    pub surprise: f64,
}

/// Output of a `distill` call: one candidate LTM memory per entry, each
/// citing the source STM ids it was built from (§4.4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistillResponse {
    pub candidates: Vec<DistillCandidate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistillCandidate {
    pub text: String,
    pub source_ids: Vec<String>,
}

/// Output of a `merge` call: whether/how to fold a candidate into its
/// nearest LTM neighbor (§4.4 step 5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeDecision {
    pub new_text: String,
    #[serde(default)]
    pub delete_ids: Vec<String>,
}

/// The language-model collaborator. One method per declared schema rather
/// than a single generic `complete<T>`, so the trait stays object-safe
/// (`Arc<dyn LLMClient>`).
#[async_trait]
pub trait LLMClient: Send + Sync {
    async fn process(
        &self,
        agent_name: &str,
        prior_context: &[ChatTurn],
        transcript: &str,
    ) -> anyhow::Result<ProcessResult>;

    async fn distill(&self, prompt: &str) -> anyhow::Result<DistillResponse>;

    async fn merge(&self, prompt: &str) -> anyhow::Result<MergeDecision>;
}

/// Retries `f` up to `attempts` times, each bounded by `per_call_timeout`
/// (§7: LLM failures retry with backoff up to N attempts, default 5,
/// 60s per-call timeout). Backoff is a fixed 200ms * attempt number --
/// simple and sufficient for a single-tenant service with at most one
/// in-flight LLM call per handler.
pub async fn call_with_retry<F, Fut, T>(
    attempts: u32,
    per_call_timeout: Duration,
    mut f: F,
) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut last_err = None;
    for attempt in 1..=attempts.max(1) {
        match tokio::time::timeout(per_call_timeout, f()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) => {
                warn!(attempt, %err, "LLM call failed");
                last_err = Some(err);
            }
            Err(_) => {
                warn!(attempt, "LLM call timed out");
                last_err = Some(anyhow::anyhow!("LLM call timed out after {per_call_timeout:?}"));
            }
        }
        if attempt < attempts {
            tokio::time::sleep(Duration::from_millis(200 * u64::from(attempt))).await;
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("LLM call failed with no error recorded")))
}

/// `reqwest`-backed client for an OpenAI-compatible `/chat/completions`
/// endpoint. Each method sends a system instruction asking for JSON-only
/// output and parses the first choice's content as the declared schema.
pub struct OpenAiLlmClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f64,
    max_completion_tokens: u32,
    api_key: String,
}

impl OpenAiLlmClient {
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        temperature: f64,
        max_completion_tokens: u32,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            temperature,
            max_completion_tokens,
            api_key: api_key.into(),
        }
    }

    async fn complete(&self, system: &str, user: &str) -> anyhow::Result<String> {
        #[derive(Serialize)]
        struct ChatMessage<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct ChatRequest<'a> {
            model: &'a str,
            messages: Vec<ChatMessage<'a>>,
            temperature: f64,
            max_completion_tokens: u32,
            response_format: serde_json::Value,
        }
        #[derive(Deserialize)]
        struct ChatChoice {
            message: ChatChoiceMessage,
        }
        #[derive(Deserialize)]
        struct ChatChoiceMessage {
            content: String,
        }
        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<ChatChoice>,
        }

        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
            max_completion_tokens: self.max_completion_tokens,
            response_format: serde_json::json!({ "type": "json_object" }),
        };

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<ChatResponse>()
            .await?;

        resp.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("LLM response had no choices"))
    }
}

#[async_trait]
impl LLMClient for OpenAiLlmClient {
    async fn process(
        &self,
        agent_name: &str,
        prior_context: &[ChatTurn],
        transcript: &str,
    ) -> anyhow::Result<ProcessResult> {
        let system = format!(
            "You are {agent_name}. Summarize the conversation and extract memories. \
             Respond with JSON matching {{summary, remember, emotions, emotional_intensity, importance}}."
        );
        let history: String = prior_context
            .iter()
            .map(|t| format!("{:?}: {}\n", t.role, t.content))
            .collect();
        let user = format!("{history}{transcript}");
        let raw = self.complete(&system, &user).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn distill(&self, prompt: &str) -> anyhow::Result<DistillResponse> {
        let system = "Distill the given memories into fewer, cleaner long-term memories. \
                       Respond with JSON matching {candidates: [{text, source_ids}]}.";
        let raw = self.complete(system, prompt).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn merge(&self, prompt: &str) -> anyhow::Result<MergeDecision> {
        let system = "Decide whether to merge the candidate memory with its nearest neighbor. \
                       Default to not merging unless it is a near-duplicate of the same event. \
                       Respond with JSON matching {new_text, delete_ids}.";
        let raw = self.complete(system, prompt).await?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Canned-response double for tests. Each queue is drained FIFO; calling
/// past the end of a queue is a test bug and panics loudly.
#[derive(Default)]
pub struct MockLlmClient {
    pub process_responses: parking_lot::Mutex<std::collections::VecDeque<anyhow::Result<ProcessResult>>>,
    pub distill_responses: parking_lot::Mutex<std::collections::VecDeque<anyhow::Result<DistillResponse>>>,
    pub merge_responses: parking_lot::Mutex<std::collections::VecDeque<anyhow::Result<MergeDecision>>>,
}

impl MockLlmClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_process(&self, result: ProcessResult) {
        self.process_responses.lock().push_back(Ok(result));
    }

    pub fn push_distill(&self, result: DistillResponse) {
        self.distill_responses.lock().push_back(Ok(result));
    }

    pub fn push_merge(&self, result: MergeDecision) {
        self.merge_responses.lock().push_back(Ok(result));
    }

    pub fn push_distill_err(&self, message: impl Into<String>) {
        self.distill_responses
            .lock()
            .push_back(Err(anyhow::anyhow!(message.into())));
    }

    pub fn push_merge_err(&self, message: impl Into<String>) {
        self.merge_responses
            .lock()
            .push_back(Err(anyhow::anyhow!(message.into())));
    }
}

#[async_trait]
impl LLMClient for MockLlmClient {
    async fn process(
        &self,
        _agent_name: &str,
        _prior_context: &[ChatTurn],
        _transcript: &str,
    ) -> anyhow::Result<ProcessResult> {
        self.process_responses
            .lock()
            .pop_front()
            .expect("MockLlmClient: no queued process response")
    }

    async fn distill(&self, _prompt: &str) -> anyhow::Result<DistillResponse> {
        self.distill_responses
            .lock()
            .pop_front()
            .expect("MockLlmClient: no queued distill response")
    }

    async fn merge(&self, _prompt: &str) -> anyhow::Result<MergeDecision> {
        self.merge_responses
            .lock()
            .pop_front()
            .expect("MockLlmClient: no queued merge response")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn call_with_retry_succeeds_first_try() {
        let result = call_with_retry(3, Duration::from_secs(1), || async { Ok::<_, anyhow::Error>(42) })
            .await
            .unwrap();
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn call_with_retry_retries_then_succeeds() {
        let attempts = AtomicU32::new(0);
        let result = call_with_retry(3, Duration::from_secs(1), || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(anyhow::anyhow!("not yet"))
                } else {
                    Ok(7)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn call_with_retry_exhausts_attempts() {
        let result: anyhow::Result<i32> =
            call_with_retry(2, Duration::from_secs(1), || async { Err(anyhow::anyhow!("nope")) }).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn mock_llm_replays_queued_distill() {
        let mock = MockLlmClient::new();
        mock.push_distill(DistillResponse {
            candidates: vec![DistillCandidate {
                text: "x".into(),
                source_ids: vec!["a".into()],
            }],
        });
        let result = mock.distill("prompt").await.unwrap();
        assert_eq!(result.candidates.len(), 1);
    }
}
