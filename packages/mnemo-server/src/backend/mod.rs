//! External collaborators the stores and compressor depend on but don't
//! own: a vector index and a language model.

mod index;
mod llm;

pub use index::{IndexBackend, InMemoryIndexBackend};
pub use llm::{
    call_with_retry, DistillCandidate, DistillResponse, Emotions, LLMClient, MergeDecision,
    MockLlmClient, OpenAiLlmClient, ProcessResult, RememberItem,
};
