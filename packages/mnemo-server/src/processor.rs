//! `Processor`: turns a batch of chat turns into a summary plus a handful
//! of candidate memories, one LLM call per invocation (§4.5). The prompt
//! template is loaded once from disk and cached, the way the teacher's
//! `ServiceContext` caches its static configuration rather than
//! re-reading it per request.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use mnemo_core::{ChatTurn, Role};
use tokio::sync::OnceCell;

use crate::backend::{call_with_retry, LLMClient, ProcessResult};

const LLM_ATTEMPTS: u32 = 5;
const LLM_TIMEOUT: Duration = Duration::from_secs(60);
const CHAR_PLACEHOLDER: &str = "{{char}}";

pub struct Processor {
    llm: Arc<dyn LLMClient>,
    template_path: PathBuf,
    template: OnceCell<String>,
}

impl Processor {
    #[must_use]
    pub fn new(llm: Arc<dyn LLMClient>, template_path: PathBuf) -> Self {
        Self {
            llm,
            template_path,
            template: OnceCell::new(),
        }
    }

    async fn template(&self) -> anyhow::Result<&str> {
        self.template
            .get_or_try_init(|| async {
                tokio::fs::read_to_string(&self.template_path)
                    .await
                    .map_err(anyhow::Error::from)
            })
            .await
            .map(String::as_str)
    }

    /// Produces a [`ProcessResult`] for `agent_name` given prior context
    /// and the new turns to fold in. The prompt substitutes `{{char}}`
    /// with `agent_name` and appends the rendered transcript.
    pub async fn process(
        &self,
        agent_name: &str,
        prior_context: &[ChatTurn],
        new_turns: &[ChatTurn],
    ) -> anyhow::Result<ProcessResult> {
        let template = self.template().await?;
        let system_prompt = template.replace(CHAR_PLACEHOLDER, agent_name);
        let transcript = render_transcript(agent_name, new_turns);

        let llm = self.llm.clone();
        let agent_name = agent_name.to_string();
        let prior_context = prior_context.to_vec();
        call_with_retry(LLM_ATTEMPTS, LLM_TIMEOUT, move || {
            let llm = llm.clone();
            let agent_name = agent_name.clone();
            let prior_context = prior_context.clone();
            let transcript = transcript.clone();
            let system_prompt = system_prompt.clone();
            async move {
                let full_transcript = format!("{system_prompt}\n{transcript}");
                llm.process(&agent_name, &prior_context, &full_transcript).await
            }
        })
        .await
    }
}

/// Renders turns as `"<name>: <content>\n"`: `agent_name` for assistant
/// turns, `msg.name` (or `"User"`) for user turns, `"SYSTEM"` for system
/// turns. Any other role is skipped.
fn render_transcript(agent_name: &str, turns: &[ChatTurn]) -> String {
    let mut out = String::new();
    for turn in turns {
        let name = match turn.role {
            Role::Assistant => agent_name,
            Role::User => turn.name.as_deref().unwrap_or("User"),
            Role::System => "SYSTEM",
        };
        out.push_str(name);
        out.push_str(": ");
        out.push_str(&turn.content);
        out.push('\n');
    }
    out
}
