use serde::{Deserialize, Serialize};

use crate::memory::{Memory, Tier};

/// A single conversation turn fed to the processor, or carried as prior
/// context. Rendered for the LLM prompt as `"<name>: <content>\n"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Every client-to-server message the dispatcher understands, tagged by
/// `type` on the wire. Each variant carries its own `uid` so a handler can
/// echo it without reaching into an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Store {
        uid: String,
        ai_name: String,
        memories: Vec<Memory>,
        to: Vec<Tier>,
    },
    Query {
        uid: String,
        ai_name: String,
        query: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        user: Option<String>,
        from: Vec<Tier>,
        n: Vec<usize>,
    },
    Process {
        uid: String,
        ai_name: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        context: Option<Vec<ChatTurn>>,
        messages: Vec<ChatTurn>,
    },
    Evict {
        uid: String,
        ai_name: String,
    },
    Clear {
        uid: String,
        ai_name: String,
        target: Tier,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        user: Option<String>,
    },
    Count {
        uid: String,
        ai_name: String,
        from: Vec<Tier>,
    },
    Close {
        uid: String,
    },
}

impl ClientMessage {
    #[must_use]
    pub fn uid(&self) -> &str {
        match self {
            ClientMessage::Store { uid, .. }
            | ClientMessage::Query { uid, .. }
            | ClientMessage::Process { uid, .. }
            | ClientMessage::Evict { uid, .. }
            | ClientMessage::Clear { uid, .. }
            | ClientMessage::Count { uid, .. }
            | ClientMessage::Close { uid } => uid,
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            ClientMessage::Store { .. } => "store",
            ClientMessage::Query { .. } => "query",
            ClientMessage::Process { .. } => "process",
            ClientMessage::Evict { .. } => "evict",
            ClientMessage::Clear { .. } => "clear",
            ClientMessage::Count { .. } => "count",
            ClientMessage::Close { .. } => "close",
        }
    }
}
