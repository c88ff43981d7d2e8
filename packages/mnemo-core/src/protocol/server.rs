use serde::{Deserialize, Serialize};

use crate::memory::{QueriedMemory, Tier};

/// Every server-to-client message, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    Query {
        uid: String,
        from: Vec<Tier>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        stm: Option<Vec<QueriedMemory>>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        ltm: Option<Vec<QueriedMemory>>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        users: Option<Vec<QueriedMemory>>,
    },
    Summary {
        uid: String,
        summary: String,
    },
    Ack {
        uid: String,
        op: String,
        target: Tier,
        ai_name: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        user: Option<String>,
    },
    Count {
        uid: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        stm: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        ltm: Option<usize>,
    },
    Error {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        uid: Option<String>,
    },
}

impl ServerMessage {
    /// Builds the `{type:"error", error, uid?}` envelope used for every
    /// protocol, validation, and backend failure (§7).
    #[must_use]
    pub fn error(message: impl Into<String>, uid: Option<String>) -> Self {
        ServerMessage::Error {
            error: message.into(),
            uid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelope_shape() {
        let msg = ServerMessage::error("boom", Some("u1".into()));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["error"], "boom");
        assert_eq!(json["uid"], "u1");
    }

    #[test]
    fn query_response_omits_absent_tiers() {
        let msg = ServerMessage::Query {
            uid: "u2".into(),
            from: vec![Tier::Stm],
            stm: Some(vec![]),
            ltm: None,
            users: None,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("ltm").is_none());
        assert!(json.get("users").is_none());
    }
}
