//! One function per [`ClientMessage`] variant (§4.6). Split out from
//! `dispatcher::mod` so the match in `dispatch` stays a thin routing
//! table, mirroring how the teacher keeps `OperationService::classify`
//! (routing) separate from each operation's body.

use mnemo_core::{ChatTurn, Clock, Memory, ProtocolError, QueriedMemory, ServerMessage, Tier};

use crate::bundle::Bundle;
use crate::processor::Processor;

pub async fn handle_store(
    bundle: &Bundle,
    ai_name: &str,
    memories: Vec<Memory>,
    to: &[Tier],
) -> Result<(), ProtocolError> {
    if to.contains(&Tier::Users) && memories.iter().any(|m| m.user.is_none()) {
        return Err(ProtocolError::validation(
            "storing to the users tier requires every memory to carry a user",
        ));
    }

    let _guard = bundle.lock().await;
    for tier in to {
        match tier {
            Tier::Stm => {
                for m in &memories {
                    bundle.stm(ai_name).store(m.clone()).await.map_err(to_validation)?;
                }
            }
            Tier::Ltm => {
                for m in &memories {
                    bundle.ltm(ai_name).store(m.clone()).await.map_err(to_validation)?;
                }
            }
            Tier::Users => {
                for m in &memories {
                    let user = m.user.as_deref().expect("validated above");
                    bundle
                        .user_log()
                        .append(ai_name, user, m.clone())
                        .await
                        .map_err(to_validation)?;
                }
            }
        }
    }
    Ok(())
}

pub async fn handle_query(
    bundle: &Bundle,
    uid: &str,
    ai_name: &str,
    query: &str,
    user: Option<&str>,
    from: &[Tier],
    n: &[usize],
) -> Result<ServerMessage, ProtocolError> {
    if from.len() != n.len() {
        return Err(ProtocolError::validation("query: `from` and `n` must be the same length"));
    }
    if from.contains(&Tier::Users) && user.is_none() {
        return Err(ProtocolError::validation("querying the users tier requires a user"));
    }

    let mut stm = None;
    let mut ltm = None;
    let mut users = None;

    for (tier, &count) in from.iter().zip(n.iter()) {
        match tier {
            Tier::Stm => {
                stm = Some(bundle.stm(ai_name).query(query, count).await.map_err(to_validation)?);
            }
            Tier::Ltm => {
                ltm = Some(bundle.ltm(ai_name).query(query, count).await.map_err(to_validation)?);
            }
            Tier::Users => {
                let user = user.expect("validated above");
                let memories = bundle.user_log().read(ai_name, user).await.map_err(to_validation)?;
                users = Some(most_recent(memories, count));
            }
        }
    }

    Ok(ServerMessage::Query {
        uid: uid.to_string(),
        from: from.to_vec(),
        stm,
        ltm,
        users,
    })
}

pub async fn handle_process(
    bundle: &Bundle,
    processor: &Processor,
    clock: &dyn Clock,
    uid: &str,
    ai_name: &str,
    context: Option<Vec<ChatTurn>>,
    messages: Vec<ChatTurn>,
) -> Result<ServerMessage, ProtocolError> {
    let prior = context.unwrap_or_default();
    let result = processor
        .process(ai_name, &prior, &messages)
        .await
        .map_err(|err| ProtocolError::validation(err.to_string()))?;

    let score = (result.emotional_intensity + result.importance) / 2.0;
    let max_lifetime = bundle.settings().long_vdb.max_memory_lifetime;
    let lifetime = (score * max_lifetime as f64).floor() as i64;

    let _guard = bundle.lock().await;
    let now = clock.now_millis();

    let summary_memory = Memory::new(result.summary.clone(), now).with_score(score).with_lifetime(lifetime);
    bundle.stm(ai_name).store(summary_memory).await.map_err(to_validation)?;

    for item in &result.remember {
        let mut memory = Memory::new(item.text.clone(), now).with_score(score).with_lifetime(lifetime);
        if let Some(user) = &item.user {
            memory = memory.with_user(user.clone());
        }
        bundle.stm(ai_name).store(memory.clone()).await.map_err(to_validation)?;
        if let Some(user) = &item.user {
            bundle.user_log().append(ai_name, user, memory).await.map_err(to_validation)?;
        }
    }

    Ok(ServerMessage::Summary {
        uid: uid.to_string(),
        summary: result.summary,
    })
}

pub async fn handle_evict(bundle: &Bundle, ai_name: &str) -> Result<(), ProtocolError> {
    let _guard = bundle.lock().await;
    bundle.stm(ai_name).evict_all().await.map_err(to_validation)
}

pub async fn handle_clear(
    bundle: &Bundle,
    uid: &str,
    ai_name: &str,
    target: Tier,
    user: Option<&str>,
) -> Result<ServerMessage, ProtocolError> {
    let _guard = bundle.lock().await;
    match target {
        Tier::Stm => bundle.stm(ai_name).clear().await.map_err(to_validation)?,
        Tier::Ltm => bundle.ltm(ai_name).clear(256).await.map_err(to_validation)?,
        Tier::Users => match user {
            Some(user) => bundle.user_log().clear(ai_name, user).await.map_err(to_validation)?,
            None => {
                let all_users = bundle.user_log().users(ai_name).await.map_err(to_validation)?;
                for u in all_users {
                    bundle.user_log().clear(ai_name, &u).await.map_err(to_validation)?;
                }
            }
        },
    }

    Ok(ServerMessage::Ack {
        uid: uid.to_string(),
        op: "clear".to_string(),
        target,
        ai_name: ai_name.to_string(),
        user: user.map(str::to_string),
    })
}

pub async fn handle_count(
    bundle: &Bundle,
    uid: &str,
    ai_name: &str,
    from: &[Tier],
) -> Result<ServerMessage, ProtocolError> {
    let mut stm = None;
    let mut ltm = None;
    for tier in from {
        match tier {
            Tier::Stm => stm = Some(bundle.stm(ai_name).count().await.map_err(to_validation)?),
            Tier::Ltm => ltm = Some(bundle.ltm(ai_name).count().await.map_err(to_validation)?),
            Tier::Users => {
                return Err(ProtocolError::validation("count does not support the users tier"))
            }
        }
    }
    Ok(ServerMessage::Count {
        uid: uid.to_string(),
        stm,
        ltm,
    })
}

fn to_validation(err: anyhow::Error) -> ProtocolError {
    ProtocolError::validation(err.to_string())
}

/// Returns the last `n` entries of a user's log, oldest-to-newest, the log
/// tier's query ignoring the search text entirely -- recency, not
/// similarity, is what "relevant" means for a per-user append-only log.
fn most_recent(memories: Vec<Memory>, n: usize) -> Vec<QueriedMemory> {
    let skip = memories.len().saturating_sub(n);
    memories
        .into_iter()
        .skip(skip)
        .map(|memory| QueriedMemory { memory, distance: 0.0 })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn most_recent_keeps_log_order_and_takes_the_tail() {
        let memories = vec![
            Memory::new("first", 1),
            Memory::new("second", 2),
            Memory::new("third", 3),
        ];
        let result = most_recent(memories, 2);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].memory.content, "second");
        assert_eq!(result[1].memory.content, "third");
    }

    #[test]
    fn most_recent_saturates_when_n_exceeds_log_length() {
        let memories = vec![Memory::new("only", 1)];
        let result = most_recent(memories, 5);
        assert_eq!(result.len(), 1);
    }
}
