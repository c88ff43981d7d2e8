//! `Dispatcher`: routes a parsed [`ClientMessage`] to its handler and
//! produces the response, if any (§4.6). Grounded on the teacher's
//! `ServiceRegistry`/`OperationService::classify` split, but the
//! string-keyed handler table they build at runtime is replaced by a
//! `match` over the already-typed, already-validated `ClientMessage`
//! enum (design note 1: no process-wide mutable registry, no stringly-
//! typed dispatch -- the type system does both jobs at once).

mod handlers;

use std::sync::Arc;

use mnemo_core::{Clock, ClientMessage, ProtocolError, ServerMessage};

use crate::bundle::Bundle;
use crate::processor::Processor;

/// What happened after dispatching one message.
pub enum DispatchOutcome {
    /// A response to send back, or `None` for fire-and-forget messages.
    Reply(Option<ServerMessage>),
    /// The client asked to close; the caller should stop reading this
    /// connection and may begin server-wide shutdown.
    Shutdown,
}

pub struct Dispatcher {
    bundle: Arc<Bundle>,
    processor: Arc<Processor>,
    clock: Arc<dyn Clock>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(bundle: Arc<Bundle>, processor: Arc<Processor>, clock: Arc<dyn Clock>) -> Self {
        Self { bundle, processor, clock }
    }

    pub async fn dispatch(&self, message: ClientMessage) -> DispatchOutcome {
        let uid = message.uid().to_string();
        let result = self.route(message).await;
        match result {
            Ok(outcome) => outcome,
            Err(err) => DispatchOutcome::Reply(Some(ServerMessage::error(err.to_string(), Some(uid)))),
        }
    }

    async fn route(&self, message: ClientMessage) -> Result<DispatchOutcome, ProtocolError> {
        match message {
            ClientMessage::Store { ai_name, memories, to, .. } => {
                handlers::handle_store(&self.bundle, &ai_name, memories, &to).await?;
                Ok(DispatchOutcome::Reply(None))
            }
            ClientMessage::Query { uid, ai_name, query, user, from, n } => {
                let reply = handlers::handle_query(&self.bundle, &uid, &ai_name, &query, user.as_deref(), &from, &n)
                    .await?;
                Ok(DispatchOutcome::Reply(Some(reply)))
            }
            ClientMessage::Process { uid, ai_name, context, messages } => {
                let reply = handlers::handle_process(
                    &self.bundle,
                    &self.processor,
                    self.clock.as_ref(),
                    &uid,
                    &ai_name,
                    context,
                    messages,
                )
                .await?;
                Ok(DispatchOutcome::Reply(Some(reply)))
            }
            ClientMessage::Evict { ai_name, .. } => {
                handlers::handle_evict(&self.bundle, &ai_name).await?;
                Ok(DispatchOutcome::Reply(None))
            }
            ClientMessage::Clear { uid, ai_name, target, user } => {
                let reply = handlers::handle_clear(&self.bundle, &uid, &ai_name, target, user.as_deref()).await?;
                Ok(DispatchOutcome::Reply(Some(reply)))
            }
            ClientMessage::Count { uid, ai_name, from } => {
                let reply = handlers::handle_count(&self.bundle, &uid, &ai_name, &from).await?;
                Ok(DispatchOutcome::Reply(Some(reply)))
            }
            ClientMessage::Close { .. } => Ok(DispatchOutcome::Shutdown),
        }
    }
}
