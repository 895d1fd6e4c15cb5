//! Automated reply produced for each relayed user message.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use parlor_orchestrator::TextCompletion;

use super::RoomRegistry;
use crate::entities::{ChatMessage, RoomEvent};
use crate::repositories::MessageStore;

/// How an AI reply attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AiReplyOutcome {
    Delivered { message_id: String, receivers: usize },
    CompletionFailed,
    PersistFailed,
    Panicked,
}

/// One detached reply attempt.
///
/// The task owns a snapshot of everything it needs, so it keeps running
/// after the triggering connection has moved on or closed.
pub struct AiReplyTask {
    registry: RoomRegistry,
    store: Arc<dyn MessageStore>,
    completion: Arc<dyn TextCompletion>,
    room_id: String,
    prompt: String,
    sender_id: String,
}

impl AiReplyTask {
    pub fn new(
        registry: RoomRegistry,
        store: Arc<dyn MessageStore>,
        completion: Arc<dyn TextCompletion>,
        room_id: impl Into<String>,
        prompt: impl Into<String>,
        sender_id: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            store,
            completion,
            room_id: room_id.into(),
            prompt: prompt.into(),
            sender_id: sender_id.into(),
        }
    }

    /// Run the task on the tokio runtime without waiting for it.
    pub fn spawn(self) -> JoinHandle<AiReplyOutcome> {
        tokio::spawn(self.run())
    }

    /// Typing started, then the reply, then typing stopped.
    ///
    /// "Typing stopped" is broadcast whatever happens in between.
    pub async fn run(self) -> AiReplyOutcome {
        self.registry
            .broadcast_event(&self.room_id, &RoomEvent::typing_started(&self.sender_id))
            .await;

        let outcome = match AssertUnwindSafe(self.produce_reply()).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(_) => {
                error!(room_id = %self.room_id, "ai reply task panicked");
                AiReplyOutcome::Panicked
            }
        };

        self.registry
            .broadcast_event(&self.room_id, &RoomEvent::typing_stopped(&self.sender_id))
            .await;

        outcome
    }

    async fn produce_reply(&self) -> AiReplyOutcome {
        let text = match self.completion.complete(&self.prompt).await {
            Ok(text) => text,
            Err(err) => {
                warn!(
                    room_id = %self.room_id,
                    provider = self.completion.name(),
                    error = %err,
                    "completion failed; no reply sent"
                );
                return AiReplyOutcome::CompletionFailed;
            }
        };

        let reply = ChatMessage::new(&self.room_id, &self.sender_id, text);
        if let Err(err) = self.store.save(&reply).await {
            warn!(
                room_id = %self.room_id,
                message_id = %reply.id,
                error = %err,
                "failed to persist ai reply"
            );
            return AiReplyOutcome::PersistFailed;
        }

        let receivers = self.registry.broadcast(&self.room_id, &reply).await;
        info!(
            room_id = %self.room_id,
            message_id = %reply.id,
            sender_id = %self.sender_id,
            receivers,
            "ai reply delivered"
        );

        AiReplyOutcome::Delivered {
            message_id: reply.id,
            receivers,
        }
    }
}
