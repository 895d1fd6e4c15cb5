//! Per-connection session loop.
//!
//! A session joins its room before the first read, relays each inbound
//! frame in arrival order, and always leaves the room before returning.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::{FutureExt, Stream, StreamExt};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use parlor_orchestrator::TextCompletion;

use super::{AiReplyTask, RoomRegistry};
use crate::entities::ChatMessage;
use crate::repositories::MessageStore;
use crate::transport::{CloseNotice, Connection, ConnectionHandle, InboundFrame, OutboundFrame};
use crate::types::{Identity, TransportError};

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The client sent a close frame or the stream ended.
    PeerClosed,
    /// Reading the next frame failed.
    Transport(TransportError),
    /// The session carried no verified identity.
    MissingIdentity,
    /// Dispatching a frame panicked.
    Internal,
}

/// What a finished session did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub close_reason: CloseReason,
    pub frames_read: u64,
    pub messages_relayed: u64,
}

enum Dispatch {
    Relayed,
    Dropped,
    Close(CloseReason),
}

#[derive(Clone)]
struct Assistant {
    completion: Arc<dyn TextCompletion>,
    sender_id: String,
}

/// Drives client sessions against a shared registry and store.
#[derive(Clone)]
pub struct StreamHandler {
    registry: RoomRegistry,
    store: Arc<dyn MessageStore>,
    assistant: Option<Assistant>,
}

impl StreamHandler {
    pub fn new(registry: RoomRegistry, store: Arc<dyn MessageStore>) -> Self {
        Self {
            registry,
            store,
            assistant: None,
        }
    }

    /// Reply to every relayed message through `completion`, as `sender_id`.
    pub fn with_assistant(
        mut self,
        completion: Arc<dyn TextCompletion>,
        sender_id: impl Into<String>,
    ) -> Self {
        self.assistant = Some(Assistant {
            completion,
            sender_id: sender_id.into(),
        });
        self
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    /// Run one session to completion.
    ///
    /// Returns once the connection has stopped producing frames and has
    /// been removed from the registry.
    pub async fn run<S>(
        &self,
        room_id: &str,
        identity: Option<Identity>,
        connection: Connection<S>,
    ) -> SessionSummary
    where
        S: Stream<Item = Result<InboundFrame, TransportError>> + Unpin + Send,
    {
        let Connection {
            handle,
            mut inbound,
        } = connection;

        self.registry.join(room_id, &handle).await;

        let mut frames_read = 0;
        let mut messages_relayed = 0;

        let close_reason = loop {
            let frame = match inbound.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(err)) => break CloseReason::Transport(err),
                None => break CloseReason::PeerClosed,
            };
            frames_read += 1;

            let content = match frame {
                InboundFrame::Text(text) => text,
                InboundFrame::Binary(bytes) => match String::from_utf8(bytes) {
                    Ok(text) => text,
                    Err(_) => {
                        warn!(
                            room_id,
                            connection_id = %handle.id,
                            "skipping binary frame that is not valid UTF-8"
                        );
                        continue;
                    }
                },
                InboundFrame::Ping | InboundFrame::Pong => continue,
                InboundFrame::Close => break CloseReason::PeerClosed,
            };

            let dispatched = AssertUnwindSafe(self.dispatch(
                room_id,
                identity.as_ref(),
                &handle,
                content,
            ))
            .catch_unwind()
            .await;

            match dispatched {
                Ok(Dispatch::Relayed) => messages_relayed += 1,
                Ok(Dispatch::Dropped) => {}
                Ok(Dispatch::Close(reason)) => break reason,
                Err(_) => {
                    error!(room_id, connection_id = %handle.id, "dispatch panicked");
                    let _ = handle
                        .sink
                        .send(OutboundFrame::Close(CloseNotice::internal_error()));
                    break CloseReason::Internal;
                }
            }
        };

        self.registry.leave(room_id, handle.id).await;

        info!(
            room_id,
            connection_id = %handle.id,
            reason = ?close_reason,
            frames_read,
            messages_relayed,
            "session closed"
        );

        SessionSummary {
            close_reason,
            frames_read,
            messages_relayed,
        }
    }

    async fn dispatch(
        &self,
        room_id: &str,
        identity: Option<&Identity>,
        handle: &ConnectionHandle,
        raw: String,
    ) -> Dispatch {
        let Some(identity) = identity else {
            warn!(room_id, connection_id = %handle.id, "frame without identity; closing");
            if let Err(err) = handle
                .sink
                .send(OutboundFrame::Close(CloseNotice::missing_identity()))
            {
                debug!(connection_id = %handle.id, error = %err, "close notice not delivered");
            }
            return Dispatch::Close(CloseReason::MissingIdentity);
        };

        let message = ChatMessage::new(room_id, identity.subject(), decode_content(raw));

        if let Err(err) = self.store.save(&message).await {
            warn!(
                room_id,
                connection_id = %handle.id,
                sender_id = %message.sender_id,
                message_id = %message.id,
                error = %err,
                "failed to persist message; dropping"
            );
            return Dispatch::Dropped;
        }

        let receivers = self.registry.broadcast(room_id, &message).await;
        debug!(
            room_id,
            sender_id = %message.sender_id,
            message_id = %message.id,
            receivers,
            "message relayed"
        );

        if let Some(assistant) = &self.assistant {
            AiReplyTask::new(
                self.registry.clone(),
                Arc::clone(&self.store),
                Arc::clone(&assistant.completion),
                room_id,
                message.content,
                assistant.sender_id.clone(),
            )
            .spawn();
        }

        Dispatch::Relayed
    }
}

#[derive(Deserialize)]
struct ContentEnvelope {
    content: String,
}

/// Extract message content from a text frame.
///
/// A JSON object with a string `content` field contributes that field;
/// anything else is taken verbatim.
pub fn decode_content(raw: String) -> String {
    if raw.trim_start().starts_with('{') {
        if let Ok(envelope) = serde_json::from_str::<ContentEnvelope>(&raw) {
            return envelope.content;
        }
    }
    raw
}
