//! Transport-neutral view of a client connection.
//!
//! A connection is split in two halves: a [`ConnectionSink`] that the room
//! registry holds for fan-out, and an inbound [`InboundFrame`] stream owned
//! by the stream handler. Adapters (the WebSocket gateway, test doubles)
//! provide both halves.

use std::sync::Arc;

use futures::Stream;
use tokio::sync::mpsc;

use crate::types::{ConnectionId, TransportError};

/// WebSocket close code for a policy violation.
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;
/// WebSocket close code for an unexpected server condition.
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;

/// Close notification sent to a client before the server hangs up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseNotice {
    pub code: u16,
    pub reason: String,
}

impl CloseNotice {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    pub fn missing_identity() -> Self {
        Self::new(CLOSE_POLICY_VIOLATION, "missing identity")
    }

    pub fn internal_error() -> Self {
        Self::new(CLOSE_INTERNAL_ERROR, "internal server error")
    }
}

/// A frame the server writes to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(Arc<str>),
    Close(CloseNotice),
}

impl OutboundFrame {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            OutboundFrame::Text(text) => Some(text),
            OutboundFrame::Close(_) => None,
        }
    }
}

/// A frame read from a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Text(String),
    Binary(Vec<u8>),
    Ping,
    Pong,
    Close,
}

/// Outbound half of a connection.
///
/// `send` must not block: adapters queue the frame and report failure once
/// the peer is gone.
pub trait ConnectionSink: Send + Sync {
    fn send(&self, frame: OutboundFrame) -> Result<(), TransportError>;
}

/// Sink backed by an unbounded channel drained by a writer task.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<OutboundFrame>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<OutboundFrame>) -> Self {
        Self { tx }
    }

    /// Create a sink together with the receiver its writer task drains.
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<OutboundFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl ConnectionSink for ChannelSink {
    fn send(&self, frame: OutboundFrame) -> Result<(), TransportError> {
        self.tx.send(frame).map_err(|_| TransportError::Closed)
    }
}

/// Registry-facing handle: the connection id plus its outbound half.
#[derive(Clone)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub sink: Arc<dyn ConnectionSink>,
}

impl ConnectionHandle {
    pub fn new(sink: Arc<dyn ConnectionSink>) -> Self {
        Self {
            id: ConnectionId::next(),
            sink,
        }
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle").field("id", &self.id).finish()
    }
}

/// An upgraded connection: both halves, ready for the stream handler.
pub struct Connection<S> {
    pub handle: ConnectionHandle,
    pub inbound: S,
}

impl<S> Connection<S>
where
    S: Stream<Item = Result<InboundFrame, TransportError>> + Unpin + Send,
{
    pub fn new(sink: Arc<dyn ConnectionSink>, inbound: S) -> Self {
        Self {
            handle: ConnectionHandle::new(sink),
            inbound,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.handle.id
    }
}
