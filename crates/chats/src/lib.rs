//! # Parlor Chats Crate
//!
//! Core of the Parlor relay: tracks which live connections are in which
//! room, fans messages and events out to them, runs the per-connection
//! session loop, and spawns the automated reply for each relayed message.
//!
//! ## Architecture
//!
//! - **Entities**: `ChatMessage` and `RoomEvent`, the two wire payloads
//! - **Services**: `RoomRegistry`, `StreamHandler`, `AiReplyTask`
//! - **Repositories**: the `MessageStore` port and an in-memory store
//! - **Transport**: the connection halves adapters must provide
//! - **Types**: identifiers and errors
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use parlor_chats::{InMemoryMessageStore, RoomRegistry, StreamHandler};
//!
//! let registry = RoomRegistry::new();
//! let handler = StreamHandler::new(registry, Arc::new(InMemoryMessageStore::new()));
//! # let _ = handler;
//! ```

pub mod entities;
pub mod repositories;
pub mod services;
pub mod transport;
pub mod types;

pub use entities::{ChatMessage, RoomEvent};
pub use repositories::{InMemoryMessageStore, MessageStore};
pub use services::{
    AiReplyOutcome, AiReplyTask, CloseReason, RoomRegistry, SessionSummary, StreamHandler,
};
pub use transport::{
    ChannelSink, CloseNotice, Connection, ConnectionHandle, ConnectionSink, InboundFrame,
    OutboundFrame,
};
pub use types::{ChatError, ChatResult, ConnectionId, Identity, RoomId, TransportError};
