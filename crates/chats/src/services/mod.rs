//! Relay services: room membership, session handling, and AI replies.

pub mod ai_reply;
pub mod room_registry;
pub mod stream_handler;

pub use ai_reply::{AiReplyOutcome, AiReplyTask};
pub use room_registry::RoomRegistry;
pub use stream_handler::{decode_content, CloseReason, SessionSummary, StreamHandler};
