//! Domain entities relayed through rooms.

pub mod event;
pub mod message;

pub use event::RoomEvent;
pub use message::ChatMessage;
