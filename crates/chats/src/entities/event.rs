use serde::{Deserialize, Serialize};

/// Out-of-band notification delivered alongside chat messages.
///
/// Events travel the same per-connection path as messages but are never
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoomEvent {
    /// A participant started or stopped composing a message
    TypingIndicator { is_typing: bool, user_id: String },
}

impl RoomEvent {
    pub fn typing_started(user_id: impl Into<String>) -> Self {
        Self::TypingIndicator {
            is_typing: true,
            user_id: user_id.into(),
        }
    }

    pub fn typing_stopped(user_id: impl Into<String>) -> Self {
        Self::TypingIndicator {
            is_typing: false,
            user_id: user_id.into(),
        }
    }

    /// Event type name for logging
    pub fn event_type_name(&self) -> &'static str {
        match self {
            RoomEvent::TypingIndicator { .. } => "typing_indicator",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typing_indicator_wire_shape() {
        let value = serde_json::to_value(RoomEvent::typing_started("GEMINI")).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "type": "typing_indicator",
                "is_typing": true,
                "user_id": "GEMINI"
            })
        );
    }
}
