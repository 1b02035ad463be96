//! §3 NormalizedMessage - one received message, flattened from the vendor envelope.

use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};

/// The discrete message-kind tag used to key the outbound payload builder
/// (out of scope per spec.md §1) and to route content extraction on the way in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Image,
    Video,
    Audio,
    Document,
    Sticker,
    Location,
    Contacts,
    Address,
    Interactive,
    Template,
    Reaction,
}

impl MessageKind {
    pub fn from_wire(tag: &str) -> Option<Self> {
        Some(match tag {
            "text" => Self::Text,
            "image" => Self::Image,
            "video" => Self::Video,
            "audio" => Self::Audio,
            "document" => Self::Document,
            "sticker" => Self::Sticker,
            "location" => Self::Location,
            "contacts" => Self::Contacts,
            "address" => Self::Address,
            "interactive" => Self::Interactive,
            "template" => Self::Template,
            "reaction" => Self::Reaction,
            _ => return None,
        })
    }
}

/// Discriminated content carried by a [`NormalizedMessage`], per kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageContent {
    Text { body: String },
    Image { media_id: Option<String>, link: Option<String>, caption: Option<String> },
    Video { media_id: Option<String>, link: Option<String>, caption: Option<String> },
    Audio { media_id: Option<String>, link: Option<String> },
    Document { media_id: Option<String>, link: Option<String>, filename: Option<String> },
    Sticker { media_id: Option<String>, link: Option<String> },
    Location { latitude: f64, longitude: f64, name: Option<String>, address: Option<String> },
    Contacts { raw: serde_json::Value },
    Address { raw: serde_json::Value },
    Interactive { selection_id: String, selection_title: Option<String> },
    Template { name: String, raw: serde_json::Value },
    Reaction { target_message_id: String, emoji: Option<String> },
}

impl MessageContent {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Text { .. } => MessageKind::Text,
            Self::Image { .. } => MessageKind::Image,
            Self::Video { .. } => MessageKind::Video,
            Self::Audio { .. } => MessageKind::Audio,
            Self::Document { .. } => MessageKind::Document,
            Self::Sticker { .. } => MessageKind::Sticker,
            Self::Location { .. } => MessageKind::Location,
            Self::Contacts { .. } => MessageKind::Contacts,
            Self::Address { .. } => MessageKind::Address,
            Self::Interactive { .. } => MessageKind::Interactive,
            Self::Template { .. } => MessageKind::Template,
            Self::Reaction { .. } => MessageKind::Reaction,
        }
    }
}

/// One message received from the vendor webhook, flattened and validated.
///
/// Invariant: `message_id` non-empty, `sender_address` starts with `+`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedMessage {
    pub message_id: String,
    pub sender_address: String,
    pub timestamp: i64,
    pub content: MessageContent,
    /// The WhatsApp `chat_id`, when the vendor envelope carries one distinct
    /// from the sender address; otherwise sessions key off `sender_address`.
    pub chat_id: Option<String>,
}

impl NormalizedMessage {
    pub fn new(
        message_id: impl Into<String>,
        sender_address: impl Into<String>,
        timestamp: i64,
        content: MessageContent,
        chat_id: Option<String>,
    ) -> ValidationResult<Self> {
        let message_id = message_id.into();
        let sender_address = sender_address.into();

        if message_id.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "message_id" });
        }
        if !sender_address.starts_with('+') {
            return Err(ValidationError::InvalidValue {
                field: "sender_address",
                reason: "must be E.164 with leading '+'".to_string(),
            });
        }

        Ok(Self {
            message_id,
            sender_address,
            timestamp,
            content,
            chat_id,
        })
    }

    pub fn kind(&self) -> MessageKind {
        self.content.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_message_id() {
        let err = NormalizedMessage::new(
            "",
            "+5511999999999",
            1,
            MessageContent::Text { body: "oi".into() },
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::MissingField { field: "message_id" }));
    }

    #[test]
    fn rejects_sender_without_plus() {
        let err = NormalizedMessage::new(
            "m1",
            "5511999999999",
            1,
            MessageContent::Text { body: "oi".into() },
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { field: "sender_address", .. }));
    }

    #[test]
    fn accepts_valid_text_message() {
        let msg = NormalizedMessage::new(
            "m1",
            "+5511999999999",
            1,
            MessageContent::Text { body: "oi".into() },
            None,
        )
        .unwrap();
        assert_eq!(msg.kind(), MessageKind::Text);
    }
}
