//! C2 - Payload Normalizer (spec.md §4.2).
//!
//! Walks the vendor envelope `entry[] -> changes[] -> value -> messages[]`
//! and emits one [`NormalizedMessage`] per entry, preserving vendor order.
//! Grounded on the original `extract_messages`/`NormalizedWhatsAppMessage`
//! walk: same traversal shape, same per-kind field extraction, but
//! represented as a Rust discriminated union instead of one wide optional
//! struct.

use otto_types::{MessageContent, MessageKind, NormalizedMessage};
use serde_json::Value;

/// Result of normalizing one webhook envelope.
#[derive(Debug, Default)]
pub struct NormalizeOutcome {
    pub messages: Vec<NormalizedMessage>,
    /// Count of vendor messages dropped for missing `id`, unknown `type`, or
    /// structurally invalid fields (spec.md §4.2: "dropped silently and counted").
    pub dropped: usize,
}

/// Normalize a full webhook envelope.
pub fn normalize_envelope(envelope: &Value) -> NormalizeOutcome {
    let mut outcome = NormalizeOutcome::default();

    let Some(entries) = envelope.get("entry").and_then(Value::as_array) else {
        return outcome;
    };

    for entry in entries {
        let Some(changes) = entry.get("changes").and_then(Value::as_array) else {
            continue;
        };
        for change in changes {
            let Some(messages) = change
                .get("value")
                .and_then(|v| v.get("messages"))
                .and_then(Value::as_array)
            else {
                continue;
            };
            for raw in messages {
                match normalize_one(raw) {
                    Some(msg) => outcome.messages.push(msg),
                    None => outcome.dropped += 1,
                }
            }
        }
    }

    outcome
}

fn normalize_one(raw: &Value) -> Option<NormalizedMessage> {
    let message_id = raw.get("id").and_then(Value::as_str)?.to_string();
    let from = raw.get("from").and_then(Value::as_str)?;
    let sender_address = format!("+{from}");
    let timestamp = raw
        .get("timestamp")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(0);
    let kind_tag = raw.get("type").and_then(Value::as_str)?;
    let kind = MessageKind::from_wire(kind_tag)?;

    let content = extract_content(kind, raw)?;

    NormalizedMessage::new(message_id, sender_address, timestamp, content, None).ok()
}

fn extract_content(kind: MessageKind, raw: &Value) -> Option<MessageContent> {
    let str_field = |obj: &Value, field: &str| {
        obj.get(field).and_then(Value::as_str).map(str::to_string)
    };

    Some(match kind {
        MessageKind::Text => MessageContent::Text {
            body: str_field(raw.get("text")?, "body")?,
        },
        MessageKind::Image => {
            let media = raw.get("image")?;
            MessageContent::Image {
                media_id: str_field(media, "id"),
                link: str_field(media, "link"),
                caption: str_field(media, "caption"),
            }
        }
        MessageKind::Video => {
            let media = raw.get("video")?;
            MessageContent::Video {
                media_id: str_field(media, "id"),
                link: str_field(media, "link"),
                caption: str_field(media, "caption"),
            }
        }
        MessageKind::Audio => {
            let media = raw.get("audio")?;
            MessageContent::Audio {
                media_id: str_field(media, "id"),
                link: str_field(media, "link"),
            }
        }
        MessageKind::Document => {
            let media = raw.get("document")?;
            MessageContent::Document {
                media_id: str_field(media, "id"),
                link: str_field(media, "link"),
                filename: str_field(media, "filename"),
            }
        }
        MessageKind::Sticker => {
            let media = raw.get("sticker")?;
            MessageContent::Sticker {
                media_id: str_field(media, "id"),
                link: str_field(media, "link"),
            }
        }
        MessageKind::Location => {
            let loc = raw.get("location")?;
            MessageContent::Location {
                latitude: loc.get("latitude").and_then(Value::as_f64)?,
                longitude: loc.get("longitude").and_then(Value::as_f64)?,
                name: str_field(loc, "name"),
                address: str_field(loc, "address"),
            }
        }
        MessageKind::Contacts => MessageContent::Contacts { raw: raw.get("contacts")?.clone() },
        MessageKind::Address => MessageContent::Address { raw: raw.get("address")?.clone() },
        MessageKind::Interactive => {
            let interactive = raw.get("interactive")?;
            let sub_type = interactive.get("type").and_then(Value::as_str)?;
            let (selection_id, selection_title) = match sub_type {
                "button" => {
                    let reply = interactive.get("button_reply")?;
                    (str_field(reply, "id")?, str_field(reply, "title"))
                }
                "list" => {
                    let reply = interactive.get("list_reply")?;
                    (str_field(reply, "id")?, str_field(reply, "title"))
                }
                _ => return None,
            };
            MessageContent::Interactive { selection_id, selection_title }
        }
        MessageKind::Template => {
            let template = raw.get("template")?;
            MessageContent::Template {
                name: str_field(template, "name")?,
                raw: template.clone(),
            }
        }
        MessageKind::Reaction => {
            let reaction = raw.get("reaction")?;
            MessageContent::Reaction {
                target_message_id: str_field(reaction, "message_id")?,
                emoji: str_field(reaction, "emoji"),
            }
        }
    })
}
