use serde_json::Value;

use crate::error::SessionError;

/// Type tag of participant-count frames
pub const TYPE_COUNT: &str = "count";
/// Type tag of participant-list frames
pub const TYPE_PARTICIPANTS: &str = "participants";
/// Type tag of handshake status frames
pub const TYPE_HANDSHAKE_STATUS: &str = "ws_handshake_status";
/// Shorter handshake tag some room servers emit
const TYPE_HANDSHAKE_STATUS_SHORT: &str = "handshake_status";
/// Handshake status that completes the join
pub const STATUS_CONNECTED: &str = "connected";

/// One inbound room frame, decoded once at the boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// `{"type": "count", "count": n}`
    Count(u64),
    /// `{"type": "participants", "participants": [..]}`
    Participants(Vec<String>),
    /// `{"type": "ws_handshake_status", "status": ..}`
    HandshakeStatus(String),
    /// Any frame carrying a string `message` field
    GenericMessage(String),
    /// Valid JSON with nothing the client understands
    Unrecognized(String),
}

impl InboundMessage {
    /// Decode a text frame into the messages it carries.
    ///
    /// A frame can yield two messages: its typed variant plus a
    /// `GenericMessage` when it also has a `message` field. Non-JSON input is
    /// an error; unknown shapes decode to a single `Unrecognized`.
    pub fn decode(text: &str) -> Result<Vec<InboundMessage>, SessionError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| SessionError::MalformedInboundMessage(e.to_string()))?;

        let Value::Object(fields) = &value else {
            return Ok(vec![InboundMessage::Unrecognized(text.to_string())]);
        };

        let mut messages = Vec::new();
        let kind = fields.get("type").and_then(Value::as_str);

        match kind {
            Some(t) if t.eq_ignore_ascii_case(TYPE_COUNT) => {
                if let Some(count) = fields.get("count").and_then(Value::as_u64) {
                    messages.push(InboundMessage::Count(count));
                }
            }
            Some(t) if t.eq_ignore_ascii_case(TYPE_PARTICIPANTS) => {
                if let Some(list) = fields.get("participants").and_then(Value::as_array) {
                    let names = list
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect();
                    messages.push(InboundMessage::Participants(names));
                }
            }
            Some(t)
                if t.eq_ignore_ascii_case(TYPE_HANDSHAKE_STATUS)
                    || t.eq_ignore_ascii_case(TYPE_HANDSHAKE_STATUS_SHORT) =>
            {
                if let Some(status) = fields.get("status").and_then(Value::as_str) {
                    messages.push(InboundMessage::HandshakeStatus(status.to_string()));
                }
            }
            _ => {}
        }

        if let Some(message) = fields.get("message").and_then(Value::as_str) {
            messages.push(InboundMessage::GenericMessage(message.to_string()));
        }

        if messages.is_empty() {
            messages.push(InboundMessage::Unrecognized(text.to_string()));
        }

        Ok(messages)
    }

    /// Whether this is the handshake acknowledgement (case-insensitive)
    pub fn is_handshake_connected(&self) -> bool {
        matches!(self, InboundMessage::HandshakeStatus(status) if status.eq_ignore_ascii_case(STATUS_CONNECTED))
    }
}
