//! JSON codec for socket text frames

use crate::error::{CoreError, Result};
use crate::types::{ClientMessage, RenderCommand, ServerControl, ServerMessage};
use serde_json::Value;

/// Maximum frame size (1MB)
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Message codec for serialization/deserialization
pub struct MessageCodec;

impl MessageCodec {
    /// Encode a client message to a text frame
    pub fn encode_client(msg: &ClientMessage) -> Result<String> {
        Self::encode(msg)
    }

    /// Decode a text frame from a client
    ///
    /// Unknown `type` values and unrecognised shapes are errors; callers log
    /// and drop them.
    pub fn decode_client(frame: &str) -> Result<ClientMessage> {
        Self::check_size(frame.len())?;
        serde_json::from_str(frame).map_err(|e| CoreError::InvalidMessageFormat(e.to_string()))
    }

    /// Encode a server message to a text frame
    pub fn encode_server(msg: &ServerMessage) -> Result<String> {
        Self::encode(msg)
    }

    /// Decode a text frame from the server
    ///
    /// Batch elements with an unknown `command` are skipped so newer servers
    /// can add commands without breaking older clients.
    pub fn decode_server(frame: &str) -> Result<ServerMessage> {
        Self::check_size(frame.len())?;
        let value: Value = serde_json::from_str(frame)?;

        match value {
            Value::Array(items) => {
                let mut batch = Vec::with_capacity(items.len());
                for item in items {
                    match serde_json::from_value::<RenderCommand>(item) {
                        Ok(cmd) => batch.push(cmd),
                        Err(e) => tracing::debug!("Skipping unknown render command: {}", e),
                    }
                }
                Ok(ServerMessage::Batch(batch))
            }
            Value::Object(_) => serde_json::from_value::<ServerControl>(value)
                .map(ServerMessage::Control)
                .map_err(|e| CoreError::InvalidMessageFormat(e.to_string())),
            other => Err(CoreError::InvalidMessageFormat(format!(
                "expected array or object, got {}",
                other
            ))),
        }
    }

    fn encode<T: serde::Serialize>(msg: &T) -> Result<String> {
        let text = serde_json::to_string(msg)?;
        Self::check_size(text.len())?;
        Ok(text)
    }

    fn check_size(size: usize) -> Result<()> {
        if size > MAX_MESSAGE_SIZE {
            return Err(CoreError::MessageTooLarge {
                size,
                max: MAX_MESSAGE_SIZE,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InputValue;

    #[test]
    fn test_client_roundtrip() {
        let msg = ClientMessage::response(InputValue::Index(1), Some(4));
        let encoded = MessageCodec::encode_client(&msg).unwrap();
        let decoded = MessageCodec::decode_client(&encoded).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_decode_client_malformed() {
        assert!(MessageCodec::decode_client("not json").is_err());
        assert!(MessageCodec::decode_client(r#"{"type":"dance"}"#).is_err());
    }

    #[test]
    fn test_decode_server_token() {
        let msg = MessageCodec::decode_server(r#"{"type":"token","token":"ab"}"#).unwrap();
        assert_eq!(msg, ServerMessage::token("ab"));
    }

    #[test]
    fn test_decode_server_skips_unknown_commands() {
        let frame = r#"[{"command":"print","text":"hi"},{"command":"beep"},{"command":"clear"}]"#;
        let msg = MessageCodec::decode_server(frame).unwrap();
        assert_eq!(
            msg,
            ServerMessage::Batch(vec![RenderCommand::print("hi"), RenderCommand::Clear])
        );
    }

    #[test]
    fn test_decode_server_rejects_scalars() {
        assert!(matches!(
            MessageCodec::decode_server("42"),
            Err(CoreError::InvalidMessageFormat(_))
        ));
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let frame = "x".repeat(MAX_MESSAGE_SIZE + 1);
        assert!(matches!(
            MessageCodec::decode_client(&frame),
            Err(CoreError::MessageTooLarge { .. })
        ));
    }
}
