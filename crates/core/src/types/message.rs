//! Messages exchanged over the socket

use serde::{Deserialize, Serialize};

use super::RenderCommand;

/// Value a client submits in answer to a request
///
/// A key press is a one-character string, a line prompt is any string,
/// and an option box answer is the selected index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    Index(u64),
    Text(String),
}

impl InputValue {
    /// Single character answer to a key request
    pub fn as_key(&self) -> Option<char> {
        match self {
            Self::Text(s) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(c),
                    _ => None,
                }
            }
            Self::Index(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Index(_) => None,
        }
    }

    pub fn as_index(&self) -> Option<u64> {
        match self {
            Self::Index(i) => Some(*i),
            Self::Text(_) => None,
        }
    }
}

/// Session control sent by the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    /// Start a new session, or resume one by token
    Connect {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },
    /// Keeps an idle socket alive
    Keepalive,
    /// Client is going away; start the grace period now
    Reset,
}

/// Answer to the most recent request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub input: InputValue,
    /// Epoch of the request being answered; absent means "current"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epoch: Option<u64>,
}

/// Anything a client sends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClientMessage {
    Control(ControlMessage),
    Response(Response),
}

impl ClientMessage {
    pub fn connect(token: Option<String>) -> Self {
        Self::Control(ControlMessage::Connect { token })
    }

    pub fn keepalive() -> Self {
        Self::Control(ControlMessage::Keepalive)
    }

    pub fn reset() -> Self {
        Self::Control(ControlMessage::Reset)
    }

    pub fn response(input: InputValue, epoch: Option<u64>) -> Self {
        Self::Response(Response { input, epoch })
    }
}

/// Session control sent by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerControl {
    /// Token the client must present to resume this session
    Token { token: String },
}

/// Anything the server sends: a control message or a command batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Control(ServerControl),
    Batch(Vec<RenderCommand>),
}

impl ServerMessage {
    pub fn token(token: impl Into<String>) -> Self {
        Self::Control(ServerControl::Token {
            token: token.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_connect_without_token() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"connect"}"#).unwrap();
        assert_eq!(msg, ClientMessage::connect(None));
        assert_eq!(serde_json::to_value(&msg).unwrap(), json!({"type": "connect"}));
    }

    #[test]
    fn test_connect_with_token() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"connect","token":"abc"}"#).unwrap();
        assert_eq!(msg, ClientMessage::connect(Some("abc".into())));
    }

    #[test]
    fn test_keepalive_and_reset() {
        let k: ClientMessage = serde_json::from_str(r#"{"type":"keepalive"}"#).unwrap();
        let r: ClientMessage = serde_json::from_str(r#"{"type":"reset"}"#).unwrap();
        assert_eq!(k, ClientMessage::keepalive());
        assert_eq!(r, ClientMessage::reset());
    }

    #[test]
    fn test_response_shapes() {
        let key: ClientMessage = serde_json::from_str(r#"{"input":"y"}"#).unwrap();
        assert_eq!(key, ClientMessage::response(InputValue::Text("y".into()), None));

        let idx: ClientMessage = serde_json::from_str(r#"{"input":2,"epoch":5}"#).unwrap();
        assert_eq!(idx, ClientMessage::response(InputValue::Index(2), Some(5)));
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"bogus"}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>(r#"{"foo":1}"#).is_err());
    }

    #[test]
    fn test_input_value_accessors() {
        assert_eq!(InputValue::Text("q".into()).as_key(), Some('q'));
        assert_eq!(InputValue::Text("qq".into()).as_key(), None);
        assert_eq!(InputValue::Text(String::new()).as_key(), None);
        assert_eq!(InputValue::Index(3).as_index(), Some(3));
        assert_eq!(InputValue::Index(3).as_text(), None);
    }

    #[test]
    fn test_server_token_shape() {
        let msg = ServerMessage::token("deadbeef");
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type": "token", "token": "deadbeef"})
        );
    }

    #[test]
    fn test_batch_is_bare_array() {
        let msg = ServerMessage::Batch(vec![RenderCommand::Clear]);
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!([{"command": "clear"}])
        );
        let back: ServerMessage = serde_json::from_value(json!([{"command": "clear"}])).unwrap();
        assert_eq!(back, msg);
    }
}
