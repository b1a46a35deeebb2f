//! Realtime wire events
//!
//! Frames are JSON objects tagged by event name:
//!
//! ```json
//! {"event": "register", "data": "alice"}
//! {"event": "send_message", "data": {"sender": "alice", "receiver": "bob", "content": "hi"}}
//! {"event": "receive_message", "data": {"_id": "...", "sender": "alice", ...}}
//! ```

use serde::{Deserialize, Serialize};

use crate::models::{ChatMessage, NewMessage};

/// Events sent by clients
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Associate this connection with a user id
    #[serde(alias = "user_online")]
    Register(String),
    SendMessage(NewMessage),
}

impl ClientEvent {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Events pushed to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    ReceiveMessage(ChatMessage),
    Error(ErrorPayload),
}

impl ServerEvent {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        ServerEvent::Error(ErrorPayload {
            kind,
            message: message.into(),
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MalformedPayload,
    PersistenceFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPayload {
    pub kind: ErrorKind,
    pub message: String,
}
