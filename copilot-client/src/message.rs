//! Wire schema of the chat channel.
//!
//! Every frame is a JSON object tagged by `message_type`, except the literal
//! text `pong` the server sends back for a heartbeat.

use serde::{Deserialize, Serialize};

use crate::error::CopilotResult;

/// Text the server answers a heartbeat with.
pub const PONG: &str = "pong";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    UserMessage,
    /// Final answer of a turn.
    Response,
    /// Progress note from an agent.
    Activity,
    /// Tool call made by an agent.
    Function,
    Error,
    Ping,
    Pong,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopilotMessage {
    pub message_type: MessageType,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl CopilotMessage {
    pub fn new(message_type: MessageType, content: impl Into<String>) -> Self {
        Self {
            message_type,
            content: content.into(),
            sender_agent: None,
            agent_name: None,
            data_source: None,
            agent_type: None,
            client_id: None,
            token: None,
        }
    }

    /// A question from the user, carrying the caller's token for the agents.
    pub fn user(content: impl Into<String>, client_id: u64, token: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id),
            token: Some(token.into()),
            ..Self::new(MessageType::UserMessage, content)
        }
    }

    /// Heartbeat frame, `{"message_type":"ping","content":""}`.
    pub fn ping() -> Self {
        Self::new(MessageType::Ping, "")
    }

    pub fn to_json(&self) -> CopilotResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A decoded inbound text frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Pong,
    Message(CopilotMessage),
}

impl Frame {
    pub fn decode(text: &str) -> CopilotResult<Self> {
        if text == PONG {
            return Ok(Self::Pong);
        }
        Ok(Self::Message(serde_json::from_str(text)?))
    }
}
