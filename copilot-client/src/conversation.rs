//! Conversation state folded from the channel.

use serde::Serialize;

use crate::graph::InteractionGraph;
use crate::message::{CopilotMessage, MessageType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One line of the chat transcript.
///
/// User lines carry `content`; assistant lines carry `reply` and the agent
/// that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatEntry {
    pub role: ChatRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_agent: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    thinking: bool,
    activities: Vec<CopilotMessage>,
    transcript: Vec<ChatEntry>,
    error: Option<String>,
}

impl Conversation {
    /// Starts a turn: the previous turn's activities and error are dropped.
    pub fn begin_user_message(&mut self, content: &str, client_id: u64) {
        self.thinking = true;
        self.activities.clear();
        self.error = None;
        self.transcript.push(ChatEntry {
            role: ChatRole::User,
            content: Some(content.to_string()),
            reply: None,
            client_id: Some(client_id),
            sender_agent: None,
        });
    }

    /// Folds one inbound message into the conversation.
    pub fn apply(&mut self, message: CopilotMessage) {
        match message.message_type {
            MessageType::Response => {
                self.transcript.push(ChatEntry {
                    role: ChatRole::Assistant,
                    content: None,
                    reply: Some(message.content.clone()),
                    client_id: None,
                    sender_agent: message.sender_agent.clone(),
                });
                self.activities.push(message);
                self.thinking = false;
            }
            MessageType::Activity | MessageType::Function => self.activities.push(message),
            MessageType::Error => self.fail(message.content),
            MessageType::UserMessage | MessageType::Ping | MessageType::Pong | MessageType::Unknown => {}
        }
    }

    /// Ends the turn with an error.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.thinking = false;
    }

    /// Empties the transcript and the activity log.
    pub fn clear(&mut self) {
        self.transcript.clear();
        self.activities.clear();
    }

    pub fn is_thinking(&self) -> bool {
        self.thinking
    }

    pub fn activities(&self) -> &[CopilotMessage] {
        &self.activities
    }

    pub fn transcript(&self) -> &[ChatEntry] {
        &self.transcript
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn interaction_graph(&self) -> InteractionGraph {
        InteractionGraph::from_activities(&self.activities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(message_type: MessageType, agent_name: &str, content: &str) -> CopilotMessage {
        CopilotMessage {
            agent_name: Some(agent_name.to_string()),
            sender_agent: Some("Planner".to_string()),
            ..CopilotMessage::new(message_type, content)
        }
    }

    #[test]
    fn test_turn_runs_from_user_message_to_response() {
        let mut conversation = Conversation::default();
        conversation.begin_user_message("top movers?", 7);
        assert!(conversation.is_thinking());

        conversation.apply(agent(MessageType::Activity, "Analyst", "looking"));
        conversation.apply(agent(MessageType::Function, "Analyst", "3 rows"));
        assert!(conversation.is_thinking());

        conversation.apply(agent(MessageType::Response, "Copilot", "MSFT is up"));

        assert!(!conversation.is_thinking());
        assert_eq!(conversation.activities().len(), 3);
        assert_eq!(conversation.transcript().len(), 2);
        let reply = &conversation.transcript()[1];
        assert_eq!(reply.role, ChatRole::Assistant);
        assert_eq!(reply.reply.as_deref(), Some("MSFT is up"));
        assert_eq!(reply.sender_agent.as_deref(), Some("Planner"));
    }

    #[test]
    fn test_new_turn_clears_activities_and_error_but_keeps_transcript() {
        let mut conversation = Conversation::default();
        conversation.begin_user_message("first", 1);
        conversation.apply(agent(MessageType::Activity, "Analyst", "working"));
        conversation.apply(CopilotMessage::new(MessageType::Error, "agent crashed"));
        assert_eq!(conversation.error(), Some("agent crashed"));
        assert!(!conversation.is_thinking());

        conversation.begin_user_message("second", 1);

        assert!(conversation.activities().is_empty());
        assert_eq!(conversation.error(), None);
        assert_eq!(conversation.transcript().len(), 2);
    }

    #[test]
    fn test_heartbeat_frames_change_nothing() {
        let mut conversation = Conversation::default();
        conversation.begin_user_message("q", 1);
        let before = conversation.clone();

        conversation.apply(CopilotMessage::new(MessageType::Pong, ""));
        conversation.apply(CopilotMessage::new(MessageType::Ping, ""));
        conversation.apply(CopilotMessage::new(MessageType::Unknown, "?"));

        assert_eq!(conversation, before);
    }

    #[test]
    fn test_clear_empties_transcript_and_activities() {
        let mut conversation = Conversation::default();
        conversation.begin_user_message("q", 1);
        conversation.apply(agent(MessageType::Response, "Copilot", "a"));

        conversation.clear();

        assert!(conversation.transcript().is_empty());
        assert!(conversation.activities().is_empty());
    }

    #[test]
    fn test_user_entry_shape() {
        let mut conversation = Conversation::default();
        conversation.begin_user_message("hello", 42);
        assert_eq!(
            serde_json::to_value(&conversation.transcript()[0]).unwrap(),
            serde_json::json!({"role": "user", "content": "hello", "client_id": 42})
        );
    }
}
