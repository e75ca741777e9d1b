//! Client for the Copilot chat channel.
//!
//! The assistant is a group of agents behind one WebSocket. The client keeps
//! the socket alive (heartbeat, exponential reconnect), forwards user
//! messages and folds every inbound frame into a [`Conversation`]: the chat
//! transcript, the activity log of the current turn and a `thinking` flag.
//! [`InteractionGraph`] turns the activity log into agent nodes and edges.

pub mod client;
pub mod config;
pub mod conversation;
pub mod error;
pub mod graph;
pub mod message;
pub mod policy;

pub use client::CopilotClient;
pub use config::CopilotConfig;
pub use conversation::{ChatEntry, ChatRole, Conversation};
pub use error::{CopilotError, CopilotResult};
pub use graph::{AgentNode, InteractionEdge, InteractionGraph};
pub use message::{CopilotMessage, Frame, MessageType};
pub use policy::{CloseKind, HeartbeatPolicy, ReadyState, ReconnectPolicy};
