//! Agent interaction graph built from a turn's activity log.
//!
//! Each agent is a node holding the messages it produced. An edge runs from
//! the sender of every activity to the agent that handled it. A tool call
//! becomes its own node `function_{agent}_{source}`, shared by repeated calls
//! of the same tool, and a final response adds an edge to `You`.

use serde::Serialize;

use crate::message::{CopilotMessage, MessageType};

/// Node every graph starts with.
pub const COPILOT_NODE: &str = "Copilot";
/// Node standing for the user, added once a response arrives.
pub const USER_NODE: &str = "You";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentNode {
    pub id: String,
    pub messages: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_source: Option<String>,
}

impl AgentNode {
    fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            messages: Vec::new(),
            source_agent: None,
            agent_type: None,
            data_source: None,
        }
    }

    /// Tool nodes are named after the agent and the data source they query.
    pub fn is_function(&self) -> bool {
        self.id.starts_with("function_")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InteractionEdge {
    pub id: String,
    pub source: String,
    pub target: String,
}

impl InteractionEdge {
    fn new(source: &str, target: &str) -> Self {
        Self {
            id: format!("{source}-{target}"),
            source: source.to_string(),
            target: target.to_string(),
        }
    }
}

/// Nodes and edges in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InteractionGraph {
    pub nodes: Vec<AgentNode>,
    pub edges: Vec<InteractionEdge>,
}

impl InteractionGraph {
    pub fn from_activities(activities: &[CopilotMessage]) -> Self {
        let mut graph = Self {
            nodes: vec![AgentNode::new(COPILOT_NODE)],
            edges: Vec::new(),
        };

        for activity in activities {
            let agent = activity.agent_name.as_deref().unwrap_or_default();
            let sender = activity.sender_agent.as_deref().unwrap_or_default();
            graph.add_edge(sender, agent);

            let node = graph.node_or_insert(agent, || AgentNode {
                agent_type: activity.agent_type.clone(),
                ..AgentNode::new(agent)
            });
            node.messages.push(activity.content.clone());

            match activity.message_type {
                MessageType::Response => {
                    graph.node_or_insert(USER_NODE, || AgentNode::new(USER_NODE)).messages.clear();
                    graph.add_edge(agent, USER_NODE);
                }
                MessageType::Function => {
                    let source = activity.data_source.as_deref().unwrap_or_default();
                    let function = format!("function_{agent}_{source}");
                    if !graph.nodes.iter().any(|n| n.id == function) {
                        graph.add_edge(agent, &function);
                    }
                    let node = graph.node_or_insert(&function, || AgentNode {
                        source_agent: Some(agent.to_string()),
                        agent_type: activity.agent_type.clone(),
                        data_source: activity.data_source.clone(),
                        ..AgentNode::new(function.as_str())
                    });
                    node.messages.push(activity.content.clone());
                }
                _ => {}
            }
        }
        graph
    }

    pub fn node(&self, id: &str) -> Option<&AgentNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    fn node_or_insert(&mut self, id: &str, create: impl FnOnce() -> AgentNode) -> &mut AgentNode {
        let index = match self.nodes.iter().position(|n| n.id == id) {
            Some(index) => index,
            None => {
                self.nodes.push(create());
                self.nodes.len() - 1
            }
        };
        &mut self.nodes[index]
    }

    fn add_edge(&mut self, source: &str, target: &str) {
        let exists = self
            .edges
            .iter()
            .any(|e| e.source == source && e.target == target);
        if !exists {
            self.edges.push(InteractionEdge::new(source, target));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activity(message_type: MessageType, sender: &str, agent: &str, content: &str) -> CopilotMessage {
        CopilotMessage {
            sender_agent: Some(sender.to_string()),
            agent_name: Some(agent.to_string()),
            ..CopilotMessage::new(message_type, content)
        }
    }

    #[test]
    fn test_empty_log_has_only_copilot() {
        let graph = InteractionGraph::from_activities(&[]);
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.nodes[0].id, COPILOT_NODE);
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn test_repeated_interactions_share_one_edge() {
        let graph = InteractionGraph::from_activities(&[
            activity(MessageType::Activity, "Manager", "Planner", "planning"),
            activity(MessageType::Activity, "Manager", "Planner", "still planning"),
        ]);

        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].id, "Manager-Planner");
        assert_eq!(graph.node("Planner").unwrap().messages, vec!["planning", "still planning"]);
    }

    #[test]
    fn test_tool_calls_become_one_node_per_data_source() {
        let call = |content: &str, source: &str| CopilotMessage {
            data_source: Some(source.to_string()),
            agent_type: Some("Fabric Data Agent".to_string()),
            ..activity(MessageType::Function, "Planner", "Analyst", content)
        };
        let graph = InteractionGraph::from_activities(&[
            call("first", "Eventhouse"),
            call("second", "Eventhouse"),
            call("third", "Lakehouse"),
        ]);

        let eventhouse = graph.node("function_Analyst_Eventhouse").unwrap();
        assert!(eventhouse.is_function());
        assert_eq!(eventhouse.messages, vec!["first", "second"]);
        assert_eq!(eventhouse.source_agent.as_deref(), Some("Analyst"));
        assert_eq!(eventhouse.data_source.as_deref(), Some("Eventhouse"));
        assert_eq!(graph.node("Analyst").unwrap().messages.len(), 3);
        assert_eq!(graph.node("Analyst").unwrap().agent_type.as_deref(), Some("Fabric Data Agent"));

        let edges: Vec<&str> = graph.edges.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(
            edges,
            vec![
                "Planner-Analyst",
                "Analyst-function_Analyst_Eventhouse",
                "Analyst-function_Analyst_Lakehouse"
            ]
        );
    }

    #[test]
    fn test_response_links_agent_to_user() {
        let graph = InteractionGraph::from_activities(&[
            activity(MessageType::Activity, "Copilot", "Planner", "on it"),
            activity(MessageType::Response, "Planner", "Copilot", "done"),
        ]);

        let ids: Vec<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["Copilot", "Planner", "You"]);
        assert_eq!(graph.node("Copilot").unwrap().messages, vec!["done"]);
        assert!(graph.node(USER_NODE).unwrap().messages.is_empty());
        assert!(graph.edges.iter().any(|e| e.source == "Copilot" && e.target == USER_NODE));
    }
}
