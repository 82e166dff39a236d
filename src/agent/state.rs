//! Conversation state threaded through the routing graph.

use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoStaticStr};

use crate::CONVERSATION_CONTEXT_MESSAGES;
use crate::tools::criteria::FlightCriteria;
use crate::tools::flight_search::ScoredFlight;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    fn label(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Coarse category a user turn is routed under. Declaration order is
/// contractual: intent resolution takes the first variant whose wire
/// label appears in the classifier output.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    FlightSearch,
    VisaQuery,
    PolicyQuery,
    GeneralTravel,
    ClarificationNeeded,
}

impl Intent {
    pub fn label(&self) -> &'static str {
        self.into()
    }
}

/// Full conversation state for one turn. The message history is
/// append-only and must already contain the current query as its last
/// entry when a turn starts; `final_response` is terminal once set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnState {
    pub messages: Vec<ChatMessage>,
    pub user_query: String,
    pub intent: Option<Intent>,
    pub extracted_criteria: Option<FlightCriteria>,
    pub search_results: Option<Vec<ScoredFlight>>,
    pub rag_context: Option<String>,
    pub final_response: Option<String>,
    pub needs_clarification: bool,
    /// Diagnostic only; a populated error never blocks a response.
    pub error: Option<String>,
}

impl TurnState {
    /// Start a turn: history plus the current query (also appended as the
    /// newest user message).
    pub fn for_query(mut messages: Vec<ChatMessage>, user_query: impl Into<String>) -> Self {
        let user_query = user_query.into();
        messages.push(ChatMessage::user(user_query.clone()));
        Self {
            messages,
            user_query,
            ..Self::default()
        }
    }

    /// Render the recent context window as "Role: content" lines.
    /// `exclude_current` drops the newest message (the query being
    /// classified) from the window.
    pub fn format_recent_messages(&self, exclude_current: bool) -> String {
        let messages = if exclude_current && !self.messages.is_empty() {
            &self.messages[..self.messages.len() - 1]
        } else {
            &self.messages[..]
        };
        let start = messages.len().saturating_sub(CONVERSATION_CONTEXT_MESSAGES);
        messages[start..]
            .iter()
            .filter(|m| !m.content.is_empty())
            .map(|m| format!("{}: {}", m.role.label(), m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Most recent assistant message, if any.
    pub fn last_assistant_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::Assistant)
            .map(|m| m.content.as_str())
    }
}
