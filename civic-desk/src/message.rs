//! Message types exchanged with the chat platform.

use serde::{Deserialize, Serialize};

/// Inbound message, normalized from a webhook delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Platform message ID
    pub id: String,
    /// Sender id (WhatsApp `from`, digits as delivered)
    pub from: String,
    /// Normalized content
    pub content: Inbound,
    /// Timestamp (Unix millis)
    pub timestamp: i64,
    /// Trace id carried through every log line for this message
    pub trace_id: String,
}

/// Inbound content kinds the desk understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Inbound {
    /// Typed text, untrimmed
    FreeText(String),
    /// Tap on a list row or reply button, carrying its id
    Selection(String),
    /// Interactive reply that carried no id
    EmptySelection,
    /// Any other message type (image, audio, location...)
    Unsupported(String),
}

impl InboundMessage {
    /// Build a message with a fresh trace id.
    pub fn new(id: impl Into<String>, from: impl Into<String>, content: Inbound) -> Self {
        Self {
            id: id.into(),
            from: from.into(),
            content,
            timestamp: chrono::Utc::now().timestamp_millis(),
            trace_id: civic_common::logging::generate_trace_id(),
        }
    }

    /// Get the text content if this is a text message.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            Inbound::FreeText(text) => Some(text),
            _ => None,
        }
    }
}

/// Outgoing message addressed to one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Recipient id
    pub to: String,
    /// Message content
    pub content: OutgoingContent,
}

/// Outgoing message content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutgoingContent {
    /// Plain text
    Text { body: String },
    /// Single-select list
    List(ListMessage),
    /// Two reply buttons
    Buttons(ButtonPrompt),
}

/// Single-select list message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListMessage {
    pub header: String,
    pub body: String,
    pub footer: Option<String>,
    /// Label of the button that opens the list
    pub button: String,
    pub sections: Vec<ListSection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListSection {
    pub title: String,
    pub rows: Vec<ListRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRow {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
}

/// Prompt with exactly two reply buttons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonPrompt {
    pub body: String,
    pub buttons: [ReplyButton; 2],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyButton {
    pub id: String,
    pub title: String,
}

impl OutgoingMessage {
    /// Plain text message.
    pub fn text(to: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            content: OutgoingContent::Text { body: body.into() },
        }
    }

    /// Text body, if this is a text message.
    pub fn body(&self) -> Option<&str> {
        match &self.content {
            OutgoingContent::Text { body } => Some(body),
            _ => None,
        }
    }

    /// Short kind label for logging.
    pub const fn kind(&self) -> &'static str {
        match self.content {
            OutgoingContent::Text { .. } => "text",
            OutgoingContent::List(_) => "list",
            OutgoingContent::Buttons(_) => "buttons",
        }
    }
}

impl ListMessage {
    /// Iterate over every row id in section order.
    pub fn row_ids(&self) -> impl Iterator<Item = &str> {
        self.sections
            .iter()
            .flat_map(|s| s.rows.iter().map(|r| r.id.as_str()))
    }
}
