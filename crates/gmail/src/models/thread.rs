//! Thread resource: an ordered set of message ids

use serde::{Deserialize, Serialize};

use super::MessageView;

/// A conversation thread as stored in a mailbox
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Thread {
    pub id: String,
    pub message_ids: Vec<String>,
}

impl Thread {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            message_ids: Vec::new(),
        }
    }

    /// Append a message id if not already present
    pub fn push_message(&mut self, message_id: &str) {
        if !self.message_ids.iter().any(|m| m == message_id) {
            self.message_ids.push(message_id.to_string());
        }
    }
}

/// Read projection of a thread with its messages rendered per format
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadView {
    pub id: String,
    pub snippet: String,
    pub history_id: String,
    pub messages: Vec<MessageView>,
    pub message_ids: Vec<String>,
}
