//! Draft resource: a message wrapper that is not yet sent

use serde::{Deserialize, Serialize};

use super::{Message, MessageInput};

/// A draft as stored in a mailbox
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Draft {
    pub id: String,
    pub message: Message,
}

/// Input accepted by draft create/update/send
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftInput {
    /// Existing draft id (send-by-id)
    pub id: Option<String>,
    pub message: Option<MessageInput>,
}
