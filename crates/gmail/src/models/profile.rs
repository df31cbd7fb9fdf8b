//! Mailbox profile

use serde::{Deserialize, Serialize};

/// Per-user profile counters, as returned by `getProfile`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub email_address: String,
    pub messages_total: u64,
    pub threads_total: u64,
    pub history_id: String,
}

impl Profile {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email_address: email.into(),
            messages_total: 0,
            threads_total: 0,
            history_id: "1".to_string(),
        }
    }
}
