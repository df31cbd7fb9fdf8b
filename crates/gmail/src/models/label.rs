//! Label resource and the well-known system label set

use serde::{Deserialize, Serialize};

/// Well-known Gmail system label ids
pub const SYSTEM_LABELS: &[&str] = &[
    "INBOX",
    "SENT",
    "DRAFT",
    "TRASH",
    "SPAM",
    "UNREAD",
    "STARRED",
    "IMPORTANT",
    "CATEGORY_PROMOTIONS",
    "CATEGORY_SOCIAL",
    "CATEGORY_UPDATES",
    "CATEGORY_FORUMS",
    "CATEGORY_PERSONAL",
];

/// Check whether a label id names a system label (case-insensitive)
pub fn is_system_label(id: &str) -> bool {
    let upper = id.to_uppercase();
    SYSTEM_LABELS.contains(&upper.as_str())
}

/// System labels are upper-cased for storage; user label case is preserved
pub fn normalize_label(id: &str) -> String {
    if is_system_label(id) {
        id.to_uppercase()
    } else {
        id.to_string()
    }
}

/// Visibility of messages with a label in the message list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageListVisibility {
    #[default]
    Show,
    Hide,
}

/// Visibility of a label in the label list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LabelListVisibility {
    #[default]
    LabelShow,
    LabelShowIfUnread,
    LabelHide,
}

/// Owner type of a label
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LabelType {
    System,
    #[default]
    User,
}

/// Label color (both fields required when a color is set)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelColor {
    pub text_color: String,
    pub background_color: String,
}

/// A label resource with its usage statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub id: String,
    pub name: String,
    pub message_list_visibility: MessageListVisibility,
    pub label_list_visibility: LabelListVisibility,
    #[serde(rename = "type")]
    pub label_type: LabelType,
    #[serde(default)]
    pub messages_total: u64,
    #[serde(default)]
    pub messages_unread: u64,
    #[serde(default)]
    pub threads_total: u64,
    #[serde(default)]
    pub threads_unread: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<LabelColor>,
}

impl Label {
    /// A user label with default visibility and zeroed counts
    pub fn user(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            message_list_visibility: MessageListVisibility::Show,
            label_list_visibility: LabelListVisibility::LabelShow,
            label_type: LabelType::User,
            messages_total: 0,
            messages_unread: 0,
            threads_total: 0,
            threads_unread: 0,
            color: None,
        }
    }

    /// A system label (read-only through the endpoints)
    pub fn system(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            label_type: LabelType::System,
            ..Self::user("", "")
        }
    }

    pub fn is_system(&self) -> bool {
        self.label_type == LabelType::System
    }
}

/// Properties accepted by label create/update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LabelInput {
    pub name: Option<String>,
    pub message_list_visibility: Option<MessageListVisibility>,
    pub label_list_visibility: Option<LabelListVisibility>,
    #[serde(rename = "type")]
    pub label_type: Option<LabelType>,
    pub color: Option<LabelColor>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("inbox"), "INBOX");
        assert_eq!(normalize_label("Project-X"), "Project-X");
    }

    #[test]
    fn test_system_label_roundtrip() {
        let label = Label::system("INBOX");
        assert!(label.is_system());
        assert_eq!(label.name, "INBOX");
    }

    #[test]
    fn test_visibility_serde_values() {
        let json = serde_json::to_value(LabelListVisibility::LabelShowIfUnread).unwrap();
        assert_eq!(json, "labelShowIfUnread");
        let json = serde_json::to_value(MessageListVisibility::Hide).unwrap();
        assert_eq!(json, "hide");
    }
}
