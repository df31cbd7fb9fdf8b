//! Label endpoints: create, get, list, update/patch, delete

use serde::Serialize;

use super::validate_user_id;
use crate::error::{Error, Result};
use crate::models::{Label, LabelInput};
use crate::store::{GmailStore, mailbox_mut};

/// Response of `list`
#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub labels: Vec<Label>,
}

/// Creates a user label with a generated `Label_{n}` id.
///
/// Missing properties fall back to defaults; the name defaults to the id.
pub fn create(store: &GmailStore, user_id: &str, input: Option<LabelInput>) -> Result<Label> {
    validate_user_id(user_id)?;
    let user = store.resolve_user(user_id)?;
    let input = input.unwrap_or_default();

    let num = store.next_label_num();
    let label_id = format!("Label_{num}");

    let label = Label {
        id: label_id.clone(),
        name: input.name.unwrap_or_else(|| label_id.clone()),
        message_list_visibility: input.message_list_visibility.unwrap_or_default(),
        label_list_visibility: input.label_list_visibility.unwrap_or_default(),
        label_type: input.label_type.unwrap_or_default(),
        messages_total: 0,
        messages_unread: 0,
        threads_total: 0,
        threads_unread: 0,
        color: input.color,
    };

    let mut users = store.users_mut();
    let mailbox = mailbox_mut(&mut users, &user)?;
    mailbox.labels.insert(label_id, label.clone());
    Ok(label)
}

/// Permanently deletes a label. System labels are read-only; deleting a
/// label that does not exist is a no-op.
pub fn delete(store: &GmailStore, user_id: &str, id: &str) -> Result<()> {
    validate_user_id(user_id)?;
    let user = store.resolve_user(user_id)?;

    let mut users = store.users_mut();
    let mailbox = mailbox_mut(&mut users, &user)?;
    if let Some(existing) = mailbox.labels.get(id)
        && existing.is_system()
    {
        return Err(Error::validation(format!(
            "Cannot delete system label '{id}'. System labels are read-only."
        )));
    }
    mailbox.labels.remove(id);
    Ok(())
}

/// Gets a label; `None` when it does not exist
pub fn get(store: &GmailStore, user_id: &str, id: &str) -> Result<Option<Label>> {
    validate_user_id(user_id)?;
    if id.chars().any(char::is_whitespace) {
        return Err(Error::validation("id cannot have whitespace"));
    }
    let user = store.resolve_user(user_id)?;
    let users = store.users();
    Ok(users[&user].labels.get(id).cloned())
}

/// Lists all labels of the user, sorted by id
pub fn list(store: &GmailStore, user_id: &str) -> Result<ListResponse> {
    validate_user_id(user_id)?;
    let user = store.resolve_user(user_id)?;
    let users = store.users();
    let mut labels: Vec<Label> = users[&user].labels.values().cloned().collect();
    labels.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(ListResponse { labels })
}

/// Replaces the properties of an existing label.
///
/// Counts are carried over; a `None` input returns the label unchanged.
/// Returns `None` when the label does not exist.
pub fn update(
    store: &GmailStore,
    user_id: &str,
    id: &str,
    input: Option<LabelInput>,
) -> Result<Option<Label>> {
    validate_user_id(user_id)?;
    let user = store.resolve_user(user_id)?;

    let mut users = store.users_mut();
    let mailbox = mailbox_mut(&mut users, &user)?;
    let Some(existing) = mailbox.labels.get_mut(id) else {
        return Ok(None);
    };
    let Some(input) = input else {
        return Ok(Some(existing.clone()));
    };

    let updated = Label {
        id: existing.id.clone(),
        name: input.name.unwrap_or_else(|| existing.name.clone()),
        message_list_visibility: input.message_list_visibility.unwrap_or_default(),
        label_list_visibility: input.label_list_visibility.unwrap_or_default(),
        label_type: input.label_type.unwrap_or_default(),
        messages_total: existing.messages_total,
        messages_unread: existing.messages_unread,
        threads_total: existing.threads_total,
        threads_unread: existing.threads_unread,
        color: input.color.or_else(|| existing.color.clone()),
    };
    *existing = updated.clone();
    Ok(Some(updated))
}

/// Alias for `update`: despite the name, a full replacement
pub fn patch(
    store: &GmailStore,
    user_id: &str,
    id: &str,
    input: Option<LabelInput>,
) -> Result<Option<Label>> {
    update(store, user_id, id, input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LabelColor, LabelListVisibility, MessageListVisibility};

    #[test]
    fn test_create_with_defaults() {
        let store = GmailStore::new();
        let label = create(&store, "me", None).unwrap();
        assert!(label.id.starts_with("Label_"));
        assert_eq!(label.name, label.id);
        assert_eq!(label.message_list_visibility, MessageListVisibility::Show);
        assert_eq!(label.label_list_visibility, LabelListVisibility::LabelShow);
        assert_eq!(label.messages_total, 0);
    }

    #[test]
    fn test_create_with_properties() {
        let store = GmailStore::new();
        let label = create(
            &store,
            "me",
            Some(LabelInput {
                name: Some("Receipts".to_string()),
                message_list_visibility: Some(MessageListVisibility::Hide),
                color: Some(LabelColor {
                    text_color: "#ffffff".to_string(),
                    background_color: "#000000".to_string(),
                }),
                ..LabelInput::default()
            }),
        )
        .unwrap();
        assert_eq!(label.name, "Receipts");
        assert_eq!(label.message_list_visibility, MessageListVisibility::Hide);
        assert_eq!(label.color.unwrap().text_color, "#ffffff");
    }

    #[test]
    fn test_get_and_list() {
        let store = GmailStore::new();
        let created = create(&store, "me", None).unwrap();

        let fetched = get(&store, "me", &created.id).unwrap().unwrap();
        assert_eq!(fetched.id, created.id);
        assert!(get(&store, "me", "Label_999").unwrap().is_none());

        // 7 system labels plus the new one
        let listed = list(&store, "me").unwrap();
        assert_eq!(listed.labels.len(), 8);
    }

    #[test]
    fn test_update_carries_counts() {
        let store = GmailStore::new();
        let created = create(&store, "me", None).unwrap();
        {
            let mut users = store.users_mut();
            users.get_mut("me").unwrap().labels.get_mut(&created.id).unwrap().messages_total = 5;
        }

        let updated = update(
            &store,
            "me",
            &created.id,
            Some(LabelInput {
                name: Some("Renamed".to_string()),
                ..LabelInput::default()
            }),
        )
        .unwrap()
        .unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.messages_total, 5);
    }

    #[test]
    fn test_update_none_input_returns_existing() {
        let store = GmailStore::new();
        let created = create(&store, "me", None).unwrap();
        let same = update(&store, "me", &created.id, None).unwrap().unwrap();
        assert_eq!(same.name, created.name);
        assert!(update(&store, "me", "Label_999", None).unwrap().is_none());
    }

    #[test]
    fn test_delete_label() {
        let store = GmailStore::new();
        let created = create(&store, "me", None).unwrap();
        delete(&store, "me", &created.id).unwrap();
        assert!(get(&store, "me", &created.id).unwrap().is_none());
        // Deleting again is a no-op
        delete(&store, "me", &created.id).unwrap();
    }

    #[test]
    fn test_delete_system_label_is_rejected() {
        let store = GmailStore::new();
        let err = delete(&store, "me", "INBOX").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(get(&store, "me", "INBOX").unwrap().is_some());
    }

    #[test]
    fn test_patch_is_update() {
        let store = GmailStore::new();
        let created = create(&store, "me", None).unwrap();
        let patched = patch(
            &store,
            "me",
            &created.id,
            Some(LabelInput {
                name: Some("Patched".to_string()),
                ..LabelInput::default()
            }),
        )
        .unwrap()
        .unwrap();
        assert_eq!(patched.name, "Patched");
    }
}
