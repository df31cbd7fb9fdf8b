//! Thread endpoints: get, list, modify, trash/untrash, delete
//!
//! Label operations on a thread fan out to every message it contains.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::{messages, validate_max_results, validate_query, validate_user_id};
use crate::error::{Error, Result};
use crate::models::{Header, Message, MessageFormat, MessageView, Thread, ThreadView};
use crate::search::{QueryEvaluator, QueryScope};
use crate::store::attachments::{attachment_ids_of, cleanup_attachment_ids};
use crate::store::{GmailStore, mailbox_mut};

/// Parameters for `list`
#[derive(Debug, Clone)]
pub struct ListParams {
    pub max_results: u32,
    pub q: String,
    pub label_ids: Option<Vec<String>>,
    pub include_spam_trash: bool,
    /// Accepted for API parity; pagination is not simulated
    pub page_token: Option<String>,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            max_results: 100,
            q: String::new(),
            label_ids: None,
            include_spam_trash: false,
            page_token: None,
        }
    }
}

/// Thread stub returned by `list`
#[derive(Debug, Clone, Serialize)]
pub struct ThreadStub {
    pub id: String,
}

/// Response of `list`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub threads: Vec<ThreadStub>,
    pub next_page_token: Option<String>,
    pub result_size_estimate: usize,
}

/// Gets a thread with its messages rendered in the requested format;
/// `None` when the thread does not exist
pub fn get(
    store: &GmailStore,
    user_id: &str,
    id: &str,
    format: MessageFormat,
    metadata_headers: Option<&[String]>,
) -> Result<Option<ThreadView>> {
    validate_user_id(user_id)?;
    let user = store.resolve_user(user_id)?;
    let users = store.users();
    let mailbox = &users[&user];
    let Some(thread) = mailbox.threads.get(id) else {
        return Ok(None);
    };

    let mut views = Vec::new();
    let mut snippet = String::new();
    for (idx, mid) in thread.message_ids.iter().enumerate() {
        let Some(msg) = mailbox.messages.get(mid) else {
            continue;
        };
        if idx == 0 {
            snippet = msg.snippet();
        }
        views.push(match format {
            MessageFormat::Minimal => MessageView {
                id: msg.id.clone(),
                label_ids: msg.labels_upper(),
                ..MessageView::default()
            },
            MessageFormat::Metadata => MessageView {
                id: msg.id.clone(),
                label_ids: msg.labels_upper(),
                headers: Some(thread_metadata_headers(msg, metadata_headers)),
                ..MessageView::default()
            },
            // Both full and raw carry the complete message data
            MessageFormat::Full | MessageFormat::Raw => msg.view(MessageFormat::Full, None),
        });
    }

    Ok(Some(ThreadView {
        id: thread.id.clone(),
        snippet,
        history_id: mailbox.history_id(),
        messages: views,
        message_ids: thread.message_ids.clone(),
    }))
}

fn thread_metadata_headers(msg: &Message, requested: Option<&[String]>) -> Vec<Header> {
    let all = [
        ("Subject", &msg.subject),
        ("From", &msg.sender),
        ("To", &msg.recipient),
        ("Date", &msg.date),
    ];
    match requested {
        Some(names) => names
            .iter()
            .filter_map(|name| {
                all.iter()
                    .find(|(known, _)| known.eq_ignore_ascii_case(name))
                    .map(|(known, value)| Header::new(*known, value.as_str()))
            })
            .collect(),
        None => all
            .iter()
            .map(|(name, value)| Header::new(*name, value.as_str()))
            .collect(),
    }
}

/// Lists threads whose messages match the query and label filters
pub fn list(store: &GmailStore, user_id: &str, params: &ListParams) -> Result<ListResponse> {
    validate_user_id(user_id)?;
    validate_max_results(params.max_results)?;
    validate_query(&params.q)?;
    let user = store.resolve_user(user_id)?;

    let users = store.users();
    let mailbox = &users[&user];

    let required_labels: HashSet<String> = params
        .label_ids
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|l| l.to_uppercase())
        .collect();

    let mut candidates: HashMap<String, Message> = HashMap::new();
    for msg in mailbox.messages.values() {
        let msg_labels: HashSet<String> = msg.labels_upper().into_iter().collect();
        if !params.include_spam_trash
            && (msg_labels.contains("TRASH") || msg_labels.contains("SPAM"))
        {
            continue;
        }
        if !required_labels.is_subset(&msg_labels) {
            continue;
        }
        candidates.insert(msg.id.clone(), msg.clone());
    }
    drop(users);

    let mut matches: Vec<Message> = if params.q.is_empty() {
        candidates.into_values().collect()
    } else {
        let matching_ids =
            QueryEvaluator::new(&params.q, &candidates, QueryScope::Messages).evaluate();
        candidates
            .into_iter()
            .filter(|(id, _)| matching_ids.contains(id))
            .map(|(_, m)| m)
            .collect()
    };
    matches.sort_by_key(|m| std::cmp::Reverse(m.internal_date.parse::<i64>().unwrap_or(0)));

    let mut seen = HashSet::new();
    let mut threads = Vec::new();
    for msg in &matches {
        if seen.insert(msg.thread_id.clone()) {
            threads.push(ThreadStub {
                id: msg.thread_id.clone(),
            });
        }
    }

    let total = threads.len();
    threads.truncate(params.max_results as usize);
    Ok(ListResponse {
        threads,
        next_page_token: None,
        result_size_estimate: total,
    })
}

/// Applies label modifications to every message in the thread
pub fn modify(
    store: &GmailStore,
    user_id: &str,
    id: &str,
    add_label_ids: Option<&[String]>,
    remove_label_ids: Option<&[String]>,
) -> Result<Thread> {
    validate_user_id(user_id)?;
    let id = id.trim();
    if id.is_empty() {
        return Err(Error::validation("id cannot be empty"));
    }
    for (name, labels) in [("addLabelIds", add_label_ids), ("removeLabelIds", remove_label_ids)] {
        if labels.is_some_and(|l| l.len() > 100) {
            return Err(Error::validation(format!(
                "{name} cannot have more than 100 elements"
            )));
        }
    }
    let user = store.resolve_user(user_id)?;

    let (thread, message_ids) = {
        let users = store.users();
        let Some(thread) = users[&user].threads.get(id) else {
            return Err(Error::not_found(format!(
                "Thread with ID {id} not available for user {user_id}."
            )));
        };
        (thread.clone(), thread.message_ids.clone())
    };

    let upper = |labels: Option<&[String]>| {
        labels.map(|l| l.iter().map(|s| s.to_uppercase()).collect::<Vec<_>>())
    };
    let add = upper(add_label_ids);
    let remove = upper(remove_label_ids);

    for mid in &message_ids {
        messages::modify(store, user_id, mid, add.as_deref(), remove.as_deref())?;
    }
    Ok(thread)
}

/// Moves every message of the thread to the trash
pub fn trash(store: &GmailStore, user_id: &str, id: &str) -> Result<Option<Thread>> {
    validate_user_id(user_id)?;
    let user = store.resolve_user(user_id)?;

    let Some(thread) = ({
        let users = store.users();
        users[&user].threads.get(id).cloned()
    }) else {
        return Ok(None);
    };
    for mid in &thread.message_ids {
        messages::trash(store, user_id, mid)?;
    }
    Ok(Some(thread))
}

/// Removes every message of the thread from the trash
pub fn untrash(store: &GmailStore, user_id: &str, id: &str) -> Result<Option<Thread>> {
    validate_user_id(user_id)?;
    let user = store.resolve_user(user_id)?;

    let Some(thread) = ({
        let users = store.users();
        users[&user].threads.get(id).cloned()
    }) else {
        return Ok(None);
    };
    for mid in &thread.message_ids {
        messages::untrash(store, user_id, mid)?;
    }
    Ok(Some(thread))
}

/// Permanently deletes a thread and all of its messages
pub fn delete(store: &GmailStore, user_id: &str, id: &str) -> Result<()> {
    validate_user_id(user_id)?;
    if id.contains(' ') {
        return Err(Error::validation("id cannot have whitespace"));
    }
    let user = store.resolve_user(user_id)?;

    let mut candidates = Vec::new();
    {
        let mut users = store.users_mut();
        let mailbox = mailbox_mut(&mut users, &user)?;
        let Some(thread) = mailbox.threads.remove(id) else {
            return Ok(());
        };
        for mid in &thread.message_ids {
            if let Some(msg) = mailbox.messages.remove(mid) {
                candidates.extend(attachment_ids_of(&msg));
            }
        }
    }
    cleanup_attachment_ids(store, &candidates);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageInput;
    use crate::users::messages::{self as msgs};

    fn send_in_thread(store: &GmailStore, thread_id: Option<&str>, subject: &str) -> Message {
        msgs::send(
            store,
            "me",
            MessageInput {
                recipient: Some("to@example.com".to_string()),
                subject: Some(subject.to_string()),
                body: Some(format!("body of {subject}")),
                thread_id: thread_id.map(str::to_string),
                ..MessageInput::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_get_thread_full() {
        let store = GmailStore::new();
        let first = send_in_thread(&store, None, "start");
        send_in_thread(&store, Some(&first.thread_id), "reply");

        let view = get(&store, "me", &first.thread_id, MessageFormat::Full, None)
            .unwrap()
            .unwrap();
        assert_eq!(view.messages.len(), 2);
        assert_eq!(view.message_ids.len(), 2);
        assert_eq!(view.snippet, "body of start");
        assert_eq!(view.history_id, "1");
    }

    #[test]
    fn test_get_thread_metadata_headers() {
        let store = GmailStore::new();
        let msg = send_in_thread(&store, None, "meta");
        let view = get(
            &store,
            "me",
            &msg.thread_id,
            MessageFormat::Metadata,
            Some(&["subject".to_string()]),
        )
        .unwrap()
        .unwrap();
        let headers = view.messages[0].headers.as_ref().unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0], Header::new("Subject", "meta"));
    }

    #[test]
    fn test_get_missing_thread() {
        let store = GmailStore::new();
        assert!(get(&store, "me", "none", MessageFormat::Full, None)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_list_groups_by_thread() {
        let store = GmailStore::new();
        let first = send_in_thread(&store, None, "a");
        send_in_thread(&store, Some(&first.thread_id), "b");
        send_in_thread(&store, None, "c");

        let listed = list(&store, "me", &ListParams::default()).unwrap();
        assert_eq!(listed.threads.len(), 2);
        assert_eq!(listed.result_size_estimate, 2);
    }

    #[test]
    fn test_list_with_query() {
        let store = GmailStore::new();
        send_in_thread(&store, None, "project update");
        send_in_thread(&store, None, "lunch");

        let listed = list(
            &store,
            "me",
            &ListParams {
                q: "subject:project".to_string(),
                ..ListParams::default()
            },
        )
        .unwrap();
        assert_eq!(listed.threads.len(), 1);
    }

    #[test]
    fn test_modify_fans_out_to_messages() {
        let store = GmailStore::new();
        let first = send_in_thread(&store, None, "a");
        send_in_thread(&store, Some(&first.thread_id), "b");

        modify(
            &store,
            "me",
            &first.thread_id,
            Some(&["starred".to_string()]),
            None,
        )
        .unwrap();

        let users = store.users();
        for msg in users["me"].messages.values() {
            assert!(msg.has_label("STARRED"));
        }
    }

    #[test]
    fn test_modify_missing_thread() {
        let store = GmailStore::new();
        let err = modify(&store, "me", "none", None, None).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_modify_caps_label_count() {
        let store = GmailStore::new();
        let msg = send_in_thread(&store, None, "a");
        let many: Vec<String> = (0..101).map(|i| format!("L{i}")).collect();
        let err = modify(&store, "me", &msg.thread_id, Some(&many), None).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_trash_untrash_thread() {
        let store = GmailStore::new();
        let first = send_in_thread(&store, None, "a");
        send_in_thread(&store, Some(&first.thread_id), "b");

        trash(&store, "me", &first.thread_id).unwrap().unwrap();
        {
            let users = store.users();
            assert!(users["me"].messages.values().all(|m| m.has_label("TRASH")));
        }

        untrash(&store, "me", &first.thread_id).unwrap().unwrap();
        let users = store.users();
        assert!(users["me"].messages.values().all(|m| !m.has_label("TRASH")));
    }

    #[test]
    fn test_delete_thread_removes_messages() {
        let store = GmailStore::new();
        let first = send_in_thread(&store, None, "a");
        send_in_thread(&store, Some(&first.thread_id), "b");

        delete(&store, "me", &first.thread_id).unwrap();
        let users = store.users();
        assert!(users["me"].threads.is_empty());
        assert!(users["me"].messages.is_empty());
    }
}
