//! Message endpoints: send, insert, import, get, list, label modification,
//! trash/untrash, deletion, attachment download

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use log::warn;
use serde::Serialize;

use super::{validate_id, validate_max_results, validate_query, validate_user_email, validate_user_id};
use crate::error::{Error, Result};
use crate::mime::{BuildOptions, build_raw_message, parse_raw_message};
use crate::models::{
    Header, Message, MessageFormat, MessageInput, MessageView, StoredAttachment,
    normalize_email_list, normalize_label,
};
use crate::search::{QueryEvaluator, QueryScope};
use crate::store::attachments::{attachment_ids_of, cleanup_attachment_ids, materialize_payload};
use crate::store::{GmailStore, mailbox_mut};

/// How `insert` derives internalDate when none is given
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InternalDateSource {
    #[default]
    ReceivedTime,
    DateHeader,
}

impl std::str::FromStr for InternalDateSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "receivedTime" => Ok(Self::ReceivedTime),
            "dateHeader" => Ok(Self::DateHeader),
            other => Err(Error::validation(format!(
                "internal_date_source must be 'receivedTime' or 'dateHeader', got '{other}'"
            ))),
        }
    }
}

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

/// Response of `list`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub messages: Vec<Message>,
    pub next_page_token: Option<String>,
}

fn now_millis() -> String {
    Utc::now().timestamp_millis().to_string()
}

/// Sends a message to its recipients.
///
/// Accepts either a base64url-encoded RFC 2822 `raw` message or structured
/// fields; when both are present the raw headers take precedence. A sender
/// must be available (field, From header, or the profile address) and at
/// least one recipient is required across to/cc/bcc. The SENT label is
/// always applied and INBOX is stripped.
pub fn send(store: &GmailStore, user_id: &str, input: MessageInput) -> Result<Message> {
    validate_user_id(user_id)?;
    validate_user_email(user_id)?;
    input.validate_internal_date()?;

    let user = store.resolve_user(user_id)?;
    let auth_email = store.get_profile(&user)?.email_address;

    let has_raw = input.raw.as_deref().is_some_and(|r| !r.is_empty());
    let parsed = if has_raw {
        match parse_raw_message(input.raw.as_deref().unwrap_or_default()) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                warn!("MIME parsing failed: {err}");
                None
            }
        }
    } else {
        None
    };

    // Sender and recipient must be present somewhere
    let field_set = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
    let mut sender_present = field_set(&input.sender);
    let mut recipient_present =
        field_set(&input.recipient) || field_set(&input.cc) || field_set(&input.bcc);
    if let Some(parsed) = &parsed {
        if parsed.header("From").is_some_and(|v| !v.is_empty()) {
            sender_present = true;
        }
        if ["To", "Cc", "Bcc"]
            .iter()
            .any(|h| parsed.header(h).is_some_and(|v| !v.is_empty()))
        {
            recipient_present = true;
        }
    }
    if !sender_present && !auth_email.is_empty() {
        sender_present = true;
    }
    if !sender_present {
        return Err(Error::validation(
            "Sender must be specified in the 'sender' field, the raw MIME 'From' header, \
             or the authenticated user must have a valid email address",
        ));
    }
    if !recipient_present {
        return Err(Error::validation(
            "At least one recipient must be specified in 'recipient', 'cc' or 'bcc', \
             or in the raw MIME 'To', 'Cc' or 'Bcc' headers",
        ));
    }

    // Synthesize the raw message when only structured fields were given
    let mut input = input;
    let has_other_fields = field_set(&input.sender)
        || field_set(&input.recipient)
        || field_set(&input.subject)
        || field_set(&input.body);
    if !has_raw && has_other_fields {
        let sender = match input.sender.as_deref() {
            Some("me") | None | Some("") => auth_email.clone(),
            Some(other) => other.to_string(),
        };
        input.sender = Some(sender.clone());
        let raw = build_raw_message(
            input.recipient.as_deref().unwrap_or_default(),
            input.subject.as_deref().unwrap_or_default(),
            input.body.as_deref().unwrap_or_default(),
            &sender,
            &BuildOptions::default(),
        );
        input.raw = Some(raw);
    }

    let num = store.next_message_num();
    let message_id = format!("msg_{num}");

    let mut labels: HashSet<String> = HashSet::new();
    labels.insert("SENT".to_string());
    if let Some(label_ids) = &input.label_ids {
        for label in label_ids {
            labels.insert(normalize_label(label));
        }
    }
    labels.remove("INBOX");
    let mut label_ids: Vec<String> = labels.into_iter().collect();
    label_ids.sort();

    let mut msg = Message {
        id: message_id.clone(),
        thread_id: input
            .thread_id
            .clone()
            .unwrap_or_else(|| format!("thread-{num}")),
        label_ids,
        raw: input.raw.clone().unwrap_or_default(),
        internal_date: input.internal_date.clone().unwrap_or_else(now_millis),
        date: input.date.clone().unwrap_or_default(),
        ..Message::default()
    };

    if let Some(parsed) = &parsed {
        let payload = materialize_payload(store, parsed)?;
        msg.sender = parsed.header("From").unwrap_or_default().to_string();
        msg.recipient = parsed.header("To").unwrap_or_default().to_string();
        msg.cc = parsed.header("Cc").unwrap_or_default().to_string();
        msg.bcc = parsed.header("Bcc").unwrap_or_default().to_string();
        msg.subject = parsed.header("Subject").unwrap_or_default().to_string();
        msg.body = parsed.body_text.clone();

        let mut headers = parsed.headers.clone();
        if msg.sender.is_empty() && !auth_email.is_empty() {
            msg.sender = auth_email.clone();
            match headers.iter_mut().find(|h| h.name.eq_ignore_ascii_case("From")) {
                Some(from) => from.value = auth_email.clone(),
                None => headers.push(Header::new("From", auth_email.clone())),
            }
        }
        msg.payload = Some(payload);
        msg.headers = Some(headers);
    } else {
        msg.sender = input.sender.clone().unwrap_or_default();
        msg.recipient = normalize_email_list(input.recipient.as_deref().unwrap_or_default());
        msg.cc = normalize_email_list(input.cc.as_deref().unwrap_or_default());
        msg.bcc = normalize_email_list(input.bcc.as_deref().unwrap_or_default());
        msg.subject = input.subject.clone().unwrap_or_default();
        msg.body = input.body.clone().unwrap_or_default();
        let payload = msg.effective_payload();
        msg.headers = Some(payload.headers.clone());
        msg.payload = Some(payload);
    }
    msg.sync_is_read();

    let mut users = store.users_mut();
    let mailbox = mailbox_mut(&mut users, &user)?;
    let thread_id = msg.thread_id.clone();
    mailbox.messages.insert(message_id.clone(), msg.clone());
    mailbox
        .threads
        .entry(thread_id.clone())
        .or_insert_with(|| crate::models::Thread::new(thread_id))
        .push_message(&message_id);
    mailbox.bump_label_stats_for_new_message(&message_id);

    Ok(msg)
}

/// Directly inserts a message, as a delivery would.
///
/// INBOX is added unless a SENT/DRAFT/TRASH label excludes it, UNREAD is
/// added unless the message is read (or a draft), and the `deleted` flag
/// applies the DELETED label.
pub fn insert(
    store: &GmailStore,
    user_id: &str,
    input: MessageInput,
    internal_date_source: InternalDateSource,
    deleted: bool,
) -> Result<Message> {
    validate_user_id(user_id)?;
    input.validate_internal_date()?;
    let user = store.resolve_user(user_id)?;
    let auth_email = store.get_profile(&user)?.email_address;

    let num = store.next_message_num();
    let message_id = format!("message-{num}");

    let internal_date = match &input.internal_date {
        Some(value) => value.clone(),
        None => match internal_date_source {
            InternalDateSource::DateHeader => input
                .date
                .as_deref()
                .filter(|d| !d.is_empty())
                .and_then(|d| DateTime::parse_from_rfc3339(&d.replace('Z', "+00:00")).ok())
                .map(|dt| dt.timestamp_millis().to_string())
                .unwrap_or_else(now_millis),
            InternalDateSource::ReceivedTime => now_millis(),
        },
    };

    let mut labels: HashSet<String> = HashSet::new();
    if let Some(label_ids) = &input.label_ids {
        for label in label_ids {
            labels.insert(normalize_label(label));
        }
    }
    let has_exclusive = ["SENT", "DRAFT", "TRASH"]
        .iter()
        .any(|l| labels.contains(*l));
    if !labels.contains("INBOX") && !has_exclusive {
        labels.insert("INBOX".to_string());
    } else if labels.contains("INBOX") && has_exclusive {
        labels.remove("INBOX");
    }
    if !input.is_read.unwrap_or(false) && !labels.contains("UNREAD") && !labels.contains("DRAFT") {
        labels.insert("UNREAD".to_string());
    }
    if deleted {
        labels.insert("DELETED".to_string());
        labels.remove("INBOX");
        labels.remove("UNREAD");
    }
    let mut label_ids: Vec<String> = labels.into_iter().collect();
    label_ids.sort();

    let parsed = input
        .raw
        .as_deref()
        .filter(|r| !r.is_empty())
        .and_then(|raw| match parse_raw_message(raw) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                warn!("MIME parsing failed: {err}");
                None
            }
        });

    let sender = input.sender.clone().unwrap_or_else(|| auth_email.clone());
    let raw = match &input.raw {
        Some(raw) => raw.clone(),
        None => build_raw_message(
            input.recipient.as_deref().unwrap_or_default(),
            input.subject.as_deref().unwrap_or_default(),
            input.body.as_deref().unwrap_or_default(),
            &sender,
            &BuildOptions::default(),
        ),
    };

    let mut msg = Message {
        id: message_id.clone(),
        thread_id: input
            .thread_id
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| format!("thread-{num}")),
        raw,
        sender,
        recipient: input.recipient.clone().unwrap_or_default(),
        subject: input.subject.clone().unwrap_or_default(),
        body: input.body.clone().unwrap_or_default(),
        date: input.date.clone().unwrap_or_default(),
        internal_date,
        label_ids,
        ..Message::default()
    };

    if let Some(parsed) = &parsed {
        let payload = materialize_payload(store, parsed)?;
        msg.sender = parsed
            .header("From")
            .map(str::to_string)
            .unwrap_or(msg.sender);
        msg.recipient = parsed.header("To").unwrap_or_default().to_string();
        msg.subject = parsed.header("Subject").unwrap_or_default().to_string();
        msg.body = parsed.body_text.clone();
        msg.headers = Some(parsed.headers.clone());
        msg.payload = Some(payload);
    } else {
        let payload = msg.effective_payload();
        msg.headers = Some(payload.headers.clone());
        msg.payload = Some(payload);
    }
    msg.sync_is_read();

    let mut users = store.users_mut();
    let mailbox = mailbox_mut(&mut users, &user)?;
    let thread_id = msg.thread_id.clone();
    mailbox.messages.insert(message_id.clone(), msg.clone());
    mailbox
        .threads
        .entry(thread_id.clone())
        .or_insert_with(|| crate::models::Thread::new(thread_id))
        .push_message(&message_id);

    Ok(msg)
}

/// Imports a message with minimal processing (migration-style)
pub fn import(
    store: &GmailStore,
    user_id: &str,
    input: MessageInput,
    deleted: bool,
) -> Result<Message> {
    validate_user_id(user_id)?;
    let user = store.resolve_user(user_id)?;

    let num = store.next_message_num();
    let message_id = format!("msg_{num}");

    let mut labels: HashSet<String> = input
        .label_ids
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|l| l.to_uppercase())
        .collect();
    if deleted {
        labels.insert("DELETED".to_string());
    }
    let mut label_ids: Vec<String> = labels.into_iter().collect();
    label_ids.sort();

    let msg = Message {
        id: message_id.clone(),
        raw: input.raw.clone().unwrap_or_default(),
        label_ids,
        internal_date: "123456789".to_string(),
        ..Message::default()
    };

    let mut users = store.users_mut();
    let mailbox = mailbox_mut(&mut users, &user)?;
    mailbox.messages.insert(message_id, msg.clone());
    Ok(msg)
}

/// Gets a message in the requested format; `None` when it does not exist
pub fn get(
    store: &GmailStore,
    user_id: &str,
    id: &str,
    format: MessageFormat,
    metadata_headers: Option<&[String]>,
) -> Result<Option<MessageView>> {
    validate_user_id(user_id)?;
    validate_id("id", id)?;
    let user = store.resolve_user(user_id)?;
    let users = store.users();
    let Some(msg) = users[&user].messages.get(id) else {
        return Ok(None);
    };
    Ok(Some(msg.view(format, metadata_headers)))
}

/// Lists messages matching the query and label filters, newest first
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
    matches.truncate(params.max_results as usize);
    for msg in &mut matches {
        msg.sync_is_read();
    }

    Ok(ListResponse {
        messages: matches,
        next_page_token: None,
    })
}

/// INBOX never coexists with these labels
const EXCLUSIVE_WITH_INBOX: &[&str] = &["SENT", "DRAFT", "TRASH"];

/// Modifies the labels on one message.
///
/// Labels are handled case-insensitively and stored upper-cased; INBOX is
/// mutually exclusive with SENT, DRAFT and TRASH. Unknown user labels are
/// created on the fly.
pub fn modify(
    store: &GmailStore,
    user_id: &str,
    id: &str,
    add_label_ids: Option<&[String]>,
    remove_label_ids: Option<&[String]>,
) -> Result<Message> {
    validate_user_id(user_id)?;
    validate_user_email(user_id)?;
    let user = store.resolve_user(user_id)?;

    let mut users = store.users_mut();
    let mailbox = mailbox_mut(&mut users, &user)?;
    if let Some(add) = add_label_ids {
        mailbox.ensure_labels_exist(add);
    }

    let Some(msg) = mailbox.messages.get_mut(id) else {
        return Err(Error::validation(format!(
            "Message '{id}' not found for user '{user_id}'"
        )));
    };

    let original: HashSet<String> = msg.labels_upper().into_iter().collect();
    let was_unread = original.contains("UNREAD");
    let mut current = original.clone();

    for label in add_label_ids.unwrap_or_default() {
        let upper = label.to_uppercase();
        if upper == "INBOX" {
            if !EXCLUSIVE_WITH_INBOX.iter().any(|l| current.contains(*l)) {
                current.insert(upper);
            }
        } else if EXCLUSIVE_WITH_INBOX.contains(&upper.as_str()) {
            current.insert(upper);
            current.remove("INBOX");
        } else {
            current.insert(upper);
        }
    }
    for label in remove_label_ids.unwrap_or_default() {
        current.remove(&label.to_uppercase());
    }

    let mut label_ids: Vec<String> = current.iter().cloned().collect();
    label_ids.sort();
    msg.label_ids = label_ids;
    msg.sync_is_read();
    let result = msg.clone();

    let added: HashSet<String> = current.difference(&original).cloned().collect();
    let removed: HashSet<String> = original.difference(&current).cloned().collect();
    mailbox.adjust_label_counts(&added, &removed, was_unread, was_unread);

    Ok(result)
}

/// Modifies the labels on many messages; missing ids are skipped
pub fn batch_modify(
    store: &GmailStore,
    user_id: &str,
    ids: &[String],
    add_label_ids: Option<&[String]>,
    remove_label_ids: Option<&[String]>,
) -> Result<()> {
    validate_user_id(user_id)?;
    let user = store.resolve_user(user_id)?;

    let add: Vec<String> = add_label_ids
        .unwrap_or_default()
        .iter()
        .map(|l| normalize_label(l))
        .collect();
    let remove: Vec<String> = remove_label_ids
        .unwrap_or_default()
        .iter()
        .map(|l| normalize_label(l))
        .collect();

    let mut users = store.users_mut();
    let mailbox = mailbox_mut(&mut users, &user)?;
    if !add.is_empty() {
        mailbox.ensure_labels_exist(&add);
    }

    for id in ids {
        let Some(msg) = mailbox.messages.get_mut(id) else {
            continue;
        };
        let original: HashSet<String> = msg.label_ids.iter().cloned().collect();
        let mut current = original.clone();
        for label in &add {
            current.insert(label.clone());
        }
        for label in &remove {
            current.remove(label);
        }

        let mut label_ids: Vec<String> = current.iter().cloned().collect();
        label_ids.sort();
        msg.label_ids = label_ids;
        msg.sync_is_read();

        let was_unread = original.contains("UNREAD");
        let is_unread = current.contains("UNREAD");
        let added: HashSet<String> = current.difference(&original).cloned().collect();
        let removed: HashSet<String> = original.difference(&current).cloned().collect();
        mailbox.adjust_label_counts(&added, &removed, is_unread, was_unread);
    }
    Ok(())
}

/// Moves a message to the trash; returns the modified message
pub fn trash(store: &GmailStore, user_id: &str, id: &str) -> Result<Option<Message>> {
    validate_user_id(user_id)?;
    if id.is_empty() {
        return Err(Error::validation("id cannot be empty"));
    }
    validate_id("id", id)?;
    let user = store.resolve_user(user_id)?;

    let mut users = store.users_mut();
    let mailbox = mailbox_mut(&mut users, &user)?;
    let Some(msg) = mailbox.messages.get_mut(id) else {
        return Ok(None);
    };
    if !msg.label_ids.iter().any(|l| l == "TRASH") {
        msg.label_ids.push("TRASH".to_string());
    }
    Ok(Some(msg.clone()))
}

/// Removes a message from the trash; returns the modified message
pub fn untrash(store: &GmailStore, user_id: &str, id: &str) -> Result<Option<Message>> {
    validate_user_id(user_id)?;
    validate_id("id", id)?;
    let user = store.resolve_user(user_id)?;

    let mut users = store.users_mut();
    let mailbox = mailbox_mut(&mut users, &user)?;
    let Some(msg) = mailbox.messages.get_mut(id) else {
        return Ok(None);
    };
    msg.label_ids.retain(|l| !l.eq_ignore_ascii_case("TRASH"));
    Ok(Some(msg.clone()))
}

/// Permanently deletes a message and releases its orphaned attachments
pub fn delete(store: &GmailStore, user_id: &str, id: &str) -> Result<Option<Message>> {
    validate_user_id(user_id)?;
    validate_id("id", id)?;
    let user = store.resolve_user(user_id)?;

    let removed = {
        let mut users = store.users_mut();
        let mailbox = mailbox_mut(&mut users, &user)?;
        mailbox.messages.remove(id)
    };
    if let Some(msg) = &removed {
        cleanup_attachment_ids(store, &attachment_ids_of(msg));
    }
    Ok(removed)
}

/// Permanently deletes many messages at once
pub fn batch_delete(store: &GmailStore, user_id: &str, ids: &[String]) -> Result<()> {
    validate_user_id(user_id)?;
    for id in ids {
        validate_id("id", id)?;
    }
    let user = store.resolve_user(user_id)?;

    let mut candidates = Vec::new();
    {
        let mut users = store.users_mut();
        let mailbox = mailbox_mut(&mut users, &user)?;
        for id in ids {
            if let Some(msg) = mailbox.messages.remove(id) {
                candidates.extend(attachment_ids_of(&msg));
            }
        }
    }
    cleanup_attachment_ids(store, &candidates);
    Ok(())
}

/// Fetches an attachment body referenced by a message part
pub fn get_attachment(
    store: &GmailStore,
    user_id: &str,
    message_id: &str,
    attachment_id: &str,
) -> Result<Option<StoredAttachment>> {
    validate_user_id(user_id)?;
    let user = store.resolve_user(user_id)?;

    let referenced = {
        let users = store.users();
        users[&user]
            .messages
            .get(message_id)
            .map(|m| attachment_ids_of(m).iter().any(|a| a == attachment_id))
            .unwrap_or(false)
    };
    if !referenced {
        return Ok(None);
    }
    Ok(store.attachments().get(attachment_id).cloned())
}
