//! Draft endpoints: create, update, get, list, delete, send

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use serde::Serialize;

use super::{messages, validate_max_results, validate_query, validate_user_id};
use crate::error::{Error, Result};
use crate::models::{
    Draft, DraftInput, Message, MessageFormat, MessageInput, MessageView, normalize_email_list,
    parse_email_list,
};
use crate::search::{QueryEvaluator, QueryScope};
use crate::store::attachments::{attachment_ids_of, cleanup_attachment_ids};
use crate::store::{GmailStore, mailbox_mut};

/// Parameters for `list`
#[derive(Debug, Clone)]
pub struct ListParams {
    pub max_results: u32,
    pub q: String,
    pub include_spam_trash: bool,
    /// Accepted for API parity; pagination is not simulated
    pub page_token: Option<String>,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            max_results: 100,
            q: String::new(),
            include_spam_trash: false,
            page_token: None,
        }
    }
}

/// Response of `list`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub drafts: Vec<Draft>,
    pub next_page_token: Option<String>,
}

/// Format-dependent read projection of a draft
#[derive(Debug, Clone, Serialize)]
pub struct DraftView {
    pub id: String,
    pub message: MessageView,
}

/// Creates a draft.
///
/// The embedded message gets the draft's id, the DRAFT label, a thread id
/// and timestamps; an invalid sender address is coerced to the profile
/// address, and recipient lists are filtered for valid addresses.
pub fn create(store: &GmailStore, user_id: &str, draft: DraftInput) -> Result<Draft> {
    validate_user_id(user_id)?;
    let user = store.resolve_user(user_id)?;
    let default_sender = store.get_profile(&user)?.email_address;

    let input = draft.message.unwrap_or_default();
    input.validate_internal_date()?;

    let num = store.next_draft_num();
    let draft_id = format!("draft-{num}");

    let sender = input
        .sender
        .as_deref()
        .filter(|s| parse_email_list(s).len() == 1)
        .map(str::to_string)
        .unwrap_or(default_sender);

    let mut message = Message {
        id: draft_id.clone(),
        thread_id: input
            .thread_id
            .clone()
            .unwrap_or_else(|| format!("thread-{num}")),
        raw: input.raw.clone().unwrap_or_default(),
        sender,
        recipient: normalize_email_list(input.recipient.as_deref().unwrap_or_default()),
        cc: normalize_email_list(input.cc.as_deref().unwrap_or_default()),
        bcc: normalize_email_list(input.bcc.as_deref().unwrap_or_default()),
        subject: input.subject.clone().unwrap_or_default(),
        body: input.body.clone().unwrap_or_default(),
        date: input.date.clone().unwrap_or_default(),
        internal_date: input
            .internal_date
            .clone()
            .unwrap_or_else(|| Utc::now().timestamp_millis().to_string()),
        label_ids: input.label_ids.clone().unwrap_or_default(),
        payload: input.payload.clone(),
        ..Message::default()
    };
    if !message.has_label("DRAFT") {
        message.label_ids.push("DRAFT".to_string());
    }
    message.sync_is_read();

    let draft = Draft {
        id: draft_id.clone(),
        message,
    };

    let mut users = store.users_mut();
    let mailbox = mailbox_mut(&mut users, &user)?;
    mailbox.drafts.insert(draft_id, draft.clone());
    Ok(draft)
}

/// Replaces the message content of an existing draft.
///
/// Provided fields overwrite, absent fields are kept; the DRAFT label is
/// always retained and INBOX is never allowed on a draft. Returns `None`
/// when the draft does not exist.
pub fn update(
    store: &GmailStore,
    user_id: &str,
    id: &str,
    draft: Option<DraftInput>,
) -> Result<Option<Draft>> {
    validate_user_id(user_id)?;
    if id.is_empty() {
        return Err(Error::validation("id must be a non-empty string"));
    }
    let user = store.resolve_user(user_id)?;

    let update = draft.and_then(|d| d.message).unwrap_or_default();
    update.validate_internal_date()?;

    let mut users = store.users_mut();
    let mailbox = mailbox_mut(&mut users, &user)?;
    let Some(existing) = mailbox.drafts.get_mut(id) else {
        return Ok(None);
    };
    let message = &mut existing.message;

    if let Some(thread_id) = &update.thread_id {
        message.thread_id = thread_id.clone();
    }
    if let Some(raw) = &update.raw {
        message.raw = raw.clone();
    }
    if let Some(internal_date) = &update.internal_date {
        message.internal_date = internal_date.clone();
    }
    if let Some(payload) = &update.payload {
        message.payload = Some(payload.clone());
    }
    if let Some(sender) = &update.sender {
        message.sender = sender.clone();
    }
    if let Some(recipient) = &update.recipient {
        message.recipient = normalize_email_list(recipient);
    }
    if let Some(cc) = &update.cc {
        message.cc = normalize_email_list(cc);
    }
    if let Some(bcc) = &update.bcc {
        message.bcc = normalize_email_list(bcc);
    }
    if let Some(subject) = &update.subject {
        message.subject = subject.clone();
    }
    if let Some(body) = &update.body {
        message.body = body.clone();
    }
    if let Some(date) = &update.date {
        message.date = date.clone();
    }

    let mut labels: HashSet<String> = match &update.label_ids {
        // A provided label list replaces the existing one
        Some(new_labels) => new_labels.iter().map(|l| l.to_uppercase()).collect(),
        None => message.label_ids.iter().map(|l| l.to_uppercase()).collect(),
    };
    labels.insert("DRAFT".to_string());
    labels.remove("INBOX");
    let mut label_ids: Vec<String> = labels.into_iter().collect();
    label_ids.sort();
    message.label_ids = label_ids;
    message.sync_is_read();

    Ok(Some(existing.clone()))
}

/// Gets a draft in the requested format; `None` when it does not exist
pub fn get(
    store: &GmailStore,
    user_id: &str,
    id: &str,
    format: MessageFormat,
) -> Result<Option<DraftView>> {
    validate_user_id(user_id)?;
    let user = store.resolve_user(user_id)?;
    let users = store.users();
    let Some(draft) = users[&user].drafts.get(id) else {
        return Ok(None);
    };
    Ok(Some(draft_view(draft, format)))
}

fn draft_view(draft: &Draft, format: MessageFormat) -> DraftView {
    let msg = &draft.message;
    let message = match format {
        MessageFormat::Minimal => MessageView {
            id: msg.id.clone(),
            label_ids: msg.labels_upper(),
            ..MessageView::default()
        },
        MessageFormat::Raw => MessageView {
            id: msg.id.clone(),
            thread_id: Some(msg.thread_id.clone()),
            label_ids: msg.labels_upper(),
            raw: Some(msg.raw.clone()),
            ..MessageView::default()
        },
        MessageFormat::Metadata => MessageView {
            id: msg.id.clone(),
            thread_id: Some(msg.thread_id.clone()),
            label_ids: msg.labels_upper(),
            sender: Some(msg.sender.clone()),
            recipient: Some(msg.recipient.clone()),
            subject: Some(msg.subject.clone()),
            date: Some(msg.date.clone()),
            ..MessageView::default()
        },
        MessageFormat::Full => MessageView {
            id: msg.id.clone(),
            thread_id: Some(msg.thread_id.clone()),
            label_ids: msg.labels_upper(),
            sender: Some(msg.sender.clone()),
            recipient: Some(msg.recipient.clone()),
            subject: Some(msg.subject.clone()),
            body: Some(msg.body.clone()),
            date: Some(msg.date.clone()),
            internal_date: Some(msg.internal_date.clone()),
            is_read: Some(msg.computed_is_read()),
            // Only documented for the raw format, kept for compatibility
            raw: Some(msg.raw.clone()),
            ..MessageView::default()
        },
    };
    DraftView {
        id: draft.id.clone(),
        message,
    }
}

/// Lists drafts matching the query, newest first
pub fn list(store: &GmailStore, user_id: &str, params: &ListParams) -> Result<ListResponse> {
    validate_user_id(user_id)?;
    validate_max_results(params.max_results)?;
    validate_query(&params.q)?;
    let user = store.resolve_user(user_id)?;

    let users = store.users();
    let mut drafts: Vec<Draft> = users[&user].drafts.values().cloned().collect();
    drop(users);

    if !params.include_spam_trash {
        drafts.retain(|d| {
            let labels = d.message.labels_upper();
            !labels.iter().any(|l| l == "SPAM" || l == "TRASH")
        });
    }

    if !params.q.is_empty() {
        let messages: HashMap<String, Message> = drafts
            .iter()
            .map(|d| (d.message.id.clone(), d.message.clone()))
            .collect();
        let matching =
            QueryEvaluator::new(&params.q, &messages, QueryScope::Drafts).evaluate();
        drafts.retain(|d| matching.contains(&d.message.id));
    }

    drafts.sort_by_key(|d| {
        std::cmp::Reverse(d.message.internal_date.parse::<i64>().unwrap_or(0))
    });
    drafts.truncate(params.max_results as usize);
    for draft in &mut drafts {
        draft.message.sync_is_read();
    }

    Ok(ListResponse {
        drafts,
        next_page_token: None,
    })
}

/// Permanently deletes a draft and releases its orphaned attachments
pub fn delete(store: &GmailStore, user_id: &str, id: &str) -> Result<Option<Draft>> {
    validate_user_id(user_id)?;
    let user = store.resolve_user(user_id)?;

    let removed = {
        let mut users = store.users_mut();
        let mailbox = mailbox_mut(&mut users, &user)?;
        mailbox.drafts.remove(id)
    };
    if let Some(draft) = &removed {
        cleanup_attachment_ids(store, &attachment_ids_of(&draft.message));
    }
    Ok(removed)
}

/// Sends a draft, either by id (removing it on success) or from an inline
/// message, delegating delivery to `messages::send`.
pub fn send(store: &GmailStore, user_id: &str, draft: DraftInput) -> Result<Message> {
    validate_user_id(user_id)?;
    let user = store.resolve_user(user_id)?;

    let stored = draft.id.as_deref().and_then(|draft_id| {
        let users = store.users();
        users[&user].drafts.get(draft_id).cloned()
    });

    if let Some(stored_draft) = stored {
        let msg = &stored_draft.message;

        let mut recipients = parse_email_list(&msg.recipient);
        recipients.extend(parse_email_list(&msg.cc));
        recipients.extend(parse_email_list(&msg.bcc));

        if msg.raw.trim().is_empty() {
            let mut missing = Vec::new();
            if recipients.is_empty() {
                missing.push("at least one recipient (TO, CC, or BCC)");
            }
            if msg.subject.trim().is_empty() {
                missing.push("subject");
            }
            if msg.body.trim().is_empty() {
                missing.push("body");
            }
            if !missing.is_empty() {
                return Err(Error::validation(format!(
                    "Cannot send draft: missing required fields: {}",
                    missing.join(", ")
                )));
            }
        }

        let non_empty = |s: &String| !s.is_empty();
        let input = MessageInput {
            thread_id: Some(msg.thread_id.clone()).filter(non_empty),
            raw: Some(msg.raw.clone()).filter(non_empty),
            sender: Some(msg.sender.clone()).filter(non_empty),
            recipient: Some(msg.recipient.clone()).filter(non_empty),
            cc: Some(msg.cc.clone()).filter(non_empty),
            bcc: Some(msg.bcc.clone()).filter(non_empty),
            subject: Some(msg.subject.clone()).filter(non_empty),
            body: Some(msg.body.clone()).filter(non_empty),
            date: Some(msg.date.clone()).filter(non_empty),
            internal_date: Some(msg.internal_date.clone()).filter(non_empty),
            label_ids: Some(msg.label_ids.clone()).filter(|l| !l.is_empty()),
            payload: msg.payload.clone(),
            ..MessageInput::default()
        };

        let sent = messages::send(store, user_id, input)?;
        let mut users = store.users_mut();
        let mailbox = mailbox_mut(&mut users, &user)?;
        mailbox.drafts.remove(&stored_draft.id);
        return Ok(sent);
    }

    // No stored draft: send the inline message content
    let input = draft.message.unwrap_or_default();
    let raw_present = input.raw.as_deref().is_some_and(|r| !r.trim().is_empty());
    if !raw_present {
        let mut missing = Vec::new();
        if input.recipient.as_deref().unwrap_or("").trim().is_empty() {
            missing.push("recipient");
        }
        if input.subject.as_deref().unwrap_or("").trim().is_empty() {
            missing.push("subject");
        }
        if input.body.as_deref().unwrap_or("").trim().is_empty() {
            missing.push("body");
        }
        if !missing.is_empty() {
            return Err(Error::validation(format!(
                "Cannot send message: missing required fields: {}",
                missing.join(", ")
            )));
        }
    }
    messages::send(store, user_id, input)
}
