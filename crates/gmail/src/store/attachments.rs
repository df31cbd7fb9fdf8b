//! Attachment bookkeeping: size limits, reference counting, cleanup
//!
//! Attachment bodies live in one global table; message and draft payload
//! parts reference them by id. Reference counts are recomputed by scanning
//! the parts, so cleanup is a dict-scan like the backend it simulates.

use std::collections::{BTreeMap, HashMap};

use log::debug;

use crate::error::{Error, Result};
use crate::models::{Message, MessagePart, PartBody, StoredAttachment};
use crate::store::{GmailStore, Mailbox};

/// Individual attachments are capped at 25MB
pub const MAX_ATTACHMENT_SIZE: u64 = 25 * 1024 * 1024;
/// Total message size (body plus attachments) is capped at 100MB
pub const MAX_MESSAGE_SIZE: u64 = 100 * 1024 * 1024;

/// Reject attachments over the per-file limit
pub fn validate_attachment_size(size: u64, filename: &str) -> Result<()> {
    if size > MAX_ATTACHMENT_SIZE {
        return Err(Error::validation(format!(
            "Attachment '{}' size ({:.1}MB) exceeds the {}MB limit",
            filename,
            size as f64 / (1024.0 * 1024.0),
            MAX_ATTACHMENT_SIZE / (1024 * 1024),
        )));
    }
    Ok(())
}

/// Store an attachment body under a freshly allocated id
pub fn register_attachment(
    store: &GmailStore,
    filename: &str,
    mime_type: &str,
    data_b64: String,
    size: u64,
) -> Result<StoredAttachment> {
    validate_attachment_size(size, filename)?;
    let attachment = StoredAttachment {
        attachment_id: format!("att_{}", store.next_attachment_num()),
        filename: filename.to_string(),
        mime_type: mime_type.to_string(),
        size,
        data: data_b64,
    };
    store
        .attachments_mut()
        .insert(attachment.attachment_id.clone(), attachment.clone());
    Ok(attachment)
}

/// Fetch a stored attachment by id
pub fn get_attachment(store: &GmailStore, attachment_id: &str) -> Option<StoredAttachment> {
    store.attachments().get(attachment_id).cloned()
}

/// Attachment ids referenced by a message's payload parts
pub fn attachment_ids_of(message: &Message) -> Vec<String> {
    let Some(payload) = &message.payload else {
        return Vec::new();
    };
    let Some(parts) = &payload.parts else {
        return Vec::new();
    };
    parts
        .iter()
        .filter_map(|p| p.body.attachment_id.clone())
        .collect()
}

/// Count references to every attachment across all messages and drafts
fn reference_counts(users: &HashMap<String, Mailbox>) -> HashMap<String, usize> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut record = |message: &Message| {
        for id in attachment_ids_of(message) {
            *counts.entry(id).or_default() += 1;
        }
    };
    for mailbox in users.values() {
        for message in mailbox.messages.values() {
            record(message);
        }
        for draft in mailbox.drafts.values() {
            record(&draft.message);
        }
    }
    counts
}

/// Reference count of one attachment
pub fn get_reference_count(store: &GmailStore, attachment_id: &str) -> usize {
    reference_counts(&store.users())
        .get(attachment_id)
        .copied()
        .unwrap_or(0)
}

/// Drop the given attachments if nothing references them anymore.
///
/// Call after removing the owning message or draft; returns the number of
/// attachment bodies released.
pub fn cleanup_attachment_ids(store: &GmailStore, candidates: &[String]) -> usize {
    if candidates.is_empty() {
        return 0;
    }
    let counts = reference_counts(&store.users());
    let mut attachments = store.attachments_mut();
    let mut removed = 0;
    for id in candidates {
        if counts.get(id).copied().unwrap_or(0) == 0 && attachments.remove(id).is_some() {
            removed += 1;
        }
    }
    if removed > 0 {
        debug!("released {removed} unreferenced attachment(s)");
    }
    removed
}

/// Sweep the whole attachment table for unreferenced entries
pub fn cleanup_unreferenced(store: &GmailStore) -> usize {
    let candidates: Vec<String> = store.attachments().keys().cloned().collect();
    cleanup_attachment_ids(store, &candidates)
}

/// Build a payload part referencing a stored attachment
pub fn attachment_part(attachment: &StoredAttachment) -> MessagePart {
    MessagePart {
        mime_type: attachment.mime_type.clone(),
        filename: Some(attachment.filename.clone()),
        body: PartBody {
            data: None,
            attachment_id: Some(attachment.attachment_id.clone()),
            size: Some(attachment.size),
        },
    }
}

/// Turn a parsed MIME message into a stored payload structure.
///
/// Attachment parts are registered in the attachment table and replaced by
/// id references; text parts keep their base64 data inline. The combined
/// size of body and attachments is capped at [`MAX_MESSAGE_SIZE`].
pub fn materialize_payload(
    store: &GmailStore,
    parsed: &crate::mime::ParsedMessage,
) -> Result<crate::models::MessagePayload> {
    use crate::mime::ParsedPart;
    use crate::models::MessagePayload;
    use base64::prelude::*;

    if parsed.parts.is_empty() {
        return Ok(MessagePayload {
            mime_type: Some(parsed.mime_type.clone()),
            headers: parsed.headers.clone(),
            body: Some(PartBody {
                data: Some(BASE64_STANDARD.encode(parsed.body_text.as_bytes())),
                ..PartBody::default()
            }),
            parts: None,
        });
    }

    let mut total_size = parsed.body_text.len() as u64;
    let mut parts = Vec::new();
    for part in &parsed.parts {
        match part {
            ParsedPart::Text(text) => parts.push(MessagePart {
                mime_type: text.mime_type.clone(),
                filename: None,
                body: PartBody {
                    data: Some(BASE64_STANDARD.encode(text.text.as_bytes())),
                    ..PartBody::default()
                },
            }),
            ParsedPart::Attachment(att) => {
                total_size += att.size;
                if total_size > MAX_MESSAGE_SIZE {
                    return Err(Error::validation(format!(
                        "Total message size ({:.1}MB) exceeds the {}MB limit",
                        total_size as f64 / (1024.0 * 1024.0),
                        MAX_MESSAGE_SIZE / (1024 * 1024),
                    )));
                }
                let stored = register_attachment(
                    store,
                    &att.filename,
                    &att.mime_type,
                    att.data.clone(),
                    att.size,
                )?;
                parts.push(attachment_part(&stored));
            }
        }
    }

    Ok(crate::models::MessagePayload {
        mime_type: Some(parsed.mime_type.clone()),
        headers: parsed.headers.clone(),
        body: None,
        parts: Some(parts),
    })
}

/// Aggregate attachment statistics
#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentStats {
    pub count: usize,
    pub total_size: u64,
    pub by_mime_type: BTreeMap<String, usize>,
}

/// Statistics over the attachments referenced by one user's mailbox
pub fn user_stats(store: &GmailStore, user_id: &str) -> Result<AttachmentStats> {
    let user = store.resolve_user(user_id)?;
    let users = store.users();
    let mailbox = &users[&user];

    let mut ids: Vec<String> = Vec::new();
    for message in mailbox.messages.values() {
        ids.extend(attachment_ids_of(message));
    }
    for draft in mailbox.drafts.values() {
        ids.extend(attachment_ids_of(&draft.message));
    }
    ids.sort();
    ids.dedup();

    let attachments = store.attachments();
    let mut stats = AttachmentStats::default();
    for id in ids {
        if let Some(att) = attachments.get(&id) {
            stats.count += 1;
            stats.total_size += att.size;
            *stats.by_mime_type.entry(att.mime_type.clone()).or_default() += 1;
        }
    }
    Ok(stats)
}

/// Statistics over the global attachment table
pub fn global_stats(store: &GmailStore) -> AttachmentStats {
    let attachments = store.attachments();
    let mut stats = AttachmentStats::default();
    for att in attachments.values() {
        stats.count += 1;
        stats.total_size += att.size;
        *stats.by_mime_type.entry(att.mime_type.clone()).or_default() += 1;
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_limit() {
        assert!(validate_attachment_size(MAX_ATTACHMENT_SIZE, "ok.bin").is_ok());
        assert!(validate_attachment_size(MAX_ATTACHMENT_SIZE + 1, "big.bin").is_err());
    }

    #[test]
    fn test_register_and_cleanup() {
        let store = GmailStore::new();
        let att = register_attachment(&store, "a.txt", "text/plain", "aGk=".to_string(), 2).unwrap();
        assert!(get_attachment(&store, &att.attachment_id).is_some());
        assert_eq!(get_reference_count(&store, &att.attachment_id), 0);

        // Unreferenced, so a sweep removes it
        assert_eq!(cleanup_unreferenced(&store), 1);
        assert!(get_attachment(&store, &att.attachment_id).is_none());
    }

    #[test]
    fn test_referenced_attachment_survives_sweep() {
        let store = GmailStore::new();
        let att = register_attachment(&store, "a.txt", "text/plain", "aGk=".to_string(), 2).unwrap();

        {
            let mut users = store.users_mut();
            let mailbox = users.get_mut("me").unwrap();
            let msg = Message {
                id: "m1".to_string(),
                thread_id: "t1".to_string(),
                payload: Some(crate::models::MessagePayload {
                    mime_type: Some("multipart/mixed".to_string()),
                    parts: Some(vec![attachment_part(&att)]),
                    ..Default::default()
                }),
                ..Message::default()
            };
            mailbox.messages.insert("m1".to_string(), msg);
        }

        assert_eq!(get_reference_count(&store, &att.attachment_id), 1);
        assert_eq!(cleanup_unreferenced(&store), 0);
        assert!(get_attachment(&store, &att.attachment_id).is_some());
    }
}
