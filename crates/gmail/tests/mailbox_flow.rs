//! Integration tests for the Gmail simulation
//!
//! These exercise the endpoint functions end to end against one store,
//! the way a test harness drives the simulated backend.

use gmail_sim::models::{DraftInput, MessageFormat, MessageInput};
use gmail_sim::store::attachments;
use gmail_sim::users::{drafts, labels, messages, threads};
use gmail_sim::{AttachmentSource, GmailStore};

fn send(store: &GmailStore, subject: &str, body: &str) -> gmail_sim::Message {
    messages::send(
        store,
        "me",
        MessageInput {
            recipient: Some("rcpt@example.com".to_string()),
            subject: Some(subject.to_string()),
            body: Some(body.to_string()),
            ..MessageInput::default()
        },
    )
    .unwrap()
}

#[test]
fn test_send_list_get_delete_flow() {
    let store = GmailStore::new();

    let sent = send(&store, "Quarterly numbers", "see below");
    send(&store, "Lunch", "pizza?");

    let listed = messages::list(&store, "me", &messages::ListParams::default()).unwrap();
    assert_eq!(listed.messages.len(), 2);

    let found = messages::list(
        &store,
        "me",
        &messages::ListParams {
            q: "subject:quarterly".to_string(),
            ..messages::ListParams::default()
        },
    )
    .unwrap();
    assert_eq!(found.messages.len(), 1);
    assert_eq!(found.messages[0].id, sent.id);

    let view = messages::get(&store, "me", &sent.id, MessageFormat::Full, None)
        .unwrap()
        .unwrap();
    assert_eq!(view.snippet.as_deref(), Some("see below"));

    messages::delete(&store, "me", &sent.id).unwrap();
    assert!(
        messages::get(&store, "me", &sent.id, MessageFormat::Full, None)
            .unwrap()
            .is_none()
    );

    let profile = store.get_profile("me").unwrap();
    assert_eq!(profile.messages_total, 2); // deletion does not decrement totals
}

#[test]
fn test_raw_message_with_attachment_is_extracted_and_cleaned_up() {
    let store = GmailStore::new();

    let raw = gmail_sim::build_raw_message(
        "rcpt@example.com",
        "Report attached",
        "PFA the report",
        "me@gmail.com",
        &gmail_sim::mime::BuildOptions {
            attachments: vec![AttachmentSource {
                filename: "report.pdf".to_string(),
                mime_type: "application/pdf".to_string(),
                data: b"%PDF-1.4 fake".to_vec(),
            }],
            ..Default::default()
        },
    );

    let sent = messages::send(
        &store,
        "me",
        MessageInput {
            raw: Some(raw),
            ..MessageInput::default()
        },
    )
    .unwrap();

    // The attachment was extracted into the store and referenced by id
    let payload = sent.payload.as_ref().unwrap();
    let parts = payload.parts.as_ref().unwrap();
    let att_ref = parts
        .iter()
        .find(|p| p.filename.as_deref() == Some("report.pdf"))
        .unwrap();
    let att_id = att_ref.body.attachment_id.as_ref().unwrap();
    assert_eq!(att_ref.body.size, Some("%PDF-1.4 fake".len() as u64));

    let fetched = messages::get_attachment(&store, "me", &sent.id, att_id)
        .unwrap()
        .unwrap();
    assert_eq!(fetched.filename, "report.pdf");
    assert_eq!(attachments::get_reference_count(&store, att_id), 1);

    // Deleting the message releases the attachment
    messages::delete(&store, "me", &sent.id).unwrap();
    assert!(attachments::get_attachment(&store, att_id).is_none());
}

#[test]
fn test_draft_lifecycle_to_sent_message() {
    let store = GmailStore::new();

    let draft = drafts::create(
        &store,
        "me",
        DraftInput {
            id: None,
            message: Some(MessageInput {
                recipient: Some("rcpt@example.com".to_string()),
                subject: Some("WIP".to_string()),
                body: Some("first version".to_string()),
                ..MessageInput::default()
            }),
        },
    )
    .unwrap();
    assert!(draft.message.has_label("DRAFT"));

    drafts::update(
        &store,
        "me",
        &draft.id,
        Some(DraftInput {
            id: None,
            message: Some(MessageInput {
                body: Some("final version".to_string()),
                ..MessageInput::default()
            }),
        }),
    )
    .unwrap()
    .unwrap();

    let sent = drafts::send(
        &store,
        "me",
        DraftInput {
            id: Some(draft.id.clone()),
            message: None,
        },
    )
    .unwrap();
    assert!(sent.has_label("SENT"));
    assert_eq!(sent.body, "final version");

    // Draft is gone, message is listed
    assert!(
        drafts::get(&store, "me", &draft.id, MessageFormat::Full)
            .unwrap()
            .is_none()
    );
    let listed = messages::list(&store, "me", &messages::ListParams::default()).unwrap();
    assert_eq!(listed.messages.len(), 1);
}

#[test]
fn test_thread_label_fanout_and_counts() {
    let store = GmailStore::new();

    let first = send(&store, "thread start", "a");
    messages::send(
        &store,
        "me",
        MessageInput {
            recipient: Some("rcpt@example.com".to_string()),
            subject: Some("Re: thread start".to_string()),
            body: Some("b".to_string()),
            thread_id: Some(first.thread_id.clone()),
            ..MessageInput::default()
        },
    )
    .unwrap();

    threads::modify(
        &store,
        "me",
        &first.thread_id,
        Some(&["IMPORTANT".to_string()]),
        None,
    )
    .unwrap();

    let view = threads::get(&store, "me", &first.thread_id, MessageFormat::Minimal, None)
        .unwrap()
        .unwrap();
    assert_eq!(view.messages.len(), 2);
    for msg in &view.messages {
        assert!(msg.label_ids.contains(&"IMPORTANT".to_string()));
    }

    // Message-level modify does not maintain per-thread label counts;
    // the verifier detects the drift and can repair it
    let report = store.verify_label_counts(true);
    assert!(report.has_differences);
    let report = store.verify_label_counts(false);
    assert!(!report.has_differences, "label counts still drifted: {report:?}");
}

#[test]
fn test_label_statistics_follow_modifications() {
    let store = GmailStore::new();
    let label = labels::create(&store, "me", None).unwrap();
    let msg = send(&store, "x", "y");

    messages::modify(&store, "me", &msg.id, Some(&[label.id.clone()]), None).unwrap();
    let after_add = labels::get(&store, "me", &label.id).unwrap().unwrap();
    assert_eq!(after_add.messages_total, 1);

    messages::modify(&store, "me", &msg.id, None, Some(&[label.id.clone()])).unwrap();
    let after_remove = labels::get(&store, "me", &label.id).unwrap().unwrap();
    assert_eq!(after_remove.messages_total, 0);
}

#[test]
fn test_search_operators_over_mailbox() {
    let store = GmailStore::new();
    messages::insert(
        &store,
        "me",
        MessageInput {
            sender: Some("alerts@ci.example.com".to_string()),
            recipient: Some("me@gmail.com".to_string()),
            subject: Some("Build failed".to_string()),
            body: Some("the build is red".to_string()),
            ..MessageInput::default()
        },
        messages::InternalDateSource::ReceivedTime,
        false,
    )
    .unwrap();
    messages::insert(
        &store,
        "me",
        MessageInput {
            sender: Some("friend@example.com".to_string()),
            recipient: Some("me@gmail.com".to_string()),
            subject: Some("Weekend plans".to_string()),
            body: Some("hiking?".to_string()),
            is_read: Some(true),
            ..MessageInput::default()
        },
        messages::InternalDateSource::ReceivedTime,
        false,
    )
    .unwrap();

    let unread = messages::list(
        &store,
        "me",
        &messages::ListParams {
            q: "is:unread".to_string(),
            ..messages::ListParams::default()
        },
    )
    .unwrap();
    assert_eq!(unread.messages.len(), 1);
    assert_eq!(unread.messages[0].subject, "Build failed");

    let combined = messages::list(
        &store,
        "me",
        &messages::ListParams {
            q: "from:alerts@ci.example.com OR subject:weekend".to_string(),
            ..messages::ListParams::default()
        },
    )
    .unwrap();
    assert_eq!(combined.messages.len(), 2);

    let negated = messages::list(
        &store,
        "me",
        &messages::ListParams {
            q: "-subject:build".to_string(),
            ..messages::ListParams::default()
        },
    )
    .unwrap();
    assert_eq!(negated.messages.len(), 1);
    assert_eq!(negated.messages[0].subject, "Weekend plans");
}

#[test]
fn test_snapshot_fixture_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mailbox.json");

    let store = GmailStore::new();
    send(&store, "persisted", "body");
    store.snapshot_to_file(&path).unwrap();

    let restored = GmailStore::new();
    restored.load_snapshot_from_file(&path).unwrap();
    let listed = messages::list(&restored, "me", &messages::ListParams::default()).unwrap();
    assert_eq!(listed.messages.len(), 1);
    assert_eq!(listed.messages[0].subject, "persisted");

    // Counters continue after the restored state
    let next = send(&restored, "after restore", "x");
    assert_ne!(next.id, listed.messages[0].id);
}

#[test]
fn test_reset_restores_seed_state() {
    let store = GmailStore::new();
    send(&store, "ephemeral", "x");
    store.reset();

    let listed = messages::list(&store, "me", &messages::ListParams::default()).unwrap();
    assert!(listed.messages.is_empty());
    let profile = store.get_profile("me").unwrap();
    assert_eq!(profile.messages_total, 0);
}
