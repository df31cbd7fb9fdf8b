//! In-memory mailbox store
//!
//! Maps protected by RwLocks so endpoint functions can share the store by
//! reference. There is no durability and no isolation between callers; the
//! store stands in for a real backend's persistent storage in tests.

pub mod attachments;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{Draft, Label, Message, Profile, StoredAttachment, Thread, is_system_label};

/// Monotonic id counters, one per resource family
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Counters {
    pub message: u64,
    pub thread: u64,
    pub draft: u64,
    pub label: u64,
    pub attachment: u64,
}

/// One user's mailbox: profile plus per-resource tables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mailbox {
    pub profile: Profile,
    pub messages: HashMap<String, Message>,
    pub threads: HashMap<String, Thread>,
    pub drafts: HashMap<String, Draft>,
    pub labels: HashMap<String, Label>,
}

impl Mailbox {
    /// A fresh mailbox seeded with the system labels
    pub fn new(email: impl Into<String>) -> Self {
        let mut labels = HashMap::new();
        for id in ["INBOX", "UNREAD", "IMPORTANT", "SENT", "DRAFT", "TRASH", "SPAM"] {
            labels.insert(id.to_string(), Label::system(id));
        }
        Self {
            profile: Profile::new(email),
            messages: HashMap::new(),
            threads: HashMap::new(),
            drafts: HashMap::new(),
            labels,
        }
    }

    /// Default sender address for this mailbox
    pub fn default_sender(&self) -> String {
        self.profile.email_address.clone()
    }

    pub fn history_id(&self) -> String {
        self.profile.history_id.clone()
    }

    /// Create any referenced user labels that do not exist yet.
    ///
    /// System label ids are never recreated; an existing label (exact id
    /// match) is left untouched.
    pub fn ensure_labels_exist(&mut self, label_ids: &[String]) {
        for incoming in label_ids {
            if self.labels.contains_key(incoming) {
                continue;
            }
            if is_system_label(incoming) {
                let upper = incoming.to_uppercase();
                self.labels
                    .entry(upper.clone())
                    .or_insert_with(|| Label::system(upper));
                continue;
            }
            self.labels
                .insert(incoming.clone(), Label::user(incoming.clone(), incoming.clone()));
        }
    }

    /// Update label statistics after a message was added to a thread.
    ///
    /// Only labels that already exist in the label table are counted; a
    /// label contributes to `threadsTotal` only when no other message of
    /// the thread already carried it.
    pub fn bump_label_stats_for_new_message(&mut self, message_id: &str) {
        let Some(msg) = self.messages.get(message_id) else {
            return;
        };
        let new_labels = msg.label_ids.clone();
        let is_unread = msg.has_label("UNREAD");
        let thread_id = msg.thread_id.clone();

        let mut existing_thread_labels: HashSet<String> = HashSet::new();
        if let Some(thread) = self.threads.get(&thread_id) {
            for mid in &thread.message_ids {
                if mid == message_id {
                    continue;
                }
                if let Some(other) = self.messages.get(mid) {
                    existing_thread_labels.extend(other.label_ids.iter().cloned());
                }
            }
        }

        for label_id in &new_labels {
            if let Some(label) = self.labels.get_mut(label_id) {
                label.messages_total += 1;
                if is_unread {
                    label.messages_unread += 1;
                }
                if !existing_thread_labels.contains(label_id) {
                    label.threads_total += 1;
                }
            }
        }

        self.profile.messages_total += 1;
        let thread_len = self
            .threads
            .get(&thread_id)
            .map(|t| t.message_ids.len())
            .unwrap_or(0);
        if thread_len == 1 {
            self.profile.threads_total += 1;
        }
    }

    /// Adjust label message counts after labels were added/removed on one
    /// message. Ids are matched case-insensitively against the label table.
    pub fn adjust_label_counts(
        &mut self,
        added: &HashSet<String>,
        removed: &HashSet<String>,
        unread_for_added: bool,
        unread_for_removed: bool,
    ) {
        let id_map: HashMap<String, String> = self
            .labels
            .keys()
            .map(|id| (id.to_uppercase(), id.clone()))
            .collect();

        for upper in added {
            if let Some(id) = id_map.get(&upper.to_uppercase())
                && let Some(label) = self.labels.get_mut(id)
            {
                label.messages_total += 1;
                if unread_for_added {
                    label.messages_unread += 1;
                }
            }
        }
        for upper in removed {
            if let Some(id) = id_map.get(&upper.to_uppercase())
                && let Some(label) = self.labels.get_mut(id)
            {
                label.messages_total = label.messages_total.saturating_sub(1);
                if unread_for_removed {
                    label.messages_unread = label.messages_unread.saturating_sub(1);
                }
            }
        }
    }
}

/// Serialized form of the whole store, used by the fixture helpers
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    users: HashMap<String, Mailbox>,
    counters: Counters,
    attachments: HashMap<String, StoredAttachment>,
}

/// The shared in-memory Gmail store
pub struct GmailStore {
    users: RwLock<HashMap<String, Mailbox>>,
    attachments: RwLock<HashMap<String, StoredAttachment>>,
    counters: RwLock<Counters>,
}

impl GmailStore {
    /// Create a store seeded with the default `me` mailbox
    pub fn new() -> Self {
        let store = Self {
            users: RwLock::new(HashMap::new()),
            attachments: RwLock::new(HashMap::new()),
            counters: RwLock::new(Counters::default()),
        };
        store.reset();
        store
    }

    /// Reset to the seeded initial state
    pub fn reset(&self) {
        let mut users = self.users.write().unwrap();
        users.clear();
        users.insert("me".to_string(), Mailbox::new("me@gmail.com"));
        drop(users);

        self.attachments.write().unwrap().clear();
        // Label counter starts above the reserved range used by seeds
        *self.counters.write().unwrap() = Counters {
            label: 10,
            ..Counters::default()
        };
    }

    /// Register an additional user mailbox (fixture seeding)
    pub fn add_user(&self, user_id: impl Into<String>, email: impl Into<String>) {
        self.users
            .write()
            .unwrap()
            .insert(user_id.into(), Mailbox::new(email));
    }

    pub(crate) fn users(&self) -> RwLockReadGuard<'_, HashMap<String, Mailbox>> {
        self.users.read().unwrap()
    }

    pub(crate) fn users_mut(&self) -> RwLockWriteGuard<'_, HashMap<String, Mailbox>> {
        self.users.write().unwrap()
    }

    pub(crate) fn attachments(&self) -> RwLockReadGuard<'_, HashMap<String, StoredAttachment>> {
        self.attachments.read().unwrap()
    }

    pub(crate) fn attachments_mut(
        &self,
    ) -> RwLockWriteGuard<'_, HashMap<String, StoredAttachment>> {
        self.attachments.write().unwrap()
    }

    /// Resolve a user argument to the store key.
    ///
    /// Accepts either a key (`me`) or a profile email address.
    pub fn resolve_user(&self, user_id: &str) -> Result<String> {
        let users = self.users();
        if users.contains_key(user_id) {
            return Ok(user_id.to_string());
        }
        for (key, mailbox) in users.iter() {
            if mailbox.profile.email_address == user_id {
                return Ok(key.clone());
            }
        }
        Err(Error::not_found(format!("User '{user_id}' does not exist.")))
    }

    pub fn next_message_num(&self) -> u64 {
        let mut counters = self.counters.write().unwrap();
        counters.message += 1;
        counters.message
    }

    pub fn next_draft_num(&self) -> u64 {
        let mut counters = self.counters.write().unwrap();
        counters.draft += 1;
        counters.draft
    }

    pub fn next_label_num(&self) -> u64 {
        let mut counters = self.counters.write().unwrap();
        counters.label += 1;
        counters.label
    }

    pub fn next_attachment_num(&self) -> u64 {
        let mut counters = self.counters.write().unwrap();
        counters.attachment += 1;
        counters.attachment
    }

    /// Profile for a user
    pub fn get_profile(&self, user_id: &str) -> Result<Profile> {
        let user = self.resolve_user(user_id)?;
        let users = self.users();
        Ok(users[&user].profile.clone())
    }

    /// Serialize the full store state
    pub fn snapshot(&self) -> serde_json::Value {
        let snapshot = Snapshot {
            users: self.users().clone(),
            counters: self.counters.read().unwrap().clone(),
            attachments: self.attachments().clone(),
        };
        serde_json::to_value(snapshot).expect("store state is always serializable")
    }

    /// Replace the store state from a snapshot value
    pub fn load_snapshot(&self, value: serde_json::Value) -> Result<()> {
        let snapshot: Snapshot = serde_json::from_value(value)
            .map_err(|e| Error::validation(format!("invalid snapshot: {e}")))?;
        *self.users.write().unwrap() = snapshot.users;
        *self.counters.write().unwrap() = snapshot.counters;
        *self.attachments.write().unwrap() = snapshot.attachments;
        Ok(())
    }

    /// Write the store state to a JSON fixture file
    pub fn snapshot_to_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        std::fs::write(path.as_ref(), json)
            .with_context(|| format!("failed to write snapshot to {}", path.as_ref().display()))
    }

    /// Load the store state from a JSON fixture file
    pub fn load_snapshot_from_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let data = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("failed to read snapshot from {}", path.as_ref().display()))?;
        let value: serde_json::Value = serde_json::from_str(&data)?;
        self.load_snapshot(value)?;
        Ok(())
    }

    /// Recompute label and profile statistics for every user and report
    /// differences against the stored values; `apply` overwrites the stored
    /// counts with the recomputed ones.
    pub fn verify_label_counts(&self, apply: bool) -> LabelCountReport {
        let mut report = LabelCountReport::default();
        let mut users = self.users_mut();

        for (user_id, mailbox) in users.iter_mut() {
            let mut computed: BTreeMap<String, LabelCounts> = BTreeMap::new();
            for id in mailbox.labels.keys() {
                computed.insert(id.to_uppercase(), LabelCounts::default());
            }

            for message in mailbox.messages.values() {
                let labels = message.labels_upper();
                let unread = !message.is_read || labels.iter().any(|l| l == "UNREAD");
                for label in &labels {
                    let counts = computed.entry(label.clone()).or_default();
                    counts.messages_total += 1;
                    if unread {
                        counts.messages_unread += 1;
                    }
                }
            }
            // Draft messages carry labels too
            for draft in mailbox.drafts.values() {
                let labels = draft.message.labels_upper();
                let unread = !draft.message.is_read || labels.iter().any(|l| l == "UNREAD");
                for label in &labels {
                    let counts = computed.entry(label.clone()).or_default();
                    counts.messages_total += 1;
                    if unread {
                        counts.messages_unread += 1;
                    }
                }
            }

            for thread in mailbox.threads.values() {
                let mut thread_labels: HashSet<String> = HashSet::new();
                let mut unread_labels: HashSet<String> = HashSet::new();
                for mid in &thread.message_ids {
                    let Some(message) = mailbox.messages.get(mid) else {
                        continue;
                    };
                    let labels = message.labels_upper();
                    thread_labels.extend(labels.iter().cloned());
                    if !message.is_read || labels.iter().any(|l| l == "UNREAD") {
                        unread_labels.extend(labels.iter().cloned());
                    }
                }
                for label in &thread_labels {
                    computed.entry(label.clone()).or_default().threads_total += 1;
                }
                for label in &unread_labels {
                    computed.entry(label.clone()).or_default().threads_unread += 1;
                }
            }

            let mut user_diff = UserCountDiff::default();
            let id_map: HashMap<String, String> = mailbox
                .labels
                .keys()
                .map(|id| (id.to_uppercase(), id.clone()))
                .collect();

            for (label_upper, counts) in &computed {
                let stored_id = id_map.get(label_upper);
                let stored = stored_id.and_then(|id| mailbox.labels.get(id));
                let actual = stored.map(LabelCounts::from_label).unwrap_or_default();
                let mut label_diff = BTreeMap::new();
                for (field, expected, got) in [
                    ("messagesTotal", counts.messages_total, actual.messages_total),
                    ("messagesUnread", counts.messages_unread, actual.messages_unread),
                    ("threadsTotal", counts.threads_total, actual.threads_total),
                    ("threadsUnread", counts.threads_unread, actual.threads_unread),
                ] {
                    if expected != got {
                        label_diff.insert(field.to_string(), CountDiff { expected, actual: got });
                    }
                }
                if !label_diff.is_empty() {
                    if apply && let Some(id) = stored_id
                        && let Some(label) = mailbox.labels.get_mut(id)
                    {
                        label.messages_total = counts.messages_total;
                        label.messages_unread = counts.messages_unread;
                        label.threads_total = counts.threads_total;
                        label.threads_unread = counts.threads_unread;
                    }
                    user_diff.labels.insert(label_upper.clone(), label_diff);
                }
            }

            let expected_messages = mailbox.messages.len() as u64;
            if mailbox.profile.messages_total != expected_messages {
                user_diff.profile.insert(
                    "messagesTotal".to_string(),
                    CountDiff {
                        expected: expected_messages,
                        actual: mailbox.profile.messages_total,
                    },
                );
                if apply {
                    mailbox.profile.messages_total = expected_messages;
                }
            }
            let expected_threads = mailbox.threads.len() as u64;
            if mailbox.profile.threads_total != expected_threads {
                user_diff.profile.insert(
                    "threadsTotal".to_string(),
                    CountDiff {
                        expected: expected_threads,
                        actual: mailbox.profile.threads_total,
                    },
                );
                if apply {
                    mailbox.profile.threads_total = expected_threads;
                }
            }

            if !user_diff.labels.is_empty() || !user_diff.profile.is_empty() {
                report.has_differences = true;
                report.users.insert(user_id.clone(), user_diff);
            }
        }

        report
    }
}

impl Default for GmailStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve a mailbox from a write-locked user map
pub(crate) fn mailbox_mut<'a>(
    users: &'a mut HashMap<String, Mailbox>,
    user: &str,
) -> Result<&'a mut Mailbox> {
    users
        .get_mut(user)
        .ok_or_else(|| Error::not_found(format!("User '{user}' does not exist.")))
}

/// Resolve a mailbox from a read-locked user map
pub(crate) fn mailbox<'a>(users: &'a HashMap<String, Mailbox>, user: &str) -> Result<&'a Mailbox> {
    users
        .get(user)
        .ok_or_else(|| Error::not_found(format!("User '{user}' does not exist.")))
}

#[derive(Debug, Clone, Copy, Default)]
struct LabelCounts {
    messages_total: u64,
    messages_unread: u64,
    threads_total: u64,
    threads_unread: u64,
}

impl LabelCounts {
    fn from_label(label: &Label) -> Self {
        Self {
            messages_total: label.messages_total,
            messages_unread: label.messages_unread,
            threads_total: label.threads_total,
            threads_unread: label.threads_unread,
        }
    }
}

/// One stored-vs-recomputed count difference
#[derive(Debug, Clone, Serialize)]
pub struct CountDiff {
    pub expected: u64,
    pub actual: u64,
}

/// Differences for one user
#[derive(Debug, Default, Serialize)]
pub struct UserCountDiff {
    pub labels: BTreeMap<String, BTreeMap<String, CountDiff>>,
    pub profile: BTreeMap<String, CountDiff>,
}

/// Result of `GmailStore::verify_label_counts`
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelCountReport {
    pub users: BTreeMap<String, UserCountDiff>,
    pub has_differences: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_store_seeds_me() {
        let store = GmailStore::new();
        let profile = store.get_profile("me").unwrap();
        assert_eq!(profile.email_address, "me@gmail.com");
        assert_eq!(profile.history_id, "1");

        let users = store.users();
        let labels = &users["me"].labels;
        assert!(labels.contains_key("INBOX"));
        assert!(labels.contains_key("TRASH"));
        assert_eq!(labels.len(), 7);
    }

    #[test]
    fn test_resolve_user_by_email() {
        let store = GmailStore::new();
        assert_eq!(store.resolve_user("me").unwrap(), "me");
        assert_eq!(store.resolve_user("me@gmail.com").unwrap(), "me");
        assert!(store.resolve_user("nobody@example.com").is_err());
    }

    #[test]
    fn test_counters_are_monotonic() {
        let store = GmailStore::new();
        assert_eq!(store.next_message_num(), 1);
        assert_eq!(store.next_message_num(), 2);
        // Label counter starts at 10
        assert_eq!(store.next_label_num(), 11);
    }

    #[test]
    fn test_ensure_labels_exist_preserves_case() {
        let store = GmailStore::new();
        let mut users = store.users_mut();
        let mailbox = users.get_mut("me").unwrap();
        mailbox.ensure_labels_exist(&["Project-X".to_string(), "inbox".to_string()]);
        assert!(mailbox.labels.contains_key("Project-X"));
        // System label already seeded, not duplicated under a new case
        assert!(!mailbox.labels.contains_key("inbox"));
        assert!(mailbox.labels.contains_key("INBOX"));
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let store = GmailStore::new();
        store.add_user("alice", "alice@example.com");
        let snapshot = store.snapshot();

        let restored = GmailStore::new();
        restored.load_snapshot(snapshot).unwrap();
        assert!(restored.resolve_user("alice@example.com").is_ok());
    }

    #[test]
    fn test_verify_label_counts_detects_and_repairs_drift() {
        let store = GmailStore::new();
        {
            let mut users = store.users_mut();
            let mailbox = users.get_mut("me").unwrap();
            let mut msg = Message {
                id: "m1".to_string(),
                thread_id: "t1".to_string(),
                label_ids: vec!["INBOX".to_string(), "UNREAD".to_string()],
                ..Message::default()
            };
            msg.sync_is_read();
            mailbox.messages.insert("m1".to_string(), msg);
            let mut thread = Thread::new("t1");
            thread.push_message("m1");
            mailbox.threads.insert("t1".to_string(), thread);
        }

        let report = store.verify_label_counts(false);
        assert!(report.has_differences);

        let report = store.verify_label_counts(true);
        assert!(report.has_differences);

        // After repair, a second pass is clean
        let report = store.verify_label_counts(false);
        assert!(!report.has_differences);
    }
}
