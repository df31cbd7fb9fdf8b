//! Gmail mailbox simulation backend
//!
//! This crate mimics the Gmail REST API as a set of plain functions over an
//! in-memory store:
//! - Resource models (Message, Draft, Thread, Label, Attachment)
//! - A per-user mailbox store with id counters and label statistics
//! - Search query evaluation (from:, label:, is:unread, OR groups, ...)
//! - MIME message building and parsing (base64url raw messages)
//! - Endpoint functions for messages, drafts, labels and threads
//!
//! There is no network layer and no persistence; every endpoint validates
//! its input, mutates the store, and returns a resource shaped like the
//! real API's JSON payload.

pub mod error;
pub mod mime;
pub mod models;
pub mod search;
pub mod store;
pub mod users;

pub use error::{Error, Result};
pub use mime::{AttachmentSource, ParsedMessage, ParsedPart, build_raw_message, parse_raw_message};
pub use models::{
    Draft, DraftInput, Header, Label, LabelColor, LabelInput, Message, MessageFormat,
    MessageInput, MessagePart, MessagePayload, MessageView, PartBody, Profile, StoredAttachment,
    Thread,
};
pub use search::{QueryEvaluator, QueryScope};
pub use store::{GmailStore, Mailbox};
