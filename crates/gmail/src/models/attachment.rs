//! Attachment record held in the store's global attachment table

use serde::{Deserialize, Serialize};

/// A stored attachment body plus its metadata
///
/// Message and draft payload parts reference these by `attachment_id`;
/// the record itself is shared and reference counted by scanning parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAttachment {
    pub attachment_id: String,
    pub filename: String,
    pub mime_type: String,
    /// Decoded size in bytes
    pub size: u64,
    /// Base64-encoded content
    pub data: String,
}
