//! Message resource and its format-dependent projections

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Permissive address shape, matching what the real API tolerates
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.+-]+@[A-Za-z0-9-]+\.[A-Za-z0-9-.]+$").unwrap());

/// Split a comma-separated recipient list, dropping invalid addresses
pub fn parse_email_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty() && EMAIL_RE.is_match(s))
        .map(str::to_string)
        .collect()
}

/// Normalize a recipient field for storage: filtered, comma-joined
pub fn normalize_email_list(value: &str) -> String {
    parse_email_list(value).join(", ")
}

/// A single RFC 2822 header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Body data of a payload part
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartBody {
    /// Base64 content for inline/text parts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Reference into the store's attachment table
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_id: Option<String>,
    /// Attachment size in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// One part of a (possibly multipart) message payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessagePart {
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub body: PartBody,
}

/// Parsed message payload in the Gmail API structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessagePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub headers: Vec<Header>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<PartBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parts: Option<Vec<MessagePart>>,
}

impl MessagePayload {
    /// Look up a header value by name, case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}

/// A message as stored in a mailbox
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Message {
    pub id: String,
    pub thread_id: String,
    /// Entire message as a base64url-encoded RFC 2822 string
    pub raw: String,
    pub sender: String,
    pub recipient: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cc: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub bcc: String,
    pub subject: String,
    pub body: String,
    pub date: String,
    /// Epoch milliseconds, rendered as a string per the Gmail convention
    pub internal_date: String,
    pub is_read: bool,
    pub label_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<MessagePayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<Header>>,
}

impl Message {
    /// True when the UNREAD label is absent
    pub fn computed_is_read(&self) -> bool {
        !self
            .label_ids
            .iter()
            .any(|l| l.eq_ignore_ascii_case("UNREAD"))
    }

    /// Recompute `isRead` from the current labels
    pub fn sync_is_read(&mut self) {
        self.is_read = self.computed_is_read();
    }

    pub fn labels_upper(&self) -> Vec<String> {
        self.label_ids.iter().map(|l| l.to_uppercase()).collect()
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.label_ids.iter().any(|l| l.eq_ignore_ascii_case(label))
    }

    /// First 100 characters of the body
    pub fn snippet(&self) -> String {
        self.body.chars().take(100).collect()
    }

    /// Payload to expose from the `full` format: the parsed structure when
    /// present, otherwise a basic single-part payload built from the fields.
    pub fn effective_payload(&self) -> MessagePayload {
        if let Some(payload) = &self.payload {
            return payload.clone();
        }
        use base64::prelude::*;
        let mut headers = vec![
            Header::new("From", &self.sender),
            Header::new("To", &self.recipient),
            Header::new("Subject", &self.subject),
            Header::new("Date", &self.date),
        ];
        if !self.cc.is_empty() {
            headers.push(Header::new("Cc", &self.cc));
        }
        if !self.bcc.is_empty() {
            headers.push(Header::new("Bcc", &self.bcc));
        }
        MessagePayload {
            mime_type: Some("text/plain".to_string()),
            headers,
            body: Some(PartBody {
                data: Some(BASE64_STANDARD.encode(self.body.as_bytes())),
                ..PartBody::default()
            }),
            parts: None,
        }
    }

    /// Project the message into the requested response format
    pub fn view(&self, format: MessageFormat, metadata_headers: Option<&[String]>) -> MessageView {
        match format {
            MessageFormat::Minimal => MessageView {
                id: self.id.clone(),
                label_ids: self.labels_upper(),
                ..MessageView::default()
            },
            MessageFormat::Metadata => MessageView {
                id: self.id.clone(),
                label_ids: self.labels_upper(),
                headers: Some(self.metadata_headers(metadata_headers)),
                ..MessageView::default()
            },
            MessageFormat::Raw => MessageView {
                id: self.id.clone(),
                thread_id: Some(self.thread_id.clone()),
                label_ids: self.labels_upper(),
                raw: Some(self.raw.clone()),
                internal_date: Some(self.internal_date.clone()),
                ..MessageView::default()
            },
            MessageFormat::Full => MessageView {
                id: self.id.clone(),
                thread_id: Some(self.thread_id.clone()),
                label_ids: self.labels_upper(),
                snippet: Some(self.snippet()),
                internal_date: Some(self.internal_date.clone()),
                payload: Some(self.effective_payload()),
                size_estimate: Some(self.body.len() as u64),
                is_read: Some(self.computed_is_read()),
                // Only documented for the raw format, kept for compatibility
                raw: Some(self.raw.clone()),
                ..MessageView::default()
            },
        }
    }

    fn metadata_headers(&self, requested: Option<&[String]>) -> Vec<Header> {
        let Some(requested) = requested else {
            return Vec::new();
        };
        let mut headers = Vec::new();
        for name in requested {
            match name.as_str() {
                "From" => headers.push(Header::new("From", &self.sender)),
                "To" => headers.push(Header::new("To", &self.recipient)),
                "Subject" => headers.push(Header::new("Subject", &self.subject)),
                "Date" => headers.push(Header::new("Date", &self.date)),
                "CC" if !self.cc.is_empty() => headers.push(Header::new("CC", &self.cc)),
                "BCC" if !self.bcc.is_empty() => headers.push(Header::new("BCC", &self.bcc)),
                _ => {}
            }
        }
        headers
    }
}

/// Response format selector for message and thread reads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MessageFormat {
    Minimal,
    Metadata,
    Raw,
    #[default]
    Full,
}

impl std::str::FromStr for MessageFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "minimal" => Ok(Self::Minimal),
            "metadata" => Ok(Self::Metadata),
            "raw" => Ok(Self::Raw),
            "full" => Ok(Self::Full),
            other => Err(Error::validation(format!(
                "format must be one of 'minimal', 'full', 'raw', 'metadata', got '{other}'"
            ))),
        }
    }
}

/// Format-dependent read projection of a message
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: String,
    pub label_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<MessagePayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_estimate: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_read: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<Header>>,
}

/// Message fields accepted by send/insert/import and draft operations
///
/// Everything is optional; endpoints apply their own defaults, mirroring the
/// partial payloads the real API accepts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessageInput {
    pub thread_id: Option<String>,
    pub raw: Option<String>,
    pub sender: Option<String>,
    pub recipient: Option<String>,
    pub cc: Option<String>,
    pub bcc: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub date: Option<String>,
    pub internal_date: Option<String>,
    pub is_read: Option<bool>,
    pub label_ids: Option<Vec<String>>,
    pub snippet: Option<String>,
    pub history_id: Option<String>,
    pub size_estimate: Option<u64>,
    pub payload: Option<MessagePayload>,
}

impl MessageInput {
    /// Validate that an explicit internalDate is on the millisecond scale.
    ///
    /// Second-scale timestamps (10 digits) are a common caller mistake and
    /// would sort a message decades into the past.
    pub fn validate_internal_date(&self) -> Result<()> {
        let Some(value) = self.internal_date.as_deref() else {
            return Ok(());
        };
        let ts: f64 = value.parse().map_err(|_| {
            Error::validation(format!(
                "internalDate '{value}' must be a valid numeric timestamp in milliseconds"
            ))
        })?;
        if ts < 1_000_000_000_000.0 {
            return Err(Error::validation(format!(
                "internalDate '{value}' appears to be in seconds, but must be in milliseconds"
            )));
        }
        Ok(())
    }
}
