//! Parse base64url-encoded RFC 2822 messages

use base64::prelude::*;

use crate::error::{Error, Result};
use crate::models::Header;

/// A text part of a parsed message
#[derive(Debug, Clone)]
pub struct TextPart {
    pub mime_type: String,
    /// Decoded text content
    pub text: String,
}

/// An attachment part of a parsed message
#[derive(Debug, Clone)]
pub struct AttachmentPart {
    pub filename: String,
    pub mime_type: String,
    /// Base64-encoded content
    pub data: String,
    /// Decoded size in bytes
    pub size: u64,
}

/// One part of a multipart message
#[derive(Debug, Clone)]
pub enum ParsedPart {
    Text(TextPart),
    Attachment(AttachmentPart),
}

/// A decoded RFC 2822 message
#[derive(Debug, Clone)]
pub struct ParsedMessage {
    pub headers: Vec<Header>,
    /// Content type of the top-level entity
    pub mime_type: String,
    /// Text of the first text part (or the whole single-part body)
    pub body_text: String,
    /// Multipart parts in order; empty for single-part messages
    pub parts: Vec<ParsedPart>,
}

impl ParsedMessage {
    /// Look up a header value by name, case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}

/// Decode and parse a base64url-encoded RFC 2822 message.
///
/// Standard base64 and missing padding are tolerated, matching what the
/// real API accepts from assorted clients.
pub fn parse_raw_message(raw: &str) -> Result<ParsedMessage> {
    let bytes = decode_raw(raw)?;
    let text = String::from_utf8_lossy(&bytes).into_owned();

    let (header_block, body) = split_message(&text);
    let headers = parse_headers(header_block);

    let content_type = headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case("Content-Type"))
        .map(|h| h.value.clone())
        .unwrap_or_else(|| "text/plain".to_string());
    let mime_type = primary_type(&content_type);

    if mime_type.starts_with("multipart/") {
        let boundary = content_type_param(&content_type, "boundary").ok_or_else(|| {
            Error::validation("multipart message is missing a boundary parameter".to_string())
        })?;
        let parts = parse_multipart(body, &boundary)?;
        let body_text = parts
            .iter()
            .find_map(|p| match p {
                ParsedPart::Text(t) => Some(t.text.clone()),
                ParsedPart::Attachment(_) => None,
            })
            .unwrap_or_default();
        Ok(ParsedMessage {
            headers,
            mime_type,
            body_text,
            parts,
        })
    } else {
        Ok(ParsedMessage {
            headers,
            mime_type,
            body_text: body.trim_end_matches(['\r', '\n']).to_string(),
            parts: Vec::new(),
        })
    }
}

fn decode_raw(raw: &str) -> Result<Vec<u8>> {
    let trimmed = raw.trim();
    for engine in [
        &BASE64_URL_SAFE_NO_PAD,
        &BASE64_URL_SAFE,
        &BASE64_STANDARD,
        &BASE64_STANDARD_NO_PAD,
    ] {
        if let Ok(bytes) = engine.decode(trimmed) {
            return Ok(bytes);
        }
    }
    Err(Error::validation(
        "raw message is not valid base64url data".to_string(),
    ))
}

/// Split an entity into its header block and body at the first blank line
fn split_message(text: &str) -> (&str, &str) {
    if let Some(pos) = text.find("\r\n\r\n") {
        (&text[..pos], &text[pos + 4..])
    } else if let Some(pos) = text.find("\n\n") {
        (&text[..pos], &text[pos + 2..])
    } else {
        (text, "")
    }
}

/// Parse a header block, unfolding continuation lines
fn parse_headers(block: &str) -> Vec<Header> {
    let mut headers: Vec<Header> = Vec::new();
    for line in block.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        if (line.starts_with(' ') || line.starts_with('\t'))
            && let Some(last) = headers.last_mut()
        {
            last.value.push(' ');
            last.value.push_str(line.trim());
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push(Header::new(name.trim(), value.trim()));
        }
    }
    headers
}

/// The media type before any parameters
fn primary_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase()
}

/// A `key="value"` or `key=value` parameter of a structured header value
fn content_type_param(value: &str, key: &str) -> Option<String> {
    for segment in value.split(';').skip(1) {
        let segment = segment.trim();
        if let Some((k, v)) = segment.split_once('=')
            && k.trim().eq_ignore_ascii_case(key)
        {
            return Some(v.trim().trim_matches('"').to_string());
        }
    }
    None
}

fn parse_multipart(body: &str, boundary: &str) -> Result<Vec<ParsedPart>> {
    let delimiter = format!("--{boundary}");
    let mut parts = Vec::new();

    for segment in body.split(delimiter.as_str()).skip(1) {
        let segment = segment.trim_start_matches(['\r', '\n']);
        // The closing delimiter leaves a "--" segment
        if segment.starts_with("--") || segment.trim().is_empty() {
            continue;
        }
        let (header_block, part_body) = split_message(segment);
        let headers = parse_headers(header_block);
        let content_type = headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case("Content-Type"))
            .map(|h| h.value.clone())
            .unwrap_or_else(|| "text/plain".to_string());
        let mime_type = primary_type(&content_type);

        let filename = headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case("Content-Disposition"))
            .and_then(|h| content_type_param(&h.value, "filename"))
            .or_else(|| content_type_param(&content_type, "name"));

        let transfer_encoding = headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case("Content-Transfer-Encoding"))
            .map(|h| h.value.trim().to_lowercase());

        let raw_body = part_body.trim_end_matches(['\r', '\n']);

        if let Some(filename) = filename {
            let bytes = if transfer_encoding.as_deref() == Some("base64") {
                let compact: String = raw_body.chars().filter(|c| !c.is_whitespace()).collect();
                BASE64_STANDARD.decode(&compact).map_err(|_| {
                    Error::validation(format!(
                        "attachment '{filename}' has invalid base64 content"
                    ))
                })?
            } else {
                raw_body.as_bytes().to_vec()
            };
            parts.push(ParsedPart::Attachment(AttachmentPart {
                filename,
                mime_type,
                size: bytes.len() as u64,
                data: BASE64_STANDARD.encode(&bytes),
            }));
        } else {
            let text = if transfer_encoding.as_deref() == Some("base64") {
                let compact: String = raw_body.chars().filter(|c| !c.is_whitespace()).collect();
                BASE64_STANDARD
                    .decode(&compact)
                    .map(|b| String::from_utf8_lossy(&b).into_owned())
                    .unwrap_or_else(|_| raw_body.to_string())
            } else {
                raw_body.to_string()
            };
            parts.push(ParsedPart::Text(TextPart { mime_type, text }));
        }
    }

    Ok(parts)
}
