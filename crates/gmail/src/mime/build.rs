//! Build RFC 2822 / MIME messages

use base64::prelude::*;
use chrono::Utc;

/// An attachment to embed when building a raw message
#[derive(Debug, Clone)]
pub struct AttachmentSource {
    pub filename: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Optional header fields for `build_raw_message`
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub cc: Option<String>,
    pub bcc: Option<String>,
    pub date: Option<String>,
    pub attachments: Vec<AttachmentSource>,
}

/// Assemble an RFC 2822 message and return it base64url encoded.
///
/// With attachments the body and each attachment become parts of a
/// multipart/mixed message; attachment bodies are base64 encoded with a
/// Content-Disposition filename.
pub fn build_raw_message(
    to: &str,
    subject: &str,
    body: &str,
    from: &str,
    options: &BuildOptions,
) -> String {
    let mut out = String::new();
    append_header(&mut out, "From", from);
    append_header(&mut out, "To", to);
    if let Some(cc) = options.cc.as_deref().filter(|s| !s.is_empty()) {
        append_header(&mut out, "Cc", cc);
    }
    if let Some(bcc) = options.bcc.as_deref().filter(|s| !s.is_empty()) {
        append_header(&mut out, "Bcc", bcc);
    }
    append_header(&mut out, "Subject", subject);
    let date = options
        .date
        .clone()
        .unwrap_or_else(|| Utc::now().to_rfc2822());
    append_header(&mut out, "Date", &date);
    append_header(&mut out, "MIME-Version", "1.0");

    if options.attachments.is_empty() {
        append_header(&mut out, "Content-Type", "text/plain; charset=\"utf-8\"");
        out.push_str("\r\n");
        out.push_str(body);
    } else {
        let boundary = make_boundary();
        append_header(
            &mut out,
            "Content-Type",
            &format!("multipart/mixed; boundary=\"{boundary}\""),
        );
        out.push_str("\r\n");

        // Body part first
        out.push_str(&format!("--{boundary}\r\n"));
        append_header(&mut out, "Content-Type", "text/plain; charset=\"utf-8\"");
        out.push_str("\r\n");
        out.push_str(body);
        out.push_str("\r\n");

        for att in &options.attachments {
            out.push_str(&format!("--{boundary}\r\n"));
            append_header(
                &mut out,
                "Content-Type",
                &format!("{}; name=\"{}\"", att.mime_type, att.filename),
            );
            append_header(&mut out, "Content-Transfer-Encoding", "base64");
            append_header(
                &mut out,
                "Content-Disposition",
                &format!("attachment; filename=\"{}\"", att.filename),
            );
            out.push_str("\r\n");
            out.push_str(&BASE64_STANDARD.encode(&att.data));
            out.push_str("\r\n");
        }
        out.push_str(&format!("--{boundary}--\r\n"));
    }

    BASE64_URL_SAFE_NO_PAD.encode(out.as_bytes())
}

fn append_header(out: &mut String, name: &str, value: &str) {
    out.push_str(name);
    out.push_str(": ");
    out.push_str(value);
    out.push_str("\r\n");
}

fn make_boundary() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    format!("_bound_{}_{}", std::process::id(), nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mime::parse_raw_message;

    #[test]
    fn test_build_plain_message_roundtrips() {
        let raw = build_raw_message(
            "to@example.com",
            "Hello",
            "Body text here",
            "from@example.com",
            &BuildOptions::default(),
        );
        let parsed = parse_raw_message(&raw).unwrap();
        assert_eq!(parsed.header("From"), Some("from@example.com"));
        assert_eq!(parsed.header("To"), Some("to@example.com"));
        assert_eq!(parsed.header("Subject"), Some("Hello"));
        assert_eq!(parsed.body_text, "Body text here");
        assert!(parsed.parts.is_empty());
    }

    #[test]
    fn test_build_with_attachment_roundtrips() {
        let options = BuildOptions {
            attachments: vec![AttachmentSource {
                filename: "notes.txt".to_string(),
                mime_type: "text/plain".to_string(),
                data: b"attached content".to_vec(),
            }],
            ..BuildOptions::default()
        };
        let raw = build_raw_message(
            "to@example.com",
            "With file",
            "See attached",
            "from@example.com",
            &options,
        );
        let parsed = parse_raw_message(&raw).unwrap();
        assert_eq!(parsed.body_text, "See attached");
        assert_eq!(parsed.parts.len(), 2);

        let att = parsed
            .parts
            .iter()
            .find_map(|p| match p {
                crate::mime::ParsedPart::Attachment(a) => Some(a),
                _ => None,
            })
            .expect("attachment part");
        assert_eq!(att.filename, "notes.txt");
        assert_eq!(att.size, "attached content".len() as u64);
    }

    #[test]
    fn test_build_includes_cc_and_bcc() {
        let options = BuildOptions {
            cc: Some("cc@example.com".to_string()),
            bcc: Some("bcc@example.com".to_string()),
            ..BuildOptions::default()
        };
        let raw = build_raw_message("to@a.com", "s", "b", "f@a.com", &options);
        let parsed = parse_raw_message(&raw).unwrap();
        assert_eq!(parsed.header("Cc"), Some("cc@example.com"));
        assert_eq!(parsed.header("Bcc"), Some("bcc@example.com"));
    }
}
