//! Predicate helpers for query terms: sizes, dates, attachment and star
//! detection, category inference

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::RegexBuilder;

use crate::models::Message;

/// Whole-word match with word boundaries, case-insensitive
pub fn exact_word_match(keyword: &str, text: &str) -> bool {
    if keyword.is_empty() || text.is_empty() {
        return false;
    }
    let pattern = format!(r"\b{}\b", regex::escape(keyword));
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .map(|re| re.is_match(text))
        .unwrap_or(false)
}

/// Approximate message size: header fields plus body plus attachment parts.
///
/// Attachment sizes come from the part's recorded size, or are estimated
/// from the base64 data length.
pub fn message_size(message: &Message) -> u64 {
    let mut size = (message.subject.len()
        + message.body.len()
        + message.sender.len()
        + message.recipient.len()) as u64;

    if let Some(payload) = &message.payload
        && let Some(parts) = &payload.parts
    {
        for part in parts {
            if let Some(part_size) = part.body.size {
                size += part_size;
            } else if let Some(data) = &part.body.data {
                size += (data.len() * 3 / 4) as u64;
            }
        }
    }
    size
}

/// Classify the attachments of a message into search categories
pub fn detect_attachment_types(message: &Message) -> HashSet<&'static str> {
    let mut types = HashSet::new();
    let Some(payload) = &message.payload else {
        return types;
    };
    let Some(parts) = &payload.parts else {
        return types;
    };

    for part in parts {
        let mime = part.mime_type.to_lowercase();
        let filename = part.filename.as_deref().unwrap_or("").to_lowercase();

        if mime.contains("youtube") || filename.contains("youtube") {
            types.insert("youtube");
        } else if mime.contains("spreadsheetml")
            || mime.contains("vnd.google-apps.spreadsheet")
            || has_extension(&filename, &[".xls", ".xlsx", ".csv"])
        {
            types.insert("spreadsheet");
        } else if mime.contains("presentationml")
            || mime.contains("vnd.google-apps.presentation")
            || has_extension(&filename, &[".ppt", ".pptx"])
        {
            types.insert("presentation");
        } else if mime.contains("wordprocessingml")
            || mime.contains("vnd.google-apps.document")
            || (mime.contains("document")
                && !mime.contains("spreadsheet")
                && !mime.contains("presentation"))
            || has_extension(&filename, &[".doc", ".docx"])
        {
            types.insert("document");
        } else if mime.contains("drive")
            || filename.contains("google")
            || mime.contains("vnd.google-apps.file")
        {
            types.insert("drive");
        } else if mime.contains("pdf") || filename.ends_with(".pdf") {
            types.insert("pdf");
        } else if mime.contains("image")
            || has_extension(&filename, &[".jpg", ".jpeg", ".png", ".gif"])
        {
            types.insert("image");
        } else if mime.contains("video") || has_extension(&filename, &[".mp4", ".avi", ".mov"]) {
            types.insert("video");
        } else if mime.contains("audio") || has_extension(&filename, &[".mp3", ".wav", ".m4a"]) {
            types.insert("audio");
        }
    }
    types
}

fn has_extension(filename: &str, extensions: &[&str]) -> bool {
    extensions.iter().any(|ext| filename.ends_with(ext))
}

/// Star and marker types implied by label naming conventions
pub fn detect_star_types(label_ids: &[String]) -> HashSet<String> {
    let mut types = HashSet::new();
    for label in label_ids {
        let lower = label.to_lowercase();
        if lower.contains("star") {
            let colored = [
                ("yellow", "yellow-star"),
                ("orange", "orange-star"),
                ("red", "red-star"),
                ("purple", "purple-star"),
                ("blue", "blue-star"),
                ("green", "green-star"),
            ]
            .iter()
            .find(|(color, _)| {
                lower.contains(&format!("{color}_star")) || lower.contains(&format!("{color} star"))
            });
            match colored {
                Some((_, name)) => {
                    types.insert((*name).to_string());
                }
                // Generic star, including the STARRED system label
                None => {
                    types.insert("star".to_string());
                }
            }
        } else if lower.contains("bang") {
            if lower.contains("red_bang") || lower.contains("red bang") {
                types.insert("red-bang".to_string());
            } else if lower.contains("yellow_bang") || lower.contains("yellow bang") {
                types.insert("yellow-bang".to_string());
            }
        } else if (lower.contains("guillemet") && lower.contains("orange"))
            || lower.contains("orange_guillemet")
        {
            types.insert("orange-guillemet".to_string());
        } else if (lower.contains("check") && lower.contains("green"))
            || lower.contains("green_check")
        {
            types.insert("green-check".to_string());
        } else if (lower.contains("info") && lower.contains("blue")) || lower.contains("blue_info")
        {
            types.insert("blue-info".to_string());
        } else if (lower.contains("question") && lower.contains("purple"))
            || lower.contains("purple_question")
        {
            types.insert("purple-question".to_string());
        }
    }
    types
}

/// Inbox category implied by label naming conventions
pub fn infer_category(label_ids: &[String]) -> Option<&'static str> {
    for label in label_ids {
        let lower = label.to_lowercase();
        if lower.contains("social") {
            return Some("social");
        } else if lower.contains("promotion") {
            return Some("promotions");
        } else if lower.contains("update") {
            return Some("updates");
        } else if lower.contains("forum") {
            return Some("forums");
        } else if lower.contains("reservation") {
            return Some("reservations");
        } else if lower.contains("purchase") || lower.contains("shopping") {
            return Some("purchases");
        } else if lower.contains("primary") || lower.contains("inbox") {
            return Some("primary");
        }
    }
    None
}

/// Parse a date in any of the accepted formats, returning epoch seconds.
///
/// Accepts slash/dash/dot orderings, datetime variants, ISO-8601, and the
/// relative phrases "today", "yesterday", "last week|month|year". Falls
/// back to `now` when nothing matches, as the simulated backend does.
pub fn parse_date_flexible(input: &str, now: DateTime<Utc>) -> f64 {
    let input = input.trim();

    const DATE_FORMATS: &[&str] = &[
        "%Y/%m/%d", "%m/%d/%Y", "%Y-%m-%d", "%m-%d-%Y", "%d/%m/%Y", "%d-%m-%Y", "%Y.%m.%d",
        "%d.%m.%Y",
    ];
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(input, fmt)
            && let Some(dt) = date.and_hms_opt(0, 0, 0)
        {
            return Utc.from_utc_datetime(&dt).timestamp() as f64;
        }
    }

    const DATETIME_FORMATS: &[&str] = &[
        "%Y/%m/%d %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%SZ",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(input, fmt) {
            return Utc.from_utc_datetime(&dt).timestamp() as f64;
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&input.replace('Z', "+00:00")) {
        return dt.timestamp() as f64;
    }

    let days_ago = match input.to_lowercase().as_str() {
        "today" => Some(0),
        "yesterday" => Some(1),
        "last week" => Some(7),
        "last month" => Some(30),
        "last year" => Some(365),
        _ => None,
    };
    if let Some(days) = days_ago {
        return (now.timestamp() - days * 24 * 60 * 60) as f64;
    }

    now.timestamp() as f64
}

/// Parse a time period like `1d`, `2m`, `1y` into days
pub fn parse_time_period(input: &str) -> Option<i64> {
    let input = input.trim().to_lowercase();
    if let Some(n) = input.strip_suffix('d') {
        n.parse().ok()
    } else if let Some(n) = input.strip_suffix('m') {
        n.parse::<i64>().ok().map(|v| v * 30)
    } else if let Some(n) = input.strip_suffix('y') {
        n.parse::<i64>().ok().map(|v| v * 365)
    } else {
        input.parse().ok()
    }
}

/// Parse a size like `10M`, `1G`, `1000` into bytes
pub fn parse_size(input: &str) -> Option<u64> {
    let input = input.trim().to_uppercase();
    if let Some(n) = input.strip_suffix('K') {
        n.parse::<u64>().ok().map(|v| v * 1024)
    } else if let Some(n) = input.strip_suffix('M') {
        n.parse::<u64>().ok().map(|v| v * 1024 * 1024)
    } else if let Some(n) = input.strip_suffix('G') {
        n.parse::<u64>().ok().map(|v| v * 1024 * 1024 * 1024)
    } else {
        input.parse().ok()
    }
}

/// Gmail internalDate (epoch milliseconds string) as epoch seconds
pub fn internal_date_secs(message: &Message) -> f64 {
    message.internal_date.parse::<f64>().unwrap_or(0.0) / 1000.0
}
