//! Recursive-descent evaluator for Gmail search queries
//!
//! Grammar (loosest binding first): OR expressions, implicit/explicit AND,
//! primaries (terms, `( ... )` groups, `{ ... }` OR groups, `-` negation).
//! Evaluation returns the set of matching message ids.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use super::filters::{
    detect_attachment_types, detect_star_types, exact_word_match, infer_category,
    internal_date_secs, message_size, parse_date_flexible, parse_size, parse_time_period,
};
use crate::models::Message;

/// Which resource family the evaluator runs over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryScope {
    Messages,
    /// Draft scope additionally recognizes the `body:` operator
    Drafts,
}

/// Split a query into tokens: parentheses and braces stand alone, quoted
/// phrases stay intact (quotes are stripped)
pub fn tokenize(query: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in query.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '(' | ')' | '{' | '}' if !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                tokens.push(ch.to_string());
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Stateful evaluator over one user's message map
pub struct QueryEvaluator<'a> {
    tokens: Vec<String>,
    pos: usize,
    messages: &'a HashMap<String, Message>,
    scope: QueryScope,
    now: DateTime<Utc>,
}

impl<'a> QueryEvaluator<'a> {
    pub fn new(query: &str, messages: &'a HashMap<String, Message>, scope: QueryScope) -> Self {
        Self {
            tokens: tokenize(query),
            pos: 0,
            messages,
            scope,
            now: Utc::now(),
        }
    }

    /// Evaluate the whole query and return the matching message ids
    pub fn evaluate(&mut self) -> HashSet<String> {
        self.pos = 0;
        self.or_expression()
    }

    fn all_ids(&self) -> HashSet<String> {
        self.messages.keys().cloned().collect()
    }

    fn or_expression(&mut self) -> HashSet<String> {
        let mut result = self.and_expression();
        while self.pos < self.tokens.len() && self.tokens[self.pos].eq_ignore_ascii_case("OR") {
            self.pos += 1;
            let right = self.and_expression();
            result.extend(right);
        }
        result
    }

    fn and_expression(&mut self) -> HashSet<String> {
        let mut result = self.primary();
        while self.pos < self.tokens.len() {
            let token = &self.tokens[self.pos];
            if token == ")" || token == "}" || token.eq_ignore_ascii_case("OR") {
                break;
            }
            if token.eq_ignore_ascii_case("AND") {
                self.pos += 1;
            }
            let right = self.primary();
            result.retain(|id| right.contains(id));
        }
        result
    }

    fn primary(&mut self) -> HashSet<String> {
        if self.pos >= self.tokens.len() {
            return self.all_ids();
        }
        let token = self.tokens[self.pos].clone();

        // A standalone '-' negates a following group, otherwise it is a
        // neutral text hyphen
        if token == "-" {
            let next_opens_group = self
                .tokens
                .get(self.pos + 1)
                .is_some_and(|t| t == "(" || t == "{");
            self.pos += 1;
            if next_opens_group {
                let negated = self.primary();
                return self.complement(&negated);
            }
            return self.all_ids();
        }

        let (negated, term) = match token.strip_prefix('-') {
            Some(rest) if !rest.is_empty() => (true, rest.to_string()),
            _ => (false, token),
        };

        let result = match term.as_str() {
            "(" => {
                self.pos += 1;
                let inner = self.or_expression();
                if self.tokens.get(self.pos).map(String::as_str) == Some(")") {
                    self.pos += 1;
                }
                inner
            }
            "{" => {
                self.pos += 1;
                let inner = self.or_group();
                if self.tokens.get(self.pos).map(String::as_str) == Some("}") {
                    self.pos += 1;
                }
                inner
            }
            _ => {
                let matched = self.term(&term);
                self.pos += 1;
                matched
            }
        };

        if negated {
            self.complement(&result)
        } else {
            result
        }
    }

    /// OR semantics inside `{ ... }`
    fn or_group(&mut self) -> HashSet<String> {
        let mut result = HashSet::new();
        while self.pos < self.tokens.len() && self.tokens[self.pos] != "}" {
            let term = self.tokens[self.pos].clone();
            result.extend(self.term(&term));
            self.pos += 1;
        }
        result
    }

    fn complement(&self, set: &HashSet<String>) -> HashSet<String> {
        self.messages
            .keys()
            .filter(|id| !set.contains(*id))
            .cloned()
            .collect()
    }

    fn matching<F>(&self, predicate: F) -> HashSet<String>
    where
        F: Fn(&Message) -> bool,
    {
        self.messages
            .iter()
            .filter(|(_, m)| predicate(m))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Evaluate a single term (field operator or keyword)
    fn term(&self, term: &str) -> HashSet<String> {
        if let Some((key, value)) = term.split_once(':') {
            let value = value.trim_matches('"');
            return self.field_term(&key.to_lowercase(), value);
        }
        self.keyword_term(term)
    }

    fn field_term(&self, key: &str, value: &str) -> HashSet<String> {
        let value_lower = value.to_lowercase();
        match key {
            "from" => self.matching(|m| m.sender.to_lowercase() == value_lower),
            "to" => self.matching(|m| m.recipient.to_lowercase() == value_lower),
            "cc" => self.matching(|m| m.cc.to_lowercase().contains(&value_lower)),
            "bcc" => self.matching(|m| m.bcc.to_lowercase().contains(&value_lower)),
            "label" => {
                let upper = value.to_uppercase();
                self.matching(|m| m.labels_upper().contains(&upper))
            }
            "subject" => self.matching(|m| m.subject.to_lowercase().contains(&value_lower)),
            "body" if self.scope == QueryScope::Drafts => {
                self.matching(|m| m.body.to_lowercase().contains(&value_lower))
            }
            "filename" => self.matching(|m| {
                let Some(payload) = &m.payload else {
                    return false;
                };
                let Some(parts) = &payload.parts else {
                    return false;
                };
                parts.iter().any(|p| {
                    p.filename
                        .as_deref()
                        .is_some_and(|f| f.to_lowercase().contains(&value_lower))
                })
            }),
            "after" => {
                let target = parse_date_flexible(value, self.now);
                self.matching(|m| internal_date_secs(m) > target)
            }
            "before" => {
                let target = parse_date_flexible(value, self.now);
                self.matching(|m| internal_date_secs(m) < target)
            }
            "older_than" => match parse_time_period(value) {
                Some(days) => {
                    let cutoff = (self.now.timestamp() - days * 24 * 60 * 60) as f64;
                    self.matching(|m| internal_date_secs(m) < cutoff)
                }
                None => HashSet::new(),
            },
            "newer_than" => match parse_time_period(value) {
                Some(days) => {
                    let cutoff = (self.now.timestamp() - days * 24 * 60 * 60) as f64;
                    self.matching(|m| internal_date_secs(m) > cutoff)
                }
                None => HashSet::new(),
            },
            "size" => match value.parse::<u64>() {
                Ok(target) => self.matching(|m| message_size(m) == target),
                Err(_) => HashSet::new(),
            },
            "larger" => match parse_size(value) {
                Some(target) => self.matching(|m| message_size(m) > target),
                None => HashSet::new(),
            },
            "smaller" => match parse_size(value) {
                Some(target) => self.matching(|m| message_size(m) < target),
                None => HashSet::new(),
            },
            "is" => match value_lower.as_str() {
                "unread" => self.matching(|m| m.labels_upper().contains(&"UNREAD".to_string())),
                "read" => self.matching(|m| !m.labels_upper().contains(&"UNREAD".to_string())),
                "starred" => self.matching(|m| m.labels_upper().iter().any(|l| l.contains("STAR"))),
                "important" => {
                    self.matching(|m| m.labels_upper().contains(&"IMPORTANT".to_string()))
                }
                _ => HashSet::new(),
            },
            "category" => {
                const VALID: &[&str] = &[
                    "primary",
                    "social",
                    "promotions",
                    "updates",
                    "forums",
                    "reservations",
                    "purchases",
                ];
                if VALID.contains(&value_lower.as_str()) {
                    self.matching(|m| infer_category(&m.label_ids) == Some(value_lower.as_str()))
                } else {
                    HashSet::new()
                }
            }
            "list" => self.matching(|m| m.sender.to_lowercase().contains(&value_lower)),
            "deliveredto" => self.matching(|m| m.recipient.to_lowercase().contains(&value_lower)),
            "rfc822msgid" => self.matching(|m| m.id.contains(value)),
            "has" => self.has_term(value),
            "in" => match value_lower.as_str() {
                "anywhere" => self.all_ids(),
                // Snoozing is not represented in this store
                _ => HashSet::new(),
            },
            // Unrecognized operators do not constrain the result
            _ => self.all_ids(),
        }
    }

    fn has_term(&self, value: &str) -> HashSet<String> {
        const ATTACHMENT_TYPES: &[&str] = &[
            "youtube",
            "drive",
            "document",
            "spreadsheet",
            "presentation",
            "pdf",
            "image",
            "video",
            "audio",
        ];
        const MARKER_SUFFIXES: &[&str] =
            &["-star", "-bang", "-guillemet", "-check", "-info", "-question"];

        match value {
            "attachment" => self.matching(|m| {
                m.payload
                    .as_ref()
                    .and_then(|p| p.parts.as_ref())
                    .is_some_and(|parts| {
                        parts.iter().any(|p| p.filename.as_deref().is_some_and(|f| !f.is_empty()))
                    })
            }),
            "userlabels" => self.matching(|m| {
                m.label_ids
                    .iter()
                    .any(|l| !crate::models::is_system_label(l))
            }),
            "nouserlabels" => self.matching(|m| {
                m.label_ids
                    .iter()
                    .all(|l| crate::models::is_system_label(l))
            }),
            "star" => self.matching(|m| detect_star_types(&m.label_ids).contains("star")),
            v if ATTACHMENT_TYPES.contains(&v) => {
                self.matching(|m| detect_attachment_types(m).contains(v))
            }
            v if MARKER_SUFFIXES.iter().any(|s| v.ends_with(s)) => {
                self.matching(|m| detect_star_types(&m.label_ids).contains(v))
            }
            _ => HashSet::new(),
        }
    }

    fn keyword_term(&self, term: &str) -> HashSet<String> {
        let keyword = term.trim_matches('"');

        // `+term` requires a whole-word match
        if let Some(word) = keyword.strip_prefix('+') {
            return self.matching(|m| {
                exact_word_match(word, &m.subject)
                    || exact_word_match(word, &m.body)
                    || exact_word_match(word, &m.sender)
                    || exact_word_match(word, &m.recipient)
            });
        }

        let needle = keyword.to_lowercase();
        self.matching(|m| {
            m.subject.to_lowercase().contains(&needle)
                || m.body.to_lowercase().contains(&needle)
                || m.sender.to_lowercase().contains(&needle)
                || m.recipient.to_lowercase().contains(&needle)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_message(id: &str, sender: &str, subject: &str, body: &str, labels: &[&str]) -> Message {
        let mut msg = Message {
            id: id.to_string(),
            thread_id: format!("t-{id}"),
            sender: sender.to_string(),
            recipient: "me@gmail.com".to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            internal_date: "1700000000000".to_string(),
            label_ids: labels.iter().map(|s| s.to_string()).collect(),
            ..Message::default()
        };
        msg.sync_is_read();
        msg
    }

    fn fixture() -> HashMap<String, Message> {
        let mut messages = HashMap::new();
        for msg in [
            make_message(
                "m1",
                "bob@example.com",
                "Quarterly report",
                "numbers attached",
                &["INBOX", "UNREAD"],
            ),
            make_message(
                "m2",
                "alice@example.com",
                "Lunch plans",
                "pizza on friday",
                &["INBOX"],
            ),
            make_message(
                "m3",
                "bob@example.com",
                "Re: Lunch plans",
                "sounds good",
                &["INBOX", "STARRED"],
            ),
        ] {
            messages.insert(msg.id.clone(), msg);
        }
        messages
    }

    fn eval(query: &str, messages: &HashMap<String, Message>) -> HashSet<String> {
        QueryEvaluator::new(query, messages, QueryScope::Messages).evaluate()
    }

    fn ids(set: &HashSet<String>) -> Vec<&str> {
        let mut v: Vec<&str> = set.iter().map(String::as_str).collect();
        v.sort();
        v
    }

    #[test]
    fn test_tokenize_groups_and_quotes() {
        assert_eq!(
            tokenize(r#"from:bob (a OR b) "two words""#),
            vec!["from:bob", "(", "a", "OR", "b", ")", "two words"]
        );
    }

    #[test]
    fn test_from_exact_match() {
        let messages = fixture();
        assert_eq!(ids(&eval("from:bob@example.com", &messages)), vec!["m1", "m3"]);
        assert!(eval("from:bob", &messages).is_empty());
    }

    #[test]
    fn test_implicit_and() {
        let messages = fixture();
        assert_eq!(
            ids(&eval("from:bob@example.com subject:lunch", &messages)),
            vec!["m3"]
        );
    }

    #[test]
    fn test_or_operator() {
        let messages = fixture();
        assert_eq!(
            ids(&eval(
                "from:alice@example.com OR subject:report",
                &messages
            )),
            vec!["m1", "m2"]
        );
    }

    #[test]
    fn test_brace_or_group() {
        let messages = fixture();
        assert_eq!(
            ids(&eval(
                "{from:alice@example.com from:bob@example.com}",
                &messages
            )),
            vec!["m1", "m2", "m3"]
        );
    }

    #[test]
    fn test_negation() {
        let messages = fixture();
        assert_eq!(ids(&eval("-from:bob@example.com", &messages)), vec!["m2"]);
    }

    #[test]
    fn test_negated_group() {
        let messages = fixture();
        assert_eq!(
            ids(&eval("-( subject:lunch )", &messages)),
            vec!["m1"]
        );
    }

    #[test]
    fn test_is_unread_and_starred() {
        let messages = fixture();
        assert_eq!(ids(&eval("is:unread", &messages)), vec!["m1"]);
        assert_eq!(ids(&eval("is:read", &messages)), vec!["m2", "m3"]);
        assert_eq!(ids(&eval("is:starred", &messages)), vec!["m3"]);
    }

    #[test]
    fn test_label_operator_is_case_insensitive() {
        let messages = fixture();
        assert_eq!(ids(&eval("label:starred", &messages)), vec!["m3"]);
    }

    #[test]
    fn test_keyword_substring_search() {
        let messages = fixture();
        assert_eq!(ids(&eval("pizza", &messages)), vec!["m2"]);
        assert_eq!(ids(&eval("lunch", &messages)), vec!["m2", "m3"]);
    }

    #[test]
    fn test_quoted_phrase() {
        let messages = fixture();
        assert_eq!(ids(&eval("\"pizza on friday\"", &messages)), vec!["m2"]);
        assert!(eval("\"pizza friday\"", &messages).is_empty());
    }

    #[test]
    fn test_exact_word_operator() {
        let messages = fixture();
        // "report" appears as an exact word only in m1's subject
        assert_eq!(ids(&eval("+report", &messages)), vec!["m1"]);
        assert!(eval("+repo", &messages).is_empty());
    }

    #[test]
    fn test_unknown_operator_matches_all() {
        let messages = fixture();
        assert_eq!(eval("zzz:whatever", &messages).len(), 3);
    }

    #[test]
    fn test_empty_query_matches_all() {
        let messages = fixture();
        assert_eq!(eval("", &messages).len(), 3);
    }

    #[test]
    fn test_body_operator_only_in_draft_scope() {
        let messages = fixture();
        let in_drafts = QueryEvaluator::new("body:pizza", &messages, QueryScope::Drafts).evaluate();
        assert_eq!(ids(&in_drafts), vec!["m2"]);
        // Message scope treats body: as an unknown operator
        assert_eq!(eval("body:pizza", &messages).len(), 3);
    }
}
