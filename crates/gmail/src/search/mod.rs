//! Search query evaluation
//!
//! Implements the Gmail-style query mini-language over an in-memory message
//! map: field operators (`from:`, `label:`, `is:unread`, ...), implicit AND,
//! `OR`, negation with `-`, parenthesised groups and `{ }` OR groups.

mod filters;
mod query;

pub use filters::{
    detect_attachment_types, detect_star_types, exact_word_match, infer_category, message_size,
    parse_date_flexible, parse_size, parse_time_period,
};
pub use query::{QueryEvaluator, QueryScope, tokenize};
