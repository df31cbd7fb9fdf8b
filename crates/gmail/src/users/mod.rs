//! Endpoint functions, one module per resource
//!
//! Each function mimics one Gmail API operation: validate the arguments,
//! mutate the store, return the response resource. The special user value
//! `me` always refers to the seeded mailbox.

pub mod drafts;
pub mod labels;
pub mod messages;
pub mod threads;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

static USER_EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.+-]+@[A-Za-z0-9-]+\.[A-Za-z0-9-.]+$").unwrap());

/// Reject empty, whitespace-only or space-containing user ids
pub(crate) fn validate_user_id(user_id: &str) -> Result<()> {
    if user_id.is_empty() {
        return Err(Error::validation("userId cannot be empty"));
    }
    if user_id.trim().is_empty() {
        return Err(Error::validation("userId cannot have only whitespace"));
    }
    if user_id.contains(' ') {
        return Err(Error::validation("userId cannot have whitespace"));
    }
    Ok(())
}

/// Mutating operations additionally require `me` or a plausible address
pub(crate) fn validate_user_email(user_id: &str) -> Result<()> {
    if user_id != "me" && !USER_EMAIL_RE.is_match(user_id) {
        return Err(Error::validation("userId must be a valid email address"));
    }
    Ok(())
}

/// Resource ids may not contain whitespace
pub(crate) fn validate_id(name: &str, id: &str) -> Result<()> {
    if id.contains(' ') {
        return Err(Error::validation(format!("{name} cannot have whitespace")));
    }
    Ok(())
}

/// A query must be empty or contain something other than whitespace
pub(crate) fn validate_query(q: &str) -> Result<()> {
    if !q.is_empty() && q.trim().is_empty() {
        return Err(Error::validation("q cannot be a string with only whitespace"));
    }
    Ok(())
}

/// maxResults must be in 1..=500
pub(crate) fn validate_max_results(max_results: u32) -> Result<()> {
    if max_results == 0 {
        return Err(Error::validation("max_results must be a positive integer"));
    }
    if max_results > 500 {
        return Err(Error::validation(
            "max_results must be less than or equal to 500",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_user_id() {
        assert!(validate_user_id("me").is_ok());
        assert!(validate_user_id("").is_err());
        assert!(validate_user_id("   ").is_err());
        assert!(validate_user_id("a b").is_err());
    }

    #[test]
    fn test_validate_user_email() {
        assert!(validate_user_email("me").is_ok());
        assert!(validate_user_email("user@example.com").is_ok());
        assert!(validate_user_email("not-an-address").is_err());
    }

    #[test]
    fn test_validate_max_results() {
        assert!(validate_max_results(1).is_ok());
        assert!(validate_max_results(500).is_ok());
        assert!(validate_max_results(0).is_err());
        assert!(validate_max_results(501).is_err());
    }
}
