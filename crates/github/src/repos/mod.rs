//! Endpoint functions for repositories, branches and file contents

pub mod branches;
pub mod files;
pub mod repositories;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};
use crate::models::limits;

pub(crate) static NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(limits::NAME_PATTERN).unwrap());
pub(crate) static BRANCH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(limits::BRANCH_NAME_PATTERN).unwrap());
pub(crate) static SHA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(limits::SHA_PATTERN).unwrap());

/// Reject empty or whitespace-only required string arguments
pub(crate) fn require(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::validation(format!("{name} must be provided.")));
    }
    if value.trim().is_empty() {
        return Err(Error::validation(format!(
            "{name} cannot have only whitespace characters."
        )));
    }
    Ok(())
}

/// Reject values containing whitespace
pub(crate) fn no_whitespace(name: &str, value: &str) -> Result<()> {
    if value.contains(' ') {
        return Err(Error::validation(format!(
            "{name} cannot contain whitespace characters."
        )));
    }
    Ok(())
}

/// Owner/repository name validation: presence, length, character set
pub(crate) fn validate_name(label: &str, value: &str, max_len: usize) -> Result<()> {
    require(label, value)?;
    if value.len() > max_len {
        return Err(Error::validation(format!(
            "{label} is too long (maximum {max_len} characters)."
        )));
    }
    if !NAME_RE.is_match(value) {
        return Err(Error::validation(format!(
            "{label} contains invalid characters. Only alphanumeric characters, dots, \
             hyphens, and underscores are allowed."
        )));
    }
    Ok(())
}

/// Branch name validation when a branch argument is present
pub(crate) fn validate_branch_name(value: &str) -> Result<()> {
    if value.len() > limits::MAX_BRANCH_LENGTH {
        return Err(Error::validation(format!(
            "Branch name is too long (maximum {} characters).",
            limits::MAX_BRANCH_LENGTH
        )));
    }
    if !BRANCH_RE.is_match(value) {
        return Err(Error::validation("Branch name contains invalid characters."));
    }
    if value.starts_with(limits::BRANCH_NAME_INVALID_START_END)
        || value.ends_with(limits::BRANCH_NAME_INVALID_START_END)
    {
        return Err(Error::validation(format!(
            "Branch name cannot start or end with '{}'.",
            limits::BRANCH_NAME_INVALID_START_END
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require() {
        assert!(require("Owner", "octocat").is_ok());
        assert!(require("Owner", "").is_err());
        assert!(require("Owner", "   ").is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Repository name", "my-repo.v2", 100).is_ok());
        assert!(validate_name("Repository name", "bad name", 100).is_err());
        assert!(validate_name("Repository name", &"x".repeat(101), 100).is_err());
    }

    #[test]
    fn test_validate_branch_name() {
        assert!(validate_branch_name("feature/login").is_ok());
        assert!(validate_branch_name("-leading").is_err());
        assert!(validate_branch_name("trailing-").is_err());
        assert!(validate_branch_name("spaces here").is_err());
    }
}
