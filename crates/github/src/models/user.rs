//! User records and the sub-document embedded in other resources

use serde::{Deserialize, Serialize};

/// A user in the Users table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub login: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub site_admin: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    /// Display name for commit authorship, falling back to the login
    pub fn author_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.login.clone())
    }

    /// Email for commit authorship, falling back to a noreply address
    pub fn author_email(&self) -> String {
        self.email
            .clone()
            .unwrap_or_else(|| noreply_email(&self.login))
    }
}

/// Synthesized noreply address for users without a stored email
pub fn noreply_email(login: &str) -> String {
    let compact: String = login
        .to_lowercase()
        .chars()
        .filter(|c| *c != ' ' && *c != '.')
        .collect();
    format!("{compact}@users.noreply.github.com")
}

/// Minimal user sub-document used inside commits and repository owners
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRef {
    pub login: String,
    pub id: i64,
}
