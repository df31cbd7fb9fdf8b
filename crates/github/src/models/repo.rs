//! Repository resource

use serde::{Deserialize, Serialize};

use super::UserRef;

/// A repository in the Repositories table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub id: i64,
    pub name: String,
    pub full_name: String,
    pub owner: UserRef,
    pub private: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub fork: bool,
    pub default_branch: Option<String>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub disabled: bool,
    pub visibility: String,
    pub has_issues: bool,
    pub has_projects: bool,
    pub has_downloads: bool,
    pub has_wiki: bool,
    pub has_pages: bool,
    pub allow_forking: bool,
    pub is_template: bool,
    pub web_commit_signoff_required: bool,
    pub created_at: String,
    pub updated_at: String,
    pub pushed_at: String,
}

impl Repository {
    /// Default feature flags for a newly created repository
    pub fn new(id: i64, name: &str, owner: UserRef, private: bool, now: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            full_name: format!("{}/{}", owner.login, name),
            owner,
            private,
            description: None,
            fork: false,
            default_branch: Some("main".to_string()),
            archived: false,
            disabled: false,
            visibility: if private { "private" } else { "public" }.to_string(),
            has_issues: true,
            has_projects: true,
            has_downloads: true,
            has_wiki: true,
            has_pages: false,
            allow_forking: true,
            is_template: false,
            web_commit_signoff_required: false,
            created_at: now.to_string(),
            updated_at: now.to_string(),
            pushed_at: now.to_string(),
        }
    }
}
