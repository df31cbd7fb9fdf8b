//! Commit records and their nested structures

use serde::{Deserialize, Serialize};

use super::UserRef;

/// Reference to a commit by SHA
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRef {
    pub sha: String,
}

impl CommitRef {
    pub fn new(sha: impl Into<String>) -> Self {
        Self { sha: sha.into() }
    }
}

/// Reference to a tree by SHA
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeRef {
    pub sha: String,
}

/// Name/email/date triple for commit authorship
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitActor {
    pub name: String,
    pub email: String,
    pub date: String,
}

/// The nested `commit` object of a commit resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitDetail {
    pub author: GitActor,
    pub committer: GitActor,
    pub message: String,
    pub tree: TreeRef,
    pub comment_count: u32,
}

/// Per-file change entry of a commit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitFile {
    pub sha: String,
    pub filename: String,
    pub status: String,
    pub additions: u64,
    pub deletions: u64,
    pub changes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
}

/// Aggregate change statistics of a commit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommitStats {
    pub total: u64,
    pub additions: u64,
    pub deletions: u64,
}

/// A commit in the Commits table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    pub id: i64,
    pub sha: String,
    pub node_id: String,
    pub repository_id: i64,
    pub commit: CommitDetail,
    pub author: Option<UserRef>,
    pub committer: Option<UserRef>,
    pub parents: Vec<CommitRef>,
    pub stats: CommitStats,
    pub files: Vec<CommitFile>,
    pub created_at: String,
    pub updated_at: String,
}
