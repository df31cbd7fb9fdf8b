//! Branch and tag records

use serde::{Deserialize, Serialize};

use super::CommitRef;

/// A branch in the Branches table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    pub commit: CommitRef,
    #[serde(default)]
    pub protected: bool,
    pub repository_id: i64,
}

/// A tag in the Tags table (ref resolution only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub commit: CommitRef,
    pub repository_id: i64,
}
