//! File and directory content entries

use serde::{Deserialize, Serialize};

/// How a file's `content` field is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Text,
    Base64,
}

/// A file as returned by the contents API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileContent {
    #[serde(rename = "type")]
    pub entry_type: String,
    pub encoding: Encoding,
    pub size: u64,
    pub name: String,
    pub path: String,
    pub content: String,
    pub sha: String,
}

impl FileContent {
    pub fn file(
        name: impl Into<String>,
        path: impl Into<String>,
        content: String,
        encoding: Encoding,
        size: u64,
        sha: impl Into<String>,
    ) -> Self {
        Self {
            entry_type: "file".to_string(),
            encoding,
            size,
            name: name.into(),
            path: path.into(),
            content,
            sha: sha.into(),
        }
    }
}

/// One row of a directory listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirEntry {
    #[serde(rename = "type")]
    pub entry_type: String,
    pub size: u64,
    pub name: String,
    pub path: String,
    pub sha: String,
}

impl DirEntry {
    pub fn file(name: impl Into<String>, path: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            entry_type: "file".to_string(),
            size: 0,
            name: name.into(),
            path: path.into(),
            sha: sha.into(),
        }
    }

    pub fn dir(name: impl Into<String>, path: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            entry_type: "dir".to_string(),
            size: 0,
            name: name.into(),
            path: path.into(),
            sha: sha.into(),
        }
    }
}

/// What lives under a `(repository, commit, path)` key: a file body, or a
/// directory listing (the empty path holds the root listing)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentEntry {
    File(FileContent),
    Dir(Vec<DirEntry>),
}
