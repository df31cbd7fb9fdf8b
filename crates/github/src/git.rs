//! Git-style object hashing and timestamps
//!
//! SHAs follow Git's shapes closely enough to be stable and collision-free
//! within a simulation: blob SHAs use the real `blob {len}\0` header, tree
//! and commit SHAs hash a simplified rendition of the object text.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sha1::{Digest, Sha1};

use crate::models::GitActor;

/// ISO-8601 timestamp with a trailing Z, seconds precision
pub fn iso_now() -> String {
    format_iso(Utc::now())
}

pub fn format_iso(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn sha1_hex(data: &[u8]) -> String {
    format!("{:x}", Sha1::digest(data))
}

/// Git blob SHA: `sha1("blob {len}\0" + content)`
pub fn blob_sha(content: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(format!("blob {}\0", content.len()).as_bytes());
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// One line of the simplified tree text
pub fn tree_entry(path: &str, blob_sha: &str) -> String {
    format!("100644 blob {blob_sha}\t{path}\n")
}

/// Tree SHA over path-sorted `path -> blob sha` entries
pub fn tree_sha(entries: &BTreeMap<String, String>) -> String {
    let mut text = String::new();
    for (path, blob) in entries {
        text.push_str(&tree_entry(path, blob));
    }
    sha1_hex(text.as_bytes())
}

/// Commit SHA over a git-like commit text
pub fn commit_sha(
    tree_sha: &str,
    parent_sha: Option<&str>,
    author: &GitActor,
    author_epoch: i64,
    committer: &GitActor,
    committer_epoch: i64,
    message: &str,
) -> String {
    let mut parts = vec![format!("tree {tree_sha}")];
    if let Some(parent) = parent_sha {
        parts.push(format!("parent {parent}"));
    }
    parts.push(format!(
        "author {} <{}> {} +0000",
        author.name, author.email, author_epoch
    ));
    parts.push(format!(
        "committer {} <{}> {} +0000",
        committer.name, committer.email, committer_epoch
    ));
    parts.push(format!("\n{message}"));
    sha1_hex(parts.join("\n").as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_sha_matches_git() {
        // Matches `git hash-object` for the same content
        assert_eq!(
            blob_sha(b"hello\n"),
            "ce013625030ba8dba906f756967f9e9ca394464a"
        );
        assert_eq!(blob_sha(b""), "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391");
    }

    #[test]
    fn test_tree_sha_is_order_independent() {
        let mut a = BTreeMap::new();
        a.insert("b.txt".to_string(), "beef".to_string());
        a.insert("a.txt".to_string(), "dead".to_string());

        let mut b = BTreeMap::new();
        b.insert("a.txt".to_string(), "dead".to_string());
        b.insert("b.txt".to_string(), "beef".to_string());

        assert_eq!(tree_sha(&a), tree_sha(&b));
    }

    #[test]
    fn test_commit_sha_changes_with_message() {
        let actor = GitActor {
            name: "Dev".to_string(),
            email: "dev@example.com".to_string(),
            date: "2024-01-01T00:00:00Z".to_string(),
        };
        let a = commit_sha("t", None, &actor, 0, &actor, 0, "one");
        let b = commit_sha("t", None, &actor, 0, &actor, 0, "two");
        assert_ne!(a, b);
        assert_eq!(a.len(), 40);
    }
}
