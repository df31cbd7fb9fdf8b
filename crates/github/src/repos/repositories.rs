//! Repository creation

use base64::prelude::*;
use log::debug;

use super::validate_name;
use crate::error::{Error, Result};
use crate::git::{self, iso_now};
use crate::models::{
    Branch, Commit, CommitDetail, CommitFile, CommitRef, CommitStats, ContentEntry, DirEntry,
    Encoding, FileContent, GitActor, Repository, TreeRef, UserRef, limits,
};
use crate::store::GitHubStore;

/// Creates a repository owned by the authenticated user.
///
/// `auto_init` seeds an initial commit containing a README so that file
/// operations have a branch head to build on.
pub fn create_repository(
    store: &GitHubStore,
    name: &str,
    description: Option<&str>,
    private: bool,
    auto_init: bool,
) -> Result<Repository> {
    validate_name("Repository name", name, limits::MAX_REPO_LENGTH)?;

    let owner = store
        .current_user()
        .ok_or_else(|| Error::not_found("No authenticated user is configured."))?;

    let full_name = format!("{}/{}", owner.login, name);
    if store.find_repository(&full_name).is_some() {
        return Err(Error::conflict(format!(
            "Repository '{full_name}' already exists."
        )));
    }

    let now = iso_now();
    let repo_id = store.next_repository_id();
    let mut repo = Repository::new(
        repo_id,
        name,
        UserRef {
            login: owner.login.clone(),
            id: owner.id,
        },
        private,
        &now,
    );
    repo.description = description.map(str::to_string);

    if auto_init {
        let readme = format!("# {name}\n");
        let readme_bytes = readme.as_bytes();
        let blob = git::blob_sha(readme_bytes);

        let mut tree = std::collections::BTreeMap::new();
        tree.insert("README.md".to_string(), blob.clone());
        let tree_sha = git::tree_sha(&tree);

        let actor = GitActor {
            name: owner.author_name(),
            email: owner.author_email(),
            date: now.clone(),
        };
        let epoch = chrono::Utc::now().timestamp();
        let commit_sha = git::commit_sha(
            &tree_sha,
            None,
            &actor,
            epoch,
            &actor,
            epoch,
            "Initial commit",
        );

        let commit = Commit {
            id: store.next_commit_id(),
            sha: commit_sha.clone(),
            node_id: format!("C_NODE_{commit_sha}"),
            repository_id: repo_id,
            commit: CommitDetail {
                author: actor.clone(),
                committer: actor,
                message: "Initial commit".to_string(),
                tree: TreeRef { sha: tree_sha },
                comment_count: 0,
            },
            author: Some(UserRef {
                login: owner.login.clone(),
                id: owner.id,
            }),
            committer: Some(UserRef {
                login: owner.login.clone(),
                id: owner.id,
            }),
            parents: Vec::new(),
            stats: CommitStats {
                total: 1,
                additions: 1,
                deletions: 0,
            },
            files: vec![CommitFile {
                sha: blob.clone(),
                filename: "README.md".to_string(),
                status: "added".to_string(),
                additions: 1,
                deletions: 0,
                changes: 1,
                patch: None,
            }],
            created_at: now.clone(),
            updated_at: now.clone(),
        };
        store.commits_mut().push(commit);

        let mut contents = store.file_contents_mut();
        contents.insert(
            (repo_id, commit_sha.clone(), "README.md".to_string()),
            ContentEntry::File(FileContent::file(
                "README.md",
                "README.md",
                BASE64_STANDARD.encode(readme_bytes),
                Encoding::Base64,
                readme_bytes.len() as u64,
                blob.clone(),
            )),
        );
        contents.insert(
            (repo_id, commit_sha.clone(), String::new()),
            ContentEntry::Dir(vec![DirEntry {
                entry_type: "file".to_string(),
                size: readme_bytes.len() as u64,
                name: "README.md".to_string(),
                path: "README.md".to_string(),
                sha: blob,
            }]),
        );
        drop(contents);

        store.branches_mut().push(Branch {
            name: "main".to_string(),
            commit: CommitRef::new(commit_sha),
            protected: false,
            repository_id: repo_id,
        });
        debug!("initialized {full_name} with an initial commit");
    }

    store.repositories_mut().push(repo.clone());
    Ok(repo)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_store() -> GitHubStore {
        let store = GitHubStore::new();
        store.add_user("octocat", Some("The Octocat"), Some("octo@example.com"), false);
        store
    }

    #[test]
    fn test_create_repository_defaults() {
        let store = seeded_store();
        let repo = create_repository(&store, "hello-world", Some("demo"), false, false).unwrap();
        assert_eq!(repo.full_name, "octocat/hello-world");
        assert_eq!(repo.default_branch.as_deref(), Some("main"));
        assert_eq!(repo.visibility, "public");
        assert!(repo.has_issues);
        assert!(!repo.archived);
        // No auto_init: no branch yet
        assert!(store.branches().is_empty());
    }

    #[test]
    fn test_create_repository_auto_init() {
        let store = seeded_store();
        let repo = create_repository(&store, "seeded", None, true, true).unwrap();
        assert_eq!(repo.visibility, "private");

        let branches = store.branches();
        assert_eq!(branches.len(), 1);
        assert_eq!(branches[0].name, "main");

        let commits = store.commits();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].commit.message, "Initial commit");

        let contents = store.file_contents();
        let head = &branches[0].commit.sha;
        assert!(contents.contains_key(&(repo.id, head.clone(), "README.md".to_string())));
        assert!(contents.contains_key(&(repo.id, head.clone(), String::new())));
    }

    #[test]
    fn test_create_repository_duplicate_name() {
        let store = seeded_store();
        create_repository(&store, "dup", None, false, false).unwrap();
        let err = create_repository(&store, "dup", None, false, false).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn test_create_repository_requires_user() {
        let store = GitHubStore::new();
        let err = create_repository(&store, "orphan", None, false, false).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_create_repository_rejects_bad_name() {
        let store = seeded_store();
        assert!(create_repository(&store, "bad name", None, false, false).is_err());
        assert!(create_repository(&store, "", None, false, false).is_err());
    }
}
