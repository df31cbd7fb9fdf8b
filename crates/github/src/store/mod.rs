//! In-memory GitHub store
//!
//! Tables are vectors of records with auto-increment integer ids, the way
//! the backend it simulates keeps lists of dicts; file contents live in a
//! map keyed by `(repository_id, commit_sha, path)` where the empty path
//! holds the root directory listing. RwLocks make the store shareable by
//! reference; there are no durability or isolation guarantees.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::git::iso_now;
use crate::models::{Branch, Commit, ContentEntry, Repository, Tag, User, UserRef};

/// Key into the file contents map
pub type FileKey = (i64, String, String);

/// A code search index row, refreshed on every file write
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeSearchItem {
    pub name: String,
    pub path: String,
    pub sha: String,
    pub repository: SearchRepoRef,
    pub score: f64,
}

/// Repository sub-document of a search index row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRepoRef {
    pub id: i64,
    pub name: String,
    pub full_name: String,
    pub owner: UserRef,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Counters {
    user: i64,
    repository: i64,
    commit: i64,
}

/// Serialized form of the whole store, used by the fixture helpers
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    users: Vec<User>,
    repositories: Vec<Repository>,
    branches: Vec<Branch>,
    tags: Vec<Tag>,
    commits: Vec<Commit>,
    file_contents: Vec<(FileKey, ContentEntry)>,
    code_search: Vec<CodeSearchItem>,
    current_user: Option<i64>,
    counters: Counters,
}

/// The shared in-memory GitHub store
pub struct GitHubStore {
    users: RwLock<Vec<User>>,
    repositories: RwLock<Vec<Repository>>,
    branches: RwLock<Vec<Branch>>,
    tags: RwLock<Vec<Tag>>,
    commits: RwLock<Vec<Commit>>,
    file_contents: RwLock<HashMap<FileKey, ContentEntry>>,
    code_search: RwLock<Vec<CodeSearchItem>>,
    current_user: RwLock<Option<i64>>,
    counters: RwLock<Counters>,
}

impl GitHubStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            users: RwLock::new(Vec::new()),
            repositories: RwLock::new(Vec::new()),
            branches: RwLock::new(Vec::new()),
            tags: RwLock::new(Vec::new()),
            commits: RwLock::new(Vec::new()),
            file_contents: RwLock::new(HashMap::new()),
            code_search: RwLock::new(Vec::new()),
            current_user: RwLock::new(None),
            counters: RwLock::new(Counters::default()),
        }
    }

    /// Drop all state
    pub fn reset(&self) {
        self.users.write().unwrap().clear();
        self.repositories.write().unwrap().clear();
        self.branches.write().unwrap().clear();
        self.tags.write().unwrap().clear();
        self.commits.write().unwrap().clear();
        self.file_contents.write().unwrap().clear();
        self.code_search.write().unwrap().clear();
        *self.current_user.write().unwrap() = None;
        *self.counters.write().unwrap() = Counters::default();
    }

    // Table guards for the endpoint modules

    pub(crate) fn users(&self) -> RwLockReadGuard<'_, Vec<User>> {
        self.users.read().unwrap()
    }

    pub(crate) fn repositories(&self) -> RwLockReadGuard<'_, Vec<Repository>> {
        self.repositories.read().unwrap()
    }

    pub(crate) fn repositories_mut(&self) -> RwLockWriteGuard<'_, Vec<Repository>> {
        self.repositories.write().unwrap()
    }

    pub(crate) fn branches(&self) -> RwLockReadGuard<'_, Vec<Branch>> {
        self.branches.read().unwrap()
    }

    pub(crate) fn branches_mut(&self) -> RwLockWriteGuard<'_, Vec<Branch>> {
        self.branches.write().unwrap()
    }

    pub(crate) fn tags(&self) -> RwLockReadGuard<'_, Vec<Tag>> {
        self.tags.read().unwrap()
    }

    pub(crate) fn commits(&self) -> RwLockReadGuard<'_, Vec<Commit>> {
        self.commits.read().unwrap()
    }

    pub(crate) fn commits_mut(&self) -> RwLockWriteGuard<'_, Vec<Commit>> {
        self.commits.write().unwrap()
    }

    pub(crate) fn file_contents(&self) -> RwLockReadGuard<'_, HashMap<FileKey, ContentEntry>> {
        self.file_contents.read().unwrap()
    }

    pub(crate) fn file_contents_mut(
        &self,
    ) -> RwLockWriteGuard<'_, HashMap<FileKey, ContentEntry>> {
        self.file_contents.write().unwrap()
    }

    pub(crate) fn code_search_mut(&self) -> RwLockWriteGuard<'_, Vec<CodeSearchItem>> {
        self.code_search.write().unwrap()
    }

    /// Register a user; the first user becomes the authenticated one
    pub fn add_user(
        &self,
        login: &str,
        name: Option<&str>,
        email: Option<&str>,
        site_admin: bool,
    ) -> User {
        let id = {
            let mut counters = self.counters.write().unwrap();
            counters.user += 1;
            counters.user
        };
        let now = iso_now();
        let user = User {
            id,
            login: login.to_string(),
            name: name.map(str::to_string),
            email: email.map(str::to_string),
            site_admin,
            created_at: now.clone(),
            updated_at: now,
        };
        self.users.write().unwrap().push(user.clone());

        let mut current = self.current_user.write().unwrap();
        if current.is_none() {
            *current = Some(id);
        }
        user
    }

    /// Designate the authenticated user
    pub fn set_current_user(&self, user_id: i64) -> Result<User> {
        let user = self
            .find_user_by_id(user_id)
            .ok_or_else(|| Error::not_found(format!("User with id {user_id} not found.")))?;
        *self.current_user.write().unwrap() = Some(user_id);
        Ok(user)
    }

    /// The authenticated user, if any
    pub fn current_user(&self) -> Option<User> {
        let id = (*self.current_user.read().unwrap())?;
        self.find_user_by_id(id)
    }

    pub fn find_user_by_id(&self, id: i64) -> Option<User> {
        self.users().iter().find(|u| u.id == id).cloned()
    }

    pub fn find_user_by_login(&self, login: &str) -> Option<User> {
        self.users().iter().find(|u| u.login == login).cloned()
    }

    /// Look up a repository by `owner/name`
    pub fn find_repository(&self, full_name: &str) -> Option<Repository> {
        self.repositories()
            .iter()
            .find(|r| r.full_name == full_name)
            .cloned()
    }

    pub(crate) fn next_repository_id(&self) -> i64 {
        let mut counters = self.counters.write().unwrap();
        counters.repository += 1;
        counters.repository
    }

    pub(crate) fn next_commit_id(&self) -> i64 {
        let mut counters = self.counters.write().unwrap();
        counters.commit += 1;
        counters.commit
    }

    /// Bump a repository's `updated_at` (and optionally `pushed_at`)
    pub(crate) fn touch_repository(&self, repo_id: i64, pushed_at: Option<&str>) {
        let mut repositories = self.repositories_mut();
        if let Some(repo) = repositories.iter_mut().find(|r| r.id == repo_id) {
            repo.updated_at = iso_now();
            if let Some(pushed) = pushed_at {
                repo.pushed_at = pushed.to_string();
            }
        }
    }

    /// Serialize the full store state
    pub fn snapshot(&self) -> serde_json::Value {
        let snapshot = Snapshot {
            users: self.users().clone(),
            repositories: self.repositories().clone(),
            branches: self.branches().clone(),
            tags: self.tags().clone(),
            commits: self.commits().clone(),
            file_contents: self
                .file_contents()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            code_search: self.code_search.read().unwrap().clone(),
            current_user: *self.current_user.read().unwrap(),
            counters: self.counters.read().unwrap().clone(),
        };
        serde_json::to_value(snapshot).expect("store state is always serializable")
    }

    /// Replace the store state from a snapshot value
    pub fn load_snapshot(&self, value: serde_json::Value) -> Result<()> {
        let snapshot: Snapshot = serde_json::from_value(value)
            .map_err(|e| Error::validation(format!("invalid snapshot: {e}")))?;
        *self.users.write().unwrap() = snapshot.users;
        *self.repositories.write().unwrap() = snapshot.repositories;
        *self.branches.write().unwrap() = snapshot.branches;
        *self.tags.write().unwrap() = snapshot.tags;
        *self.commits.write().unwrap() = snapshot.commits;
        *self.file_contents.write().unwrap() = snapshot.file_contents.into_iter().collect();
        *self.code_search.write().unwrap() = snapshot.code_search;
        *self.current_user.write().unwrap() = snapshot.current_user;
        *self.counters.write().unwrap() = snapshot.counters;
        Ok(())
    }

    /// Write the store state to a JSON fixture file
    pub fn snapshot_to_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        std::fs::write(path.as_ref(), json)
            .with_context(|| format!("failed to write snapshot to {}", path.as_ref().display()))
    }

    /// Load the store state from a JSON fixture file
    pub fn load_snapshot_from_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let data = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("failed to read snapshot from {}", path.as_ref().display()))?;
        let value: serde_json::Value = serde_json::from_str(&data)?;
        self.load_snapshot(value)?;
        Ok(())
    }
}

impl Default for GitHubStore {
    fn default() -> Self {
        Self::new()
    }
}
