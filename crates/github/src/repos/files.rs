//! File content endpoints: create/update a single file, multi-file push,
//! and content reads

use std::collections::BTreeMap;

use base64::prelude::*;
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use super::{SHA_RE, no_whitespace, require, validate_branch_name, validate_name};
use crate::error::{Error, Result};
use crate::git::{self, format_iso};
use crate::models::{
    Commit, CommitDetail, CommitFile, CommitStats, ContentEntry, DirEntry, Encoding, FileContent,
    GitActor, TreeRef, UserRef, limits, noreply_email,
};
use crate::store::{CodeSearchItem, GitHubStore, SearchRepoRef};

/// `content` half of the create/update response
#[derive(Debug, Serialize)]
pub struct FileCommitContent {
    pub name: String,
    pub path: String,
    pub sha: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub entry_type: String,
}

/// `commit` half of the create/update response
#[derive(Debug, Serialize)]
pub struct FileCommitInfo {
    pub sha: String,
    pub message: String,
    pub author: GitActor,
    pub committer: GitActor,
}

/// Response of `create_or_update_file`
#[derive(Debug, Serialize)]
pub struct FileCommitResponse {
    pub content: FileCommitContent,
    pub commit: FileCommitInfo,
}

/// One file of a multi-file push
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushFile {
    pub path: String,
    pub content: String,
}

/// Response of `push_files`
#[derive(Debug, Serialize)]
pub struct PushResponse {
    pub commit_sha: String,
    pub tree_sha: String,
    pub message: String,
}

/// Creates or updates a single file, producing a new commit on the branch.
///
/// `content` must be base64 encoded. Updating an existing file requires the
/// current blob SHA; a stale SHA is a conflict. The branch defaults to the
/// repository's default branch.
#[allow(clippy::too_many_arguments)]
pub fn create_or_update_file(
    store: &GitHubStore,
    owner: &str,
    repo: &str,
    path: &str,
    message: &str,
    content: &str,
    branch: Option<&str>,
    sha: Option<&str>,
) -> Result<FileCommitResponse> {
    validate_name("Owner name", owner, limits::MAX_OWNER_LENGTH)?;
    validate_name("Repository name", repo, limits::MAX_REPO_LENGTH)?;
    require("Path", path)?;
    require("Commit message", message)?;
    require("Content", content)?;
    if path.len() > limits::MAX_PATH_LENGTH {
        return Err(Error::validation(format!(
            "Path is too long (maximum {} characters).",
            limits::MAX_PATH_LENGTH
        )));
    }
    if message.len() > limits::MAX_COMMIT_MESSAGE_LENGTH {
        return Err(Error::validation(format!(
            "Commit message is too long (maximum {} characters).",
            limits::MAX_COMMIT_MESSAGE_LENGTH
        )));
    }
    if let Some(branch) = branch.filter(|b| !b.trim().is_empty()) {
        validate_branch_name(branch)?;
    }
    if let Some(sha) = sha.filter(|s| !s.trim().is_empty())
        && !SHA_RE.is_match(sha)
    {
        return Err(Error::validation(
            "SHA must be a 40-character hexadecimal string.",
        ));
    }

    let path = clean_path(path)?;

    // Strict base64, then size and padding sanity checks
    let decoded = BASE64_STANDARD
        .decode(content.trim())
        .map_err(|_| Error::validation("Content must be a valid base64 encoded string."))?;
    if decoded.len() > limits::MAX_CONTENT_SIZE {
        return Err(Error::validation(format!(
            "Content size ({} bytes) exceeds maximum allowed size ({} bytes).",
            decoded.len(),
            limits::MAX_CONTENT_SIZE
        )));
    }
    let expected_b64_len = decoded.len().div_ceil(3) * 4;
    if content.len() as f64 > expected_b64_len as f64 * 1.5 {
        return Err(Error::validation(
            "Base64 content appears to have excessive padding or invalid encoding.",
        ));
    }

    // Repository and branch resolution
    let full_name = format!("{owner}/{repo}");
    let repository = store
        .find_repository(&full_name)
        .ok_or_else(|| Error::not_found(format!("Repository '{full_name}' not found.")))?;
    let repo_id = repository.id;

    if repository.archived {
        return Err(Error::forbidden(format!(
            "Repository '{full_name}' is archived and cannot be modified."
        )));
    }

    let target_branch = match branch.filter(|b| !b.trim().is_empty()) {
        Some(b) => b.to_string(),
        None => repository.default_branch.clone().ok_or_else(|| {
            Error::not_found(format!(
                "Repository '{full_name}' has no default branch and no branch was specified."
            ))
        })?,
    };

    let (parent_sha, branch_protected) = {
        let branches = store.branches();
        let branch_entry = branches
            .iter()
            .find(|b| b.repository_id == repo_id && b.name == target_branch)
            .ok_or_else(|| {
                Error::not_found(format!(
                    "Branch '{target_branch}' not found in repository '{full_name}'."
                ))
            })?;
        (branch_entry.commit.sha.clone(), branch_entry.protected)
    };

    // Committer details and protected-branch check
    let owner_user = store.find_user_by_login(owner);
    let author_name = owner_user
        .as_ref()
        .map(|u| u.author_name())
        .unwrap_or_else(|| owner.to_string());
    let author_email = owner_user
        .as_ref()
        .map(|u| u.author_email())
        .unwrap_or_else(|| noreply_email(owner));
    let is_site_admin = owner_user.as_ref().is_some_and(|u| u.site_admin);

    if branch_protected && !is_site_admin {
        return Err(Error::forbidden(format!(
            "Branch '{target_branch}' is protected. Only site admins can write to this \
             protected branch in this simulation."
        )));
    }

    // Existing file and SHA check for updates
    let existing_sha = {
        let contents = store.file_contents();
        match contents.get(&(repo_id, parent_sha.clone(), path.clone())) {
            Some(ContentEntry::File(file)) => Some(file.sha.clone()),
            _ => None,
        }
    };
    let is_update = existing_sha.is_some();
    if let Some(existing_sha) = &existing_sha {
        let Some(sha) = sha.filter(|s| !s.trim().is_empty()) else {
            return Err(Error::validation(
                "SHA (blob SHA of the file) must be provided when updating an existing file.",
            ));
        };
        if existing_sha != sha {
            return Err(Error::conflict(
                "File SHA does not match. The file has been changed since the SHA was obtained.",
            ));
        }
    }

    // New blob, tree and commit SHAs
    let new_blob_sha = git::blob_sha(&decoded);
    let file_size = decoded.len() as u64;
    let file_name = path.rsplit('/').next().unwrap_or(&path).to_string();

    let now = Utc::now();
    let timestamp = format_iso(now);
    let actor = GitActor {
        name: author_name,
        email: author_email,
        date: timestamp.clone(),
    };

    // Simplified single-entry tree; enough to give every commit a
    // distinct, content-dependent tree SHA
    let mut tree = BTreeMap::new();
    tree.insert(path.clone(), new_blob_sha.clone());
    let tree_sha = git::tree_sha(&tree);
    let epoch = now.timestamp();
    let new_commit_sha = git::commit_sha(
        &tree_sha,
        Some(parent_sha.as_str()),
        &actor,
        epoch,
        &actor,
        epoch,
        message,
    );

    let author_subdoc = owner_user.as_ref().map(|u| UserRef {
        login: u.login.clone(),
        id: u.id,
    });

    let line_count = String::from_utf8_lossy(&decoded).lines().count() as u64;
    let commit_file = CommitFile {
        sha: new_blob_sha.clone(),
        filename: path.clone(),
        status: if is_update { "modified" } else { "added" }.to_string(),
        additions: line_count,
        deletions: 0,
        changes: line_count,
        patch: None,
    };
    let commit = Commit {
        id: store.next_commit_id(),
        sha: new_commit_sha.clone(),
        node_id: format!("C_NODE_{new_commit_sha}"),
        repository_id: repo_id,
        commit: CommitDetail {
            author: actor.clone(),
            committer: actor.clone(),
            message: message.to_string(),
            tree: TreeRef {
                sha: tree_sha.clone(),
            },
            comment_count: 0,
        },
        author: author_subdoc.clone(),
        committer: author_subdoc,
        parents: vec![crate::models::CommitRef::new(parent_sha.clone())],
        stats: CommitStats {
            total: line_count,
            additions: line_count,
            deletions: 0,
        },
        files: vec![commit_file],
        created_at: timestamp.clone(),
        updated_at: timestamp.clone(),
    };
    store.commits_mut().push(commit);

    // Store the new file content and refresh the root listing
    {
        let mut contents = store.file_contents_mut();
        contents.insert(
            (repo_id, new_commit_sha.clone(), path.clone()),
            ContentEntry::File(FileContent::file(
                file_name.clone(),
                path.clone(),
                BASE64_STANDARD.encode(&decoded),
                Encoding::Base64,
                file_size,
                new_blob_sha.clone(),
            )),
        );

        let mut root = match contents.get(&(repo_id, parent_sha.clone(), String::new())) {
            Some(ContentEntry::Dir(entries)) => entries.clone(),
            _ => Vec::new(),
        };
        extend_root_listing(&mut root, &path, &new_blob_sha, file_size);
        contents.insert((repo_id, new_commit_sha.clone(), String::new()), ContentEntry::Dir(root));
    }

    // Index the file for code search, replacing any entry for the old blob
    {
        let mut index = store.code_search_mut();
        if is_update {
            index.retain(|item| !(item.path == path && item.repository.id == repo_id));
        }
        index.push(CodeSearchItem {
            name: file_name.clone(),
            path: path.clone(),
            sha: new_blob_sha.clone(),
            repository: SearchRepoRef {
                id: repo_id,
                name: repo.to_string(),
                full_name: full_name.clone(),
                owner: UserRef {
                    login: owner.to_string(),
                    id: owner_user.as_ref().map(|u| u.id).unwrap_or(1),
                },
            },
            score: 1.0,
        });
    }

    // Advance the branch and repository timestamps
    {
        let mut branches = store.branches_mut();
        if let Some(entry) = branches
            .iter_mut()
            .find(|b| b.repository_id == repo_id && b.name == target_branch)
        {
            entry.commit.sha = new_commit_sha.clone();
        }
    }
    store.touch_repository(repo_id, Some(&timestamp));
    debug!("{} {path} on {full_name}@{target_branch}", if is_update { "updated" } else { "created" });

    Ok(FileCommitResponse {
        content: FileCommitContent {
            name: file_name,
            path,
            sha: new_blob_sha,
            size: file_size,
            entry_type: "file".to_string(),
        },
        commit: FileCommitInfo {
            sha: new_commit_sha,
            message: message.to_string(),
            author: actor.clone(),
            committer: actor,
        },
    })
}

/// Pushes multiple files in a single commit.
///
/// Files identical to the parent commit are skipped in the commit's change
/// list; the full tree (pushed plus inherited files) is materialized under
/// the new commit. If the branch moved since it was read, the commit and
/// its contents are rolled back and a conflict is returned.
#[allow(clippy::too_many_arguments)]
pub fn push_files(
    store: &GitHubStore,
    owner: &str,
    repo: &str,
    branch: &str,
    files: &[PushFile],
    message: &str,
    author_date: Option<&str>,
    committer_date: Option<&str>,
) -> Result<PushResponse> {
    require("Owner username", owner)?;
    require("Repository name", repo)?;
    require("Branch name", branch)?;
    require("Commit message", message)?;
    no_whitespace("Owner username", owner)?;
    no_whitespace("Repository name", repo)?;
    no_whitespace("Branch name", branch)?;
    if files.is_empty() {
        return Err(Error::validation("Files list cannot be empty."));
    }
    for file in files {
        if file.path.trim().is_empty() {
            return Err(Error::validation("Invalid files list: file path is required."));
        }
        if file.content.is_empty() {
            return Err(Error::validation(
                "Invalid files list: file content is required.",
            ));
        }
    }

    let full_name = format!("{owner}/{repo}");
    let repository = store
        .find_repository(&full_name)
        .ok_or_else(|| Error::not_found(format!("Repository '{full_name}' not found.")))?;
    let repo_id = repository.id;

    let parent_sha = {
        let branches = store.branches();
        branches
            .iter()
            .find(|b| b.repository_id == repo_id && b.name == branch)
            .map(|b| b.commit.sha.clone())
            .ok_or_else(|| {
                Error::not_found(format!(
                    "Branch '{branch}' not found in repository '{full_name}'."
                ))
            })?
    };

    // Blobs of the parent commit, by path
    let parent_blobs: BTreeMap<String, String> = {
        let contents = store.file_contents();
        contents
            .iter()
            .filter(|((rid, csha, path), _)| {
                *rid == repo_id && *csha == parent_sha && !path.is_empty()
            })
            .filter_map(|((_, _, path), entry)| match entry {
                ContentEntry::File(file) => Some((path.clone(), file.sha.clone())),
                ContentEntry::Dir(_) => None,
            })
            .collect()
    };

    // New tree: parent blobs overridden by the pushed files
    let mut tree = parent_blobs.clone();
    let mut pushed: BTreeMap<String, (String, String)> = BTreeMap::new();
    for file in files {
        let blob = git::blob_sha(file.content.as_bytes());
        tree.insert(file.path.clone(), blob.clone());
        pushed.insert(file.path.clone(), (blob, file.content.clone()));
    }
    let tree_sha = git::tree_sha(&tree);

    // Change entries, skipping files identical to the parent
    let mut changes = Vec::new();
    for (path, (blob, content)) in &pushed {
        let status = match parent_blobs.get(path) {
            Some(parent_blob) if parent_blob == blob => continue,
            Some(_) => "modified",
            None => "added",
        };
        let lines = content.lines().count() as u64;
        changes.push(CommitFile {
            sha: blob.clone(),
            filename: path.clone(),
            status: status.to_string(),
            additions: lines,
            deletions: 0,
            changes: lines,
            patch: None,
        });
    }

    let committer = store.find_user_by_login(owner).ok_or_else(|| {
        Error::not_found(format!(
            "User '{owner}' (acting as committer) not found in Users table."
        ))
    })?;

    let now = Utc::now();
    let default_timestamp = format_iso(now);
    let author_date = resolve_date("author_date", author_date, &default_timestamp)?;
    let committer_date = resolve_date("committer_date", committer_date, &default_timestamp)?;

    let author = GitActor {
        name: committer.author_name(),
        email: committer.author_email(),
        date: author_date.0,
    };
    let committer_actor = GitActor {
        date: committer_date.0,
        ..author.clone()
    };

    let commit_id = store.next_commit_id();
    let new_commit_sha = git::commit_sha(
        &tree_sha,
        (!parent_sha.is_empty()).then_some(parent_sha.as_str()),
        &author,
        author_date.1,
        &committer_actor,
        committer_date.1,
        message,
    );
    let node_id = format!("C_kwDOAAB{commit_id}_{}", &new_commit_sha[..20]);

    let user_ref = UserRef {
        login: committer.login.clone(),
        id: committer.id,
    };
    let total_additions: u64 = changes.iter().map(|c| c.additions).sum();
    let total_deletions: u64 = changes.iter().map(|c| c.deletions).sum();
    let changed_count = changes.len();
    let commit = Commit {
        id: commit_id,
        sha: new_commit_sha.clone(),
        node_id,
        repository_id: repo_id,
        commit: CommitDetail {
            author: author.clone(),
            committer: committer_actor.clone(),
            message: message.to_string(),
            tree: TreeRef {
                sha: tree_sha.clone(),
            },
            comment_count: 0,
        },
        author: Some(user_ref.clone()),
        committer: Some(user_ref.clone()),
        parents: if parent_sha.is_empty() {
            Vec::new()
        } else {
            vec![crate::models::CommitRef::new(parent_sha.clone())]
        },
        stats: CommitStats {
            total: total_additions + total_deletions,
            additions: total_additions,
            deletions: total_deletions,
        },
        files: changes,
        created_at: author.date.clone(),
        updated_at: committer_actor.date.clone(),
    };
    store.commits_mut().push(commit);

    // Materialize every tree file under the new commit
    {
        let mut contents = store.file_contents_mut();
        let mut root: Vec<DirEntry> = Vec::new();
        for (path, blob) in &tree {
            let content_str = match pushed.get(path) {
                Some((_, content)) => content.clone(),
                None => {
                    let parent_entry =
                        contents.get(&(repo_id, parent_sha.clone(), path.clone()));
                    match parent_entry {
                        Some(ContentEntry::File(file)) => match file.encoding {
                            Encoding::Base64 => {
                                let bytes =
                                    BASE64_STANDARD.decode(&file.content).map_err(|_| {
                                        Error::validation(format!(
                                            "Failed to decode file content for path '{path}': \
                                             file content appears to be corrupted or invalid."
                                        ))
                                    })?;
                                String::from_utf8_lossy(&bytes).into_owned()
                            }
                            Encoding::Text => file.content.clone(),
                        },
                        _ => String::new(),
                    }
                }
            };
            let size = content_str.len() as u64;
            contents.insert(
                (repo_id, new_commit_sha.clone(), path.clone()),
                ContentEntry::File(FileContent::file(
                    path.rsplit('/').next().unwrap_or(path),
                    path.clone(),
                    content_str,
                    Encoding::Text,
                    size,
                    blob.clone(),
                )),
            );
            extend_root_listing(&mut root, path, blob, size);
        }
        contents.insert((repo_id, new_commit_sha.clone(), String::new()), ContentEntry::Dir(root));
    }

    // Fast-forward check, then advance the branch
    let branch_moved = {
        let branches = store.branches();
        branches
            .iter()
            .find(|b| b.repository_id == repo_id && b.name == branch)
            .map(|b| b.commit.sha != parent_sha)
            .unwrap_or(true)
    };
    if branch_moved {
        store.commits_mut().retain(|c| c.id != commit_id);
        store
            .file_contents_mut()
            .retain(|(rid, csha, _), _| !(*rid == repo_id && *csha == new_commit_sha));
        return Err(Error::conflict(
            "Branch has been updated since last fetch. Push cannot be fast-forwarded.",
        ));
    }
    {
        let mut branches = store.branches_mut();
        if let Some(entry) = branches
            .iter_mut()
            .find(|b| b.repository_id == repo_id && b.name == branch)
        {
            entry.commit.sha = new_commit_sha.clone();
        }
    }
    store.touch_repository(repo_id, Some(&committer_actor.date));

    // Index the pushed files for code search
    {
        let mut index = store.code_search_mut();
        for (path, (blob, _)) in &pushed {
            index.push(CodeSearchItem {
                name: path.rsplit('/').next().unwrap_or(path).to_string(),
                path: path.clone(),
                sha: blob.clone(),
                repository: SearchRepoRef {
                    id: repo_id,
                    name: repo.to_string(),
                    full_name: full_name.clone(),
                    owner: user_ref.clone(),
                },
                score: 1.0,
            });
        }
    }

    Ok(PushResponse {
        commit_sha: new_commit_sha,
        tree_sha,
        message: format!(
            "Successfully pushed {changed_count} file(s) (with changes) to {full_name}/{branch}."
        ),
    })
}

/// Gets the contents of a file or directory at a ref.
///
/// Files are returned base64 encoded regardless of how they are stored;
/// directories return their entry listing. The ref may be a branch name, a
/// tag name, or a commit SHA, defaulting to the repository's default
/// branch. `/` addresses the root listing.
pub fn get_file_contents(
    store: &GitHubStore,
    owner: &str,
    repo: &str,
    path: &str,
    git_ref: Option<&str>,
) -> Result<ContentEntry> {
    require("Repository owner", owner)?;
    require("Repository name", repo)?;
    require("Path", path)?;
    no_whitespace("Repository owner", owner)?;
    no_whitespace("Repository name", repo)?;
    no_whitespace("Path", path)?;
    if let Some(r) = git_ref {
        require("Ref", r)?;
        no_whitespace("Ref", r)?;
    }

    let full_name = format!("{owner}/{repo}");
    let repository = store
        .find_repository(&full_name)
        .ok_or_else(|| Error::not_found(format!("Repository '{full_name}' not found.")))?;
    let repo_id = repository.id;

    let ref_to_resolve = match git_ref {
        Some(r) => r.to_string(),
        None => repository.default_branch.clone().ok_or_else(|| {
            Error::not_found(format!(
                "Repository '{full_name}' does not have a default branch."
            ))
        })?,
    };

    let commit_sha = resolve_ref(store, repo_id, &ref_to_resolve).ok_or_else(|| {
        Error::not_found(format!(
            "Ref '{ref_to_resolve}' does not exist or could not be resolved to a commit \
             in repository '{full_name}'."
        ))
    })?;

    let path_for_key = if path == "/" {
        String::new()
    } else {
        path.trim_matches('/').to_string()
    };

    let contents = store.file_contents();
    match contents.get(&(repo_id, commit_sha.clone(), path_for_key.clone())) {
        Some(ContentEntry::File(file)) => {
            let mut file = file.clone();
            if file.encoding == Encoding::Text {
                file.content = BASE64_STANDARD.encode(file.content.as_bytes());
                file.encoding = Encoding::Base64;
            }
            Ok(ContentEntry::File(file))
        }
        Some(ContentEntry::Dir(entries)) => Ok(ContentEntry::Dir(entries.clone())),
        None if path == "/" => Ok(ContentEntry::Dir(Vec::new())),
        None => {
            // Synthesize a directory listing from deeper keys
            let prefix = format!("{path_for_key}/");
            let mut entries: Vec<DirEntry> = Vec::new();
            for ((rid, csha, key_path), entry) in contents.iter() {
                if *rid != repo_id || *csha != commit_sha || !key_path.starts_with(&prefix) {
                    continue;
                }
                let relative = &key_path[prefix.len()..];
                if relative.is_empty() {
                    continue;
                }
                if let Some((subdir, _)) = relative.split_once('/') {
                    if !entries
                        .iter()
                        .any(|e| e.entry_type == "dir" && e.name == subdir)
                    {
                        entries.push(DirEntry::dir(
                            subdir,
                            format!("{path_for_key}/{subdir}"),
                            "",
                        ));
                    }
                } else if let ContentEntry::File(file) = entry {
                    entries.push(DirEntry {
                        entry_type: file.entry_type.clone(),
                        size: file.size,
                        name: file.name.clone(),
                        path: file.path.clone(),
                        sha: file.sha.clone(),
                    });
                }
            }
            if entries.is_empty() {
                return Err(Error::not_found(format!(
                    "Path '{path}' not found at ref '{ref_to_resolve}' (commit: {commit_sha}) \
                     in repository '{full_name}'."
                )));
            }
            Ok(ContentEntry::Dir(entries))
        }
    }
}

/// Resolve a ref to a commit SHA: branch name, tag name, commit SHA, or a
/// branch head SHA
fn resolve_ref(store: &GitHubStore, repo_id: i64, git_ref: &str) -> Option<String> {
    {
        let branches = store.branches();
        if let Some(branch) = branches
            .iter()
            .find(|b| b.repository_id == repo_id && b.name == git_ref)
        {
            return Some(branch.commit.sha.clone());
        }
    }
    {
        let tags = store.tags();
        if let Some(tag) = tags
            .iter()
            .find(|t| t.repository_id == repo_id && t.name == git_ref)
        {
            return Some(tag.commit.sha.clone());
        }
    }
    {
        let commits = store.commits();
        if commits
            .iter()
            .any(|c| c.repository_id == repo_id && c.sha == git_ref)
        {
            return Some(git_ref.to_string());
        }
    }
    let branches = store.branches();
    branches
        .iter()
        .find(|b| b.repository_id == repo_id && b.commit.sha == git_ref)
        .map(|b| b.commit.sha.clone())
}

/// Reject traversal and reserved names, returning the cleaned path
fn clean_path(path: &str) -> Result<String> {
    let cleaned = path.trim().trim_matches('/').to_string();
    if cleaned.is_empty() {
        return Err(Error::validation(
            "Path cannot be empty or contain only slashes and whitespace.",
        ));
    }
    if cleaned.contains("..") {
        return Err(Error::validation(
            "Path cannot contain '..' (parent directory references).",
        ));
    }
    if cleaned.contains('\\') {
        return Err(Error::validation("Path cannot contain backslashes."));
    }
    if cleaned.contains("//") {
        return Err(Error::validation("Path cannot contain consecutive slashes."));
    }
    for part in cleaned.split('/') {
        if limits::RESERVED_FILENAMES.contains(&part.to_uppercase().as_str()) {
            return Err(Error::validation(format!(
                "Path contains reserved filename: {part}"
            )));
        }
    }
    Ok(cleaned)
}

/// Add a file (or its top-level directory) to a root listing, if absent
fn extend_root_listing(root: &mut Vec<DirEntry>, path: &str, blob_sha: &str, size: u64) {
    if let Some((dir_name, _)) = path.split_once('/') {
        if !root
            .iter()
            .any(|e| e.entry_type == "dir" && e.name == dir_name)
        {
            root.push(DirEntry::dir(dir_name, dir_name, dir_sha(dir_name)));
        }
    } else if !root
        .iter()
        .any(|e| e.entry_type == "file" && e.name == path)
    {
        root.push(DirEntry {
            entry_type: "file".to_string(),
            size,
            name: path.to_string(),
            path: path.to_string(),
            sha: blob_sha.to_string(),
        });
    }
}

fn dir_sha(name: &str) -> String {
    use sha1::{Digest, Sha1};
    format!("{:x}", Sha1::digest(name.as_bytes()))
}

/// Parse an optional ISO-8601 override date, returning (iso string, epoch)
fn resolve_date(
    field: &str,
    value: Option<&str>,
    default_iso: &str,
) -> Result<(String, i64)> {
    match value {
        None => {
            let epoch = DateTime::parse_from_rfc3339(&default_iso.replace('Z', "+00:00"))
                .map(|dt| dt.timestamp())
                .unwrap_or(0);
            Ok((default_iso.to_string(), epoch))
        }
        Some(raw) => {
            let parsed = DateTime::parse_from_rfc3339(&raw.replace('Z', "+00:00")).map_err(|e| {
                Error::validation(format!(
                    "Invalid {field} format '{raw}': {e}. Expected ISO 8601 format \
                     (YYYY-MM-DDTHH:MM:SSZ)."
                ))
            })?;
            Ok((raw.to_string(), parsed.timestamp()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repos::repositories::create_repository;

    fn seeded_store() -> GitHubStore {
        let store = GitHubStore::new();
        store.add_user("octocat", Some("The Octocat"), Some("octo@example.com"), false);
        create_repository(&store, "demo", None, false, true).unwrap();
        store
    }

    fn b64(text: &str) -> String {
        BASE64_STANDARD.encode(text.as_bytes())
    }

    #[test]
    fn test_create_file_produces_commit_on_branch_head() {
        let store = seeded_store();
        let parent = store.branches()[0].commit.sha.clone();

        let response = create_or_update_file(
            &store,
            "octocat",
            "demo",
            "src/main.rs",
            "add main",
            &b64("fn main() {}\n"),
            None,
            None,
        )
        .unwrap();

        assert_eq!(response.content.name, "main.rs");
        assert_eq!(response.content.path, "src/main.rs");
        assert_eq!(response.content.entry_type, "file");

        // New commit's parent is the prior branch head
        let commits = store.commits();
        let commit = commits
            .iter()
            .find(|c| c.sha == response.commit.sha)
            .unwrap();
        assert_eq!(commit.parents[0].sha, parent);
        assert_eq!(commit.files[0].status, "added");

        // Branch now points at the new commit
        let branches = store.branches();
        assert_eq!(branches[0].commit.sha, response.commit.sha);
    }

    #[test]
    fn test_update_requires_matching_sha() {
        let store = seeded_store();
        let created = create_or_update_file(
            &store,
            "octocat",
            "demo",
            "notes.txt",
            "add notes",
            &b64("v1"),
            None,
            None,
        )
        .unwrap();

        // Updating without a SHA fails
        let err = create_or_update_file(
            &store,
            "octocat",
            "demo",
            "notes.txt",
            "update",
            &b64("v2"),
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        // Updating with a stale SHA conflicts
        let err = create_or_update_file(
            &store,
            "octocat",
            "demo",
            "notes.txt",
            "update",
            &b64("v2"),
            None,
            Some(&"0".repeat(40)),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        // Updating with the current blob SHA succeeds
        let updated = create_or_update_file(
            &store,
            "octocat",
            "demo",
            "notes.txt",
            "update",
            &b64("v2"),
            None,
            Some(&created.content.sha),
        )
        .unwrap();
        let commits = store.commits();
        let commit = commits.iter().find(|c| c.sha == updated.commit.sha).unwrap();
        assert_eq!(commit.files[0].status, "modified");
    }

    #[test]
    fn test_create_file_rejects_bad_content() {
        let store = seeded_store();
        let err = create_or_update_file(
            &store,
            "octocat",
            "demo",
            "x.txt",
            "msg",
            "not base64!!!",
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_create_file_rejects_path_traversal() {
        let store = seeded_store();
        for bad in ["../etc/passwd", "a//b.txt", "dir\\file", "COM1/x.txt"] {
            let err = create_or_update_file(
                &store,
                "octocat",
                "demo",
                bad,
                "msg",
                &b64("x"),
                None,
                None,
            )
            .unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "path {bad} accepted");
        }
    }

    #[test]
    fn test_create_file_on_archived_repo_is_forbidden() {
        let store = seeded_store();
        store
            .repositories_mut()
            .iter_mut()
            .find(|r| r.name == "demo")
            .unwrap()
            .archived = true;
        let err = create_or_update_file(
            &store,
            "octocat",
            "demo",
            "x.txt",
            "msg",
            &b64("x"),
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[test]
    fn test_create_file_on_protected_branch() {
        let store = seeded_store();
        store.branches_mut()[0].protected = true;
        let err = create_or_update_file(
            &store,
            "octocat",
            "demo",
            "x.txt",
            "msg",
            &b64("x"),
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        // Site admins may write to protected branches
        let store = GitHubStore::new();
        store.add_user("admin", None, None, true);
        create_repository(&store, "demo", None, false, true).unwrap();
        store.branches_mut()[0].protected = true;
        assert!(
            create_or_update_file(&store, "admin", "demo", "x.txt", "m", &b64("x"), None, None)
                .is_ok()
        );
    }

    #[test]
    fn test_create_file_unknown_branch() {
        let store = seeded_store();
        let err = create_or_update_file(
            &store,
            "octocat",
            "demo",
            "x.txt",
            "msg",
            &b64("x"),
            Some("ghost"),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_push_files_multi_file_commit() {
        let store = seeded_store();
        let response = push_files(
            &store,
            "octocat",
            "demo",
            "main",
            &[
                PushFile {
                    path: "a.txt".to_string(),
                    content: "alpha\n".to_string(),
                },
                PushFile {
                    path: "dir/b.txt".to_string(),
                    content: "beta\n".to_string(),
                },
            ],
            "add two files",
            None,
            None,
        )
        .unwrap();
        assert!(response.message.contains("2 file(s)"));

        // Both files plus the inherited README live under the new commit
        let head = store.branches()[0].commit.sha.clone();
        assert_eq!(head, response.commit_sha);
        let contents = store.file_contents();
        let repo_id = store.find_repository("octocat/demo").unwrap().id;
        assert!(contents.contains_key(&(repo_id, head.clone(), "a.txt".to_string())));
        assert!(contents.contains_key(&(repo_id, head.clone(), "dir/b.txt".to_string())));
        assert!(contents.contains_key(&(repo_id, head.clone(), "README.md".to_string())));

        // Root listing has the file and the directory
        match contents.get(&(repo_id, head, String::new())).unwrap() {
            ContentEntry::Dir(entries) => {
                assert!(entries.iter().any(|e| e.name == "a.txt"));
                assert!(entries.iter().any(|e| e.name == "dir" && e.entry_type == "dir"));
                assert!(entries.iter().any(|e| e.name == "README.md"));
            }
            other => panic!("root listing is not a dir: {other:?}"),
        }
    }

    #[test]
    fn test_push_files_skips_unchanged() {
        let store = seeded_store();
        push_files(
            &store,
            "octocat",
            "demo",
            "main",
            &[PushFile {
                path: "a.txt".to_string(),
                content: "same".to_string(),
            }],
            "first",
            None,
            None,
        )
        .unwrap();
        let response = push_files(
            &store,
            "octocat",
            "demo",
            "main",
            &[PushFile {
                path: "a.txt".to_string(),
                content: "same".to_string(),
            }],
            "second",
            None,
            None,
        )
        .unwrap();
        assert!(response.message.contains("0 file(s)"));
    }

    #[test]
    fn test_push_files_custom_dates() {
        let store = seeded_store();
        let response = push_files(
            &store,
            "octocat",
            "demo",
            "main",
            &[PushFile {
                path: "a.txt".to_string(),
                content: "x".to_string(),
            }],
            "dated",
            Some("2023-05-01T10:00:00Z"),
            Some("2023-05-02T10:00:00Z"),
        )
        .unwrap();
        let commits = store.commits();
        let commit = commits
            .iter()
            .find(|c| c.sha == response.commit_sha)
            .unwrap();
        assert_eq!(commit.commit.author.date, "2023-05-01T10:00:00Z");
        assert_eq!(commit.commit.committer.date, "2023-05-02T10:00:00Z");

        let repo = store.find_repository("octocat/demo").unwrap();
        assert_eq!(repo.pushed_at, "2023-05-02T10:00:00Z");

        let err = push_files(
            &store,
            "octocat",
            "demo",
            "main",
            &[PushFile {
                path: "a.txt".to_string(),
                content: "y".to_string(),
            }],
            "bad date",
            Some("yesterday"),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_push_files_validates_input() {
        let store = seeded_store();
        assert!(push_files(&store, "octocat", "demo", "main", &[], "m", None, None).is_err());
        assert!(
            push_files(
                &store,
                "octocat",
                "demo",
                "main",
                &[PushFile {
                    path: "".to_string(),
                    content: "x".to_string()
                }],
                "m",
                None,
                None,
            )
            .is_err()
        );
    }

    #[test]
    fn test_get_file_contents_file_and_root() {
        let store = seeded_store();
        create_or_update_file(
            &store,
            "octocat",
            "demo",
            "src/lib.rs",
            "add lib",
            &b64("pub fn f() {}\n"),
            None,
            None,
        )
        .unwrap();

        match get_file_contents(&store, "octocat", "demo", "src/lib.rs", None).unwrap() {
            ContentEntry::File(file) => {
                assert_eq!(file.encoding, Encoding::Base64);
                let decoded = BASE64_STANDARD.decode(&file.content).unwrap();
                assert_eq!(decoded, b"pub fn f() {}\n");
            }
            other => panic!("expected file, got {other:?}"),
        }

        match get_file_contents(&store, "octocat", "demo", "/", None).unwrap() {
            ContentEntry::Dir(entries) => {
                assert!(entries.iter().any(|e| e.name == "src" && e.entry_type == "dir"));
                assert!(entries.iter().any(|e| e.name == "README.md"));
            }
            other => panic!("expected dir, got {other:?}"),
        }

        // Subdirectory listing is synthesized from deeper keys
        match get_file_contents(&store, "octocat", "demo", "src", None).unwrap() {
            ContentEntry::Dir(entries) => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].name, "lib.rs");
            }
            other => panic!("expected dir, got {other:?}"),
        }
    }

    #[test]
    fn test_get_file_contents_at_older_ref() {
        let store = seeded_store();
        let first = create_or_update_file(
            &store,
            "octocat",
            "demo",
            "v.txt",
            "v1",
            &b64("one"),
            None,
            None,
        )
        .unwrap();
        create_or_update_file(
            &store,
            "octocat",
            "demo",
            "v.txt",
            "v2",
            &b64("two"),
            None,
            Some(&first.content.sha),
        )
        .unwrap();

        // At the old commit the old content is still visible
        match get_file_contents(&store, "octocat", "demo", "v.txt", Some(&first.commit.sha))
            .unwrap()
        {
            ContentEntry::File(file) => {
                assert_eq!(BASE64_STANDARD.decode(&file.content).unwrap(), b"one");
            }
            other => panic!("expected file, got {other:?}"),
        }

        // At the branch head the new content is returned
        match get_file_contents(&store, "octocat", "demo", "v.txt", Some("main")).unwrap() {
            ContentEntry::File(file) => {
                assert_eq!(BASE64_STANDARD.decode(&file.content).unwrap(), b"two");
            }
            other => panic!("expected file, got {other:?}"),
        }
    }

    #[test]
    fn test_get_file_contents_unknown_ref_and_path() {
        let store = seeded_store();
        assert!(matches!(
            get_file_contents(&store, "octocat", "demo", "x", Some("ghost")).unwrap_err(),
            Error::NotFound(_)
        ));
        assert!(matches!(
            get_file_contents(&store, "octocat", "demo", "missing.txt", None).unwrap_err(),
            Error::NotFound(_)
        ));
    }
}
