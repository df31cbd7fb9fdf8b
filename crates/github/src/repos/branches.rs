//! Branch endpoints: create and list

use base64::prelude::*;
use serde::Serialize;

use super::{SHA_RE, no_whitespace, require};
use crate::error::{Error, Result};
use crate::models::{Branch, CommitRef};
use crate::store::GitHubStore;

/// Response of `create_branch`: the new `refs/heads/...` object
#[derive(Debug, Serialize)]
pub struct RefObject {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub node_id: String,
    pub object: RefTarget,
}

/// Target of a ref
#[derive(Debug, Serialize)]
pub struct RefTarget {
    #[serde(rename = "type")]
    pub target_type: String,
    pub sha: String,
}

/// Creates a branch pointing at an existing commit of the repository
pub fn create_branch(
    store: &GitHubStore,
    owner: &str,
    repo: &str,
    branch: &str,
    sha: &str,
) -> Result<RefObject> {
    require("Owner username", owner)?;
    require("Repository name", repo)?;
    no_whitespace("Owner username", owner)?;
    no_whitespace("Repository name", repo)?;

    let full_name = format!("{owner}/{repo}");
    let repository = store
        .find_repository(&full_name)
        .ok_or_else(|| Error::not_found(format!("Repository '{full_name}' not found.")))?;

    if !SHA_RE.is_match(sha) {
        return Err(Error::unprocessable(format!(
            "SHA '{sha}' is not a valid SHA format."
        )));
    }

    let commit_exists = store
        .commits()
        .iter()
        .any(|c| c.sha == sha && c.repository_id == repository.id);
    if !commit_exists {
        return Err(Error::not_found(format!(
            "Commit with SHA '{sha}' not found in repository '{full_name}'."
        )));
    }

    if branch.is_empty() {
        return Err(Error::unprocessable("Branch name cannot be empty."));
    }
    let duplicate = store
        .branches()
        .iter()
        .any(|b| b.name == branch && b.repository_id == repository.id);
    if duplicate {
        return Err(Error::unprocessable(format!(
            "Branch '{branch}' already exists in repository '{full_name}'."
        )));
    }

    store.branches_mut().push(Branch {
        name: branch.to_string(),
        commit: CommitRef::new(sha),
        protected: false,
        repository_id: repository.id,
    });
    store.touch_repository(repository.id, None);

    let git_ref = format!("refs/heads/{branch}");
    let node_id = BASE64_STANDARD.encode(format!("ref:{full_name}:{git_ref}").as_bytes());
    Ok(RefObject {
        git_ref,
        node_id,
        object: RefTarget {
            target_type: "commit".to_string(),
            sha: sha.to_string(),
        },
    })
}

/// Lists branches of a repository, sorted by name, paginated
pub fn list_branches(
    store: &GitHubStore,
    owner: &str,
    repo: &str,
    page: Option<u32>,
    per_page: Option<u32>,
) -> Result<Vec<Branch>> {
    require("Owner username", owner)?;
    require("Repository name", repo)?;
    let page = page.unwrap_or(1);
    let per_page = per_page.unwrap_or(30);
    if page == 0 {
        return Err(Error::validation("page must be a positive integer."));
    }
    if per_page == 0 {
        return Err(Error::validation("per_page must be a positive integer."));
    }

    let full_name = format!("{owner}/{repo}");
    let repository = store
        .find_repository(&full_name)
        .ok_or_else(|| Error::not_found(format!("Repository '{full_name}' not found.")))?;

    let mut branches: Vec<Branch> = store
        .branches()
        .iter()
        .filter(|b| b.repository_id == repository.id)
        .cloned()
        .collect();
    branches.sort_by(|a, b| a.name.cmp(&b.name));

    let start = ((page - 1) * per_page) as usize;
    Ok(branches
        .into_iter()
        .skip(start)
        .take(per_page as usize)
        .collect())
}
