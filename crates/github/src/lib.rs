//! GitHub repository-file simulation backend
//!
//! This crate mimics the GitHub REST API's repository, branch and file
//! content operations as plain functions over an in-memory store:
//! - Resource models (Repository, Branch, Commit, file contents)
//! - Vector tables with auto-increment ids, plus a content map keyed by
//!   `(repository, commit, path)`
//! - Git-style SHA-1 hashing for blobs, trees and commits
//! - Endpoint functions for file create/update, multi-file pushes, content
//!   reads, branch management and repository creation
//!
//! There is no network layer and no persistence; every endpoint validates
//! its input, mutates the store, and returns a resource shaped like the
//! real API's JSON payload.

pub mod error;
pub mod git;
pub mod models;
pub mod repos;
pub mod store;

pub use error::{Error, Result};
pub use models::{
    Branch, Commit, CommitFile, CommitRef, CommitStats, ContentEntry, DirEntry, FileContent,
    GitActor, Repository, Tag, User, UserRef,
};
pub use store::GitHubStore;
