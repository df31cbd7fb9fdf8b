//! Resource models mirroring the GitHub API JSON shapes (snake_case)

mod branch;
mod commit;
mod content;
mod repo;
mod user;

pub use branch::{Branch, Tag};
pub use commit::{Commit, CommitDetail, CommitFile, CommitRef, CommitStats, GitActor, TreeRef};
pub use content::{ContentEntry, DirEntry, Encoding, FileContent};
pub use repo::Repository;
pub use user::{User, UserRef, noreply_email};

/// Validation limits and patterns shared by the endpoints
pub mod limits {
    pub const MAX_OWNER_LENGTH: usize = 255;
    pub const MAX_REPO_LENGTH: usize = 100;
    pub const MAX_BRANCH_LENGTH: usize = 255;
    pub const MAX_PATH_LENGTH: usize = 1000;
    pub const MAX_COMMIT_MESSAGE_LENGTH: usize = 50_000;
    /// 100MB decoded content cap
    pub const MAX_CONTENT_SIZE: usize = 100 * 1024 * 1024;

    /// Owner and repository names
    pub const NAME_PATTERN: &str = r"^[A-Za-z0-9._-]+$";
    /// Branch names additionally allow slashes
    pub const BRANCH_NAME_PATTERN: &str = r"^[A-Za-z0-9._/-]+$";
    /// Branch names cannot start or end with this character
    pub const BRANCH_NAME_INVALID_START_END: char = '-';
    /// Git object SHAs
    pub const SHA_PATTERN: &str = r"^[a-f0-9]{40}$";

    /// Windows device names are rejected in paths
    pub const RESERVED_FILENAMES: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7",
        "COM8", "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
}
