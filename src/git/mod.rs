//! Git operations abstraction layer
//!
//! The coordinator depends on the [Repository] trait rather than on `git2`
//! directly so that the state machine can be exercised against an in-memory
//! history and remote.
//!
//! - [repository::Git2Repository]: real implementation using the `git2` crate
//! - [mock::MockRepository]: in-memory implementation for testing
//!
//! Remote-facing methods always talk to the remote itself. Local refs are a
//! cache that may have diverged from it.

pub mod mock;
pub mod repository;

pub use mock::{MockRemote, MockRepository, RemoteOp};
pub use repository::Git2Repository;

use crate::error::Result;
use git2::Oid;
use std::path::{Path, PathBuf};

/// Commit information for analysis
#[derive(Debug, Clone, PartialEq)]
pub struct CommitInfo {
    /// The full commit hash
    pub hash: String,
    /// The commit message
    pub message: String,
    /// The commit author
    pub author: String,
}

/// A tag name and the commit it peels to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRef {
    pub name: String,
    pub target: Oid,
}

/// Author of commits the coordinator creates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

/// Common git operation trait for abstraction
///
/// Implementations map underlying failures to [crate::error::CoordinatorError];
/// a push that the remote refuses must surface as
/// [crate::error::CoordinatorError::TagRejected] so callers can treat a lost
/// race as a skip.
pub trait Repository: Send {
    /// Working directory of the checkout
    fn workdir(&self) -> Result<PathBuf>;

    /// Name of the checked-out branch, `None` when HEAD is detached
    fn current_branch(&self) -> Result<Option<String>>;

    /// Commit at HEAD
    fn head_oid(&self) -> Result<Oid>;

    /// Resolve a commit-ish (full or abbreviated hash) to a commit.
    ///
    /// Returns `Ok(None)` when the object does not exist in this clone.
    fn resolve_commit(&self, rev: &str) -> Result<Option<Oid>>;

    /// Whether `ancestor` is `descendant` or reachable from it
    fn is_ancestor(&self, ancestor: Oid, descendant: Oid) -> Result<bool>;

    /// Best common ancestor of `a` and `b`, `None` when the histories are
    /// unrelated or either commit is unknown here
    fn merge_base(&self, a: Oid, b: Oid) -> Result<Option<Oid>>;

    /// Commits reachable from `to` but not from `from`, oldest first
    fn commits_between(&self, from: Option<Oid>, to: Oid) -> Result<Vec<CommitInfo>>;

    /// Content of `path` in the tree of `commit`, `None` if absent there
    fn read_file_at(&self, commit: Oid, path: &Path) -> Result<Option<String>>;

    /// Stage `path` (relative to the workdir) and commit it on HEAD
    fn commit_file(&self, path: &Path, message: &str, identity: &Identity) -> Result<Oid>;

    /// All local tags that peel to a commit
    fn list_tags(&self) -> Result<Vec<TagRef>>;

    /// Local tag lookup
    fn find_tag(&self, name: &str) -> Result<Option<Oid>>;

    /// Create a lightweight tag; `force` replaces an existing local tag
    fn create_tag(&self, name: &str, target: Oid, force: bool) -> Result<()>;

    /// Delete a local tag. Absence is not an error: returns `false`.
    fn delete_local_tag(&self, name: &str) -> Result<bool>;

    /// Fetch the branch and all tags from the remote
    fn fetch(&self, remote: &str, branch: &str) -> Result<()>;

    /// Query the remote tag namespace directly
    fn remote_tag_exists(&self, remote: &str, name: &str) -> Result<bool>;

    /// Push a tag; `force` is only used for floating tags
    fn push_tag(&self, remote: &str, name: &str, force: bool) -> Result<()>;

    /// Delete a tag on the remote. Absence is not an error: returns `false`.
    fn delete_remote_tag(&self, remote: &str, name: &str) -> Result<bool>;

    /// Push the local branch to the same-named remote branch
    fn push_branch(&self, remote: &str, branch: &str) -> Result<()>;
}
