use std::fmt;

fn short(hash: &str) -> &str {
    if hash.len() > 7 {
        &hash[..7]
    } else {
        hash
    }
}

/// Why a run ended successfully without publishing.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The checked-out branch is not the release branch
    NotReleaseBranch {
        branch: Option<String>,
        release_branch: String,
    },
    /// No commit in range carries a release marker
    NoReleasableCommits { since: String, commit_count: usize },
    /// The candidate tag exists remotely and has a release
    TagAlreadyReleased { tag: String },
    /// The candidate tag existed without a release and was removed; the next
    /// run re-tags
    OrphanTagRemoved {
        tag: String,
        local_removed: bool,
        remote_removed: bool,
    },
    /// A release tag exists but its release record could not be checked
    ReleaseStateUnknown { tag: String, reason: String },
    /// The remote did not answer; nothing was decided about `tag`
    RemoteUnavailable {
        tag: String,
        operation: String,
        reason: String,
    },
    /// Another run pushed the tag first
    LostTagRace { tag: String, reason: String },
    /// Dry run stopped before any mutation
    DryRun { tag: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotReleaseBranch {
                branch,
                release_branch,
            } => write!(
                f,
                "Branch '{}' is not the release branch '{}'",
                branch.as_deref().unwrap_or("(detached HEAD)"),
                release_branch
            ),
            SkipReason::NoReleasableCommits {
                since,
                commit_count,
            } => write!(
                f,
                "No releasable commits since {} ({} commits examined)",
                short(since),
                commit_count
            ),
            SkipReason::TagAlreadyReleased { tag } => {
                write!(f, "Tag '{}' already exists with a release", tag)
            }
            SkipReason::OrphanTagRemoved {
                tag,
                local_removed,
                remote_removed,
            } => write!(
                f,
                "Removed orphan tag '{}' (local: {}, remote: {}); next run will re-tag",
                tag,
                if *local_removed { "deleted" } else { "absent" },
                if *remote_removed { "deleted" } else { "absent" }
            ),
            SkipReason::ReleaseStateUnknown { tag, reason } => write!(
                f,
                "Tag '{}' exists but its release could not be checked: {}",
                tag, reason
            ),
            SkipReason::RemoteUnavailable {
                tag,
                operation,
                reason,
            } => write!(
                f,
                "Remote unavailable during {} for '{}': {}",
                operation, tag, reason
            ),
            SkipReason::LostTagRace { tag, reason } => {
                write!(f, "Tag '{}' was pushed by another run: {}", tag, reason)
            }
            SkipReason::DryRun { tag } => write!(f, "Dry run: stopped before changing anything for '{}'", tag),
        }
    }
}

/// Non-fatal problems reported in run output.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryWarning {
    /// Fetch failed; local refs were used
    FetchFailed { remote: String, reason: String },
    /// A tag matching the pattern could not be parsed
    UnparsableTag { tag: String },
    /// The host refused to create the release
    ReleaseRejected { tag: String, reason: String },
    /// The release commit could not be pushed to the branch
    ReleaseCommitNotPushed { branch: String, reason: String },
    /// The floating major tag could not be moved
    MajorTagNotUpdated { tag: String, reason: String },
}

impl fmt::Display for BoundaryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryWarning::FetchFailed { remote, reason } => write!(
                f,
                "Could not fetch from remote '{}': {}. Using local data",
                remote, reason
            ),
            BoundaryWarning::UnparsableTag { tag } => {
                write!(f, "Cannot parse tag '{}' as a version", tag)
            }
            BoundaryWarning::ReleaseRejected { tag, reason } => {
                write!(f, "Release for '{}' was not created: {}", tag, reason)
            }
            BoundaryWarning::ReleaseCommitNotPushed { branch, reason } => write!(
                f,
                "Release commit was not pushed to '{}': {}",
                branch, reason
            ),
            BoundaryWarning::MajorTagNotUpdated { tag, reason } => {
                write!(f, "Floating tag '{}' was not updated: {}", tag, reason)
            }
        }
    }
}
