use tracing::{info, warn};

use crate::boundary::SkipReason;
use crate::error::Result;
use crate::git::Repository;

/// Removes a tag that has no completed release behind it.
///
/// The run that reconciles never re-tags; the next run does.
pub struct OrphanTagReconciler<'a, R: Repository> {
    repo: &'a R,
    remote: &'a str,
}

impl<'a, R: Repository> OrphanTagReconciler<'a, R> {
    pub fn new(repo: &'a R, remote: &'a str) -> Self {
        OrphanTagReconciler { repo, remote }
    }

    /// Delete the local tag, then the remote one. Absence of either is fine.
    ///
    /// A remote that cannot be reached leaves the remote tag for a later run.
    pub fn reconcile(&self, tag: &str) -> Result<SkipReason> {
        warn!(tag, "tag has no release record, removing it");

        let local_removed = self.repo.delete_local_tag(tag)?;
        let remote_removed = match self.repo.delete_remote_tag(self.remote, tag) {
            Ok(removed) => removed,
            Err(e) => {
                warn!(tag, error = %e, "remote tag deletion failed");
                return Ok(SkipReason::RemoteUnavailable {
                    tag: tag.to_string(),
                    operation: "orphan tag removal".to_string(),
                    reason: e.to_string(),
                });
            }
        };

        info!(tag, local_removed, remote_removed, "orphan tag reconciled");
        Ok(SkipReason::OrphanTagRemoved {
            tag: tag.to_string(),
            local_removed,
            remote_removed,
        })
    }
}
