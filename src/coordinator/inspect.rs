use tracing::debug;

use crate::error::Result;
use crate::git::Repository;

/// Answers tag existence from the remote, never from local refs
pub struct TagInspector<'a, R: Repository> {
    repo: &'a R,
    remote: &'a str,
}

impl<'a, R: Repository> TagInspector<'a, R> {
    pub fn new(repo: &'a R, remote: &'a str) -> Self {
        TagInspector { repo, remote }
    }

    pub fn tag_exists(&self, tag: &str) -> Result<bool> {
        let exists = self.repo.remote_tag_exists(self.remote, tag)?;
        debug!(tag, remote = self.remote, exists, "queried remote tag namespace");
        Ok(exists)
    }
}
