/// The checked-out branch, judged against the configured release branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchContext {
    pub name: Option<String>,
    pub release_branch: String,
}

impl BranchContext {
    /// `name` is `None` for a detached HEAD
    pub fn new(name: Option<String>, release_branch: impl Into<String>) -> Self {
        BranchContext {
            name,
            release_branch: release_branch.into(),
        }
    }

    /// Only the configured release branch may publish
    pub fn is_release_branch(&self) -> bool {
        self.name.as_deref() == Some(self.release_branch.as_str())
    }
}
