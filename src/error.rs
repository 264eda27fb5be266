use thiserror::Error;

/// Unified error type for release coordination
#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Version parsing error: {0}")]
    Version(String),

    #[error("Tag error: {0}")]
    Tag(String),

    #[error("Remote operation failed: {0}")]
    Remote(String),

    #[error("Version resolution failed: {0}")]
    ResolutionFailed(String),

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Tag push rejected: {0}")]
    TagRejected(String),

    #[error("Release already exists: {0}")]
    ReleaseExists(String),

    #[error("Release host error: {0}")]
    Release(String),

    #[error("Verification gate failed: {0}")]
    Gate(String),

    #[error("Artifact error: {0}")]
    Artifact(String),
}

/// How the coordinator reacts to an error at the point it is observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Abort the run with a non-zero exit
    Fatal,
    /// End the run successfully without further side effects
    Skip,
    /// Surface in run output, do not retry, do not fail the run
    Reported,
}

/// Convenience type alias for Results in the coordinator
pub type Result<T> = std::result::Result<T, CoordinatorError>;

impl CoordinatorError {
    pub fn config(msg: impl Into<String>) -> Self {
        CoordinatorError::Config(msg.into())
    }

    pub fn version(msg: impl Into<String>) -> Self {
        CoordinatorError::Version(msg.into())
    }

    pub fn tag(msg: impl Into<String>) -> Self {
        CoordinatorError::Tag(msg.into())
    }

    pub fn remote(msg: impl Into<String>) -> Self {
        CoordinatorError::Remote(msg.into())
    }

    pub fn resolution(msg: impl Into<String>) -> Self {
        CoordinatorError::ResolutionFailed(msg.into())
    }

    pub fn manifest(msg: impl Into<String>) -> Self {
        CoordinatorError::Manifest(msg.into())
    }

    pub fn release(msg: impl Into<String>) -> Self {
        CoordinatorError::Release(msg.into())
    }

    pub fn gate(msg: impl Into<String>) -> Self {
        CoordinatorError::Gate(msg.into())
    }

    pub fn artifact(msg: impl Into<String>) -> Self {
        CoordinatorError::Artifact(msg.into())
    }

    /// Classify the error into the coordinator's three-way taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoordinatorError::TagRejected(_) => ErrorKind::Skip,
            CoordinatorError::ReleaseExists(_) | CoordinatorError::Release(_) => {
                ErrorKind::Reported
            }
            _ => ErrorKind::Fatal,
        }
    }
}
