//! Release hosting platform abstraction
//!
//! - [gh::GhCliHost]: drives the `gh` command line client
//! - [mock::MockReleaseHost]: in-memory host for testing

pub mod gh;
pub mod mock;

pub use gh::GhCliHost;
pub use mock::MockReleaseHost;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// What the coordinator asks the host to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRequest {
    pub tag: String,
    pub title: String,
    pub notes: String,
    pub draft: bool,
    pub latest: bool,
    /// Absolute paths of files to attach
    pub artifacts: Vec<PathBuf>,
}

/// Host-side record correlating a tag with its uploaded artifacts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRecord {
    pub tag: String,
    pub title: String,
    pub url: Option<String>,
    pub draft: bool,
    pub latest: bool,
    pub assets: Vec<String>,
}

/// A platform that stores one release per tag.
///
/// `create_release` for a tag that already has a release must fail with
/// [crate::error::CoordinatorError::ReleaseExists].
pub trait ReleaseHost: Send {
    fn release_exists(&self, tag: &str) -> Result<bool>;

    fn create_release(&self, request: &ReleaseRequest) -> Result<ReleaseRecord>;
}
