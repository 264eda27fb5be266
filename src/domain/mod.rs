//! Domain logic - pure release rules independent of git and the release host

pub mod branch;
pub mod commit;
pub mod tag;
pub mod version;

pub use branch::BranchContext;
pub use commit::{ChangeKind, ParsedCommit};
pub use tag::TagPattern;
pub use version::{Version, VersionBump};
