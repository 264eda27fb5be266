pub mod boundary;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod error;
pub mod gate;
pub mod git;
pub mod host;
pub mod manifest;
pub mod resolver;
pub mod ui;

pub use coordinator::{Coordinator, CoordinatorDecision, Outcome, RunReport};
pub use error::{CoordinatorError, ErrorKind, Result};
