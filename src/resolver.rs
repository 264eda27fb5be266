//! Next-version resolution from conventional commit history

use git2::Oid;
use tracing::debug;

use crate::config::ConventionalCommitsConfig;
use crate::domain::{ParsedCommit, Version, VersionBump};
use crate::error::{CoordinatorError, Result};
use crate::git::{CommitInfo, Repository};

/// Commits newer than `lower` (exclusive) up to `tip` (inclusive), oldest first
#[derive(Debug, Clone, PartialEq)]
pub struct CommitRange {
    pub lower: Option<Oid>,
    pub tip: Oid,
    pub commits: Vec<CommitInfo>,
}

impl CommitRange {
    /// Collect the range bounded below by the later of `baseline` and
    /// `release_base`.
    ///
    /// `release_base` is where the last release meets this history: the tag
    /// commit when the tip contains it, otherwise their merge base. It only
    /// narrows the range when it descends from the baseline.
    pub fn collect<R: Repository>(
        repo: &R,
        baseline: Option<Oid>,
        release_base: Option<Oid>,
        tip: Oid,
    ) -> Result<Self> {
        let lower = match (baseline, release_base) {
            (Some(base), Some(release)) if repo.is_ancestor(base, release)? => Some(release),
            (Some(base), _) => Some(base),
            (None, release) => release,
        };

        let commits = repo.commits_between(lower, tip)?;
        debug!(lower = ?lower, tip = %tip, count = commits.len(), "collected commit range");
        Ok(CommitRange {
            lower,
            tip,
            commits,
        })
    }

    pub fn messages(&self) -> Vec<String> {
        self.commits.iter().map(|c| c.message.clone()).collect()
    }
}

/// Resolve the configured baseline hash against the branch tip.
///
/// An unknown hash, or one the tip does not descend from, is a
/// `ResolutionFailed`.
pub fn resolve_baseline<R: Repository>(repo: &R, rev: Option<&str>, tip: Oid) -> Result<Option<Oid>> {
    let rev = match rev.map(str::trim).filter(|s| !s.is_empty()) {
        Some(rev) => rev,
        None => return Ok(None),
    };

    let baseline = repo.resolve_commit(rev)?.ok_or_else(|| {
        CoordinatorError::resolution(format!(
            "baseline commit '{}' not found (shallow clone?)",
            rev
        ))
    })?;

    if !repo.is_ancestor(baseline, tip)? {
        return Err(CoordinatorError::resolution(format!(
            "baseline commit '{}' is not reachable from {}",
            rev, tip
        )));
    }
    Ok(Some(baseline))
}

/// Outcome of resolution over one commit range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub previous: Version,
    /// Strictly greater than `previous` whenever `publish` is true;
    /// equal to `previous` otherwise
    pub candidate: Version,
    pub bump: Option<VersionBump>,
    pub publish: bool,
}

/// Analyzes commits to determine the next version
pub struct VersionResolver {
    config: ConventionalCommitsConfig,
}

impl VersionResolver {
    pub fn new(config: ConventionalCommitsConfig) -> Self {
        VersionResolver { config }
    }

    pub fn config(&self) -> &ConventionalCommitsConfig {
        &self.config
    }

    /// Highest-severity marker across the messages, `None` if no commit carries one
    pub fn analyze_messages(&self, messages: &[String]) -> Option<VersionBump> {
        messages
            .iter()
            .filter_map(|message| {
                ParsedCommit::parse(message, &self.config.breaking_change_indicators)
                    .bump(&self.config)
            })
            .max()
    }

    /// Next version after `previous` for the commits in `range`.
    ///
    /// `recorded` is the version the manifest currently holds. A publishing
    /// candidate is never lower than it, so a manually raised manifest is
    /// released as written instead of being overwritten downwards.
    pub fn resolve(
        &self,
        range: &CommitRange,
        previous: Version,
        recorded: Option<Version>,
    ) -> Result<Resolution> {
        let bump = match self.analyze_messages(&range.messages()) {
            Some(bump) => bump,
            None => {
                return Ok(Resolution {
                    previous,
                    candidate: previous,
                    bump: None,
                    publish: false,
                })
            }
        };

        let mut candidate = previous.bump(bump)?;
        if let Some(recorded) = recorded.filter(|r| *r > candidate) {
            debug!(bumped = %candidate, %recorded, "manifest already records a higher version");
            candidate = recorded;
        }
        Ok(Resolution {
            previous,
            candidate,
            bump: Some(bump),
            publish: true,
        })
    }
}
