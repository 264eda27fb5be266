use std::path::PathBuf;

use tracing::{info, warn};

use crate::boundary::{BoundaryWarning, SkipReason};
use crate::config::{ConventionalCommitsConfig, ReleaseConfig};
use crate::domain::{ChangeKind, ParsedCommit, TagPattern, Version};
use crate::error::{CoordinatorError, ErrorKind, Result};
use crate::git::{CommitInfo, Repository};
use crate::host::{ReleaseHost, ReleaseRecord, ReleaseRequest};

/// How a publish attempt ended, short of a fatal error
#[derive(Debug, Clone, PartialEq)]
pub enum PublishResult {
    Published(ReleaseRecord),
    /// The tag is pushed but the host refused the release
    ReleaseRejected { tag: String, reason: String },
    Skipped(SkipReason),
}

/// Tags HEAD, pushes the tag and creates the release record
pub struct ReleasePublisher<'a, R: Repository, H: ReleaseHost> {
    repo: &'a R,
    host: &'a H,
    config: &'a ReleaseConfig,
    pattern: &'a TagPattern,
}

impl<'a, R: Repository, H: ReleaseHost> ReleasePublisher<'a, R, H> {
    pub fn new(repo: &'a R, host: &'a H, config: &'a ReleaseConfig, pattern: &'a TagPattern) -> Self {
        ReleasePublisher {
            repo,
            host,
            config,
            pattern,
        }
    }

    /// Publish `version` with `artifacts` (absolute paths).
    ///
    /// The caller has already established that the tag is absent remotely and
    /// that the manifest commit, if any, is in place.
    pub fn publish(
        &self,
        version: &Version,
        artifacts: Vec<PathBuf>,
        notes: String,
        warnings: &mut Vec<BoundaryWarning>,
    ) -> Result<PublishResult> {
        let tag = self.pattern.format(version);
        let remote = self.config.remote.as_str();

        // A local-only tag was never published; it may point anywhere
        if self.repo.delete_local_tag(&tag)? {
            warn!(tag = %tag, "removed stale local tag");
        }

        let head = self.repo.head_oid()?;
        self.repo.create_tag(&tag, head, false)?;
        info!(tag = %tag, commit = %head, "created tag");

        if let Err(e) = self.repo.push_tag(remote, &tag, false) {
            self.repo.delete_local_tag(&tag)?;
            return match e.kind() {
                ErrorKind::Skip => {
                    warn!(tag = %tag, error = %e, "tag push lost the race");
                    Ok(PublishResult::Skipped(SkipReason::LostTagRace {
                        tag,
                        reason: e.to_string(),
                    }))
                }
                _ => {
                    warn!(tag = %tag, error = %e, "tag push failed");
                    Ok(PublishResult::Skipped(SkipReason::RemoteUnavailable {
                        tag,
                        operation: "tag push".to_string(),
                        reason: e.to_string(),
                    }))
                }
            };
        }
        info!(tag = %tag, remote, "pushed tag");

        if self.config.push_release_commit {
            if let Some(branch) = self.repo.current_branch()? {
                if let Err(e) = self.repo.push_branch(remote, &branch) {
                    warnings.push(BoundaryWarning::ReleaseCommitNotPushed {
                        branch,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let request = ReleaseRequest {
            tag: tag.clone(),
            title: self.config.title_pattern.replace("{version}", &version.to_string()),
            notes,
            draft: self.config.draft,
            latest: self.is_latest(version)?,
            artifacts,
        };

        let record = match self.host.create_release(&request) {
            Ok(record) => record,
            Err(e) if e.kind() == ErrorKind::Reported => {
                warn!(tag = %tag, error = %e, "release not created");
                return Ok(PublishResult::ReleaseRejected {
                    tag,
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        };
        info!(tag = %tag, url = ?record.url, "release published");

        if self.config.update_major_tag {
            if let Err(e) = self.move_major_tag(version, head) {
                warnings.push(BoundaryWarning::MajorTagNotUpdated {
                    tag: self.pattern.major_tag(version),
                    reason: e.to_string(),
                });
            }
        }

        Ok(PublishResult::Published(record))
    }

    /// "latest" follows config, except that with floating major tags a
    /// release on an older major line never becomes latest
    fn is_latest(&self, version: &Version) -> Result<bool> {
        if !self.config.latest {
            return Ok(false);
        }
        if !self.config.update_major_tag {
            return Ok(true);
        }
        let highest_major = self
            .repo
            .list_tags()?
            .iter()
            .filter_map(|t| self.pattern.parse(&t.name))
            .map(|v| v.major)
            .max()
            .unwrap_or(version.major);
        Ok(version.major >= highest_major)
    }

    fn move_major_tag(&self, version: &Version, target: git2::Oid) -> Result<()> {
        let major = self.pattern.major_tag(version);
        self.repo.create_tag(&major, target, true)?;
        self.repo
            .push_tag(&self.config.remote, &major, true)
            .map_err(|e| CoordinatorError::remote(e.to_string()))?;
        info!(tag = %major, "moved floating major tag");
        Ok(())
    }
}

/// Markdown body grouping the range's commits by kind
pub fn release_notes(commits: &[CommitInfo], config: &ConventionalCommitsConfig) -> String {
    let sections = [
        (ChangeKind::Breaking, "Breaking Changes"),
        (ChangeKind::Feature, "Features"),
        (ChangeKind::Fix, "Fixes"),
        (ChangeKind::Other, "Other"),
    ];

    let parsed: Vec<(ChangeKind, &CommitInfo, String)> = commits
        .iter()
        .map(|c| {
            let p = ParsedCommit::parse(&c.message, &config.breaking_change_indicators);
            let line = match (&p.scope, p.conventional) {
                (Some(scope), true) => format!("**{}:** {}", scope, p.description),
                _ => p.description.clone(),
            };
            (p.change_kind(config), c, line)
        })
        .collect();

    let mut notes = String::new();
    for (kind, heading) in sections {
        let entries: Vec<String> = parsed
            .iter()
            .filter(|(k, _, _)| *k == kind)
            .map(|(_, c, line)| format!("- {} ({})", line, &c.hash[..c.hash.len().min(7)]))
            .collect();
        if entries.is_empty() {
            continue;
        }
        if !notes.is_empty() {
            notes.push('\n');
        }
        notes.push_str(&format!("### {}\n\n{}\n", heading, entries.join("\n")));
    }
    notes
}
