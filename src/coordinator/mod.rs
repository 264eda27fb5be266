//! Release coordination state machine
//!
//! ```text
//! START -> RESOLVE -> CHECK_TAG -+-> exists:  RECONCILE_OR_SKIP -> END
//!                                +-> absent:  SYNC_MANIFEST -> GATE -> TAG_AND_PUSH -> PUBLISH -> END
//! ```
//!
//! One call to [Coordinator::run] walks the machine once and returns a
//! [RunReport]. There is no retry loop: a later trigger re-runs from scratch,
//! and every step tolerates the partial state an interrupted run leaves
//! behind.

pub mod inspect;
pub mod publish;
pub mod reconcile;

pub use inspect::TagInspector;
pub use publish::{release_notes, PublishResult, ReleasePublisher};
pub use reconcile::OrphanTagReconciler;

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::boundary::{BoundaryWarning, SkipReason};
use crate::config::Config;
use crate::domain::{BranchContext, TagPattern, Version};
use crate::error::{CoordinatorError, Result};
use crate::gate::GateExecutor;
use crate::git::{Identity, Repository, TagRef};
use crate::host::{ReleaseHost, ReleaseRecord};
use crate::manifest::Manifest;
use crate::resolver::{resolve_baseline, CommitRange, Resolution, VersionResolver};

/// Derived per run, never persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorDecision {
    pub candidate_version: Version,
    pub tag: String,
    pub publish: bool,
    pub skip_release: bool,
}

/// How a run ended. Fatal outcomes are the `Err` side of [Coordinator::run].
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Published(ReleaseRecord),
    Skipped(SkipReason),
    /// Tag published, release refused by the host; not retried
    ReleaseRejected { tag: String, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Absent when the run stopped before resolving
    pub decision: Option<CoordinatorDecision>,
    pub resolution: Option<Resolution>,
    pub outcome: Outcome,
    pub manifest_committed: bool,
    pub warnings: Vec<BoundaryWarning>,
}

impl RunReport {
    fn skipped(reason: SkipReason, warnings: Vec<BoundaryWarning>) -> Self {
        RunReport {
            decision: None,
            resolution: None,
            outcome: Outcome::Skipped(reason),
            manifest_committed: false,
            warnings,
        }
    }

    pub fn published(&self) -> Option<&ReleaseRecord> {
        match &self.outcome {
            Outcome::Published(record) => Some(record),
            _ => None,
        }
    }
}

/// What RESOLVE produced: a range to act on, or a reason to stop early
enum Resolved {
    Ready(Resolution, CommitRange),
    Halted(SkipReason),
}

enum Published {
    Release(Version, TagRef),
    Nothing,
    /// The host could not say whether `tag` has a release
    Unknown { tag: String, reason: String },
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Resolve,
    CheckTag,
    ReconcileOrSkip,
    SyncManifest,
    Gate,
    TagAndPush,
}

/// Drives one release decision over a repository and a release host
pub struct Coordinator<R: Repository, H: ReleaseHost> {
    config: Config,
    repo: R,
    host: H,
    pattern: TagPattern,
    manifest: Manifest,
    resolver: VersionResolver,
    dry_run: bool,
}

impl<R: Repository, H: ReleaseHost> Coordinator<R, H> {
    pub fn new(config: Config, repo: R, host: H) -> Result<Self> {
        config.validate()?;
        let pattern = TagPattern::new(&config.release.tag_pattern)?;
        let manifest = Manifest::new(&config.manifest)?;
        let resolver = VersionResolver::new(config.conventional_commits.clone());

        Ok(Coordinator {
            config,
            repo,
            host,
            pattern,
            manifest,
            resolver,
            dry_run: false,
        })
    }

    /// Stop after CHECK_TAG without mutating anything
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn enter(&self, stage: Stage) {
        debug!(stage = ?stage, "entering stage");
    }

    /// Walk the state machine once
    pub fn run(&self) -> Result<RunReport> {
        let release = &self.config.release;
        let mut warnings = Vec::new();

        let branch = BranchContext::new(self.repo.current_branch()?, release.branch.clone());
        if !branch.is_release_branch() {
            let reason = SkipReason::NotReleaseBranch {
                branch: branch.name,
                release_branch: branch.release_branch,
            };
            info!(%reason, "skipping");
            return Ok(RunReport::skipped(reason, warnings));
        }

        if let Err(e) = self.repo.fetch(&release.remote, &release.branch) {
            warn!(error = %e, "fetch failed, continuing with local refs");
            warnings.push(BoundaryWarning::FetchFailed {
                remote: release.remote.clone(),
                reason: e.to_string(),
            });
        }

        self.enter(Stage::Resolve);
        let (resolution, range) = match self.resolve(&mut warnings)? {
            Resolved::Ready(resolution, range) => (resolution, range),
            Resolved::Halted(reason) => {
                info!(%reason, "skipping");
                return Ok(RunReport::skipped(reason, warnings));
            }
        };
        let mut decision = CoordinatorDecision {
            candidate_version: resolution.candidate,
            tag: self.pattern.format(&resolution.candidate),
            publish: resolution.publish,
            skip_release: false,
        };
        info!(
            previous = %resolution.previous,
            candidate = %resolution.candidate,
            publish = resolution.publish,
            "resolved version"
        );

        let mut report = RunReport {
            decision: None,
            resolution: Some(resolution),
            outcome: Outcome::Skipped(SkipReason::DryRun {
                tag: decision.tag.clone(),
            }),
            manifest_committed: false,
            warnings: Vec::new(),
        };

        if !resolution.publish {
            decision.skip_release = true;
            report.outcome = Outcome::Skipped(SkipReason::NoReleasableCommits {
                since: range
                    .lower
                    .map(|oid| oid.to_string())
                    .unwrap_or_else(|| "the first commit".to_string()),
                commit_count: range.commits.len(),
            });
            return Ok(self.finish(report, decision, warnings));
        }

        self.enter(Stage::CheckTag);
        let inspector = TagInspector::new(&self.repo, &release.remote);
        let exists = match inspector.tag_exists(&decision.tag) {
            Ok(exists) => exists,
            Err(e) => {
                warn!(tag = %decision.tag, error = %e, "remote tag query failed");
                decision.skip_release = true;
                report.outcome = Outcome::Skipped(SkipReason::RemoteUnavailable {
                    tag: decision.tag.clone(),
                    operation: "remote tag query".to_string(),
                    reason: e.to_string(),
                });
                return Ok(self.finish(report, decision, warnings));
            }
        };
        if exists {
            self.enter(Stage::ReconcileOrSkip);
            decision.skip_release = true;
            report.outcome = Outcome::Skipped(self.reconcile_or_skip(&decision.tag)?);
            return Ok(self.finish(report, decision, warnings));
        }

        if self.dry_run {
            decision.skip_release = true;
            return Ok(self.finish(report, decision, warnings));
        }

        self.enter(Stage::SyncManifest);
        let identity = Identity {
            name: self.config.commit.name.clone(),
            email: self.config.commit.email.clone(),
        };
        let message = self
            .config
            .commit
            .message_pattern
            .replace("{version}", &decision.candidate_version.to_string());
        report.manifest_committed =
            self.manifest
                .write_version(&self.repo, &decision.candidate_version, &identity, &message)?;

        self.enter(Stage::Gate);
        let workdir = self.repo.workdir()?;
        GateExecutor::run(&self.config.gate, &workdir)?;
        let artifacts = self.artifacts(&workdir)?;

        self.enter(Stage::TagAndPush);
        let notes = release_notes(&range.commits, self.resolver.config());
        let publisher = ReleasePublisher::new(&self.repo, &self.host, release, &self.pattern);
        report.outcome = match publisher.publish(
            &decision.candidate_version,
            artifacts,
            notes,
            &mut warnings,
        )? {
            PublishResult::Published(record) => Outcome::Published(record),
            PublishResult::ReleaseRejected { tag, reason } => {
                warnings.push(BoundaryWarning::ReleaseRejected {
                    tag: tag.clone(),
                    reason: reason.clone(),
                });
                Outcome::ReleaseRejected { tag, reason }
            }
            PublishResult::Skipped(reason) => {
                decision.skip_release = true;
                Outcome::Skipped(reason)
            }
        };

        Ok(self.finish(report, decision, warnings))
    }

    fn finish(
        &self,
        mut report: RunReport,
        decision: CoordinatorDecision,
        warnings: Vec<BoundaryWarning>,
    ) -> RunReport {
        if let Outcome::Skipped(reason) = &report.outcome {
            info!(%reason, "run ended without publishing");
        }
        report.decision = Some(decision);
        report.warnings = warnings;
        report
    }

    /// RESOLVE: baseline, last published release, range, next version
    fn resolve(&self, warnings: &mut Vec<BoundaryWarning>) -> Result<Resolved> {
        let tip = self.repo.head_oid()?;
        let baseline = resolve_baseline(&self.repo, self.config.release.baseline.as_deref(), tip)?;

        let last = match self.last_published(warnings)? {
            Published::Release(version, tag) => Some((version, tag)),
            Published::Nothing => None,
            Published::Unknown { tag, reason } => {
                warn!(tag = %tag, reason = %reason, "cannot tell whether tag is released");
                return Ok(Resolved::Halted(SkipReason::ReleaseStateUnknown { tag, reason }));
            }
        };

        let at_baseline = match baseline {
            Some(base) => self.manifest.read_version_at(&self.repo, base)?,
            None => None,
        };
        let previous = last
            .as_ref()
            .map(|(version, _)| *version)
            .into_iter()
            .chain(at_baseline)
            .max()
            .unwrap_or_default();

        let release_base = match &last {
            Some((_, tag)) => self.repo.merge_base(tag.target, tip)?,
            None => None,
        };
        let range = CommitRange::collect(&self.repo, baseline, release_base, tip)?;

        let recorded = self.manifest.read_version(&self.repo.workdir()?)?;
        let resolution = self.resolver.resolve(&range, previous, recorded)?;
        Ok(Resolved::Ready(resolution, range))
    }

    /// Highest version among local tags that has a release.
    ///
    /// Every tag counts, whether or not the tip contains it: a release commit
    /// that never reached the branch still fixes the version floor. Tags
    /// without a release record do not count as published.
    fn last_published(&self, warnings: &mut Vec<BoundaryWarning>) -> Result<Published> {
        let mut candidates = Vec::new();
        for tag in self.repo.list_tags()? {
            match self.pattern.parse(&tag.name) {
                Some(version) => candidates.push((version, tag)),
                None if self.pattern.is_malformed(&tag.name) => {
                    warn!(tag = %tag.name, "ignoring unparsable tag");
                    warnings.push(BoundaryWarning::UnparsableTag { tag: tag.name });
                }
                None => {}
            }
        }
        candidates.sort_by(|a, b| b.0.cmp(&a.0));

        for (version, tag) in candidates {
            match self.host.release_exists(&tag.name) {
                Ok(true) => {
                    debug!(tag = %tag.name, target = %tag.target, "last published release");
                    return Ok(Published::Release(version, tag));
                }
                Ok(false) => debug!(tag = %tag.name, "tag has no release, not counted"),
                Err(e) => {
                    return Ok(Published::Unknown {
                        tag: tag.name,
                        reason: e.to_string(),
                    })
                }
            }
        }
        Ok(Published::Nothing)
    }

    /// The tag exists remotely: skip if released, otherwise remove it
    fn reconcile_or_skip(&self, tag: &str) -> Result<SkipReason> {
        match self.host.release_exists(tag) {
            Ok(true) => Ok(SkipReason::TagAlreadyReleased {
                tag: tag.to_string(),
            }),
            Ok(false) if self.dry_run => Ok(SkipReason::DryRun {
                tag: tag.to_string(),
            }),
            Ok(false) => {
                OrphanTagReconciler::new(&self.repo, &self.config.release.remote).reconcile(tag)
            }
            Err(e) => Ok(SkipReason::ReleaseStateUnknown {
                tag: tag.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Configured artifacts resolved against the workdir; all must exist
    fn artifacts(&self, workdir: &Path) -> Result<Vec<PathBuf>> {
        self.config
            .release
            .artifacts
            .iter()
            .map(|relative| {
                let path = workdir.join(relative);
                if path.is_file() {
                    Ok(path)
                } else {
                    Err(CoordinatorError::artifact(format!(
                        "build artifact not found: {}",
                        path.display()
                    )))
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::{Arc, Mutex};

    use git2::Oid;
    use tempfile::TempDir;

    use super::*;
    use crate::error::ErrorKind;
    use crate::git::{MockRemote, MockRepository, RemoteOp};
    use crate::host::MockReleaseHost;

    const MANIFEST: &str = "[package]\nname = \"system-monitoring\"\nversion = \"1.2.0\"\n";

    struct Fixture {
        dir: TempDir,
        repo: MockRepository,
        host: MockReleaseHost,
        baseline: Oid,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Cargo.toml"), MANIFEST).unwrap();
        let repo = MockRepository::new(dir.path(), "main", MockRemote::shared());
        let baseline = repo.add_commit("chore: adopt automation", &[("Cargo.toml", MANIFEST)]);
        Fixture {
            dir,
            repo,
            host: MockReleaseHost::new(),
            baseline,
        }
    }

    fn config(baseline: Oid) -> Config {
        let mut config = Config::default();
        config.release.baseline = Some(baseline.to_string());
        config.release.artifacts = Vec::new();
        config.gate.enabled = false;
        config
    }

    fn coordinator(f: &Fixture) -> Coordinator<MockRepository, MockReleaseHost> {
        let repo = f.repo.fork(f.dir.path());
        Coordinator::new(config(f.baseline), repo, f.host.clone()).unwrap()
    }

    fn manifest_version(dir: &TempDir) -> String {
        fs::read_to_string(dir.path().join("Cargo.toml")).unwrap()
    }

    #[test]
    fn test_feature_publishes_minor() {
        let f = fixture();
        f.repo.add_commit("feat: add disk metrics", &[]);
        let coordinator = coordinator(&f);

        let report = coordinator.run().unwrap();
        let decision = report.decision.clone().unwrap();
        assert_eq!(decision.candidate_version, Version::new(1, 3, 0));
        assert_eq!(decision.tag, "v1.3.0");
        assert!(decision.publish);
        assert!(!decision.skip_release);
        assert!(report.manifest_committed);
        assert!(report.published().is_some());

        let tagged = coordinator.repo().find_tag("v1.3.0").unwrap();
        assert_eq!(tagged, Some(coordinator.repo().head_oid().unwrap()));
        assert!(manifest_version(&f.dir).contains("version = \"1.3.0\""));
        assert!(f.host.release("v1.3.0").is_some());
    }

    #[test]
    fn test_second_run_is_idempotent() {
        let f = fixture();
        f.repo.add_commit("feat: add disk metrics", &[]);
        let coordinator = coordinator(&f);
        coordinator.run().unwrap();
        let commits = coordinator.repo().commit_count();

        let report = coordinator.run().unwrap();
        assert!(matches!(
            report.outcome,
            Outcome::Skipped(SkipReason::NoReleasableCommits { .. })
        ));
        assert_eq!(report.decision.unwrap().candidate_version, Version::new(1, 3, 0));
        assert_eq!(coordinator.repo().commit_count(), commits);
        assert_eq!(f.host.create_calls(), 1);
    }

    #[test]
    fn test_no_markers_means_no_publish() {
        let f = fixture();
        f.repo.add_commit("docs: readme", &[]);
        f.repo.add_commit("chore: bump deps", &[]);
        let coordinator = coordinator(&f);

        let report = coordinator.run().unwrap();
        let decision = report.decision.unwrap();
        assert!(!decision.publish);
        assert!(decision.skip_release);
        assert_eq!(decision.candidate_version, Version::new(1, 2, 0));
        assert_eq!(coordinator.repo().commit_count(), 3);
        assert_eq!(f.host.create_calls(), 0);
    }

    #[test]
    fn test_existing_release_skips_without_mutation() {
        let f = fixture();
        let tip = f.repo.add_commit("fix: overflow", &[]);
        f.repo.add_local_tag("v1.2.1", tip);
        f.repo.push_tag("origin", "v1.2.1", false).unwrap();
        f.repo.delete_local_tag("v1.2.1").unwrap();
        f.host.add_release("v1.2.1");
        let coordinator = coordinator(&f);
        // stale local refs: only the remote knows about the tag
        coordinator.repo().fail_remote(RemoteOp::Fetch, "early EOF");

        let report = coordinator.run().unwrap();
        assert_eq!(
            report.outcome,
            Outcome::Skipped(SkipReason::TagAlreadyReleased {
                tag: "v1.2.1".to_string()
            })
        );
        assert!(report.decision.unwrap().skip_release);
        assert!(matches!(report.warnings[..], [BoundaryWarning::FetchFailed { .. }]));
        assert_eq!(coordinator.repo().commit_count(), 2);
        assert_eq!(manifest_version(&f.dir), MANIFEST);
        assert_eq!(f.host.create_calls(), 0);
        assert!(coordinator.repo().remote_tag_exists("origin", "v1.2.1").unwrap());
    }

    #[test]
    fn test_release_commit_left_off_branch_does_not_stall() {
        let f = fixture();
        f.repo.add_commit("feat: add disk metrics", &[]);
        let first = coordinator(&f).run().unwrap();
        assert_eq!(first.published().unwrap().tag, "v1.3.0");

        // the branch moves on from before the release commit
        f.repo.add_commit("fix: overflow", &[]);
        let second = coordinator(&f);
        let report = second.run().unwrap();
        let resolution = report.resolution.unwrap();
        assert_eq!(resolution.previous, Version::new(1, 3, 0));
        assert_eq!(report.published().unwrap().tag, "v1.3.1");

        f.repo.add_commit("feat: another feature", &[]);
        let report = coordinator(&f).run().unwrap();
        assert_eq!(report.published().unwrap().tag, "v1.4.0");
        assert_eq!(f.host.release_count(), 3);
    }

    #[test]
    fn test_raised_manifest_is_released_not_lowered() {
        let f = fixture();
        let raised = MANIFEST.replace("1.2.0", "1.5.0");
        f.repo
            .add_commit("chore: start 1.5 line", &[("Cargo.toml", raised.as_str())]);
        fs::write(f.dir.path().join("Cargo.toml"), &raised).unwrap();
        f.repo.add_commit("fix: overflow", &[]);
        let coordinator = coordinator(&f);

        let report = coordinator.run().unwrap();
        let resolution = report.resolution.unwrap();
        assert_eq!(resolution.previous, Version::new(1, 2, 0));
        assert_eq!(resolution.candidate, Version::new(1, 5, 0));
        assert!(!report.manifest_committed);
        assert_eq!(manifest_version(&f.dir), raised);
        assert_eq!(report.published().unwrap().tag, "v1.5.0");
    }

    #[test]
    fn test_unreachable_remote_at_tag_check_skips() {
        let f = fixture();
        f.repo.add_commit("feat: add disk metrics", &[]);
        let coordinator = coordinator(&f);
        coordinator
            .repo()
            .fail_remote(RemoteOp::TagQuery, "failed to connect to github.com");

        let report = coordinator.run().unwrap();
        match &report.outcome {
            Outcome::Skipped(SkipReason::RemoteUnavailable { tag, operation, .. }) => {
                assert_eq!(tag, "v1.3.0");
                assert_eq!(operation, "remote tag query");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(!report.manifest_committed);
        assert_eq!(coordinator.repo().commit_count(), 2);
        assert_eq!(manifest_version(&f.dir), MANIFEST);
    }

    #[test]
    fn test_unreachable_remote_at_push_skips_without_tag() {
        let f = fixture();
        f.repo.add_commit("feat: add disk metrics", &[]);
        let coordinator = coordinator(&f);
        coordinator
            .repo()
            .fail_remote(RemoteOp::TagPush, "connection reset by peer");

        let report = coordinator.run().unwrap();
        assert!(matches!(
            report.outcome,
            Outcome::Skipped(SkipReason::RemoteUnavailable { .. })
        ));
        assert!(report.manifest_committed);
        assert_eq!(coordinator.repo().find_tag("v1.3.0").unwrap(), None);
        assert_eq!(f.host.create_calls(), 0);

        // once the remote is back the unpushed manifest commit is reused
        coordinator.repo().restore_remote();
        let commits = coordinator.repo().commit_count();
        let report = coordinator.run().unwrap();
        assert!(!report.manifest_committed);
        assert_eq!(coordinator.repo().commit_count(), commits);
        assert_eq!(report.published().unwrap().tag, "v1.3.0");
    }

    #[test]
    fn test_unanswered_release_query_stops_resolution() {
        let f = fixture();
        let head = f.repo.add_commit("feat: add disk metrics", &[]);
        f.repo.add_local_tag("v1.3.0", head);
        f.repo.add_commit("fix: overflow", &[]);
        f.host.fail_release_checks("HTTP 502: bad gateway");
        let coordinator = coordinator(&f);

        let report = coordinator.run().unwrap();
        assert!(report.decision.is_none());
        assert_eq!(
            report.outcome,
            Outcome::Skipped(SkipReason::ReleaseStateUnknown {
                tag: "v1.3.0".to_string(),
                reason: "Release host error: HTTP 502: bad gateway".to_string(),
            })
        );
        assert_eq!(coordinator.repo().commit_count(), 3);
        assert_eq!(f.host.create_calls(), 0);
    }

    #[test]
    fn test_orphan_tag_is_removed_then_republished() {
        let f = fixture();
        f.repo.add_commit("feat: add disk metrics", &[]);
        let head = f.repo.head_oid().unwrap();
        f.repo.add_local_tag("v1.3.0", head);
        f.repo.push_tag("origin", "v1.3.0", false).unwrap();
        let coordinator = coordinator(&f);

        let report = coordinator.run().unwrap();
        assert!(matches!(
            report.outcome,
            Outcome::Skipped(SkipReason::OrphanTagRemoved { remote_removed: true, .. })
        ));
        assert!(!coordinator.repo().remote_tag_exists("origin", "v1.3.0").unwrap());
        assert_eq!(f.host.create_calls(), 0);

        let report = coordinator.run().unwrap();
        assert_eq!(report.published().unwrap().tag, "v1.3.0");
    }

    #[test]
    fn test_interrupted_run_converges() {
        let f = fixture();
        f.repo.add_commit("feat: add disk metrics", &[]);
        let coordinator = coordinator(&f);

        // simulate a run cancelled right after the manifest commit
        let manifest = Manifest::new(&coordinator.config().manifest).unwrap();
        let identity = Identity {
            name: "release-bot".to_string(),
            email: "release-bot@users.noreply.github.com".to_string(),
        };
        assert!(manifest
            .write_version(coordinator.repo(), &Version::new(1, 3, 0), &identity, "chore(release): 1.3.0")
            .unwrap());
        let commits = coordinator.repo().commit_count();

        let report = coordinator.run().unwrap();
        assert!(!report.manifest_committed);
        assert_eq!(coordinator.repo().commit_count(), commits);
        assert_eq!(report.published().unwrap().tag, "v1.3.0");
    }

    #[test]
    fn test_lost_race_skips_and_cleans_up() {
        let f = fixture();
        f.repo.add_commit("feat: add disk metrics", &[]);

        let other_dir = TempDir::new().unwrap();
        fs::write(other_dir.path().join("Cargo.toml"), MANIFEST).unwrap();
        let winner = Coordinator::new(
            config(f.baseline),
            f.repo.fork(other_dir.path()),
            f.host.clone(),
        )
        .unwrap();
        let loser = coordinator(&f);

        let winner_report = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&winner_report);
        loser.repo().interleave_after_tag_check(move || {
            *slot.lock().unwrap() = Some(winner.run().unwrap());
        });

        let report = loser.run().unwrap();
        assert!(matches!(
            report.outcome,
            Outcome::Skipped(SkipReason::LostTagRace { .. })
        ));
        assert_eq!(loser.repo().find_tag("v1.3.0").unwrap(), None);

        let winner_report = winner_report.lock().unwrap().take().unwrap();
        assert!(winner_report.published().is_some());
        assert_eq!(f.host.release_count(), 1);
        assert_eq!(f.host.create_calls(), 1);
    }

    #[test]
    fn test_other_branch_is_skipped() {
        let f = fixture();
        f.repo.add_commit("feat: add disk metrics", &[]);
        let coordinator = coordinator(&f);
        coordinator.repo().set_branch(Some("feature/x"));

        let report = coordinator.run().unwrap();
        assert!(report.decision.is_none());
        assert!(matches!(
            report.outcome,
            Outcome::Skipped(SkipReason::NotReleaseBranch { .. })
        ));
    }

    #[test]
    fn test_unknown_baseline_is_fatal() {
        let f = fixture();
        f.repo.add_commit("feat: add disk metrics", &[]);
        let mut config = config(f.baseline);
        config.release.baseline = Some("0123456789abcdef".to_string());
        let coordinator = Coordinator::new(config, f.repo.fork(f.dir.path()), f.host.clone()).unwrap();

        let err = coordinator.run().unwrap_err();
        assert!(matches!(err, CoordinatorError::ResolutionFailed(_)));
        assert_eq!(err.kind(), ErrorKind::Fatal);
    }

    #[test]
    fn test_missing_artifact_is_fatal_before_tagging() {
        let f = fixture();
        f.repo.add_commit("fix: overflow", &[]);
        let mut config = config(f.baseline);
        config.release.artifacts = vec![PathBuf::from("target/release/system-monitoring")];
        let coordinator = Coordinator::new(config, f.repo.fork(f.dir.path()), f.host.clone()).unwrap();

        let err = coordinator.run().unwrap_err();
        assert!(matches!(err, CoordinatorError::Artifact(_)));
        assert_eq!(coordinator.repo().find_tag("v1.2.1").unwrap(), None);
        assert_eq!(f.host.create_calls(), 0);
    }

    #[test]
    fn test_dry_run_does_not_mutate() {
        let f = fixture();
        f.repo.add_commit("feat!: drop legacy collector", &[]);
        let coordinator = coordinator(&f).with_dry_run(true);

        let report = coordinator.run().unwrap();
        assert_eq!(report.decision.unwrap().tag, "v2.0.0");
        assert!(matches!(report.outcome, Outcome::Skipped(SkipReason::DryRun { .. })));
        assert_eq!(coordinator.repo().commit_count(), 2);
        assert_eq!(manifest_version(&f.dir), MANIFEST);
    }

    #[test]
    fn test_pre_baseline_commits_are_ignored() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Cargo.toml"), MANIFEST).unwrap();
        let repo = MockRepository::new(dir.path(), "main", MockRemote::shared());
        repo.add_commit("feat!: ancient breaking change", &[("Cargo.toml", MANIFEST)]);
        let baseline = repo.add_commit("chore: adopt automation", &[]);
        repo.add_commit("fix: overflow", &[]);

        let coordinator = Coordinator::new(config(baseline), repo, MockReleaseHost::new()).unwrap();
        let report = coordinator.run().unwrap();
        assert_eq!(report.decision.unwrap().tag, "v1.2.1");
    }
}
