// tests/integration_test.rs
//
// End-to-end runs against real git repositories: a bare remote and a working
// clone in temporary directories, with the in-memory release host.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use git2::build::RepoBuilder;
use git2::{Oid, Repository as Git2Repo, RepositoryInitOptions, Signature};
use tempfile::TempDir;

use release_coordinator::boundary::SkipReason;
use release_coordinator::config::Config;
use release_coordinator::domain::Version;
use release_coordinator::git::{CommitInfo, Git2Repository, Identity, Repository, TagRef};
use release_coordinator::host::MockReleaseHost;
use release_coordinator::{Coordinator, CoordinatorError, ErrorKind, Outcome, Result};

const MANIFEST: &str = "[package]\nname = \"system-monitoring\"\nversion = \"1.2.3\"\nedition = \"2021\"\n\n[dependencies]\nversion_check = \"0.9\"\n";

struct Sandbox {
    remote: TempDir,
    work: TempDir,
    baseline: Oid,
}

fn commit_in(dir: &Path, file: &str, content: &str, message: &str) -> Oid {
    let raw = Git2Repo::open(dir).unwrap();
    fs::write(dir.join(file), content).unwrap();
    let mut index = raw.index().unwrap();
    index.add_path(Path::new(file)).unwrap();
    index.write().unwrap();
    let tree = raw.find_tree(index.write_tree().unwrap()).unwrap();
    let sig = Signature::now("Developer", "dev@example.com").unwrap();
    let parents = match raw.head() {
        Ok(head) => vec![head.peel_to_commit().unwrap()],
        Err(_) => vec![],
    };
    let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();
    raw.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
        .unwrap()
}

fn add_artifact(dir: &Path) {
    let artifact = dir.join("target/release/system-monitoring");
    fs::create_dir_all(artifact.parent().unwrap()).unwrap();
    fs::write(&artifact, b"\x7fELF").unwrap();
}

impl Sandbox {
    /// Bare remote plus a clone on `main` whose first commit is the baseline
    fn new() -> Self {
        let remote = TempDir::new().unwrap();
        Git2Repo::init_bare(remote.path()).unwrap();

        let work = TempDir::new().unwrap();
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        let raw = Git2Repo::init_opts(work.path(), &opts).unwrap();
        raw.remote("origin", remote.path().to_str().unwrap()).unwrap();

        let mut sandbox = Sandbox {
            remote,
            work,
            baseline: Oid::zero(),
        };
        sandbox.baseline = sandbox.commit("Cargo.toml", MANIFEST, "chore: adopt release automation");

        let repo = sandbox.open();
        repo.push_branch("origin", "main").unwrap();
        add_artifact(sandbox.work.path());
        sandbox
    }

    /// Another checkout of the remote's `main`, as a second CI job would have
    fn clone_remote(&self) -> TempDir {
        let dir = TempDir::new().unwrap();
        RepoBuilder::new()
            .branch("main")
            .clone(self.remote.path().to_str().unwrap(), dir.path())
            .unwrap();
        add_artifact(dir.path());
        dir
    }

    fn raw(&self) -> Git2Repo {
        Git2Repo::open(self.work.path()).unwrap()
    }

    fn open(&self) -> Git2Repository {
        Git2Repository::open(self.work.path()).unwrap()
    }

    fn commit(&self, file: &str, content: &str, message: &str) -> Oid {
        commit_in(self.work.path(), file, content, message)
    }

    fn head(&self) -> Oid {
        self.raw().head().unwrap().peel_to_commit().unwrap().id()
    }

    fn manifest(&self) -> String {
        fs::read_to_string(self.work.path().join("Cargo.toml")).unwrap()
    }

    fn config(&self) -> Config {
        let mut config = Config::default();
        config.release.baseline = Some(self.baseline.to_string());
        config.gate.enabled = false;
        config
    }

    fn coordinator(&self, host: &MockReleaseHost) -> Coordinator<Git2Repository, MockReleaseHost> {
        Coordinator::new(self.config(), self.open(), host.clone()).unwrap()
    }

    /// Push `tag` at `target` to the remote without keeping it locally
    fn push_remote_tag(&self, tag: &str, target: Oid) {
        let repo = self.open();
        repo.create_tag(tag, target, false).unwrap();
        repo.push_tag("origin", tag, false).unwrap();
        repo.delete_local_tag(tag).unwrap();
    }

    fn remote_has_tag(&self, tag: &str) -> bool {
        self.open().remote_tag_exists("origin", tag).unwrap()
    }

    fn remote_tag_target(&self, tag: &str) -> Option<Oid> {
        let bare = Git2Repo::open_bare(self.remote.path()).unwrap();
        let reference = bare.find_reference(&format!("refs/tags/{}", tag)).ok()?;
        reference.target()
    }
}

type Hook = Box<dyn FnOnce() + Send>;

/// A real clone that lets another job act between its tag check and its push
struct Interleaved {
    inner: Git2Repository,
    after_tag_check: Mutex<Option<Hook>>,
}

impl Interleaved {
    fn new(inner: Git2Repository, hook: impl FnOnce() + Send + 'static) -> Self {
        Interleaved {
            inner,
            after_tag_check: Mutex::new(Some(Box::new(hook))),
        }
    }
}

impl Repository for Interleaved {
    fn workdir(&self) -> Result<PathBuf> {
        self.inner.workdir()
    }
    fn current_branch(&self) -> Result<Option<String>> {
        self.inner.current_branch()
    }
    fn head_oid(&self) -> Result<Oid> {
        self.inner.head_oid()
    }
    fn resolve_commit(&self, rev: &str) -> Result<Option<Oid>> {
        self.inner.resolve_commit(rev)
    }
    fn is_ancestor(&self, ancestor: Oid, descendant: Oid) -> Result<bool> {
        self.inner.is_ancestor(ancestor, descendant)
    }
    fn merge_base(&self, a: Oid, b: Oid) -> Result<Option<Oid>> {
        self.inner.merge_base(a, b)
    }
    fn commits_between(&self, from: Option<Oid>, to: Oid) -> Result<Vec<CommitInfo>> {
        self.inner.commits_between(from, to)
    }
    fn read_file_at(&self, commit: Oid, path: &Path) -> Result<Option<String>> {
        self.inner.read_file_at(commit, path)
    }
    fn commit_file(&self, path: &Path, message: &str, identity: &Identity) -> Result<Oid> {
        self.inner.commit_file(path, message, identity)
    }
    fn list_tags(&self) -> Result<Vec<TagRef>> {
        self.inner.list_tags()
    }
    fn find_tag(&self, name: &str) -> Result<Option<Oid>> {
        self.inner.find_tag(name)
    }
    fn create_tag(&self, name: &str, target: Oid, force: bool) -> Result<()> {
        self.inner.create_tag(name, target, force)
    }
    fn delete_local_tag(&self, name: &str) -> Result<bool> {
        self.inner.delete_local_tag(name)
    }
    fn fetch(&self, remote: &str, branch: &str) -> Result<()> {
        self.inner.fetch(remote, branch)
    }
    fn remote_tag_exists(&self, remote: &str, name: &str) -> Result<bool> {
        let exists = self.inner.remote_tag_exists(remote, name)?;
        let hook = self.after_tag_check.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }
        Ok(exists)
    }
    fn push_tag(&self, remote: &str, name: &str, force: bool) -> Result<()> {
        self.inner.push_tag(remote, name, force)
    }
    fn delete_remote_tag(&self, remote: &str, name: &str) -> Result<bool> {
        self.inner.delete_remote_tag(remote, name)
    }
    fn push_branch(&self, remote: &str, branch: &str) -> Result<()> {
        self.inner.push_branch(remote, branch)
    }
}

fn with_fix_and_feature(sandbox: &Sandbox) {
    sandbox.commit("src.txt", "1", "fix: handle empty cpu list");
    sandbox.commit("src.txt", "2", "feat(disk): report mount usage");
}

#[test]
fn test_publishes_next_minor_release() {
    let sandbox = Sandbox::new();
    with_fix_and_feature(&sandbox);
    let host = MockReleaseHost::new();

    let report = sandbox.coordinator(&host).run().unwrap();

    let decision = report.decision.clone().unwrap();
    assert_eq!(decision.candidate_version, Version::new(1, 3, 0));
    assert!(decision.publish);
    assert!(report.manifest_committed);

    let expected = MANIFEST.replace("version = \"1.2.3\"", "version = \"1.3.0\"");
    assert_eq!(sandbox.manifest(), expected);

    let raw = sandbox.raw();
    let head = raw.head().unwrap().peel_to_commit().unwrap();
    assert_eq!(head.message(), Some("chore(release): 1.3.0 [skip ci]"));
    assert_eq!(head.author().name(), Some("release-bot"));

    let repo = sandbox.open();
    assert_eq!(repo.find_tag("v1.3.0").unwrap(), Some(head.id()));
    assert!(sandbox.remote_has_tag("v1.3.0"));

    let record = host.release("v1.3.0").unwrap();
    assert_eq!(record.title, "Release 1.3.0");
    assert_eq!(record.assets, vec!["system-monitoring".to_string()]);
    assert!(record.latest);
    assert!(!record.draft);
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
}

#[test]
fn test_second_run_changes_nothing() {
    let sandbox = Sandbox::new();
    with_fix_and_feature(&sandbox);
    let host = MockReleaseHost::new();
    let coordinator = sandbox.coordinator(&host);

    coordinator.run().unwrap();
    let head = sandbox.head();

    let report = coordinator.run().unwrap();
    assert!(matches!(
        report.outcome,
        Outcome::Skipped(SkipReason::NoReleasableCommits { .. })
    ));
    assert_eq!(sandbox.head(), head);
    assert_eq!(host.create_calls(), 1);
    assert_eq!(host.release_count(), 1);
}

#[test]
fn test_existing_release_is_left_alone() {
    let sandbox = Sandbox::new();
    with_fix_and_feature(&sandbox);
    let tip = sandbox.head();
    sandbox.push_remote_tag("v1.3.0", tip);
    let host = MockReleaseHost::new();
    host.add_release("v1.3.0");

    let report = sandbox.coordinator(&host).run().unwrap();

    assert!(matches!(report.outcome, Outcome::Skipped(_)));
    assert!(!report.manifest_committed);
    assert_eq!(sandbox.head(), tip);
    assert_eq!(sandbox.manifest(), MANIFEST);
    assert!(sandbox.remote_has_tag("v1.3.0"));
    assert_eq!(host.create_calls(), 0);
}

#[test]
fn test_orphan_tag_removed_then_republished() {
    let sandbox = Sandbox::new();
    with_fix_and_feature(&sandbox);
    sandbox.push_remote_tag("v1.3.0", sandbox.head());
    let host = MockReleaseHost::new();
    let coordinator = sandbox.coordinator(&host);

    let report = coordinator.run().unwrap();
    assert_eq!(
        report.outcome,
        Outcome::Skipped(SkipReason::OrphanTagRemoved {
            tag: "v1.3.0".to_string(),
            local_removed: true,
            remote_removed: true,
        })
    );
    assert!(!sandbox.remote_has_tag("v1.3.0"));
    assert_eq!(sandbox.open().find_tag("v1.3.0").unwrap(), None);
    assert_eq!(host.create_calls(), 0);

    let report = coordinator.run().unwrap();
    assert_eq!(report.published().unwrap().tag, "v1.3.0");
    assert!(sandbox.remote_has_tag("v1.3.0"));
}

#[test]
fn test_cancelled_run_after_manifest_commit_converges() {
    let sandbox = Sandbox::new();
    with_fix_and_feature(&sandbox);
    // a previous run committed the manifest and was killed before tagging
    let bumped = MANIFEST.replace("1.2.3", "1.3.0");
    sandbox.commit("Cargo.toml", &bumped, "chore(release): 1.3.0 [skip ci]");
    let head = sandbox.head();
    let host = MockReleaseHost::new();

    let report = sandbox.coordinator(&host).run().unwrap();

    assert!(!report.manifest_committed);
    assert_eq!(sandbox.head(), head);
    assert_eq!(report.published().unwrap().tag, "v1.3.0");
    assert_eq!(sandbox.open().find_tag("v1.3.0").unwrap(), Some(head));
}

#[test]
fn test_successive_releases_increase() {
    let sandbox = Sandbox::new();
    with_fix_and_feature(&sandbox);
    let host = MockReleaseHost::new();
    let coordinator = sandbox.coordinator(&host);

    let first = coordinator.run().unwrap().decision.unwrap().candidate_version;

    sandbox.commit("src.txt", "3", "fix(cpu): clamp negative idle time");
    let report = coordinator.run().unwrap();
    let second = report.decision.clone().unwrap().candidate_version;

    assert_eq!(second, Version::new(1, 3, 1));
    assert!(second > first);
    assert!(report.published().is_some());
    assert!(sandbox.remote_has_tag("v1.3.1"));
}

#[test]
fn test_unreachable_baseline_aborts_without_mutation() {
    let sandbox = Sandbox::new();
    with_fix_and_feature(&sandbox);
    let head = sandbox.head();
    let host = MockReleaseHost::new();

    let mut config = sandbox.config();
    config.release.baseline = Some("0123456789abcdef0123456789abcdef01234567".to_string());
    let coordinator = Coordinator::new(config, sandbox.open(), host.clone()).unwrap();

    let err = coordinator.run().unwrap_err();
    assert!(matches!(err, CoordinatorError::ResolutionFailed(_)));
    assert_eq!(sandbox.head(), head);
    assert_eq!(sandbox.manifest(), MANIFEST);
    assert!(!sandbox.remote_has_tag("v1.3.0"));
}

#[test]
fn test_cosmetic_commits_do_not_publish() {
    let sandbox = Sandbox::new();
    sandbox.commit("src.txt", "0", "docs: describe metrics");
    let host = MockReleaseHost::new();

    let report = sandbox.coordinator(&host).run().unwrap();
    let decision = report.decision.unwrap();
    assert!(!decision.publish);
    assert_eq!(decision.candidate_version, Version::new(1, 2, 3));
    assert_eq!(host.create_calls(), 0);
}

#[test]
fn test_conflicting_tag_push_from_second_clone_is_rejected() {
    let sandbox = Sandbox::new();
    let other = sandbox.clone_remote();
    let mine = sandbox.commit("src.txt", "1", "feat(disk): report mount usage");
    let theirs = commit_in(other.path(), "src.txt", "2", "feat(net): report interface errors");

    let first = sandbox.open();
    first.create_tag("v1.3.0", mine, false).unwrap();
    first.push_tag("origin", "v1.3.0", false).unwrap();

    let second = Git2Repository::open(other.path()).unwrap();
    second.create_tag("v1.3.0", theirs, false).unwrap();
    let err = second.push_tag("origin", "v1.3.0", false).unwrap_err();

    assert!(matches!(err, CoordinatorError::TagRejected(_)), "{:?}", err);
    assert_eq!(err.kind(), ErrorKind::Skip);
    assert_eq!(sandbox.remote_tag_target("v1.3.0"), Some(mine));
}

#[test]
fn test_concurrent_runs_publish_exactly_once() {
    let sandbox = Sandbox::new();
    let other = sandbox.clone_remote();
    sandbox.commit("src.txt", "1", "feat(disk): report mount usage");
    commit_in(other.path(), "src.txt", "2", "feat(net): report interface errors");
    let host = MockReleaseHost::new();

    // the other job tags and publishes while this one sits between its
    // tag check and its push
    let winner = sandbox.coordinator(&host);
    let winner_published = std::sync::Arc::new(Mutex::new(None));
    let slot = std::sync::Arc::clone(&winner_published);
    let loser_repo = Interleaved::new(Git2Repository::open(other.path()).unwrap(), move || {
        let report = winner.run().unwrap();
        *slot.lock().unwrap() = report.published().map(|r| r.tag.clone());
    });
    let loser = Coordinator::new(sandbox.config(), loser_repo, host.clone()).unwrap();

    let report = loser.run().unwrap();

    assert!(
        matches!(report.outcome, Outcome::Skipped(SkipReason::LostTagRace { .. })),
        "{:?}",
        report.outcome
    );
    assert_eq!(winner_published.lock().unwrap().as_deref(), Some("v1.3.0"));
    assert_eq!(loser.repo().find_tag("v1.3.0").unwrap(), None);
    assert_eq!(sandbox.remote_tag_target("v1.3.0"), Some(sandbox.head()));
    assert_eq!(host.release_count(), 1);
    assert_eq!(host.create_calls(), 1);
}

#[test]
fn test_release_commit_kept_off_branch_still_advances() {
    let sandbox = Sandbox::new();
    with_fix_and_feature(&sandbox);
    sandbox.open().push_branch("origin", "main").unwrap();
    let host = MockReleaseHost::new();
    let config = || {
        let mut config = sandbox.config();
        config.release.push_release_commit = false;
        config
    };

    let report = Coordinator::new(config(), sandbox.open(), host.clone())
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(report.published().unwrap().tag, "v1.3.0");

    // the next checkout of main never saw the release commit
    let next = sandbox.clone_remote();
    commit_in(next.path(), "src.txt", "3", "fix(cpu): clamp negative idle time");
    let coordinator =
        Coordinator::new(config(), Git2Repository::open(next.path()).unwrap(), host.clone()).unwrap();

    let report = coordinator.run().unwrap();
    assert_eq!(report.resolution.unwrap().previous, Version::new(1, 3, 0));
    assert_eq!(report.published().unwrap().tag, "v1.3.1");
    let manifest = fs::read_to_string(next.path().join("Cargo.toml")).unwrap();
    assert!(manifest.contains("version = \"1.3.1\""));
    assert_eq!(host.release_count(), 2);
}
