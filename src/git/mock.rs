use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use git2::{ObjectType, Oid};

use crate::error::{CoordinatorError, Result};
use crate::git::{CommitInfo, Identity, Repository, TagRef};

static NEXT_OBJECT: AtomicU64 = AtomicU64::new(1);

fn fresh_oid(message: &str) -> Oid {
    let n = NEXT_OBJECT.fetch_add(1, Ordering::Relaxed);
    Oid::hash_object(ObjectType::Blob, format!("{}\0{}", n, message).as_bytes())
        .unwrap_or_else(|_| Oid::zero())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Shared state of a mock remote: several [MockRepository] clones may point at one
#[derive(Debug, Default)]
pub struct MockRemote {
    pub tags: HashMap<String, Oid>,
    pub branches: HashMap<String, Oid>,
    /// Number of successful tag pushes, floating tags included
    pub tag_pushes: usize,
    /// Parent links of every commit pushed here, so that clones which never
    /// had a commit locally can still walk its history after a fetch
    pub commits: HashMap<Oid, Option<Oid>>,
}

impl MockRemote {
    pub fn shared() -> Arc<Mutex<MockRemote>> {
        Arc::new(Mutex::new(MockRemote::default()))
    }
}

#[derive(Debug, Clone)]
struct MockCommit {
    oid: Oid,
    info: CommitInfo,
    files: HashMap<PathBuf, String>,
}

#[derive(Debug, Clone)]
struct LocalState {
    /// Linear history, oldest first
    commits: Vec<MockCommit>,
    branch: Option<String>,
    tags: HashMap<String, Oid>,
}

type Interleave = Box<dyn FnOnce() + Send>;

/// Remote-facing operations whose failure can be simulated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    Fetch,
    TagQuery,
    TagPush,
    TagDelete,
    BranchPush,
}

/// In-memory repository with a linear history and a shared remote
pub struct MockRepository {
    workdir: PathBuf,
    local: Mutex<LocalState>,
    remote: Arc<Mutex<MockRemote>>,
    after_tag_check: Mutex<Option<Interleave>>,
    failures: Mutex<HashMap<RemoteOp, String>>,
}

impl MockRepository {
    /// Create an empty repository on `branch` whose workdir is `workdir`
    pub fn new(workdir: impl Into<PathBuf>, branch: &str, remote: Arc<Mutex<MockRemote>>) -> Self {
        MockRepository {
            workdir: workdir.into(),
            local: Mutex::new(LocalState {
                commits: Vec::new(),
                branch: Some(branch.to_string()),
                tags: HashMap::new(),
            }),
            remote,
            after_tag_check: Mutex::new(None),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// A second clone with the same history, its own workdir and the same remote
    pub fn fork(&self, workdir: impl Into<PathBuf>) -> Self {
        MockRepository {
            workdir: workdir.into(),
            local: Mutex::new(lock(&self.local).clone()),
            remote: Arc::clone(&self.remote),
            after_tag_check: Mutex::new(None),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Append a commit, snapshotting `files` on top of the previous tree
    pub fn add_commit(&self, message: &str, files: &[(&str, &str)]) -> Oid {
        let mut local = lock(&self.local);
        let mut tree = local
            .commits
            .last()
            .map(|c| c.files.clone())
            .unwrap_or_default();
        for (path, content) in files {
            tree.insert(PathBuf::from(path), content.to_string());
        }
        let oid = fresh_oid(message);
        local.commits.push(MockCommit {
            oid,
            info: CommitInfo {
                hash: oid.to_string(),
                message: message.to_string(),
                author: "Test Author".to_string(),
            },
            files: tree,
        });
        oid
    }

    /// Add a tag to the local clone only
    pub fn add_local_tag(&self, name: &str, oid: Oid) {
        lock(&self.local).tags.insert(name.to_string(), oid);
    }

    pub fn set_branch(&self, branch: Option<&str>) {
        lock(&self.local).branch = branch.map(str::to_string);
    }

    /// Run `f` once, right after the next remote tag query has been answered
    pub fn interleave_after_tag_check(&self, f: impl FnOnce() + Send + 'static) {
        *lock(&self.after_tag_check) = Some(Box::new(f));
    }

    /// Make every later `op` from this clone fail as if the remote were down
    pub fn fail_remote(&self, op: RemoteOp, reason: &str) {
        lock(&self.failures).insert(op, reason.to_string());
    }

    /// Undo every [MockRepository::fail_remote]
    pub fn restore_remote(&self) {
        lock(&self.failures).clear();
    }

    pub fn commit_count(&self) -> usize {
        lock(&self.local).commits.len()
    }

    fn position(&self, oid: Oid) -> Option<usize> {
        lock(&self.local).commits.iter().position(|c| c.oid == oid)
    }

    fn check_remote(&self, op: RemoteOp) -> Result<()> {
        match lock(&self.failures).get(&op) {
            Some(reason) => Err(CoordinatorError::remote(reason.clone())),
            None => Ok(()),
        }
    }

    /// Record the history up to `target` on the remote, as a push would
    fn upload_history(&self, target: Oid) {
        let links: Vec<(Oid, Option<Oid>)> = {
            let local = lock(&self.local);
            match local.commits.iter().position(|c| c.oid == target) {
                Some(end) => local.commits[..=end]
                    .iter()
                    .enumerate()
                    .map(|(i, c)| (c.oid, i.checked_sub(1).map(|p| local.commits[p].oid)))
                    .collect(),
                None => Vec::new(),
            }
        };
        lock(&self.remote).commits.extend(links);
    }

    /// `oid` followed by its ancestors, newest first
    fn lineage(&self, oid: Oid) -> Vec<Oid> {
        let local = lock(&self.local);
        let remote = lock(&self.remote);
        let mut chain = Vec::new();
        let mut next = Some(oid);
        while let Some(current) = next {
            chain.push(current);
            next = match local.commits.iter().position(|c| c.oid == current) {
                Some(i) => i.checked_sub(1).map(|p| local.commits[p].oid),
                None => remote.commits.get(&current).copied().flatten(),
            };
        }
        chain
    }
}

impl Repository for MockRepository {
    fn workdir(&self) -> Result<PathBuf> {
        Ok(self.workdir.clone())
    }

    fn current_branch(&self) -> Result<Option<String>> {
        Ok(lock(&self.local).branch.clone())
    }

    fn head_oid(&self) -> Result<Oid> {
        lock(&self.local)
            .commits
            .last()
            .map(|c| c.oid)
            .ok_or_else(|| CoordinatorError::Git(git2::Error::from_str("unborn HEAD")))
    }

    fn resolve_commit(&self, rev: &str) -> Result<Option<Oid>> {
        Ok(lock(&self.local)
            .commits
            .iter()
            .find(|c| c.info.hash.starts_with(rev))
            .map(|c| c.oid))
    }

    fn is_ancestor(&self, ancestor: Oid, descendant: Oid) -> Result<bool> {
        match (self.position(ancestor), self.position(descendant)) {
            (Some(a), Some(d)) => Ok(a <= d),
            _ => Ok(false),
        }
    }

    fn merge_base(&self, a: Oid, b: Oid) -> Result<Option<Oid>> {
        let theirs = self.lineage(b);
        Ok(self.lineage(a).into_iter().find(|oid| theirs.contains(oid)))
    }

    fn commits_between(&self, from: Option<Oid>, to: Oid) -> Result<Vec<CommitInfo>> {
        let end = self
            .position(to)
            .ok_or_else(|| CoordinatorError::Git(git2::Error::from_str("unknown commit")))?;
        let start = match from.and_then(|oid| self.position(oid)) {
            Some(index) => index + 1,
            None => 0,
        };
        let local = lock(&self.local);
        Ok(local.commits[start.min(end + 1)..=end]
            .iter()
            .map(|c| c.info.clone())
            .collect())
    }

    fn read_file_at(&self, commit: Oid, path: &Path) -> Result<Option<String>> {
        Ok(lock(&self.local)
            .commits
            .iter()
            .find(|c| c.oid == commit)
            .and_then(|c| c.files.get(path).cloned()))
    }

    fn commit_file(&self, path: &Path, message: &str, identity: &Identity) -> Result<Oid> {
        let content = fs::read_to_string(self.workdir.join(path))?;
        let path_str = path.to_string_lossy().to_string();
        let oid = self.add_commit(message, &[(path_str.as_str(), content.as_str())]);
        if let Some(last) = lock(&self.local).commits.last_mut() {
            last.info.author = identity.name.clone();
        }
        Ok(oid)
    }

    fn list_tags(&self) -> Result<Vec<TagRef>> {
        let mut tags: Vec<TagRef> = lock(&self.local)
            .tags
            .iter()
            .map(|(name, target)| TagRef {
                name: name.clone(),
                target: *target,
            })
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    fn find_tag(&self, name: &str) -> Result<Option<Oid>> {
        Ok(lock(&self.local).tags.get(name).copied())
    }

    fn create_tag(&self, name: &str, target: Oid, force: bool) -> Result<()> {
        let mut local = lock(&self.local);
        if !force && local.tags.contains_key(name) {
            return Err(CoordinatorError::tag(format!("Tag '{}' already exists", name)));
        }
        local.tags.insert(name.to_string(), target);
        Ok(())
    }

    fn delete_local_tag(&self, name: &str) -> Result<bool> {
        Ok(lock(&self.local).tags.remove(name).is_some())
    }

    fn fetch(&self, _remote: &str, _branch: &str) -> Result<()> {
        self.check_remote(RemoteOp::Fetch)?;
        let remote_tags = lock(&self.remote).tags.clone();
        lock(&self.local).tags.extend(remote_tags);
        Ok(())
    }

    fn remote_tag_exists(&self, _remote: &str, name: &str) -> Result<bool> {
        self.check_remote(RemoteOp::TagQuery)?;
        let exists = lock(&self.remote).tags.contains_key(name);
        let interleave = lock(&self.after_tag_check).take();
        if let Some(f) = interleave {
            f();
        }
        Ok(exists)
    }

    fn push_tag(&self, _remote: &str, name: &str, force: bool) -> Result<()> {
        self.check_remote(RemoteOp::TagPush)?;
        let target = self
            .find_tag(name)?
            .ok_or_else(|| CoordinatorError::tag(format!("No local tag '{}'", name)))?;
        self.upload_history(target);
        let mut remote = lock(&self.remote);
        match remote.tags.get(name) {
            Some(existing) if *existing != target && !force => {
                Err(CoordinatorError::TagRejected(format!(
                    "refs/tags/{}: already exists",
                    name
                )))
            }
            _ => {
                remote.tags.insert(name.to_string(), target);
                remote.tag_pushes += 1;
                Ok(())
            }
        }
    }

    fn delete_remote_tag(&self, _remote: &str, name: &str) -> Result<bool> {
        self.check_remote(RemoteOp::TagDelete)?;
        Ok(lock(&self.remote).tags.remove(name).is_some())
    }

    fn push_branch(&self, _remote: &str, branch: &str) -> Result<()> {
        self.check_remote(RemoteOp::BranchPush)?;
        let head = self.head_oid()?;
        self.upload_history(head);
        lock(&self.remote).branches.insert(branch.to_string(), head);
        Ok(())
    }
}
